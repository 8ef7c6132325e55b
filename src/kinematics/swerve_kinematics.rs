//! Provides the conversions between the motion of the chassis and the states of the modules.
//!
//! The inverse kinematics compute, for every module, the wheel velocity vector that is the sum of
//! the chassis linear velocity and the tangential velocity caused by the chassis rotation at the
//! module location:
//!
//! ```text
//! | v_x,i |   | 1  0  -r_y,i |   | v_x   |
//! | v_y,i | = | 0  1   r_x,i | * | v_y   |
//!                                | omega |
//! ```
//!
//! Stacking these rows for all modules gives an 8x3 matrix. The forward kinematics solve the
//! over-determined system in the least-squares sense using the normal equations, which is exact
//! for measurements that are consistent with a rigid chassis.
//!
//! ## References
//!
//! * [A vector algebra formulation of mobile robot velocity kinematics](https://scholar.google.co.nz/citations?view_op=view_citation&hl=en&user=H10kxZgAAAAJ&cstart=20&pagesize=80&sortby=pubdate&citation_for_view=H10kxZgAAAAJ:qjMakFHDy7sC)
//!   Neal Seegmiller and Alonzo Kelly
//!   Field and Service Robotics: Results of the 8th International Conference
//!   2013/12/31

extern crate nalgebra as na;

use na::{Matrix3, RowVector3, SMatrix, SVector, Vector2, Vector3};

use crate::{
    geometry::Twist,
    kinematics::{
        chassis_speeds::BodyMotion,
        module_state::{ModulePosition, ModuleState, ModuleTarget},
    },
    rotation::Rotation,
    Error, NUMBER_OF_MODULES,
};

#[cfg(test)]
#[path = "swerve_kinematics_tests.rs"]
mod swerve_kinematics_tests;

/// The number of rows in the stacked module equations, two per module.
const NUMBER_OF_ROWS: usize = 2 * NUMBER_OF_MODULES;

/// Modules closer together than this distance are considered to be at the same location.
///
/// Units: meters
const COINCIDENT_MODULE_DISTANCE: f64 = 1e-6;

/// The smallest acceptable determinant for the normal equations. Anything smaller means the
/// module layout cannot resolve the chassis rotation.
const MINIMUM_NORMAL_DETERMINANT: f64 = 1e-9;

/// Module speeds below this value are treated as stationary. A stationary module keeps its
/// current angle instead of steering towards an undefined direction.
///
/// Units: meters/second
const STATIONARY_MODULE_SPEED: f64 = 1e-9;

/// Returns the two rows of the inverse kinematics matrix for a module at the given offset.
fn module_rows(offset: &Vector2<f64>) -> (RowVector3<f64>, RowVector3<f64>) {
    (
        RowVector3::new(1.0, 0.0, -offset.y),
        RowVector3::new(0.0, 1.0, offset.x),
    )
}

/// Solves the least-squares problem for the chassis motion from the per-module velocity or
/// displacement vectors. Modules for which 'included' is false are ignored.
///
/// Returns `None` when the included modules cannot resolve the chassis motion.
fn solve_least_squares(
    offsets: &[Vector2<f64>; NUMBER_OF_MODULES],
    vectors: &[Vector2<f64>; NUMBER_OF_MODULES],
    included: &[bool; NUMBER_OF_MODULES],
) -> Option<Vector3<f64>> {
    let mut normal = Matrix3::<f64>::zeros();
    let mut rhs = Vector3::<f64>::zeros();
    for i in 0..NUMBER_OF_MODULES {
        if !included[i] {
            continue;
        }

        let (x_row, y_row) = module_rows(&offsets[i]);
        normal += x_row.transpose() * x_row + y_row.transpose() * y_row;
        rhs += x_row.transpose() * vectors[i].x + y_row.transpose() * vectors[i].y;
    }

    if normal.determinant().abs() < MINIMUM_NORMAL_DETERMINANT {
        return None;
    }

    normal.try_inverse().map(|inverse| inverse * rhs)
}

/// Scales all module speeds down by the same ratio so that none of them exceeds the maximum
/// speed.
///
/// Scaling all modules by the same ratio keeps the relative wheel speeds, and therefore the
/// shape of the commanded path, intact. The module angles are never changed.
///
/// Returns `true` if the speeds were scaled and `false` if all speeds were already attainable.
///
/// ## Parameters
///
/// * 'targets' - The module targets that should be desaturated
/// * 'max_speed' - The maximum attainable module speed in meters/second
pub fn desaturate(targets: &mut [ModuleTarget; NUMBER_OF_MODULES], max_speed: f64) -> bool {
    let max_observed = targets
        .iter()
        .map(|t| t.speed.abs())
        .fold(0.0_f64, f64::max);

    if max_speed <= 0.0 || max_observed <= max_speed {
        return false;
    }

    let ratio = max_speed / max_observed;
    for target in targets.iter_mut() {
        target.speed *= ratio;
    }

    true
}

/// Converts between the motion of the chassis and the states of the four modules.
///
/// The kinematics are stateless after construction. The module offsets are fixed for the life
/// time of the instance.
#[derive(Clone, Debug)]
pub struct SwerveKinematics {
    /// The offset of each module from the rotation center, in the body frame.
    ///
    /// Units: meters
    module_offsets: [Vector2<f64>; NUMBER_OF_MODULES],

    /// Maps the chassis motion (vx, vy, omega) to the stacked module vectors.
    inverse_kinematics: SMatrix<f64, NUMBER_OF_ROWS, 3>,

    /// Maps the stacked module vectors to the least-squares chassis motion.
    forward_kinematics: SMatrix<f64, 3, NUMBER_OF_ROWS>,
}

impl SwerveKinematics {
    /// Returns the distance from the rotation center to the module that is furthest away.
    ///
    /// Units: meters
    pub fn drive_base_radius(&self) -> f64 {
        self.module_offsets
            .iter()
            .map(|o| o.norm())
            .fold(0.0_f64, f64::max)
    }

    /// Creates a new [SwerveKinematics] with the modules on the corners of a rectangle centered
    /// on the rotation center.
    ///
    /// Modules are ordered front-left, front-right, back-left, back-right.
    ///
    /// ## Parameters
    ///
    /// * 'track_length' - The distance between the front and back modules in meters
    /// * 'track_width' - The distance between the left and right modules in meters
    ///
    /// ## Errors
    ///
    /// * [Error::CoincidentModules] - Returned when the rectangle has a zero length or width.
    /// * [Error::InvalidModuleOffset] - Returned when a dimension is not finite.
    pub fn from_track(track_length: f64, track_width: f64) -> Result<Self, Error> {
        let half_length = 0.5 * track_length;
        let half_width = 0.5 * track_width;
        Self::new([
            Vector2::new(half_length, half_width),
            Vector2::new(half_length, -half_width),
            Vector2::new(-half_length, half_width),
            Vector2::new(-half_length, -half_width),
        ])
    }

    /// Returns the offsets of the modules from the rotation center.
    pub fn module_offsets(&self) -> &[Vector2<f64>; NUMBER_OF_MODULES] {
        &self.module_offsets
    }

    /// Creates a new [SwerveKinematics] instance.
    ///
    /// ## Parameters
    ///
    /// * 'module_offsets' - The offset of each module from the rotation center, in meters, in
    ///   the body frame (x forward, y to the left).
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidModuleOffset] - Returned when an offset is not a finite number.
    /// * [Error::CoincidentModules] - Returned when two modules are at the same location.
    /// * [Error::DegenerateGeometry] - Returned when the layout cannot resolve the chassis
    ///   rotation.
    pub fn new(module_offsets: [Vector2<f64>; NUMBER_OF_MODULES]) -> Result<Self, Error> {
        for (index, offset) in module_offsets.iter().enumerate() {
            if !offset.x.is_finite() || !offset.y.is_finite() {
                return Err(Error::InvalidModuleOffset { index });
            }
        }

        for first in 0..NUMBER_OF_MODULES {
            for second in first + 1..NUMBER_OF_MODULES {
                if (module_offsets[first] - module_offsets[second]).norm()
                    < COINCIDENT_MODULE_DISTANCE
                {
                    return Err(Error::CoincidentModules { first, second });
                }
            }
        }

        let mut inverse_kinematics = SMatrix::<f64, NUMBER_OF_ROWS, 3>::zeros();
        for (i, offset) in module_offsets.iter().enumerate() {
            let (x_row, y_row) = module_rows(offset);
            inverse_kinematics.set_row(2 * i, &x_row);
            inverse_kinematics.set_row(2 * i + 1, &y_row);
        }

        let transpose = inverse_kinematics.transpose();
        let normal = transpose * inverse_kinematics;
        if normal.determinant().abs() < MINIMUM_NORMAL_DETERMINANT {
            return Err(Error::DegenerateGeometry);
        }

        let normal_inverse = normal.try_inverse().ok_or(Error::DegenerateGeometry)?;
        let forward_kinematics = normal_inverse * transpose;

        Ok(Self {
            module_offsets,
            inverse_kinematics,
            forward_kinematics,
        })
    }

    /// Returns the chassis motion, in the body frame, that best matches the measured module
    /// states.
    ///
    /// ## Parameters
    ///
    /// * 'states' - The measured states of the modules.
    pub fn to_body_motion(&self, states: &[ModuleState; NUMBER_OF_MODULES]) -> BodyMotion {
        let mut module_vectors = SVector::<f64, NUMBER_OF_ROWS>::zeros();
        for (i, state) in states.iter().enumerate() {
            module_vectors[2 * i] = state.speed * state.angle.cos();
            module_vectors[2 * i + 1] = state.speed * state.angle.sin();
        }

        let chassis = self.forward_kinematics * module_vectors;
        BodyMotion::body(chassis[0], chassis[1], chassis[2])
    }

    /// Returns the module targets that produce the desired chassis motion.
    ///
    /// Field-relative motions are rotated into the body frame first. A motion with all
    /// components equal to zero returns zero speed targets that keep the current module angles.
    ///
    /// The returned targets are not desaturated, use [desaturate] to limit the module speeds.
    ///
    /// ## Parameters
    ///
    /// * 'motion' - The desired chassis motion
    /// * 'heading' - The current heading of the robot on the field, used for field-relative
    ///   motions
    /// * 'current_angles' - The angles the modules are currently pointing at
    pub fn to_module_targets(
        &self,
        motion: &BodyMotion,
        heading: Rotation,
        current_angles: &[Rotation; NUMBER_OF_MODULES],
    ) -> [ModuleTarget; NUMBER_OF_MODULES] {
        if motion.is_stationary() {
            return std::array::from_fn(|i| ModuleTarget::new(0.0, current_angles[i]));
        }

        let body = motion.to_body_frame(heading);
        let module_vectors = self.inverse_kinematics * Vector3::new(body.vx, body.vy, body.omega);

        std::array::from_fn(|i| {
            let x = module_vectors[2 * i];
            let y = module_vectors[2 * i + 1];
            let speed = x.hypot(y);
            if speed < STATIONARY_MODULE_SPEED {
                ModuleTarget::new(0.0, current_angles[i])
            } else {
                ModuleTarget::new(speed, Rotation::from_vector(x, y))
            }
        })
    }

    /// Returns the body-frame displacement of the chassis given the displacement of each
    /// module since the previous update.
    ///
    /// ## Parameters
    ///
    /// * 'deltas' - The distance each module travelled since the previous update, together with
    ///   the current module angle.
    pub fn to_twist(&self, deltas: &[ModulePosition; NUMBER_OF_MODULES]) -> Twist {
        let mut module_vectors = SVector::<f64, NUMBER_OF_ROWS>::zeros();
        for (i, delta) in deltas.iter().enumerate() {
            module_vectors[2 * i] = delta.distance * delta.angle.cos();
            module_vectors[2 * i + 1] = delta.distance * delta.angle.sin();
        }

        let chassis = self.forward_kinematics * module_vectors;
        Twist::new(chassis[0], chassis[1], chassis[2])
    }

    /// Returns the body-frame displacement of the chassis using only a subset of the modules.
    ///
    /// Returns `None` if the included modules cannot resolve the chassis motion, e.g. when
    /// fewer than two modules are included.
    ///
    /// ## Parameters
    ///
    /// * 'deltas' - The distance each module travelled since the previous update, together with
    ///   the current module angle.
    /// * 'included' - Indicates for each module if it should be used.
    pub fn to_twist_from_subset(
        &self,
        deltas: &[ModulePosition; NUMBER_OF_MODULES],
        included: &[bool; NUMBER_OF_MODULES],
    ) -> Option<Twist> {
        if included.iter().all(|i| *i) {
            return Some(self.to_twist(deltas));
        }

        let vectors = deltas.map(|d| {
            Vector2::new(d.distance * d.angle.cos(), d.distance * d.angle.sin())
        });

        solve_least_squares(&self.module_offsets, &vectors, included)
            .map(|chassis| Twist::new(chassis[0], chassis[1], chassis[2]))
    }

    /// Returns the module targets for the X-lock braking pattern.
    ///
    /// Every module points along the line through its own location and the rotation center,
    /// with zero speed, so that the wheels resist being pushed in any direction.
    pub fn x_lock_targets(&self) -> [ModuleTarget; NUMBER_OF_MODULES] {
        self.module_offsets
            .map(|offset| ModuleTarget::new(0.0, Rotation::from_vector(offset.x, offset.y)))
    }
}
