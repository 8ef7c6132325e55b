//! Provides the estimate of the robot pose on the field from the wheel odometry and the heading.
//!
//! The module displacements since the previous update are converted into a body-frame twist by
//! the kinematics. The twist is integrated along an arc, see [Pose::exp]. The heading sensor is
//! authoritative for the rotation, the modules are authoritative for the translation.

use log::{debug, trace, warn};

use crate::{
    geometry::{Pose, Twist},
    kinematics::{module_state::ModulePosition, swerve_kinematics::SwerveKinematics},
    rotation::Rotation,
    NUMBER_OF_MODULES,
};

#[cfg(test)]
#[path = "odometry_tests.rs"]
mod odometry_tests;

/// Describes the data quality of the most recent odometry update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OdometryReport {
    /// For each module, `true` if its displacement was implausible and it was excluded from the
    /// update.
    pub rejected: [bool; NUMBER_OF_MODULES],

    /// `true` if too few modules were plausible to compute a translation. The pose only rotated
    /// in that update.
    pub translation_lost: bool,
}

impl OdometryReport {
    /// Returns `true` if any module was excluded from the update.
    pub fn has_rejections(&self) -> bool {
        self.rejected.iter().any(|r| *r)
    }
}

fn is_finite(position: &ModulePosition) -> bool {
    position.distance.is_finite() && position.angle.radians().is_finite()
}

/// Tracks the pose of the robot on the field.
///
/// The estimator has a single writer, the drive coordinator, which calls
/// [PoseEstimator::update] once per control cycle.
#[derive(Clone, Debug)]
pub struct PoseEstimator {
    pose: Pose,

    /// The difference between the pose heading and the sensor heading
    heading_offset: Rotation,

    previous_heading: Rotation,
    previous_positions: [ModulePosition; NUMBER_OF_MODULES],

    /// For each module, `true` if it has no finite reference position. The first finite
    /// position becomes the new reference and the module is excluded from that update.
    needs_reference: [bool; NUMBER_OF_MODULES],

    /// Module displacements larger than this are implausible for a single cycle.
    ///
    /// Units: meters
    max_delta: f64,

    report: OdometryReport,
}

impl PoseEstimator {
    /// Returns the largest plausible module displacement per update in meters.
    pub fn max_delta(&self) -> f64 {
        self.max_delta
    }

    /// Creates a new [PoseEstimator] instance.
    ///
    /// ## Parameters
    ///
    /// * 'heading' - The current heading from the heading provider
    /// * 'positions' - The current accumulated positions of the modules
    /// * 'pose' - The initial pose on the field
    /// * 'max_delta' - The largest plausible module displacement per update in meters
    pub fn new(
        heading: Rotation,
        positions: &[ModulePosition; NUMBER_OF_MODULES],
        pose: Pose,
        max_delta: f64,
    ) -> Self {
        Self {
            pose,
            heading_offset: pose.heading() - heading,
            previous_heading: heading,
            previous_positions: *positions,
            needs_reference: positions.map(|p| !is_finite(&p)),
            max_delta,
            report: OdometryReport::default(),
        }
    }

    /// Returns the current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Keeps the pose on the field while the heading provider changes its reference, e.g. after
    /// it was zeroed.
    ///
    /// ## Parameters
    ///
    /// * 'heading' - The heading from the heading provider after the change
    pub fn rebase_heading(&mut self, heading: Rotation) {
        self.heading_offset = self.pose.heading() - heading;
        self.previous_heading = heading;
    }

    /// Returns the data quality report of the most recent update.
    pub fn report(&self) -> &OdometryReport {
        &self.report
    }

    /// Overwrites the pose. The pose is not blended with the current estimate.
    ///
    /// ## Parameters
    ///
    /// * 'pose' - The new pose on the field
    /// * 'heading' - The current heading from the heading provider
    /// * 'positions' - The current accumulated positions of the modules
    pub fn reset_pose(
        &mut self,
        pose: Pose,
        heading: Rotation,
        positions: &[ModulePosition; NUMBER_OF_MODULES],
    ) {
        self.pose = pose;
        self.heading_offset = pose.heading() - heading;
        self.previous_heading = heading;
        self.previous_positions = *positions;
        self.needs_reference = positions.map(|p| !is_finite(&p));
        self.report = OdometryReport::default();
    }

    /// Advances the pose estimate with the latest heading and module positions.
    ///
    /// A module whose displacement is not finite, or larger than the plausible maximum, is
    /// excluded from this update and flagged in the [OdometryReport]. Its reference position is
    /// still advanced so that the next update only sees the next displacement. A module that
    /// reported a non-finite position is excluded once more when its position is finite again,
    /// that position becomes its new reference.
    ///
    /// A non-finite heading is ignored, the previous heading is used instead.
    ///
    /// Returns the new pose.
    ///
    /// ## Parameters
    ///
    /// * 'kinematics' - The kinematics of the drive
    /// * 'heading' - The current heading from the heading provider
    /// * 'positions' - The current accumulated positions of the modules
    pub fn update(
        &mut self,
        kinematics: &SwerveKinematics,
        heading: Rotation,
        positions: &[ModulePosition; NUMBER_OF_MODULES],
    ) -> Pose {
        let heading = if heading.radians().is_finite() {
            heading
        } else {
            warn!("Heading is not finite. Using the previous heading for odometry.");
            self.previous_heading
        };

        let mut deltas = [ModulePosition::default(); NUMBER_OF_MODULES];
        let mut included = [true; NUMBER_OF_MODULES];
        let mut report = OdometryReport::default();

        for i in 0..NUMBER_OF_MODULES {
            if !is_finite(&positions[i]) {
                warn!("Module {} position is not finite. Excluded from odometry.", i);
                self.needs_reference[i] = true;
                included[i] = false;
                report.rejected[i] = true;
                continue;
            }

            if self.needs_reference[i] {
                debug!("Module {} position is finite again. Using it as the new reference.", i);
                self.needs_reference[i] = false;
                self.previous_positions[i] = positions[i];
                included[i] = false;
                report.rejected[i] = true;
                continue;
            }

            let delta = positions[i].distance - self.previous_positions[i].distance;
            deltas[i] = ModulePosition::new(delta, positions[i].angle);
            self.previous_positions[i] = positions[i];

            if delta.abs() > self.max_delta {
                warn!(
                    "Module {} moved an implausible {:.3} m in one cycle. Excluded from odometry.",
                    i, delta
                );
                included[i] = false;
                report.rejected[i] = true;
            }
        }

        let twist = match kinematics.to_twist_from_subset(&deltas, &included) {
            Some(t) => t,
            None => {
                warn!("Too few plausible modules to compute the odometry translation.");
                report.translation_lost = true;
                Twist::default()
            }
        };

        let dtheta = self.previous_heading.smallest_distance_to(heading);
        let new_pose = self.pose.exp(&Twist::new(twist.dx, twist.dy, dtheta));

        self.pose = new_pose.with_heading(heading + self.heading_offset);
        self.previous_heading = heading;
        self.report = report;

        trace!("Odometry pose {}", self.pose);
        self.pose
    }
}
