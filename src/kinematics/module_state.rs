//! Defines the targets, states and positions of the individual swerve modules.

use std::{f64::consts::FRAC_PI_2, fmt::Display};

use crate::rotation::Rotation;

#[cfg(test)]
#[path = "module_state_tests.rs"]
mod module_state_tests;

/// The desired speed and angle for a single module.
///
/// Units: meters/second for the speed. The speed is signed, a negative speed drives the wheel
/// backwards relative to the module angle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleTarget {
    /// The desired wheel speed.
    pub speed: f64,

    /// The desired module angle in the body frame.
    pub angle: Rotation,
}

impl ModuleTarget {
    /// Creates a new [ModuleTarget].
    pub fn new(speed: f64, angle: Rotation) -> Self {
        Self { speed, angle }
    }

    /// Returns the equivalent target that requires the least steering travel from the current
    /// module angle.
    ///
    /// If steering to the target angle would take more than a quarter turn then the module
    /// steers to the opposite angle and reverses the drive direction instead. The returned
    /// target therefore never needs more than 90 degrees of steering.
    ///
    /// ## Parameters
    ///
    /// * 'current_angle' - The angle the module is currently pointing at.
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_drive_core::{kinematics::module_state::ModuleTarget, rotation::Rotation};
    ///
    /// let target = ModuleTarget::new(2.0, Rotation::from_degrees(170.0));
    /// let optimized = target.optimize(Rotation::from_degrees(0.0));
    /// assert_eq!(-2.0, optimized.speed);
    /// assert!((optimized.angle.degrees() + 10.0).abs() < 1e-9);
    /// ```
    pub fn optimize(&self, current_angle: Rotation) -> ModuleTarget {
        let delta = current_angle.smallest_distance_to(self.angle);
        if delta.abs() > FRAC_PI_2 {
            ModuleTarget {
                speed: -self.speed,
                angle: self.angle.opposite(),
            }
        } else {
            *self
        }
    }
}

impl Display for ModuleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModuleTarget [{:.3} m/s at {}]", self.speed, self.angle)
    }
}

/// The measured speed and angle of a single module.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleState {
    /// The measured wheel speed in meters/second.
    pub speed: f64,

    /// The measured module angle in the body frame.
    pub angle: Rotation,
}

impl ModuleState {
    /// Creates a new [ModuleState].
    pub fn new(speed: f64, angle: Rotation) -> Self {
        Self { speed, angle }
    }
}

/// The accumulated distance and the current angle of a single module. Used for odometry.
///
/// The distance is accumulated continuously over the lifetime of the module, it is signed by the
/// direction in which the wheel turned and never reset between control cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModulePosition {
    /// The accumulated distance in meters.
    pub distance: f64,

    /// The current module angle in the body frame.
    pub angle: Rotation,
}

impl ModulePosition {
    /// Creates a new [ModulePosition].
    pub fn new(distance: f64, angle: Rotation) -> Self {
        Self { distance, angle }
    }
}
