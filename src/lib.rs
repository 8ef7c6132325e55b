#![warn(missing_docs)]

//! Drive-control core for a four module swerve (4 wheel steering and 4 wheel drive) robot.
//!
//! Converts body-frame or field-frame motion commands into per-module speed and angle targets,
//! drives each module towards its target under closed-loop control and fuses wheel odometry with
//! the heading sensor into a pose estimate on the field.
//!
//! All values use SI units: meters, radians and seconds. The body frame has x pointing forward,
//! y pointing to the left and counter-clockwise rotations are positive.

use thiserror::Error;

/// Defines the wrapped angle type used for headings and module angles
pub mod rotation;

/// Defines poses and twists in the 2D field plane
pub mod geometry;

/// Provides the conversions between chassis motion and module states
pub mod kinematics;

/// Defines the interfaces to the motors and sensors
pub mod hardware;

/// Provides the closed-loop controllers for the modules and the heading provider
pub mod control;

/// Provides the pose estimation from wheel odometry
pub mod odometry;

/// Provides the voltage profiles used for system identification
pub mod characterization;

/// Provides the best-effort telemetry output
pub mod telemetry;

/// Defines the configuration of the drive
pub mod config;

/// Provides the drive coordinator that owns the modules
pub mod drive;

/// The number of swerve modules on the robot. Module indices 0 to 3 are stable identities.
///
/// Modules are ordered front-left, front-right, back-left, back-right.
pub const NUMBER_OF_MODULES: usize = 4;

/// Defines the different errors for the swerve drive crate.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Returned when the module layout cannot resolve chassis rotation, e.g. because all modules
    /// are mounted at the same point.
    #[error("The module geometry is degenerate and cannot resolve the chassis motion")]
    DegenerateGeometry,

    /// Returned when two modules are mounted at the same location.
    #[error("Modules {first} and {second} are mounted at the same location")]
    CoincidentModules {
        /// The index of the first module
        first: usize,
        /// The index of the second module
        second: usize,
    },

    /// Returned when the offset of a module is not a finite number.
    #[error("The offset of module {index} is not a finite number")]
    InvalidModuleOffset {
        /// The index of the module
        index: usize,
    },

    /// Returned when the absolute steering encoder of a module did not provide a reading.
    #[error("The absolute encoder of module {index} did not provide a reading")]
    AbsoluteEncoderUnavailable {
        /// The index of the module
        index: usize,
    },

    /// Returned when a configuration value is outside of the acceptable range.
    #[error("Invalid configuration value for '{name}': {reason}")]
    InvalidConfiguration {
        /// The name of the configuration value
        name: String,
        /// The reason the value was rejected
        reason: String,
    },
}
