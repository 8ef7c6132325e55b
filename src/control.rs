/// Provides the PID and feedforward controllers
pub mod pid;

/// Provides the controller for a single swerve module
pub mod swerve_module;

/// Provides the heading of the robot based on the orientation sensor
pub mod heading;
