/// Defines the motion of the chassis
pub mod chassis_speeds;

/// Defines the targets, states and positions of the individual modules
pub mod module_state;

/// Provides the conversions between chassis motion and module states
pub mod swerve_kinematics;
