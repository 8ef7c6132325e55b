//! Defines the interface for the motors of a swerve module.

/// Defines the interface for a motor controller with an integrated relative encoder.
///
/// Every module has two of these, one that drives the wheel and one that steers the module. All
/// commands are voltages. The closed-loop control runs in the drive core, not on the motor
/// controller.
///
/// Encoder readings are expressed in motor rotations. Converting to wheel distance or module
/// angle is done by the swerve module using the gear ratios. A reading of `None` means the
/// hardware did not provide a value for the current cycle.
pub trait HardwareMotor {
    /// Returns the position of the integrated encoder in motor rotations.
    fn encoder_position(&self) -> Option<f64>;

    /// Returns the velocity of the integrated encoder in motor rotations per minute.
    fn encoder_velocity(&self) -> Option<f64>;

    /// Sets the position of the integrated encoder.
    ///
    /// ## Parameters
    ///
    /// * 'rotations' - The new encoder position in motor rotations.
    fn reset_encoder_position(&mut self, rotations: f64);

    /// Applies a voltage to the motor.
    ///
    /// ## Parameters
    ///
    /// * 'volts' - The voltage to apply. Positive values turn the motor forward.
    fn set_voltage(&mut self, volts: f64);
}
