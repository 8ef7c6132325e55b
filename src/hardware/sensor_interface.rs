//! Defines the interface for sensors

/// Defines the interface for the absolute encoder that measures the steering angle of a module.
///
/// The absolute encoder keeps its reading over a power cycle. It is used to align the relative
/// steering encoder at start-up.
pub trait AbsoluteEncoder {
    /// Returns the absolute position in rotations, in the range [0, 1), or `None` if the encoder
    /// did not provide a reading.
    fn absolute_rotations(&self) -> Option<f64>;
}

/// Defines the interface for the inertial sensor that provides the heading of the robot.
///
/// The yaw follows the convention of the common FRC gyros, i.e. it increases when the robot
/// turns clockwise when seen from above. Converting to the counter-clockwise positive heading
/// is done by the heading provider.
pub trait OrientationSensor {
    /// Returns the pitch of the robot in degrees, or `None` if no reading was available.
    fn pitch_degrees(&self) -> Option<f64>;

    /// Returns the accumulated yaw of the robot in degrees, clockwise positive, or `None` if no
    /// reading was available.
    fn yaw_degrees(&self) -> Option<f64>;
}
