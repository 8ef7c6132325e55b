/// Defines the interface for the drive and steering motors
pub mod actuator_interface;

/// Defines the interface for the absolute encoders and the orientation sensor
pub mod sensor_interface;

#[cfg(test)]
pub(crate) mod mock_hardware;
