//! Defines the configuration of the swerve drive and loads it from TOML.
//!
//! All lengths are in meters, speeds in meters/second and angles are suffixed with their unit.
//! The default configuration describes the reference robot, with every inch based measurement
//! converted to meters.

use std::{fs::read_to_string, path::Path};

use nalgebra::Vector2;
use serde::Deserialize;

use crate::{
    control::pid::{FeedforwardGains, PidGains},
    kinematics::swerve_kinematics::SwerveKinematics,
    Error, NUMBER_OF_MODULES,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

const METERS_PER_INCH: f64 = 0.0254;

/// Converts a length in inches to meters.
pub fn inches_to_meters(inches: f64) -> f64 {
    inches * METERS_PER_INCH
}

/// An error that occurs during loading of a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be read.
    #[error("Cannot load the configuration file: {0}")]
    FileLoad(#[from] std::io::Error),

    /// Returned when the configuration file is not valid TOML or does not match the structure
    /// of [DriveConfig].
    #[error("Cannot read the configuration file: {0}")]
    Deserialize(#[from] toml::de::Error),

    /// Returned when a configuration value is outside of the acceptable range.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] Error),
}

/// The physical layout of the drive.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GeometryConfig {
    /// The distance between the left and right sides of the frame.
    ///
    /// Units: meters
    pub track_width_m: f64,

    /// The distance between the front and back of the frame.
    ///
    /// Units: meters
    pub track_length_m: f64,

    /// Units: meters
    pub wheel_diameter_m: f64,

    /// Drive motor rotations per wheel rotation
    pub drive_gear_ratio: f64,

    /// Angle motor rotations per module rotation
    pub angle_gear_ratio: f64,

    /// The distance between the front of the frame and the front module axes.
    ///
    /// Units: meters
    #[serde(default)]
    pub front_inset_m: f64,

    /// The distance between the back of the frame and the back module axes.
    ///
    /// Units: meters
    #[serde(default)]
    pub back_inset_m: f64,

    /// The distance between the sides of the frame and the module axes.
    ///
    /// Units: meters
    #[serde(default)]
    pub side_inset_m: f64,
}

impl GeometryConfig {
    /// Returns the offset of each module from the rotation center, ordered front-left,
    /// front-right, back-left, back-right.
    pub fn module_offsets(&self) -> [Vector2<f64>; NUMBER_OF_MODULES] {
        let front_x = 0.5 * self.track_length_m - self.front_inset_m;
        let back_x = -(0.5 * self.track_length_m - self.back_inset_m);
        let left_y = 0.5 * self.track_width_m - self.side_inset_m;

        [
            Vector2::new(front_x, left_y),
            Vector2::new(front_x, -left_y),
            Vector2::new(back_x, left_y),
            Vector2::new(back_x, -left_y),
        ]
    }

    /// Returns the wheel circumference in meters.
    pub fn wheel_circumference(&self) -> f64 {
        self.wheel_diameter_m * std::f64::consts::PI
    }
}

/// The configuration of the orientation sensor.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeadingConfig {
    /// Mirrors the yaw reading. Required for sensors that report clockwise positive angles.
    pub invert: bool,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self { invert: true }
    }
}

/// The calibration of a single module.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ModuleConfig {
    /// The absolute encoder reading at which the module points forward.
    ///
    /// Units: degrees
    pub angle_offset_deg: f64,

    /// Negates the absolute encoder reading
    #[serde(default)]
    pub absolute_encoder_inverted: bool,

    /// Reverses the drive motor
    #[serde(default)]
    pub drive_inverted: bool,

    /// Reverses the angle motor
    #[serde(default)]
    pub angle_inverted: bool,
}

impl ModuleConfig {
    /// Creates a new [ModuleConfig] with the invert flags of the reference robot.
    pub fn new(angle_offset_deg: f64) -> Self {
        Self {
            angle_offset_deg,
            absolute_encoder_inverted: true,
            drive_inverted: false,
            angle_inverted: true,
        }
    }
}

/// The configuration of the odometry.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OdometryConfig {
    /// A module that moves further in one cycle than this factor times the distance it can
    /// travel at maximum speed is excluded from the odometry for that cycle.
    pub plausibility_factor: f64,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            plausibility_factor: 2.0,
        }
    }
}

/// The voltage profiles used to characterize the drive motors.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CharacterizationConfig {
    /// The rate at which the voltage increases during a quasistatic test.
    ///
    /// Units: volts/second
    pub ramp_rate_v_per_s: f64,

    /// The voltage applied during a dynamic test.
    ///
    /// Units: volts
    pub step_voltage: f64,

    /// The maximum duration of a single test.
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// The time the modules get to align, and to come to rest between tests.
    ///
    /// Units: seconds
    pub settle_s: f64,
}

impl Default for CharacterizationConfig {
    fn default() -> Self {
        Self {
            ramp_rate_v_per_s: 1.0,
            step_voltage: 7.0,
            timeout_s: 5.0,
            settle_s: 0.25,
        }
    }
}

/// The configuration of the swerve drive.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DriveConfig {
    /// Units: seconds
    pub control_period_s: f64,

    /// The maximum speed of a module.
    ///
    /// Units: meters/second
    pub max_speed_mps: f64,

    /// The maximum angular velocity of the chassis.
    ///
    /// Units: radians/second
    pub max_angular_velocity_radps: f64,

    /// The voltage all motor outputs are clamped to.
    ///
    /// Units: volts
    pub nominal_voltage: f64,

    /// The physical layout of the drive
    pub geometry: GeometryConfig,

    /// The orientation sensor configuration
    #[serde(default)]
    pub heading: HeadingConfig,

    /// The gains of the wheel speed controller, in volts per meter/second of error.
    pub drive_pid: PidGains,

    /// The feedforward model of the drive motors
    pub drive_feedforward: FeedforwardGains,

    /// The gains of the steering controller, in volts per radian of error.
    pub angle_pid: PidGains,

    /// The calibration of the modules, ordered front-left, front-right, back-left, back-right.
    pub modules: [ModuleConfig; NUMBER_OF_MODULES],

    /// The odometry configuration
    #[serde(default)]
    pub odometry: OdometryConfig,

    /// The characterization voltage profiles
    #[serde(default)]
    pub characterization: CharacterizationConfig,
}

impl Default for DriveConfig {
    fn default() -> Self {
        let nominal_voltage = 12.0;
        let max_speed_mps = 5.0;

        Self {
            control_period_s: 0.02,
            max_speed_mps,
            max_angular_velocity_radps: 7.0,
            nominal_voltage,
            geometry: GeometryConfig {
                track_width_m: inches_to_meters(26.0),
                track_length_m: inches_to_meters(31.0),
                wheel_diameter_m: inches_to_meters(4.0),
                drive_gear_ratio: 6.75,
                angle_gear_ratio: 150.0 / 7.0,
                front_inset_m: inches_to_meters(8.5),
                back_inset_m: inches_to_meters(2.5),
                side_inset_m: inches_to_meters(2.5),
            },
            heading: HeadingConfig::default(),
            drive_pid: PidGains::new(0.3, 0.0, 0.0),
            drive_feedforward: FeedforwardGains::new(0.1, nominal_voltage / max_speed_mps, 0.0),
            // 0.01 of the output per degree of error
            angle_pid: PidGains::new(0.01 * nominal_voltage * 180.0 / std::f64::consts::PI, 0.0, 0.0),
            modules: [
                ModuleConfig::new(-136.1),
                ModuleConfig::new(154.5),
                ModuleConfig::new(157.5),
                ModuleConfig::new(-107.9),
            ],
            odometry: OdometryConfig::default(),
            characterization: CharacterizationConfig::default(),
        }
    }
}

fn invalid(name: &str, reason: &str) -> Error {
    Error::InvalidConfiguration {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), Error> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(name, "must be a finite number larger than zero"));
    }

    Ok(())
}

fn require_finite(name: &str, value: f64) -> Result<(), Error> {
    if !value.is_finite() {
        return Err(invalid(name, "must be a finite number"));
    }

    Ok(())
}

impl DriveConfig {
    /// Parses and validates a configuration from a TOML string.
    ///
    /// ## Errors
    ///
    /// * [ConfigError::Deserialize] - Returned when the string is not a valid configuration,
    ///   e.g. when it does not have exactly four modules.
    /// * [ConfigError::Validation] - Returned when a value is out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: DriveConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Creates the kinematics for the configured geometry.
    ///
    /// ## Errors
    ///
    /// Returns the geometry errors of [SwerveKinematics::new].
    pub fn kinematics(&self) -> Result<SwerveKinematics, Error> {
        SwerveKinematics::new(self.geometry.module_offsets())
    }

    /// Loads and validates a configuration from a TOML file.
    ///
    /// ## Errors
    ///
    /// * [ConfigError::FileLoad] - Returned when the file cannot be read.
    /// * [ConfigError::Deserialize] - Returned when the file is not a valid configuration.
    /// * [ConfigError::Validation] - Returned when a value is out of range.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_str = read_to_string(path)?;
        Self::from_toml_str(config_str.as_str())
    }

    /// Returns the largest distance a module may plausibly travel in a single control cycle.
    ///
    /// Units: meters
    pub fn max_odometry_delta_m(&self) -> f64 {
        self.max_speed_mps * self.control_period_s * self.odometry.plausibility_factor
    }

    /// Checks that all values are in range.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned for the first value that is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        require_positive("control_period_s", self.control_period_s)?;
        require_positive("max_speed_mps", self.max_speed_mps)?;
        require_positive("max_angular_velocity_radps", self.max_angular_velocity_radps)?;
        require_positive("nominal_voltage", self.nominal_voltage)?;

        let geometry = &self.geometry;
        require_positive("geometry.track_width_m", geometry.track_width_m)?;
        require_positive("geometry.track_length_m", geometry.track_length_m)?;
        require_positive("geometry.wheel_diameter_m", geometry.wheel_diameter_m)?;
        require_positive("geometry.drive_gear_ratio", geometry.drive_gear_ratio)?;
        require_positive("geometry.angle_gear_ratio", geometry.angle_gear_ratio)?;
        require_finite("geometry.front_inset_m", geometry.front_inset_m)?;
        require_finite("geometry.back_inset_m", geometry.back_inset_m)?;
        require_finite("geometry.side_inset_m", geometry.side_inset_m)?;

        for (name, gains) in [("drive_pid", &self.drive_pid), ("angle_pid", &self.angle_pid)] {
            require_finite(&format!("{}.kp", name), gains.kp)?;
            require_finite(&format!("{}.ki", name), gains.ki)?;
            require_finite(&format!("{}.kd", name), gains.kd)?;
        }

        require_finite("drive_feedforward.ks", self.drive_feedforward.ks)?;
        require_finite("drive_feedforward.kv", self.drive_feedforward.kv)?;
        require_finite("drive_feedforward.ka", self.drive_feedforward.ka)?;

        for (i, module) in self.modules.iter().enumerate() {
            require_finite(
                &format!("modules[{}].angle_offset_deg", i),
                module.angle_offset_deg,
            )?;
        }

        require_positive(
            "odometry.plausibility_factor",
            self.odometry.plausibility_factor,
        )?;

        let characterization = &self.characterization;
        require_positive(
            "characterization.ramp_rate_v_per_s",
            characterization.ramp_rate_v_per_s,
        )?;
        require_positive("characterization.step_voltage", characterization.step_voltage)?;
        require_positive("characterization.timeout_s", characterization.timeout_s)?;
        require_finite("characterization.settle_s", characterization.settle_s)?;
        if characterization.settle_s < 0.0 {
            return Err(invalid("characterization.settle_s", "must not be negative"));
        }

        Ok(())
    }
}
