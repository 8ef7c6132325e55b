//! Provides the controller for a single swerve module.
//!
//! A module has a drive motor that turns the wheel and an angle motor that steers the module.
//! Both motors have an integrated relative encoder. The steering is controlled on the relative
//! encoder because it has a higher resolution and update rate than the absolute encoder. The
//! absolute encoder is only used to re-zero the relative encoder, which loses its reference
//! over a power cycle.

use std::f64::consts::PI;

use log::{debug, info, trace, warn};

use crate::{
    config::DriveConfig,
    hardware::{actuator_interface::HardwareMotor, sensor_interface::AbsoluteEncoder},
    kinematics::module_state::{ModulePosition, ModuleState, ModuleTarget},
    rotation::Rotation,
    Error,
};

use super::pid::{PidController, SimpleMotorFeedforward};

#[cfg(test)]
#[path = "swerve_module_tests.rs"]
mod swerve_module_tests;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// The motors and sensors of a single swerve module.
pub struct ModuleHardware {
    /// The motor that turns the wheel
    pub drive_motor: Box<dyn HardwareMotor>,

    /// The motor that steers the module
    pub angle_motor: Box<dyn HardwareMotor>,

    /// The absolute encoder that measures the steering angle
    pub absolute_encoder: Box<dyn AbsoluteEncoder>,
}

/// Returns +1 for a motor that runs in the default direction and -1 for an inverted motor.
fn direction(inverted: bool) -> f64 {
    if inverted {
        -1.0
    } else {
        1.0
    }
}

/// Drops readings that are not finite, they are treated as a missing reading.
fn finite(reading: Option<f64>) -> Option<f64> {
    reading.filter(|value| value.is_finite())
}

/// Controls the drive and steering of a single swerve module.
///
/// The sensor values are cached. [SwerveModule::refresh] reads the sensors once per control
/// cycle, a sensor that does not provide a reading keeps its last known value and the module is
/// marked as stale until a fresh reading arrives.
pub struct SwerveModule {
    /// The stable index of the module, used for logging
    index: usize,

    hardware: ModuleHardware,

    /// The absolute encoder reading, in degrees, at which the module points forward
    angle_offset_deg: f64,

    absolute_encoder_inverted: bool,

    drive_direction: f64,
    angle_direction: f64,

    /// The wheel distance for one rotation of the drive motor
    drive_meters_per_rotation: f64,

    /// The module rotation for one rotation of the angle motor
    angle_radians_per_rotation: f64,

    max_speed: f64,
    nominal_voltage: f64,

    drive_pid: PidController,
    drive_feedforward: SimpleMotorFeedforward,
    angle_pid: PidController,

    /// The accumulated wheel distance in meters
    distance: f64,

    /// The wheel speed in meters/second
    speed: f64,

    /// The steering angle according to the relative encoder
    angle: Rotation,

    /// The last reading of the absolute encoder, without the calibration offset
    absolute_angle: Option<Rotation>,

    stale: bool,
    steering_synchronized: bool,

    /// Set while the absolute encoder is known to be unavailable, so that the outage is only
    /// reported once
    absolute_encoder_fault: bool,

    /// Set while non-finite targets are being rejected
    rejecting_targets: bool,

    last_target: Option<ModuleTarget>,
    open_loop: bool,
}

impl SwerveModule {
    /// Returns the last reading of the absolute encoder, without the calibration offset.
    pub fn absolute_angle(&self) -> Option<Rotation> {
        self.absolute_angle
    }

    /// Returns the steering angle the module locks to while characterizing the drive motors.
    pub fn calibration_angle(&self) -> Rotation {
        Rotation::from_degrees(self.angle_offset_deg)
    }

    /// Returns `true` while the absolute encoder is known to be unavailable.
    pub fn has_absolute_encoder_fault(&self) -> bool {
        self.absolute_encoder_fault
    }

    /// Re-applies the most recent target so that the closed loops keep running in cycles in
    /// which the module did not receive a new command.
    pub fn hold(&mut self) {
        match self.last_target {
            Some(target) => {
                let optimized = target.optimize(self.angle);
                self.apply(optimized, self.open_loop);
            }
            None => self.stop(),
        }
    }

    /// Returns the index of the module.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns `true` if the relative steering encoder has been re-zeroed from the absolute
    /// encoder.
    pub fn is_steering_synchronized(&self) -> bool {
        self.steering_synchronized
    }

    /// Returns `true` if one of the sensors did not provide a reading in the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Returns the most recent target the module was driven to, after the steering
    /// optimization.
    pub fn last_target(&self) -> Option<ModuleTarget> {
        self.last_target
    }

    /// Creates a new [SwerveModule] instance.
    ///
    /// The steering is not synchronized with the absolute encoder until
    /// [SwerveModule::reset_steering_to_absolute] is called.
    ///
    /// ## Parameters
    ///
    /// * 'index' - The index of the module, 0 to 3
    /// * 'config' - The drive configuration which contains the module calibration
    /// * 'hardware' - The motors and sensors of the module
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when there is no module configuration for
    ///   the given index.
    pub fn new(index: usize, config: &DriveConfig, hardware: ModuleHardware) -> Result<Self, Error> {
        let module = config
            .modules
            .get(index)
            .ok_or_else(|| Error::InvalidConfiguration {
                name: format!("modules[{}]", index),
                reason: "no configuration for the module".to_string(),
            })?;

        let geometry = &config.geometry;
        let mut result = Self {
            index,
            hardware,
            angle_offset_deg: module.angle_offset_deg,
            absolute_encoder_inverted: module.absolute_encoder_inverted,
            drive_direction: direction(module.drive_inverted),
            angle_direction: direction(module.angle_inverted),
            drive_meters_per_rotation: geometry.wheel_circumference() / geometry.drive_gear_ratio,
            angle_radians_per_rotation: 2.0 * PI / geometry.angle_gear_ratio,
            max_speed: config.max_speed_mps,
            nominal_voltage: config.nominal_voltage,
            drive_pid: PidController::new(config.drive_pid, config.control_period_s),
            drive_feedforward: SimpleMotorFeedforward::new(config.drive_feedforward),
            angle_pid: PidController::new(config.angle_pid, config.control_period_s),
            distance: 0.0,
            speed: 0.0,
            angle: Rotation::zero(),
            absolute_angle: None,
            stale: false,
            steering_synchronized: false,
            absolute_encoder_fault: false,
            rejecting_targets: false,
            last_target: None,
            open_loop: false,
        };

        result.refresh();
        Ok(result)
    }

    /// Returns the accumulated distance and the current angle of the module.
    pub fn position(&self) -> ModulePosition {
        ModulePosition::new(self.distance, self.angle)
    }

    /// Reads all sensors of the module. Sensors that do not provide a reading, or provide a
    /// non-finite reading, keep their last known value.
    pub fn refresh(&mut self) {
        let mut missing = false;

        match finite(self.hardware.drive_motor.encoder_position()) {
            Some(rotations) => {
                self.distance = self.drive_direction * rotations * self.drive_meters_per_rotation
            }
            None => missing = true,
        }

        match finite(self.hardware.drive_motor.encoder_velocity()) {
            Some(rpm) => {
                self.speed = self.drive_direction * rpm * self.drive_meters_per_rotation
                    / SECONDS_PER_MINUTE
            }
            None => missing = true,
        }

        match finite(self.hardware.angle_motor.encoder_position()) {
            Some(rotations) => {
                self.angle = Rotation::from_radians(
                    self.angle_direction * rotations * self.angle_radians_per_rotation,
                )
            }
            None => missing = true,
        }

        if let Some(rotations) = finite(self.hardware.absolute_encoder.absolute_rotations()) {
            self.absolute_angle = Some(self.absolute_from_rotations(rotations));
        }

        if missing && !self.stale {
            warn!(
                "Module {} did not provide a sensor reading. Using the last known values.",
                self.index
            );
        } else if !missing && self.stale {
            info!("Module {} sensor readings restored.", self.index);
        }
        self.stale = missing;
    }

    /// Re-zeroes the relative steering encoder from the absolute encoder and the calibration
    /// offset.
    ///
    /// ## Errors
    ///
    /// * [Error::AbsoluteEncoderUnavailable] - Returned when the absolute encoder did not
    ///   provide a reading. The relative encoder is left unchanged.
    pub fn reset_steering_to_absolute(&mut self) -> Result<(), Error> {
        let absolute = match finite(self.hardware.absolute_encoder.absolute_rotations()) {
            Some(rotations) => self.absolute_from_rotations(rotations),
            None => {
                if !self.absolute_encoder_fault {
                    warn!(
                        "Module {} absolute encoder unavailable. Steering was not re-zeroed.",
                        self.index
                    );
                    self.absolute_encoder_fault = true;
                }
                return Err(Error::AbsoluteEncoderUnavailable { index: self.index });
            }
        };

        if self.absolute_encoder_fault {
            info!("Module {} absolute encoder restored.", self.index);
            self.absolute_encoder_fault = false;
        }

        let angle = Rotation::from_degrees(absolute.degrees() - self.angle_offset_deg);
        let rotations = self.angle_direction * angle.radians() / self.angle_radians_per_rotation;
        self.hardware.angle_motor.reset_encoder_position(rotations);

        self.absolute_angle = Some(absolute);
        self.angle = angle;
        self.angle_pid.reset();
        self.steering_synchronized = true;

        debug!("Module {} steering re-zeroed to {}", self.index, angle);
        Ok(())
    }

    /// Drives the module towards the target.
    ///
    /// The target is optimized first so that the module never steers more than a quarter turn.
    /// If the steering has not been synchronized with the absolute encoder yet then the module
    /// synchronizes before driving. A target with a non-finite speed or angle is replaced by a
    /// stationary target at the current angle.
    ///
    /// ## Parameters
    ///
    /// * 'target' - The desired speed and angle of the module
    /// * 'open_loop' - If `true` the drive voltage is proportional to the target speed,
    ///   otherwise the measured wheel speed is controlled to the target speed.
    pub fn set_desired_state(&mut self, target: ModuleTarget, open_loop: bool) {
        if !self.steering_synchronized {
            if !self.absolute_encoder_fault {
                warn!(
                    "Module {} received a command before the steering was re-zeroed. Re-zeroing now.",
                    self.index
                );
            }

            // On failure the module keeps steering on the relative encoder
            let _ = self.reset_steering_to_absolute();
        }

        let target = if target.speed.is_finite() && target.angle.radians().is_finite() {
            if self.rejecting_targets {
                info!("Module {} received a valid target again.", self.index);
                self.rejecting_targets = false;
            }
            target
        } else {
            if !self.rejecting_targets {
                warn!(
                    "Module {} received a non-finite target {}. Holding the current angle.",
                    self.index, target
                );
                self.rejecting_targets = true;
            }
            ModuleTarget::new(0.0, self.angle)
        };

        let optimized = target.optimize(self.angle);
        self.last_target = Some(optimized);
        self.open_loop = open_loop;
        self.apply(optimized, open_loop);
    }

    /// Applies a voltage to the drive motor while the steering holds the calibration angle.
    ///
    /// Bypasses the drive closed loop. Used for characterizing the drive motors.
    ///
    /// ## Parameters
    ///
    /// * 'volts' - The drive voltage, clamped to the nominal voltage
    pub fn set_raw_voltage(&mut self, volts: f64) {
        self.last_target = None;

        let drive_voltage = self.clamp_voltage(volts);
        self.hardware
            .drive_motor
            .set_voltage(self.drive_direction * drive_voltage);

        let steering_voltage = self.steering_voltage(self.calibration_angle());
        self.hardware
            .angle_motor
            .set_voltage(self.angle_direction * steering_voltage);

        trace!(
            "Module {} raw drive voltage {:.3} V, steering {:.3} V",
            self.index,
            drive_voltage,
            steering_voltage
        );
    }

    /// Returns the measured speed and angle of the module.
    pub fn state(&self) -> ModuleState {
        ModuleState::new(self.speed, self.angle)
    }

    /// Removes all power from the module and clears the last target.
    pub fn stop(&mut self) {
        self.last_target = None;
        self.drive_pid.reset();
        self.angle_pid.reset();
        self.hardware.drive_motor.set_voltage(0.0);
        self.hardware.angle_motor.set_voltage(0.0);
    }

    fn absolute_from_rotations(&self, rotations: f64) -> Rotation {
        let degrees = rotations * 360.0;
        if self.absolute_encoder_inverted {
            Rotation::from_degrees(-degrees)
        } else {
            Rotation::from_degrees(degrees)
        }
    }

    fn apply(&mut self, target: ModuleTarget, open_loop: bool) {
        let drive_voltage = if open_loop {
            self.clamp_voltage(target.speed / self.max_speed * self.nominal_voltage)
        } else {
            let feedforward = self.drive_feedforward.calculate(target.speed, 0.0);
            let feedback = self.drive_pid.calculate(self.speed, target.speed);
            self.clamp_voltage(feedforward + feedback)
        };

        let steering_voltage = self.steering_voltage(target.angle);

        self.hardware
            .drive_motor
            .set_voltage(self.drive_direction * drive_voltage);
        self.hardware
            .angle_motor
            .set_voltage(self.angle_direction * steering_voltage);

        trace!(
            "Module {} target {}, drive {:.3} V, steering {:.3} V",
            self.index,
            target,
            drive_voltage,
            steering_voltage
        );
    }

    fn clamp_voltage(&self, volts: f64) -> f64 {
        if volts.is_nan() {
            return 0.0;
        }

        volts.clamp(-self.nominal_voltage, self.nominal_voltage)
    }

    fn steering_voltage(&mut self, target: Rotation) -> f64 {
        let error = self.angle.smallest_distance_to(target);
        let output = self.angle_pid.calculate_from_error(error);
        self.clamp_voltage(output)
    }
}
