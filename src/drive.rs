//! Provides the drive coordinator that owns the modules, the heading provider and the pose
//! estimator.
//!
//! The coordinator runs in a single control loop. Drive requests are dispatched to the modules
//! when they are made. [SwerveDrive::periodic] is called once at the end of every control cycle,
//! it keeps the closed loops running, advances the odometry and publishes the telemetry.

use log::{debug, info, trace, warn};

use crate::{
    characterization::{CharacterizationDirection, CharacterizationDriver},
    config::{CharacterizationConfig, DriveConfig},
    control::{
        heading::HeadingProvider,
        swerve_module::{ModuleHardware, SwerveModule},
    },
    geometry::Pose,
    hardware::sensor_interface::OrientationSensor,
    kinematics::{
        chassis_speeds::BodyMotion,
        module_state::{ModulePosition, ModuleState, ModuleTarget},
        swerve_kinematics::{desaturate, SwerveKinematics},
    },
    odometry::{OdometryReport, PoseEstimator},
    rotation::Rotation,
    telemetry::{ModuleTelemetry, TelemetryFrame, TelemetrySink},
    Error, NUMBER_OF_MODULES,
};

#[cfg(test)]
#[path = "drive_tests.rs"]
mod drive_tests;

/// The operations an external path follower uses to drive the robot.
///
/// All values use meters, radians and seconds with the same conventions as the kinematics.
pub trait HolonomicDrive {
    /// Returns the velocity of the chassis in the body frame.
    fn chassis_velocity(&self) -> BodyMotion;

    /// Drives the robot with a velocity in the body frame.
    fn drive_robot_relative(&mut self, motion: BodyMotion);

    /// Returns the estimated pose on the field.
    fn pose(&self) -> Pose;

    /// Overwrites the estimated pose on the field.
    fn reset_pose(&mut self, pose: Pose);
}

/// An external component that follows a path by driving a [HolonomicDrive].
///
/// The follower is invoked inline in the control cycle, see
/// [SwerveDrive::periodic_with_follower].
pub trait PathFollower {
    /// Performs one control cycle of path following.
    fn follow(&mut self, drive: &mut dyn HolonomicDrive);
}

/// The mode of the drive without the mode specific data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriveModeKind {
    /// Drive requests are converted into module targets.
    Normal,
    /// The modules hold the X-lock pattern.
    Locked,
    /// The drive motors follow a characterization voltage profile.
    Characterizing,
}

/// The mode of the drive.
#[derive(Clone, Debug, PartialEq)]
pub enum DriveMode {
    /// Drive requests are converted into module targets.
    Normal,

    /// All drive requests are replaced by the X-lock pattern.
    Locked,

    /// Drive requests are ignored while the drive motors follow a characterization voltage
    /// profile.
    Characterizing(CharacterizationDriver),
}

impl DriveMode {
    /// Returns the mode without the mode specific data.
    pub fn kind(&self) -> DriveModeKind {
        match self {
            DriveMode::Normal => DriveModeKind::Normal,
            DriveMode::Locked => DriveModeKind::Locked,
            DriveMode::Characterizing(_) => DriveModeKind::Characterizing,
        }
    }
}

/// Coordinates the four swerve modules.
pub struct SwerveDrive {
    kinematics: SwerveKinematics,
    modules: [SwerveModule; NUMBER_OF_MODULES],
    heading: HeadingProvider,
    estimator: PoseEstimator,
    mode: DriveMode,
    telemetry: Box<dyn TelemetrySink>,

    /// Units: meters/second
    max_speed: f64,

    /// Units: radians/second
    max_angular_velocity: f64,

    /// Units: seconds
    period: f64,

    nominal_voltage: f64,
    characterization: CharacterizationConfig,

    /// Set when the module speeds were scaled down in the current cycle
    desaturated: bool,

    /// Set when the modules received a command in the current cycle
    commanded: bool,

    /// Set while non-finite drive requests are being rejected
    rejecting_motion: bool,

    cycle: u64,
}

impl SwerveDrive {
    /// Stops the characterization run and returns to normal driving. Does nothing if no
    /// characterization is running.
    pub fn cancel_characterization(&mut self) {
        if self.is_characterizing() {
            info!("Characterization cancelled");
            self.finish_characterization();
        }
    }

    /// Returns the velocity of the chassis in the body frame, computed from the measured module
    /// states.
    pub fn chassis_velocity(&self) -> BodyMotion {
        self.kinematics.to_body_motion(&self.module_states())
    }

    /// Drives the robot.
    ///
    /// The angular velocity is limited to the configured maximum. A request with a non-finite
    /// component is replaced by a stationary request. In the locked mode the modules receive the
    /// X-lock pattern instead. While characterizing the request is ignored.
    ///
    /// ## Parameters
    ///
    /// * 'motion' - The desired motion in the body or the field frame
    /// * 'open_loop' - If `true` the drive voltages are proportional to the target speeds,
    ///   otherwise the wheel speeds are controlled.
    pub fn drive(&mut self, motion: BodyMotion, open_loop: bool) {
        match self.mode.kind() {
            DriveModeKind::Characterizing => {
                debug!("Ignoring drive request {} while characterizing", motion);
            }
            DriveModeKind::Locked => {
                let targets = self.kinematics.x_lock_targets();
                self.dispatch(&targets, open_loop);
            }
            DriveModeKind::Normal => {
                let motion = self.limit_motion(motion);
                let current_angles = self.module_states().map(|s| s.angle);
                let mut targets = self.kinematics.to_module_targets(
                    &motion,
                    self.heading.heading(),
                    &current_angles,
                );
                self.desaturated |= desaturate(&mut targets, self.max_speed);
                self.dispatch(&targets, open_loop);
            }
        }
    }

    /// Drives the robot with a body frame velocity under closed-loop control.
    ///
    /// The velocity is discretized over the control period so that the robot does not drift
    /// sideways while translating and rotating at the same time.
    pub fn drive_robot_relative(&mut self, motion: BodyMotion) {
        let body = self
            .limit_motion(motion)
            .to_body_frame(self.heading.heading())
            .discretize(self.period);
        self.drive(body, false);
    }

    /// Returns the current heading from the heading provider.
    pub fn heading(&self) -> Rotation {
        self.heading.heading()
    }

    /// Rotates the heading by half a turn and negates the pitch. The pose on the field is kept.
    pub fn invert_heading(&mut self) {
        self.heading.invert();
        self.estimator.rebase_heading(self.heading.heading());
    }

    /// Returns `true` while a characterization run is active.
    pub fn is_characterizing(&self) -> bool {
        matches!(self.mode, DriveMode::Characterizing(_))
    }

    /// Returns `true` while the modules hold the X-lock pattern.
    pub fn is_locked(&self) -> bool {
        matches!(self.mode, DriveMode::Locked)
    }

    /// Returns the kinematics of the drive.
    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    /// Returns the mode of the drive.
    pub fn mode(&self) -> DriveModeKind {
        self.mode.kind()
    }

    /// Returns the accumulated positions of the modules.
    pub fn module_positions(&self) -> [ModulePosition; NUMBER_OF_MODULES] {
        std::array::from_fn(|i| self.modules[i].position())
    }

    /// Returns the measured states of the modules.
    pub fn module_states(&self) -> [ModuleState; NUMBER_OF_MODULES] {
        std::array::from_fn(|i| self.modules[i].state())
    }

    /// Creates a new [SwerveDrive] instance.
    ///
    /// The steering of every module is re-zeroed from its absolute encoder. A module whose
    /// absolute encoder does not respond re-zeroes itself when it receives its first command.
    ///
    /// ## Parameters
    ///
    /// * 'config' - The drive configuration
    /// * 'hardware' - The motors and sensors of the modules, ordered front-left, front-right,
    ///   back-left, back-right
    /// * 'orientation_sensor' - The sensor that provides the heading
    /// * 'telemetry' - The sink for the telemetry frames
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when a configuration value is out of range.
    /// * [Error::CoincidentModules] - Returned when two modules are at the same location.
    /// * [Error::DegenerateGeometry] - Returned when the module layout cannot resolve the chassis
    ///   rotation.
    /// * [Error::InvalidModuleOffset] - Returned when a module offset is not finite.
    pub fn new(
        config: &DriveConfig,
        hardware: [ModuleHardware; NUMBER_OF_MODULES],
        orientation_sensor: Box<dyn OrientationSensor>,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let kinematics = config.kinematics()?;

        let [front_left, front_right, back_left, back_right] = hardware;
        let mut modules = [
            SwerveModule::new(0, config, front_left)?,
            SwerveModule::new(1, config, front_right)?,
            SwerveModule::new(2, config, back_left)?,
            SwerveModule::new(3, config, back_right)?,
        ];

        for module in modules.iter_mut() {
            // A failure has been logged and the module re-zeroes on its first command
            let _ = module.reset_steering_to_absolute();
        }

        let heading = HeadingProvider::new(orientation_sensor, config.heading.invert);
        let positions: [ModulePosition; NUMBER_OF_MODULES] =
            std::array::from_fn(|i| modules[i].position());
        let estimator = PoseEstimator::new(
            heading.heading(),
            &positions,
            Pose::default(),
            config.max_odometry_delta_m(),
        );

        info!(
            "Swerve drive created. Drive base radius {:.3} m, maximum speed {:.2} m/s",
            kinematics.drive_base_radius(),
            config.max_speed_mps
        );

        Ok(Self {
            kinematics,
            modules,
            heading,
            estimator,
            mode: DriveMode::Normal,
            telemetry,
            max_speed: config.max_speed_mps,
            max_angular_velocity: config.max_angular_velocity_radps,
            period: config.control_period_s,
            nominal_voltage: config.nominal_voltage,
            characterization: config.characterization.clone(),
            desaturated: false,
            commanded: false,
            rejecting_motion: false,
            cycle: 0,
        })
    }

    /// Returns the data quality report of the most recent odometry update.
    pub fn odometry_report(&self) -> &OdometryReport {
        self.estimator.report()
    }

    /// Completes the control cycle.
    ///
    /// Advances an active characterization run, or re-applies the last module targets if no
    /// command was given in this cycle. Then reads the sensors, updates the pose estimate and
    /// publishes the telemetry.
    pub fn periodic(&mut self) {
        self.cycle += 1;

        let characterization_step = match &mut self.mode {
            DriveMode::Characterizing(driver) => Some(driver.advance(self.period)),
            _ => None,
        };

        match characterization_step {
            Some(Some(voltage)) => {
                for module in self.modules.iter_mut() {
                    module.set_raw_voltage(voltage);
                }
            }
            Some(None) => {
                info!("Characterization finished");
                self.finish_characterization();
            }
            None => {
                if !self.commanded {
                    for module in self.modules.iter_mut() {
                        module.hold();
                    }
                }
            }
        }

        self.heading.refresh();
        for module in self.modules.iter_mut() {
            module.refresh();
        }

        let positions = self.module_positions();
        self.estimator
            .update(&self.kinematics, self.heading.heading(), &positions);

        self.publish_telemetry();

        self.commanded = false;
        self.desaturated = false;
    }

    /// Completes the control cycle after letting the path follower drive the robot.
    ///
    /// The follower is invoked before the cycle completes so that its commands are applied in
    /// the same cycle.
    pub fn periodic_with_follower(&mut self, follower: &mut dyn PathFollower) {
        follower.follow(self);
        self.periodic();
    }

    /// Returns the pitch of the robot in degrees.
    pub fn pitch(&self) -> f64 {
        self.heading.pitch()
    }

    /// Returns the estimated pose on the field.
    pub fn pose(&self) -> Pose {
        self.estimator.pose()
    }

    /// Re-zeroes the steering of all modules from their absolute encoders.
    ///
    /// All modules are attempted, even if one of them fails.
    ///
    /// ## Errors
    ///
    /// * [Error::AbsoluteEncoderUnavailable] - Returned for the first module whose absolute
    ///   encoder did not provide a reading.
    pub fn reset_modules_to_absolute(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for module in self.modules.iter_mut() {
            if let Err(e) = module.reset_steering_to_absolute() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }

    /// Overwrites the estimated pose on the field.
    pub fn reset_pose(&mut self, pose: Pose) {
        let positions = self.module_positions();
        self.estimator
            .reset_pose(pose, self.heading.heading(), &positions);
        info!("Pose reset to {}", pose);
    }

    /// Starts a quasistatic characterization test in a single direction.
    ///
    /// ## Parameters
    ///
    /// * 'direction' - The direction of travel
    /// * 'duration' - The duration of the voltage ramp in seconds, limited to the configured
    ///   timeout
    pub fn run_voltage_ramp(&mut self, direction: CharacterizationDirection, duration: f64) {
        let driver = CharacterizationDriver::run_voltage_ramp(
            direction,
            duration,
            &self.characterization,
            self.nominal_voltage,
        );
        self.start_characterization_with(driver);
    }

    /// Sets the offset that is added to the heading. The pose on the field is kept.
    pub fn set_heading_offset(&mut self, offset: Rotation) {
        self.heading.set_offset(offset);
        self.estimator.rebase_heading(self.heading.heading());
    }

    /// Enables or disables the X-lock pattern.
    ///
    /// Enabling sends the pattern to the modules immediately. Disabling returns to normal
    /// driving, the modules keep the pattern until the next drive request. Ignored while
    /// characterizing.
    pub fn set_locked(&mut self, locked: bool) {
        match (self.mode.kind(), locked) {
            (DriveModeKind::Characterizing, _) => {
                debug!("Ignoring lock request while characterizing");
            }
            (DriveModeKind::Normal, true) => {
                info!("Drive locked");
                self.mode = DriveMode::Locked;
                let targets = self.kinematics.x_lock_targets();
                self.dispatch(&targets, false);
            }
            (DriveModeKind::Locked, false) => {
                info!("Drive unlocked");
                self.mode = DriveMode::Normal;
            }
            _ => {}
        }
    }

    /// Drives the modules to externally computed targets under closed-loop control.
    ///
    /// The targets are desaturated first. In the locked mode the modules receive the X-lock
    /// pattern instead. While characterizing the request is ignored.
    pub fn set_module_targets(&mut self, targets: [ModuleTarget; NUMBER_OF_MODULES]) {
        match self.mode.kind() {
            DriveModeKind::Characterizing => {
                debug!("Ignoring module targets while characterizing");
            }
            DriveModeKind::Locked => {
                let targets = self.kinematics.x_lock_targets();
                self.dispatch(&targets, false);
            }
            DriveModeKind::Normal => {
                let mut targets = targets;
                self.desaturated |= desaturate(&mut targets, self.max_speed);
                self.dispatch(&targets, false);
            }
        }
    }

    /// Starts the full characterization routine: quasistatic and dynamic tests in both
    /// directions.
    pub fn start_characterization(&mut self) {
        let driver =
            CharacterizationDriver::full_routine(&self.characterization, self.nominal_voltage);
        self.start_characterization_with(driver);
    }

    /// Toggles the X-lock pattern, see [SwerveDrive::set_locked].
    pub fn toggle_lock(&mut self) {
        let locked = self.is_locked();
        self.set_locked(!locked);
    }

    /// Makes the current direction of the robot the zero heading. The pose on the field is kept.
    pub fn zero_heading(&mut self) {
        self.heading.zero();
        self.estimator.rebase_heading(self.heading.heading());
    }

    fn dispatch(&mut self, targets: &[ModuleTarget; NUMBER_OF_MODULES], open_loop: bool) {
        for (module, target) in self.modules.iter_mut().zip(targets.iter()) {
            module.set_desired_state(*target, open_loop);
        }
        self.commanded = true;
    }

    fn finish_characterization(&mut self) {
        self.mode = DriveMode::Normal;
        for module in self.modules.iter_mut() {
            module.stop();
        }
    }

    fn limit_motion(&mut self, motion: BodyMotion) -> BodyMotion {
        if !(motion.vx.is_finite() && motion.vy.is_finite() && motion.omega.is_finite()) {
            if !self.rejecting_motion {
                warn!("Ignoring non-finite drive request {}. Holding position.", motion);
                self.rejecting_motion = true;
            }

            return BodyMotion {
                vx: 0.0,
                vy: 0.0,
                omega: 0.0,
                ..motion
            };
        }

        if self.rejecting_motion {
            info!("Drive requests are finite again.");
            self.rejecting_motion = false;
        }

        BodyMotion {
            omega: motion
                .omega
                .clamp(-self.max_angular_velocity, self.max_angular_velocity),
            ..motion
        }
    }

    fn publish_telemetry(&mut self) {
        let modules = std::array::from_fn(|i| {
            let module = &self.modules[i];
            let state = module.state();
            let target = module.last_target();
            ModuleTelemetry {
                absolute_angle_deg: module.absolute_angle().map(|a| a.degrees()),
                measured_angle_deg: state.angle.degrees(),
                measured_speed_mps: state.speed,
                target_angle_deg: target.map(|t| t.angle.degrees()),
                target_speed_mps: target.map(|t| t.speed),
                stale: module.is_stale(),
                steering_synchronized: module.is_steering_synchronized(),
            }
        });

        let frame = TelemetryFrame {
            cycle: self.cycle,
            modules,
            pose: self.estimator.pose(),
            mode: self.mode.kind(),
            desaturated: self.desaturated,
            heading_stale: self.heading.is_stale(),
            odometry: *self.estimator.report(),
        };

        if self.heading.is_stale() || self.modules.iter().any(|m| m.is_stale()) {
            trace!("Cycle {} used stale sensor values", self.cycle);
        }

        self.telemetry.publish(&frame);
    }

    fn start_characterization_with(&mut self, driver: CharacterizationDriver) {
        if self.is_characterizing() {
            warn!("Restarting the characterization while a run was active");
        }

        info!(
            "Characterization started, first phase: {}",
            driver
                .phase()
                .map_or_else(|| "none".to_string(), |p| p.to_string())
        );
        self.mode = DriveMode::Characterizing(driver);
    }
}

impl HolonomicDrive for SwerveDrive {
    fn chassis_velocity(&self) -> BodyMotion {
        SwerveDrive::chassis_velocity(self)
    }

    fn drive_robot_relative(&mut self, motion: BodyMotion) {
        SwerveDrive::drive_robot_relative(self, motion)
    }

    fn pose(&self) -> Pose {
        SwerveDrive::pose(self)
    }

    fn reset_pose(&mut self, pose: Pose) {
        SwerveDrive::reset_pose(self, pose)
    }
}
