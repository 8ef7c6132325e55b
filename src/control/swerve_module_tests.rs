use std::f64::consts::PI;

use float_cmp::{ApproxEq, F64Margin};

use crate::{
    config::{DriveConfig, ModuleConfig},
    hardware::mock_hardware::{MockAbsoluteEncoder, MockMotor},
    kinematics::module_state::ModuleTarget,
    rotation::Rotation,
    Error,
};

use super::{ModuleHardware, SwerveModule};

fn margin() -> F64Margin {
    F64Margin {
        ulps: 4,
        epsilon: 1e-9,
    }
}

struct TestModule {
    module: SwerveModule,
    drive: MockMotor,
    angle: MockMotor,
    absolute: MockAbsoluteEncoder,
}

fn plain_config(angle_offset_deg: f64) -> DriveConfig {
    let mut config = DriveConfig::default();
    config.modules[0] = ModuleConfig {
        angle_offset_deg,
        absolute_encoder_inverted: false,
        drive_inverted: false,
        angle_inverted: false,
    };
    config
}

fn create_module(config: &DriveConfig, absolute_rotations: Option<f64>) -> TestModule {
    let drive = MockMotor::new();
    let angle = MockMotor::new();
    let absolute = MockAbsoluteEncoder::new(absolute_rotations);

    let module = SwerveModule::new(
        0,
        config,
        ModuleHardware {
            drive_motor: Box::new(drive.clone()),
            angle_motor: Box::new(angle.clone()),
            absolute_encoder: Box::new(absolute.clone()),
        },
    )
    .unwrap();

    TestModule {
        module,
        drive,
        angle,
        absolute,
    }
}

fn create_synchronized_module(config: &DriveConfig) -> TestModule {
    let mut result = create_module(config, Some(0.0));
    result.module.reset_steering_to_absolute().unwrap();
    result
}

// Construction

#[test]
fn when_creating_a_module_without_configuration_should_fail() {
    let config = DriveConfig::default();
    let result = SwerveModule::new(
        4,
        &config,
        ModuleHardware {
            drive_motor: Box::new(MockMotor::new()),
            angle_motor: Box::new(MockMotor::new()),
            absolute_encoder: Box::new(MockAbsoluteEncoder::new(Some(0.0))),
        },
    );

    assert!(matches!(result, Err(Error::InvalidConfiguration { .. })));
}

#[test]
fn when_creating_a_module_should_not_be_synchronized() {
    let config = plain_config(0.0);
    let test = create_module(&config, Some(0.1));

    assert!(!test.module.is_steering_synchronized());
    assert_eq!(None, test.module.last_target());
    assert_eq!(0, test.module.index());
}

// Absolute re-zeroing

#[test]
fn when_resetting_to_absolute_should_subtract_the_calibration_offset() {
    let config = plain_config(30.0);
    let mut test = create_module(&config, Some(0.25));

    test.module.reset_steering_to_absolute().unwrap();

    assert!(test.module.is_steering_synchronized());
    assert!(test.module.state().angle.degrees().approx_eq(60.0, margin()));

    // 60 degrees of module rotation in angle motor rotations
    let expected_rotations = config.geometry.angle_gear_ratio / 6.0;
    let resets = test.angle.position_resets();
    assert_eq!(1, resets.len());
    assert!(resets[0].approx_eq(expected_rotations, margin()));

    // The relative encoder now reports the synchronized angle
    test.module.refresh();
    assert!(test.module.state().angle.degrees().approx_eq(60.0, margin()));
}

#[test]
fn when_resetting_an_inverted_absolute_encoder_should_negate_the_reading() {
    let mut config = plain_config(0.0);
    config.modules[0].absolute_encoder_inverted = true;
    let mut test = create_module(&config, Some(0.25));

    test.module.reset_steering_to_absolute().unwrap();

    assert!(test.module.state().angle.degrees().approx_eq(-90.0, margin()));
    assert!(test
        .module
        .absolute_angle()
        .unwrap()
        .degrees()
        .approx_eq(-90.0, margin()));
}

#[test]
fn when_resetting_an_inverted_angle_motor_should_negate_the_encoder_position() {
    let mut config = plain_config(0.0);
    config.modules[0].angle_inverted = true;
    let mut test = create_module(&config, Some(0.25));

    test.module.reset_steering_to_absolute().unwrap();
    test.module.refresh();

    let resets = test.angle.position_resets();
    assert!(resets[0].approx_eq(-config.geometry.angle_gear_ratio / 4.0, margin()));
    assert!(test.module.state().angle.degrees().approx_eq(90.0, margin()));
}

#[test]
fn when_resetting_without_an_absolute_reading_should_fail_and_keep_the_encoder() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, None);

    let result = test.module.reset_steering_to_absolute();

    assert_eq!(Err(Error::AbsoluteEncoderUnavailable { index: 0 }), result);
    assert!(!test.module.is_steering_synchronized());
    assert!(test.angle.position_resets().is_empty());
}

#[test]
fn when_commanding_before_synchronizing_should_synchronize_first() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, Some(0.125));

    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::from_degrees(45.0)), true);

    assert!(test.module.is_steering_synchronized());
    assert_eq!(1, test.angle.position_resets().len());
    assert!(test.module.state().angle.degrees().approx_eq(45.0, margin()));
}

#[test]
fn when_commanding_without_an_absolute_reading_should_still_drive() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, None);

    test.module
        .set_desired_state(ModuleTarget::new(2.5, Rotation::zero()), true);

    assert!(!test.module.is_steering_synchronized());
    assert!(test.drive.last_voltage().unwrap().approx_eq(6.0, margin()));
}

#[test]
fn when_the_absolute_encoder_stays_unavailable_should_flag_the_outage_until_it_recovers() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, None);
    assert!(!test.module.has_absolute_encoder_fault());

    for _ in 0..3 {
        test.module
            .set_desired_state(ModuleTarget::new(1.0, Rotation::zero()), true);
        assert!(test.module.has_absolute_encoder_fault());
    }
    assert!(test.angle.position_resets().is_empty());

    test.absolute.set_rotations(Some(0.0));
    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::zero()), true);

    assert!(!test.module.has_absolute_encoder_fault());
    assert!(test.module.is_steering_synchronized());
    assert_eq!(1, test.angle.position_resets().len());
}

#[test]
fn when_the_absolute_reading_is_not_finite_should_not_resynchronize() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, Some(f64::NAN));

    let result = test.module.reset_steering_to_absolute();

    assert_eq!(Err(Error::AbsoluteEncoderUnavailable { index: 0 }), result);
    assert!(test.module.has_absolute_encoder_fault());
    assert!(test.angle.position_resets().is_empty());
    assert_eq!(None, test.module.absolute_angle());
}

// Drive output

#[test]
fn when_driving_open_loop_should_scale_the_speed_to_the_nominal_voltage() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(2.5, Rotation::zero()), true);

    assert!(test.drive.last_voltage().unwrap().approx_eq(6.0, margin()));
    assert!(test.angle.last_voltage().unwrap().approx_eq(0.0, margin()));
}

#[test]
fn when_driving_to_the_opposite_angle_should_reverse_instead_of_steering() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(2.5, Rotation::from_degrees(180.0)), true);

    let target = test.module.last_target().unwrap();
    assert_eq!(-2.5, target.speed);
    assert!(target.angle.degrees().approx_eq(0.0, margin()));
    assert!(test.drive.last_voltage().unwrap().approx_eq(-6.0, margin()));
    assert!(test.angle.last_voltage().unwrap().approx_eq(0.0, margin()));
}

#[test]
fn when_driving_closed_loop_should_combine_feedforward_and_feedback() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::zero()), false);

    // kS + kV * 1.0 + kP * (1.0 - 0.0)
    let expected = 0.1 + 2.4 + 0.3;
    assert!(test.drive.last_voltage().unwrap().approx_eq(expected, margin()));
}

#[test]
fn when_driving_closed_loop_at_the_target_speed_should_only_apply_feedforward() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    // One wheel rotation per second
    let rpm = 60.0 * config.geometry.drive_gear_ratio;
    test.drive.set_velocity(Some(rpm));
    test.module.refresh();
    let speed = config.geometry.wheel_circumference();

    test.module
        .set_desired_state(ModuleTarget::new(speed, Rotation::zero()), false);

    let expected = 0.1 + 2.4 * speed;
    assert!(test.drive.last_voltage().unwrap().approx_eq(expected, margin()));
}

#[test]
fn when_driving_faster_than_possible_should_clamp_to_the_nominal_voltage() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(50.0, Rotation::zero()), true);
    assert_eq!(12.0, test.drive.last_voltage().unwrap());

    test.module
        .set_desired_state(ModuleTarget::new(-50.0, Rotation::zero()), false);
    assert_eq!(-12.0, test.drive.last_voltage().unwrap());
}

#[test]
fn when_the_drive_motor_is_inverted_should_negate_the_voltage() {
    let mut config = plain_config(0.0);
    config.modules[0].drive_inverted = true;
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(2.5, Rotation::zero()), true);

    assert!(test.drive.last_voltage().unwrap().approx_eq(-6.0, margin()));
}

#[test]
fn when_given_a_non_finite_target_should_stop_at_the_current_angle_and_recover() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(f64::NAN, Rotation::from_degrees(10.0)), false);

    let target = test.module.last_target().unwrap();
    assert_eq!(0.0, target.speed);
    assert!(target.angle.degrees().approx_eq(0.0, margin()));
    assert_eq!(0.0, test.drive.last_voltage().unwrap());
    assert_eq!(0.0, test.angle.last_voltage().unwrap());

    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::from_radians(f64::NAN)), false);
    assert_eq!(0.0, test.module.last_target().unwrap().speed);

    for _ in 0..3 {
        test.module
            .set_desired_state(ModuleTarget::new(1.0, Rotation::from_degrees(10.0)), false);
    }

    // Closed loop drive and steering both produce output again
    assert!(test
        .drive
        .last_voltage()
        .unwrap()
        .approx_eq(0.1 + 2.4 + 0.3, margin()));
    let expected = config.angle_pid.kp * 10.0_f64.to_radians();
    assert!(test.angle.last_voltage().unwrap().approx_eq(expected, margin()));
}

// Steering output

#[test]
fn when_steering_should_drive_the_angle_motor_towards_the_target() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::from_degrees(10.0)), true);

    let expected = config.angle_pid.kp * 10.0_f64.to_radians();
    assert!(test.angle.last_voltage().unwrap().approx_eq(expected, margin()));
}

#[test]
fn when_steering_across_the_wrap_boundary_should_take_the_short_way() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, Some(0.5 - 5.0 / 360.0));
    test.module.reset_steering_to_absolute().unwrap();

    // Module at 175 degrees, target at -175 degrees is 10 degrees counter-clockwise
    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::from_degrees(-175.0)), true);

    let expected = config.angle_pid.kp * 10.0_f64.to_radians();
    assert!(test.angle.last_voltage().unwrap().approx_eq(expected, margin()));
}

#[test]
fn when_the_angle_motor_is_inverted_should_negate_the_steering_voltage() {
    let mut config = plain_config(0.0);
    config.modules[0].angle_inverted = true;
    let mut test = create_synchronized_module(&config);

    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::from_degrees(10.0)), true);

    let expected = -config.angle_pid.kp * 10.0_f64.to_radians();
    assert!(test.angle.last_voltage().unwrap().approx_eq(expected, margin()));
}

// Sensor readings

#[test]
fn when_refreshing_should_convert_encoder_readings_to_wheel_units() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);
    let ratio = config.geometry.drive_gear_ratio;
    let circumference = config.geometry.wheel_circumference();

    test.drive.set_position(Some(2.0 * ratio));
    test.drive.set_velocity(Some(60.0 * ratio));
    test.angle
        .set_position(Some(0.25 * config.geometry.angle_gear_ratio));
    test.module.refresh();

    assert!(test.module.position().distance.approx_eq(2.0 * circumference, margin()));
    assert!(test.module.state().speed.approx_eq(circumference, margin()));
    assert!(test.module.position().angle.degrees().approx_eq(90.0, margin()));
    assert!(!test.module.is_stale());
}

#[test]
fn when_a_sensor_has_no_reading_should_keep_the_last_value_and_be_stale() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);
    let ratio = config.geometry.drive_gear_ratio;

    test.drive.set_position(Some(ratio));
    test.module.refresh();
    let distance = test.module.position().distance;

    test.drive.set_position(None);
    test.module.refresh();

    assert!(test.module.is_stale());
    assert_eq!(distance, test.module.position().distance);

    test.drive.set_position(Some(2.0 * ratio));
    test.module.refresh();

    assert!(!test.module.is_stale());
    assert!(test
        .module
        .position()
        .distance
        .approx_eq(2.0 * distance, margin()));
}

#[test]
fn when_a_sensor_reading_is_not_finite_should_keep_the_last_value_and_be_stale() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);
    let ratio = config.geometry.drive_gear_ratio;

    test.drive.set_position(Some(ratio));
    test.module.refresh();
    let position = test.module.position();

    test.drive.set_position(Some(f64::INFINITY));
    test.drive.set_velocity(Some(f64::NAN));
    test.angle.set_position(Some(f64::NAN));
    test.module.refresh();

    assert!(test.module.is_stale());
    assert_eq!(position, test.module.position());
    assert_eq!(0.0, test.module.state().speed);

    // A command in the glitched cycle must not poison the drive loop
    test.module
        .set_desired_state(ModuleTarget::new(1.0, Rotation::zero()), false);

    test.drive.set_position(Some(ratio));
    test.drive.set_velocity(Some(0.0));
    test.angle.set_position(Some(0.0));
    test.module.refresh();
    assert!(!test.module.is_stale());

    for _ in 0..3 {
        test.module
            .set_desired_state(ModuleTarget::new(1.0, Rotation::zero()), false);
    }

    assert!(test
        .drive
        .last_voltage()
        .unwrap()
        .approx_eq(0.1 + 2.4 + 0.3, margin()));
}

#[test]
fn when_the_absolute_encoder_has_no_reading_should_keep_the_last_absolute_angle() {
    let config = plain_config(0.0);
    let mut test = create_module(&config, Some(0.25));
    test.absolute.set_rotations(None);

    test.module.refresh();

    assert!(test
        .module
        .absolute_angle()
        .unwrap()
        .degrees()
        .approx_eq(90.0, margin()));
}

// Diagnostics

#[test]
fn when_applying_a_raw_voltage_should_bypass_the_drive_loop_and_hold_the_calibration_angle() {
    let config = plain_config(20.0);
    let mut test = create_module(&config, Some(20.0 / 360.0));
    test.module.reset_steering_to_absolute().unwrap();

    // The module points forward, the calibration angle is 20 degrees further
    test.module.set_raw_voltage(3.0);

    assert_eq!(3.0, test.drive.last_voltage().unwrap());
    let expected = config.angle_pid.kp * 20.0_f64.to_radians();
    assert!(test.angle.last_voltage().unwrap().approx_eq(expected, margin()));
    assert_eq!(None, test.module.last_target());

    test.module.set_raw_voltage(-30.0);
    assert_eq!(-12.0, test.drive.last_voltage().unwrap());
}

#[test]
fn when_holding_should_reapply_the_last_target() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);
    test.module
        .set_desired_state(ModuleTarget::new(2.5, Rotation::zero()), true);
    let count = test.drive.voltage_count();

    test.module.hold();

    assert_eq!(count + 1, test.drive.voltage_count());
    assert!(test.drive.last_voltage().unwrap().approx_eq(6.0, margin()));
}

#[test]
fn when_holding_after_stopping_should_output_nothing() {
    let config = plain_config(0.0);
    let mut test = create_synchronized_module(&config);
    test.module
        .set_desired_state(ModuleTarget::new(2.5, Rotation::from_degrees(30.0)), true);

    test.module.stop();
    test.module.hold();

    assert_eq!(0.0, test.drive.last_voltage().unwrap());
    assert_eq!(0.0, test.angle.last_voltage().unwrap());
    assert_eq!(None, test.module.last_target());
}

#[test]
fn when_getting_the_calibration_angle_should_use_the_offset_in_degrees() {
    let config = plain_config(-136.1);
    let test = create_module(&config, Some(0.0));

    assert!(test
        .module
        .calibration_angle()
        .radians()
        .approx_eq((-136.1_f64).to_radians(), margin()));
    assert!(test.module.calibration_angle().radians().abs() < PI);
}
