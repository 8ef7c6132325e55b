use std::f64::consts::PI;

use float_cmp::{ApproxEq, F64Margin};

use crate::rotation::Rotation;

use super::*;

fn margin() -> F64Margin {
    F64Margin {
        ulps: 4,
        epsilon: 1e-9,
    }
}

fn assert_pose_eq(expected: &Pose, actual: &Pose) {
    assert!(
        expected.x().approx_eq(actual.x(), margin()),
        "x: expected {} but was {}",
        expected,
        actual
    );
    assert!(
        expected.y().approx_eq(actual.y(), margin()),
        "y: expected {} but was {}",
        expected,
        actual
    );
    assert!(
        expected
            .heading()
            .smallest_distance_to(actual.heading())
            .approx_eq(0.0, margin()),
        "heading: expected {} but was {}",
        expected,
        actual
    );
}

#[test]
fn when_applying_a_straight_twist_should_move_along_the_heading() {
    let pose = Pose::new(1.0, 2.0, Rotation::from_degrees(90.0));
    let result = pose.exp(&Twist::new(1.5, 0.0, 0.0));

    assert_pose_eq(&Pose::new(1.0, 3.5, Rotation::from_degrees(90.0)), &result);
}

#[test]
fn when_applying_a_quarter_arc_should_end_on_the_arc() {
    // Quarter circle with a radius of 1 meter, turning left
    let pose = Pose::default();
    let result = pose.exp(&Twist::new(0.5 * PI, 0.0, 0.5 * PI));

    assert_pose_eq(&Pose::new(1.0, 1.0, Rotation::from_degrees(90.0)), &result);
}

#[test]
fn when_applying_a_sideways_twist_should_move_to_the_left() {
    let pose = Pose::new(0.0, 0.0, Rotation::zero());
    let result = pose.exp(&Twist::new(0.0, 2.0, 0.0));

    assert_pose_eq(&Pose::new(0.0, 2.0, Rotation::zero()), &result);
}

#[test]
fn when_taking_the_log_of_an_exp_should_recover_the_twist() {
    let start = Pose::new(3.0, -1.0, Rotation::from_degrees(30.0));
    let twist = Twist::new(0.4, -0.2, 0.3);

    let end = start.exp(&twist);
    let recovered = start.log(&end);

    assert!(twist.dx.approx_eq(recovered.dx, margin()));
    assert!(twist.dy.approx_eq(recovered.dy, margin()));
    assert!(twist.dtheta.approx_eq(recovered.dtheta, margin()));
}

#[test]
fn when_taking_the_log_of_the_same_pose_should_return_a_zero_twist() {
    let pose = Pose::new(1.0, 1.0, Rotation::from_degrees(-45.0));
    let twist = pose.log(&pose);

    assert!(twist.dx.approx_eq(0.0, margin()));
    assert!(twist.dy.approx_eq(0.0, margin()));
    assert!(twist.dtheta.approx_eq(0.0, margin()));
}

#[test]
fn when_expressing_a_pose_relative_to_another_should_rotate_into_its_frame() {
    let origin = Pose::new(1.0, 1.0, Rotation::from_degrees(90.0));
    let pose = Pose::new(1.0, 3.0, Rotation::from_degrees(180.0));

    let relative = pose.relative_to(&origin);

    assert_pose_eq(&Pose::new(2.0, 0.0, Rotation::from_degrees(90.0)), &relative);
}

#[test]
fn when_replacing_the_heading_should_keep_the_translation() {
    let pose = Pose::new(4.0, 5.0, Rotation::zero());
    let result = pose.with_heading(Rotation::from_degrees(10.0));

    assert_eq!(4.0, result.x());
    assert_eq!(5.0, result.y());
    assert!(result.heading().degrees().approx_eq(10.0, margin()));
}
