//! Defines poses and twists in the field plane.
//!
//! A [Pose] describes where the robot is on the field, a [Twist] describes a motion along a
//! constant-curvature arc expressed in the robot's own frame. [Pose::exp] applies a twist to a
//! pose and [Pose::log] recovers the twist between two poses.

extern crate nalgebra as na;

use std::fmt::Display;

use na::{Rotation2, Vector2};

use crate::rotation::Rotation;

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod geometry_tests;

/// Below this rotation the series expansions of the arc functions are used.
const SMALL_ANGLE_THRESHOLD: f64 = 1e-9;

/// The position and heading of the robot in the field frame.
///
/// Units: meters for the position, the heading is counter-clockwise positive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    /// The position of the robot rotation center in the field frame.
    translation: Vector2<f64>,

    /// The heading of the robot, i.e. the direction of the body x-axis in the field frame.
    heading: Rotation,
}

impl Pose {
    /// Returns the pose reached by following the given twist, starting from the current pose.
    ///
    /// The twist is expressed in the body frame of the current pose.
    ///
    /// ## Parameters
    ///
    /// * 'twist' - The motion that should be applied.
    pub fn exp(&self, twist: &Twist) -> Pose {
        let sin_theta = twist.dtheta.sin();
        let cos_theta = twist.dtheta.cos();

        let (s, c) = if twist.dtheta.abs() < SMALL_ANGLE_THRESHOLD {
            (
                1.0 - twist.dtheta * twist.dtheta / 6.0,
                0.5 * twist.dtheta,
            )
        } else {
            (
                sin_theta / twist.dtheta,
                (1.0 - cos_theta) / twist.dtheta,
            )
        };

        let body_delta = Vector2::new(
            twist.dx * s - twist.dy * c,
            twist.dx * c + twist.dy * s,
        );
        let field_delta = Rotation2::new(self.heading.radians()) * body_delta;

        Pose {
            translation: self.translation + field_delta,
            heading: self.heading + Rotation::from_radians(twist.dtheta),
        }
    }

    /// Returns the heading of the pose.
    pub fn heading(&self) -> Rotation {
        self.heading
    }

    /// Returns the twist that takes the current pose to the target pose.
    ///
    /// This is the inverse of [Pose::exp], i.e. `pose.exp(&pose.log(&target)) == target`.
    ///
    /// ## Parameters
    ///
    /// * 'target' - The pose at the end of the twist.
    pub fn log(&self, target: &Pose) -> Twist {
        let transform = target.relative_to(self);
        let dtheta = transform.heading.radians();
        let half_dtheta = 0.5 * dtheta;
        let cos_minus_one = transform.heading.cos() - 1.0;

        let half_theta_by_tan_of_half_dtheta = if cos_minus_one.abs() < SMALL_ANGLE_THRESHOLD {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * transform.heading.sin()) / cos_minus_one
        };

        let rotated = Rotation2::new((-half_dtheta).atan2(half_theta_by_tan_of_half_dtheta))
            * transform.translation;
        let scale = half_theta_by_tan_of_half_dtheta.hypot(half_dtheta);
        let translation_part = rotated * scale;

        Twist::new(translation_part.x, translation_part.y, dtheta)
    }

    /// Creates a new [Pose].
    ///
    /// ## Parameters
    ///
    /// * 'x' - The x position in the field frame in meters
    /// * 'y' - The y position in the field frame in meters
    /// * 'heading' - The heading of the robot in the field frame
    pub fn new(x: f64, y: f64, heading: Rotation) -> Self {
        Self {
            translation: Vector2::new(x, y),
            heading,
        }
    }

    /// Returns the current pose expressed in the frame of the given origin pose.
    ///
    /// ## Parameters
    ///
    /// * 'origin' - The pose that acts as the new reference frame.
    pub fn relative_to(&self, origin: &Pose) -> Pose {
        let offset = self.translation - origin.translation;
        Pose {
            translation: Rotation2::new(-origin.heading.radians()) * offset,
            heading: self.heading - origin.heading,
        }
    }

    /// Returns the position of the pose.
    pub fn translation(&self) -> &Vector2<f64> {
        &self.translation
    }

    /// Returns a copy of the pose with the heading replaced.
    pub fn with_heading(&self, heading: Rotation) -> Pose {
        Pose {
            translation: self.translation,
            heading,
        }
    }

    /// Returns the x position in meters.
    pub fn x(&self) -> f64 {
        self.translation.x
    }

    /// Returns the y position in meters.
    pub fn y(&self) -> f64 {
        self.translation.y
    }
}

impl Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pose [x: {:.3} m, y: {:.3} m, heading: {}]",
            self.x(),
            self.y(),
            self.heading
        )
    }
}

/// A motion along a constant-curvature arc in the body frame.
///
/// Units: meters and radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist {
    /// The forward displacement.
    pub dx: f64,

    /// The sideways displacement, positive to the left.
    pub dy: f64,

    /// The change in heading, counter-clockwise positive.
    pub dtheta: f64,
}

impl Twist {
    /// Creates a new [Twist].
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}
