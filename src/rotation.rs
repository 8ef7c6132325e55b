//! Defines the angle type that is used for headings and module angles.
//!
//! Angles live in a periodic number space: going past the upper boundary wraps around to the lower
//! boundary. A [Rotation] is always stored in the range [-PI, PI), which means that two rotations
//! that describe the same direction always compare equal.
//!
//! Continuously accumulating angles, e.g. the position of a steering encoder, are kept as plain
//! `f64` radians and are only turned into a [Rotation] when a direction is needed.

use std::{
    f64::consts::PI,
    fmt::Display,
    ops::{Add, Neg, Sub},
};

#[cfg(test)]
#[path = "rotation_tests.rs"]
mod rotation_tests;

/// The size of the periodic angle space.
const FULL_TURN_IN_RADIANS: f64 = 2.0 * PI;

/// Returns the value in the [-PI, PI) range that describes the same direction as the given
/// angle.
///
/// ## Parameters
///
/// * 'radians' - The angle that should be normalized.
pub fn normalize_radians(radians: f64) -> f64 {
    let normalized = (radians + PI).rem_euclid(FULL_TURN_IN_RADIANS) - PI;

    // rem_euclid can round up to the range size for tiny negative inputs
    if normalized >= PI {
        normalized - FULL_TURN_IN_RADIANS
    } else {
        normalized
    }
}

/// A direction in the 2D plane, stored in radians in the range [-PI, PI).
///
/// Counter-clockwise rotations are positive.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Rotation {
    radians: f64,
}

impl Rotation {
    /// Returns the cosine of the rotation.
    pub fn cos(&self) -> f64 {
        self.radians.cos()
    }

    /// Returns the rotation in degrees, in the range [-180, 180).
    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }

    /// Creates a rotation from a value in degrees. The value may be outside of the [-180, 180)
    /// range.
    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    /// Creates a rotation from a value in radians. The value may be outside of the [-PI, PI)
    /// range.
    pub fn from_radians(radians: f64) -> Self {
        Self {
            radians: normalize_radians(radians),
        }
    }

    /// Creates a rotation pointing along the vector (x, y).
    ///
    /// Returns the zero rotation for the zero vector.
    pub fn from_vector(x: f64, y: f64) -> Self {
        if x == 0.0 && y == 0.0 {
            return Self::zero();
        }

        Self::from_radians(y.atan2(x))
    }

    /// Returns the rotation that points in the opposite direction.
    pub fn opposite(&self) -> Self {
        Self::from_radians(self.radians + PI)
    }

    /// Returns the rotation in radians, in the range [-PI, PI).
    pub fn radians(&self) -> f64 {
        self.radians
    }

    /// Returns the sine of the rotation.
    pub fn sin(&self) -> f64 {
        self.radians.sin()
    }

    /// Returns the signed angle, in radians, that has to be added to the current rotation to
    /// reach the target rotation along the shortest path.
    ///
    /// The result is in the range [-PI, PI).
    ///
    /// ## Parameters
    ///
    /// * 'target' - The rotation that should be reached
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_drive_core::rotation::Rotation;
    ///
    /// let current = Rotation::from_degrees(170.0);
    /// let target = Rotation::from_degrees(-170.0);
    /// let distance = current.smallest_distance_to(target);
    /// assert!((distance.to_degrees() - 20.0).abs() < 1e-9);
    /// ```
    pub fn smallest_distance_to(&self, target: Rotation) -> f64 {
        normalize_radians(target.radians - self.radians)
    }

    /// Returns the rotation that points along the positive x-axis.
    pub fn zero() -> Self {
        Self { radians: 0.0 }
    }
}

impl Add for Rotation {
    type Output = Rotation;

    fn add(self, rhs: Self) -> Self::Output {
        Rotation::from_radians(self.radians + rhs.radians)
    }
}

impl Sub for Rotation {
    type Output = Rotation;

    fn sub(self, rhs: Self) -> Self::Output {
        Rotation::from_radians(self.radians - rhs.radians)
    }
}

impl Neg for Rotation {
    type Output = Rotation;

    fn neg(self) -> Self::Output {
        Rotation::from_radians(-self.radians)
    }
}

impl Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} deg", self.degrees())
    }
}
