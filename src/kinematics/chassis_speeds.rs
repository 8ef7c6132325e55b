//! Defines the motion of the chassis.

use std::fmt::Display;

use crate::{geometry::Pose, rotation::Rotation};

#[cfg(test)]
#[path = "chassis_speeds_tests.rs"]
mod chassis_speeds_tests;

/// Defines the frame in which the linear velocity of a [BodyMotion] is expressed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MotionFrame {
    /// The velocity is relative to the robot chassis, x forward and y to the left.
    #[default]
    Body,

    /// The velocity is relative to the playing field. It is rotated into the body frame using
    /// the current robot heading before the module targets are computed.
    Field,
}

/// The desired or measured motion of the chassis.
///
/// Units: meters/second for the linear velocity, radians/second for the angular velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyMotion {
    /// The velocity along the x-axis of the frame.
    pub vx: f64,

    /// The velocity along the y-axis of the frame.
    pub vy: f64,

    /// The angular velocity around the rotation center, counter-clockwise positive.
    pub omega: f64,

    /// The frame in which 'vx' and 'vy' are expressed.
    pub frame: MotionFrame,
}

impl BodyMotion {
    /// Creates a new robot-relative [BodyMotion].
    ///
    /// ## Parameters
    ///
    /// * 'vx' - The forward velocity in meters/second
    /// * 'vy' - The sideways velocity in meters/second, positive to the left
    /// * 'omega' - The angular velocity in radians/second, counter-clockwise positive
    pub fn body(vx: f64, vy: f64, omega: f64) -> Self {
        Self {
            vx,
            vy,
            omega,
            frame: MotionFrame::Body,
        }
    }

    /// Returns the robot-relative velocity that, when applied for one period, ends up at the
    /// same pose as the current motion would if it was followed exactly.
    ///
    /// Driving a constant translation while rotating makes the robot drift sideways when the
    /// command is only updated once per period. The discretized motion compensates for this
    /// drift.
    ///
    /// ## Parameters
    ///
    /// * 'period_in_seconds' - The duration of one control cycle.
    pub fn discretize(&self, period_in_seconds: f64) -> BodyMotion {
        if period_in_seconds <= 0.0 {
            return *self;
        }

        let desired_delta = Pose::new(
            self.vx * period_in_seconds,
            self.vy * period_in_seconds,
            Rotation::from_radians(self.omega * period_in_seconds),
        );
        let twist = Pose::default().log(&desired_delta);

        BodyMotion {
            vx: twist.dx / period_in_seconds,
            vy: twist.dy / period_in_seconds,
            omega: twist.dtheta / period_in_seconds,
            frame: self.frame,
        }
    }

    /// Creates a new field-relative [BodyMotion].
    ///
    /// ## Parameters
    ///
    /// * 'vx' - The velocity along the field x-axis in meters/second
    /// * 'vy' - The velocity along the field y-axis in meters/second
    /// * 'omega' - The angular velocity in radians/second, counter-clockwise positive
    pub fn field(vx: f64, vy: f64, omega: f64) -> Self {
        Self {
            vx,
            vy,
            omega,
            frame: MotionFrame::Field,
        }
    }

    /// Returns a value indicating whether all the velocity components are zero.
    pub fn is_stationary(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }

    /// Returns the motion expressed in the body frame.
    ///
    /// Field-relative motions are rotated by the negative of the robot heading, body-relative
    /// motions are returned unchanged.
    ///
    /// ## Parameters
    ///
    /// * 'heading' - The current heading of the robot on the field.
    pub fn to_body_frame(&self, heading: Rotation) -> BodyMotion {
        match self.frame {
            MotionFrame::Body => *self,
            MotionFrame::Field => {
                let (sin, cos) = (heading.sin(), heading.cos());
                BodyMotion {
                    vx: self.vx * cos + self.vy * sin,
                    vy: -self.vx * sin + self.vy * cos,
                    omega: self.omega,
                    frame: MotionFrame::Body,
                }
            }
        }
    }
}

impl Display for BodyMotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BodyMotion [{:?}: vx {:.3} m/s, vy {:.3} m/s, omega {:.3} rad/s]",
            self.frame, self.vx, self.vy, self.omega
        )
    }
}
