//! Provides the heading of the robot based on the orientation sensor.

use log::{info, warn};

use crate::{hardware::sensor_interface::OrientationSensor, rotation::Rotation};

#[cfg(test)]
#[path = "heading_tests.rs"]
mod heading_tests;

const FULL_TURN_IN_DEGREES: f64 = 360.0;
const HALF_TURN_IN_DEGREES: f64 = 180.0;

/// Converts the readings of the orientation sensor into a counter-clockwise positive heading.
///
/// The heading is computed as
///
/// ```text
/// raw     = yaw + adjustment
/// heading = (inverted ? 360 - raw : raw) + offset
/// ```
///
/// The inversion flag is fixed by the configuration. The adjustment is either 0 or 180 degrees
/// and is controlled by [HeadingProvider::invert] and [HeadingProvider::zero]. The offset can be
/// changed at any time.
///
/// The sensor is read once per control cycle by [HeadingProvider::refresh]. When the sensor does
/// not provide a reading the last known values are used and the provider reports that it is
/// stale.
pub struct HeadingProvider {
    sensor: Box<dyn OrientationSensor>,

    /// Mirrors the yaw reading
    inverted: bool,

    /// Units: degrees
    adjustment: f64,

    offset: Rotation,

    /// Negates the pitch reading
    pitch_inverted: bool,

    /// The last yaw reading in degrees
    yaw: f64,

    /// The last pitch reading in degrees
    pitch: f64,

    stale: bool,
}

impl HeadingProvider {
    /// Returns the current heading of the robot.
    pub fn heading(&self) -> Rotation {
        self.sensor_heading() + self.offset
    }

    /// Rotates the heading by half a turn and negates the pitch. Used when the robot starts
    /// facing the opposite direction.
    pub fn invert(&mut self) {
        self.adjustment = HALF_TURN_IN_DEGREES;
        self.pitch_inverted = true;

        info!("Heading inverted. Heading is now {}", self.heading());
    }

    /// Returns `true` if the sensor did not provide a reading in the last refresh.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Creates a new [HeadingProvider] instance.
    ///
    /// ## Parameters
    ///
    /// * 'sensor' - The orientation sensor
    /// * 'inverted' - Mirrors the yaw reading. Must be set for sensors that report clockwise
    ///   positive angles.
    pub fn new(sensor: Box<dyn OrientationSensor>, inverted: bool) -> Self {
        let mut result = Self {
            sensor,
            inverted,
            adjustment: 0.0,
            offset: Rotation::zero(),
            pitch_inverted: false,
            yaw: 0.0,
            pitch: 0.0,
            stale: false,
        };

        result.refresh();
        result
    }

    /// Returns the offset that is added to the sensor heading.
    pub fn offset(&self) -> Rotation {
        self.offset
    }

    /// Returns the pitch of the robot in degrees.
    pub fn pitch(&self) -> f64 {
        if self.pitch_inverted {
            -self.pitch
        } else {
            self.pitch
        }
    }

    /// Reads the orientation sensor. Readings that are not available, or not finite, keep their
    /// last known value.
    pub fn refresh(&mut self) {
        let yaw = self.sensor.yaw_degrees().filter(|d| d.is_finite());
        let pitch = self.sensor.pitch_degrees().filter(|d| d.is_finite());

        if let Some(degrees) = yaw {
            self.yaw = degrees;
        }

        if let Some(degrees) = pitch {
            self.pitch = degrees;
        }

        let missing = yaw.is_none() || pitch.is_none();
        if missing && !self.stale {
            warn!("Orientation sensor did not provide a reading. Using the last known heading.");
        } else if !missing && self.stale {
            info!("Orientation sensor readings restored.");
        }
        self.stale = missing;
    }

    /// Sets the offset that is added to the sensor heading.
    pub fn set_offset(&mut self, offset: Rotation) {
        self.offset = offset;
    }

    /// Makes the current direction of the robot the zero heading. Clears the adjustment made by
    /// [HeadingProvider::invert].
    pub fn zero(&mut self) {
        self.adjustment = 0.0;
        self.pitch_inverted = false;
        self.offset = -self.sensor_heading();

        info!("Heading zeroed");
    }

    /// Returns the heading before the offset is applied.
    fn sensor_heading(&self) -> Rotation {
        let raw = self.yaw + self.adjustment;
        let degrees = if self.inverted {
            FULL_TURN_IN_DEGREES - raw
        } else {
            raw
        };

        Rotation::from_degrees(degrees)
    }
}
