//! Provides the best-effort telemetry output of the drive.
//!
//! The drive publishes one [TelemetryFrame] per control cycle. Publishing never blocks and never
//! fails. A sink that cannot accept a frame drops it.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::trace;

use crate::{drive::DriveModeKind, geometry::Pose, odometry::OdometryReport, NUMBER_OF_MODULES};

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod telemetry_tests;

/// The telemetry of a single module.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleTelemetry {
    /// The absolute encoder reading without the calibration offset, in degrees. `None` if the
    /// encoder has not provided a reading yet.
    pub absolute_angle_deg: Option<f64>,

    /// The module angle according to the relative steering encoder, in degrees.
    pub measured_angle_deg: f64,

    /// The measured wheel speed in meters/second.
    pub measured_speed_mps: f64,

    /// The angle the module is steering to, in degrees.
    pub target_angle_deg: Option<f64>,

    /// The speed the module is driving at, in meters/second.
    pub target_speed_mps: Option<f64>,

    /// `true` if one of the module sensors did not provide a reading.
    pub stale: bool,

    /// `true` once the steering has been re-zeroed from the absolute encoder.
    pub steering_synchronized: bool,
}

/// The telemetry of the drive for a single control cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TelemetryFrame {
    /// The number of the control cycle, starting at 1.
    pub cycle: u64,

    /// The module telemetry, ordered front-left, front-right, back-left, back-right.
    pub modules: [ModuleTelemetry; NUMBER_OF_MODULES],

    /// The estimated pose on the field.
    pub pose: Pose,

    /// The mode of the drive.
    pub mode: DriveModeKind,

    /// `true` if the module speeds were scaled down in this cycle.
    pub desaturated: bool,

    /// `true` if the orientation sensor did not provide a reading.
    pub heading_stale: bool,

    /// The data quality of the odometry update.
    pub odometry: OdometryReport,
}

/// Defines the interface for consumers of the drive telemetry, e.g. a dashboard or a logger.
pub trait TelemetrySink {
    /// Publishes a frame. Must not block and must not fail, a frame that cannot be delivered is
    /// dropped.
    fn publish(&mut self, frame: &TelemetryFrame);
}

/// A sink that discards all frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    #[cfg_attr(test, mutants::skip)] // Nothing to observe
    fn publish(&mut self, _frame: &TelemetryFrame) {}
}

/// A sink that sends the frames over a bounded channel to another thread.
///
/// When the channel is full, or the receiver has been dropped, the frame is dropped.
pub struct ChannelTelemetrySink {
    sender: Sender<TelemetryFrame>,
    dropped: u64,
}

impl ChannelTelemetrySink {
    /// Returns the number of frames that could not be delivered.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Creates a new [ChannelTelemetrySink] and the [Receiver] for the frames.
    ///
    /// ## Parameters
    ///
    /// * 'capacity' - The number of frames the channel can hold
    pub fn new(capacity: usize) -> (Self, Receiver<TelemetryFrame>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender, dropped: 0 }, receiver)
    }
}

impl TelemetrySink for ChannelTelemetrySink {
    fn publish(&mut self, frame: &TelemetryFrame) {
        match self.sender.try_send(*frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                trace!("Telemetry channel full. Dropped frame {}", frame.cycle);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                trace!("Telemetry receiver disconnected. Dropped frame {}", frame.cycle);
            }
        }
    }
}
