//! Provides the PID controller and the feedforward model used by the swerve modules.

use serde::Deserialize;

#[cfg(test)]
#[path = "pid_tests.rs"]
mod pid_tests;

/// The gains for a [PidController].
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct PidGains {
    /// Proportional gain
    pub kp: f64,

    /// Integral gain
    #[serde(default)]
    pub ki: f64,

    /// Derivative gain
    #[serde(default)]
    pub kd: f64,
}

impl PidGains {
    /// Creates a new [PidGains] instance.
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// A PID controller that runs at a fixed period.
#[derive(Clone, Debug)]
pub struct PidController {
    /// The controller gains
    gains: PidGains,

    /// The time between two calls to the controller in seconds
    period: f64,

    /// Previous error, `None` until the first calculation
    previous_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

impl PidController {
    /// Returns the controller output for the given measurement and setpoint.
    ///
    /// ## Parameters
    ///
    /// * 'measurement' - The measured value of the controlled quantity
    /// * 'setpoint' - The desired value of the controlled quantity
    pub fn calculate(&mut self, measurement: f64, setpoint: f64) -> f64 {
        self.calculate_from_error(setpoint - measurement)
    }

    /// Returns the controller output for an error that was computed by the caller, e.g. the
    /// wrapped distance between two angles.
    ///
    /// A non-finite error produces no output and clears the controller state, so the integral
    /// and the derivative stay finite once the error is finite again.
    pub fn calculate_from_error(&mut self, error: f64) -> f64 {
        if !error.is_finite() {
            self.reset();
            return 0.0;
        }

        self.integral += error * self.period;

        // No derivative on the first call, otherwise the output would spike
        let derivative = match self.previous_error {
            Some(e) => (error - e) / self.period,
            None => 0.0,
        };
        self.previous_error = Some(error);

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
    }

    /// Returns the gains of the controller.
    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    /// Creates a new [PidController] instance.
    ///
    /// ## Parameters
    ///
    /// * 'gains' - The controller gains
    /// * 'period' - The time between two calls to the controller in seconds. Must be larger
    ///   than zero.
    pub fn new(gains: PidGains, period: f64) -> Self {
        Self {
            gains,
            period,
            previous_error: None,
            integral: 0.0,
        }
    }

    /// Clears the integral accumulation and the previous error.
    pub fn reset(&mut self) {
        self.previous_error = None;
        self.integral = 0.0;
    }
}

/// The gains of a permanent magnet DC motor feedforward model.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct FeedforwardGains {
    /// Static gain in volts
    pub ks: f64,

    /// Velocity gain in volts per meter/second
    pub kv: f64,

    /// Acceleration gain in volts per meter/second^2
    #[serde(default)]
    pub ka: f64,
}

impl FeedforwardGains {
    /// Creates a new [FeedforwardGains] instance.
    pub fn new(ks: f64, kv: f64, ka: f64) -> Self {
        Self { ks, kv, ka }
    }
}

/// Computes the voltage needed to run a motor at a given velocity and acceleration.
///
/// ```text
/// V = kS * sign(v) + kV * v + kA * a
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimpleMotorFeedforward {
    gains: FeedforwardGains,
}

impl SimpleMotorFeedforward {
    /// Returns the feedforward voltage.
    ///
    /// ## Parameters
    ///
    /// * 'velocity' - The desired velocity
    /// * 'acceleration' - The desired acceleration
    pub fn calculate(&self, velocity: f64, acceleration: f64) -> f64 {
        let static_voltage = if velocity == 0.0 {
            0.0
        } else {
            self.gains.ks * velocity.signum()
        };

        static_voltage + self.gains.kv * velocity + self.gains.ka * acceleration
    }

    /// Creates a new [SimpleMotorFeedforward] instance.
    pub fn new(gains: FeedforwardGains) -> Self {
        Self { gains }
    }
}
