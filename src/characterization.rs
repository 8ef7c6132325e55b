//! Provides the voltage profiles used to characterize the drive motors.
//!
//! A characterization run is a sequence of phases. The modules first get time to steer to their
//! calibration angles, after that each test applies a voltage to all drive motors. A quasistatic
//! test ramps the voltage up slowly so that the acceleration is negligible, a dynamic test
//! applies a voltage step. Between tests the drive rests so that the robot comes to a stop.
//!
//! The driver only produces voltages. The drive coordinator applies them to the modules.

use std::fmt::Display;

use log::info;

use crate::config::CharacterizationConfig;

#[cfg(test)]
#[path = "characterization_tests.rs"]
mod characterization_tests;

/// The direction in which the robot drives during a test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CharacterizationDirection {
    /// Positive voltages
    Forward,
    /// Negative voltages
    Reverse,
}

impl CharacterizationDirection {
    fn sign(&self) -> f64 {
        match self {
            CharacterizationDirection::Forward => 1.0,
            CharacterizationDirection::Reverse => -1.0,
        }
    }
}

/// The shape of the voltage profile of a test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CharacterizationKind {
    /// A slow voltage ramp
    Quasistatic,
    /// A voltage step
    Dynamic,
}

/// A phase of a characterization run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CharacterizationPhase {
    /// The modules steer to their calibration angles with the drive motors off.
    Align,

    /// A voltage is applied to the drive motors.
    Test {
        /// The shape of the voltage profile
        kind: CharacterizationKind,
        /// The direction of travel
        direction: CharacterizationDirection,
    },

    /// The drive motors are off so that the robot comes to a stop.
    Rest,
}

impl Display for CharacterizationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterizationPhase::Align => write!(f, "align"),
            CharacterizationPhase::Test { kind, direction } => {
                write!(f, "{:?} {:?}", kind, direction)
            }
            CharacterizationPhase::Rest => write!(f, "rest"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TimedPhase {
    phase: CharacterizationPhase,

    /// Units: seconds
    duration: f64,
}

/// Produces the drive voltages for a characterization run, one value per control cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterizationDriver {
    phases: Vec<TimedPhase>,

    /// The index of the active phase
    current: usize,

    /// The time spent in the active phase in seconds
    elapsed: f64,

    /// Units: volts/second
    ramp_rate: f64,

    /// Units: volts
    step_voltage: f64,

    /// Units: volts
    nominal_voltage: f64,
}

impl CharacterizationDriver {
    /// Returns the drive voltage for the next control cycle, or `None` when the run has
    /// finished.
    ///
    /// ## Parameters
    ///
    /// * 'period' - The duration of the control cycle in seconds
    pub fn advance(&mut self, period: f64) -> Option<f64> {
        loop {
            let active = *self.phases.get(self.current)?;
            if self.elapsed < active.duration {
                let voltage = self.voltage(active.phase, self.elapsed);
                self.elapsed += period;
                return Some(voltage);
            }

            self.current += 1;
            self.elapsed = 0.0;
            if let Some(next) = self.phases.get(self.current) {
                info!("Characterization phase: {}", next.phase);
            }
        }
    }

    /// Creates the full characterization routine: align, then a quasistatic and a dynamic test
    /// in both directions with a rest between the tests.
    ///
    /// ## Parameters
    ///
    /// * 'config' - The voltage profiles and timing
    /// * 'nominal_voltage' - The voltage the output is clamped to
    pub fn full_routine(config: &CharacterizationConfig, nominal_voltage: f64) -> Self {
        let test = |kind, direction| TimedPhase {
            phase: CharacterizationPhase::Test { kind, direction },
            duration: config.timeout_s,
        };
        let rest = TimedPhase {
            phase: CharacterizationPhase::Rest,
            duration: config.settle_s,
        };

        let phases = vec![
            TimedPhase {
                phase: CharacterizationPhase::Align,
                duration: config.settle_s,
            },
            test(
                CharacterizationKind::Quasistatic,
                CharacterizationDirection::Forward,
            ),
            rest,
            test(
                CharacterizationKind::Quasistatic,
                CharacterizationDirection::Reverse,
            ),
            rest,
            test(
                CharacterizationKind::Dynamic,
                CharacterizationDirection::Forward,
            ),
            rest,
            test(
                CharacterizationKind::Dynamic,
                CharacterizationDirection::Reverse,
            ),
        ];

        Self::with_phases(phases, config, nominal_voltage)
    }

    /// Returns `true` once all phases have completed.
    pub fn is_finished(&self) -> bool {
        self.current >= self.phases.len()
    }

    /// Returns the active phase, or `None` when the run has finished.
    pub fn phase(&self) -> Option<CharacterizationPhase> {
        self.phases.get(self.current).map(|p| p.phase)
    }

    /// Creates a run with a single quasistatic test: align, then ramp the voltage up.
    ///
    /// ## Parameters
    ///
    /// * 'direction' - The direction of travel
    /// * 'duration' - The duration of the ramp in seconds. Limited to the configured timeout.
    /// * 'config' - The voltage profiles and timing
    /// * 'nominal_voltage' - The voltage the output is clamped to
    pub fn run_voltage_ramp(
        direction: CharacterizationDirection,
        duration: f64,
        config: &CharacterizationConfig,
        nominal_voltage: f64,
    ) -> Self {
        let phases = vec![
            TimedPhase {
                phase: CharacterizationPhase::Align,
                duration: config.settle_s,
            },
            TimedPhase {
                phase: CharacterizationPhase::Test {
                    kind: CharacterizationKind::Quasistatic,
                    direction,
                },
                duration: duration.min(config.timeout_s),
            },
        ];

        Self::with_phases(phases, config, nominal_voltage)
    }

    fn voltage(&self, phase: CharacterizationPhase, time: f64) -> f64 {
        let voltage = match phase {
            CharacterizationPhase::Align | CharacterizationPhase::Rest => 0.0,
            CharacterizationPhase::Test { kind, direction } => {
                let magnitude = match kind {
                    CharacterizationKind::Quasistatic => self.ramp_rate * time,
                    CharacterizationKind::Dynamic => self.step_voltage,
                };
                direction.sign() * magnitude
            }
        };

        voltage.clamp(-self.nominal_voltage, self.nominal_voltage)
    }

    fn with_phases(
        phases: Vec<TimedPhase>,
        config: &CharacterizationConfig,
        nominal_voltage: f64,
    ) -> Self {
        Self {
            phases,
            current: 0,
            elapsed: 0.0,
            ramp_rate: config.ramp_rate_v_per_s,
            step_voltage: config.step_voltage,
            nominal_voltage: nominal_voltage.abs(),
        }
    }
}
