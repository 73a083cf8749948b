//! Single-temperature simulations on a fixed output grid.

use crate::error::{ModelError, Result};
use crate::model::{PredatorPrey, State};
use crate::params::ParameterSet;
use crate::solvers::{DormandPrince45, IntegratorSettings, OdeSolution};
use crate::traits::Integrator;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Hard cap on output samples per scenario.
const MAX_OUTPUT_SAMPLES: usize = 50_000_000;

/// One row of a trajectory table (`t, R, P`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub t: f64,
    #[serde(rename = "R")]
    pub prey: f64,
    #[serde(rename = "P")]
    pub predator: f64,
}

impl TrajectorySample {
    pub fn state(&self) -> State {
        State::new(self.prey, self.predator)
    }
}

/// Time-ordered samples of a two-species integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn final_state(&self) -> Option<State> {
        self.samples.last().map(TrajectorySample::state)
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.t)
    }
}

impl From<&OdeSolution> for Trajectory {
    fn from(solution: &OdeSolution) -> Self {
        let samples = solution
            .iter()
            .map(|(t, state)| TrajectorySample {
                t,
                prey: state[0],
                predator: state[1],
            })
            .collect();
        Self { samples }
    }
}

/// Initial condition and output grid of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub initial_state: State,
    pub t_start: f64,
    pub t_end: f64,
    /// Spacing of the output grid; the last sample is always `t_end`.
    pub output_step: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            initial_state: State::new(50.0, 5.0),
            t_start: 0.0,
            t_end: 500.0,
            output_step: 0.1,
        }
    }
}

impl ScenarioConfig {
    /// `t_start, t_start + step, ...` followed by `t_end` exactly.
    pub fn output_times(&self) -> Result<Vec<f64>> {
        if !self.t_start.is_finite() || !self.t_end.is_finite() {
            return Err(ModelError::InvalidGrid(format!(
                "scenario span [{}, {}] must be finite",
                self.t_start, self.t_end
            )));
        }
        if self.t_end <= self.t_start {
            return Err(ModelError::InvalidGrid(format!(
                "scenario end {} must exceed start {}",
                self.t_end, self.t_start
            )));
        }
        if !self.output_step.is_finite() || self.output_step <= 0.0 {
            return Err(ModelError::invalid(
                "output_step",
                self.output_step,
                "must be finite and positive",
            ));
        }

        let intervals = ((self.t_end - self.t_start) / self.output_step - 1e-9).ceil();
        if intervals + 1.0 > MAX_OUTPUT_SAMPLES as f64 {
            return Err(ModelError::InvalidGrid(format!(
                "output grid of {intervals} intervals exceeds {MAX_OUTPUT_SAMPLES} samples"
            )));
        }
        let intervals = intervals.max(1.0) as usize;

        let mut times: Vec<f64> = (0..intervals)
            .map(|i| self.t_start + i as f64 * self.output_step)
            .take_while(|&t| t < self.t_end)
            .collect();
        times.push(self.t_end);
        Ok(times)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub temperature: f64,
    pub trajectory: Trajectory,
    pub final_state: State,
}

/// Runs the model at fixed temperatures with a pluggable integrator.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner<I = DormandPrince45> {
    pub integrator: I,
    pub config: ScenarioConfig,
}

impl ScenarioRunner<DormandPrince45> {
    pub fn with_settings(settings: IntegratorSettings, config: ScenarioConfig) -> Self {
        Self {
            integrator: DormandPrince45::new(settings),
            config,
        }
    }
}

impl<I: Integrator> ScenarioRunner<I> {
    pub fn new(integrator: I, config: ScenarioConfig) -> Self {
        Self { integrator, config }
    }

    /// Integrates from the configured initial state at `temperature`.
    ///
    /// Integration failures are returned as [`ModelError::Scenario`] naming the
    /// temperature; the failure keeps the partial output.
    #[instrument(level = "debug", skip(self, params))]
    pub fn run(&self, params: &ParameterSet, temperature: f64) -> Result<ScenarioResult> {
        if !temperature.is_finite() {
            return Err(ModelError::invalid(
                "temperature",
                temperature,
                "must be finite",
            ));
        }
        let times = self.config.output_times()?;
        let field = PredatorPrey::new(*params, temperature);
        let span = (self.config.t_start, self.config.t_end);

        let solution = self
            .integrator
            .integrate(&field, span, &self.config.initial_state.to_array(), &times)
            .map_err(|err| match err {
                ModelError::Integration(failure) => ModelError::Scenario {
                    temperature,
                    failure,
                },
                other => other,
            })?;

        let trajectory = Trajectory::from(&solution);
        let final_state = trajectory
            .final_state()
            .unwrap_or(self.config.initial_state);

        info!(
            temperature,
            samples = trajectory.len(),
            prey = final_state.prey,
            predator = final_state.predator,
            "scenario complete"
        );

        Ok(ScenarioResult {
            temperature,
            trajectory,
            final_state,
        })
    }

    /// Runs every temperature in order; stops at the first failure.
    pub fn run_all(&self, params: &ParameterSet, temperatures: &[f64]) -> Result<Vec<ScenarioResult>> {
        temperatures
            .iter()
            .map(|&temperature| self.run(params, temperature))
            .collect()
    }
}

/// Runs one scenario with the default adaptive integrator.
pub fn run_scenario(
    params: &ParameterSet,
    temperature: f64,
    config: ScenarioConfig,
) -> Result<ScenarioResult> {
    ScenarioRunner::new(DormandPrince45::default(), config).run(params, temperature)
}
