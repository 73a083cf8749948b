//! Serializable description of a full analysis run.
//!
//! Every field has a default reproducing the reference study, so a partial
//! JSON document only needs to name what it overrides.

use crate::bifurcation::{BifurcationScanner, TemperatureGrid};
use crate::error::{ModelError, Result};
use crate::params::ParameterSet;
use crate::scenario::{ScenarioConfig, ScenarioRunner};
use crate::solvers::{DormandPrince45, IntegratorSettings};
use serde::{Deserialize, Serialize};

/// Evenly spaced temperature sweep `[min, max]` with `points` samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSpec {
    pub min: f64,
    pub max: f64,
    pub points: usize,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            min: 10.0,
            max: 25.0,
            points: 200,
        }
    }
}

impl SweepSpec {
    pub fn grid(&self) -> Result<TemperatureGrid> {
        TemperatureGrid::linspace(self.min, self.max, self.points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub parameters: ParameterSet,
    pub scenario_temperatures: Vec<f64>,
    pub scenario: ScenarioConfig,
    pub integrator: IntegratorSettings,
    pub sweep: SweepSpec,
    /// Evaluate sweep temperatures on the rayon pool.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parameters: ParameterSet::reference(),
            scenario_temperatures: vec![10.0, 15.0, 20.0, 22.0],
            scenario: ScenarioConfig::default(),
            integrator: IntegratorSettings::default(),
            sweep: SweepSpec::default(),
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    /// Checks everything that can be checked before running anything.
    pub fn validate(&self) -> Result<()> {
        if let Some(&bad) = self.scenario_temperatures.iter().find(|t| !t.is_finite()) {
            return Err(ModelError::invalid(
                "scenario_temperatures",
                bad,
                "must be finite",
            ));
        }
        self.integrator.validate()?;
        self.scenario.output_times()?;
        self.sweep.grid()?;
        Ok(())
    }

    pub fn runner(&self) -> ScenarioRunner<DormandPrince45> {
        ScenarioRunner::with_settings(self.integrator, self.scenario)
    }

    pub fn scanner(&self) -> BifurcationScanner {
        BifurcationScanner {
            parallel: self.parallel,
            ..BifurcationScanner::default()
        }
    }
}
