//! Temperature sweeps of the coexistence equilibrium.
//!
//! Each grid temperature is evaluated independently (equilibrium, Jacobian
//! classification, predator invasion rate at `(K, 0)`), optionally in
//! parallel. The sweep then looks for the first interval in which coexistence
//! appears or disappears and locates the crossing by linear interpolation.

use crate::equilibrium::{coexistence_equilibrium, EquilibriumPoint};
use crate::error::{ModelError, Result};
use crate::model::Rates;
use crate::params::ParameterSet;
use crate::stability::{StabilityAnalyzer, StabilityResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Non-empty, finite, strictly increasing list of temperatures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureGrid {
    values: Vec<f64>,
}

impl TemperatureGrid {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ModelError::InvalidGrid("temperature grid is empty".into()));
        }
        if let Some(bad) = values.iter().find(|t| !t.is_finite()) {
            return Err(ModelError::InvalidGrid(format!(
                "temperature grid contains non-finite value {bad}"
            )));
        }
        if let Some(idx) = values.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ModelError::InvalidGrid(format!(
                "temperature grid is not strictly increasing at index {}: {} -> {}",
                idx + 1,
                values[idx],
                values[idx + 1]
            )));
        }
        Ok(Self { values })
    }

    /// `points` evenly spaced temperatures from `start` to `end` inclusive.
    pub fn linspace(start: f64, end: f64, points: usize) -> Result<Self> {
        match points {
            0 => Err(ModelError::InvalidGrid("temperature grid is empty".into())),
            1 => Self::new(vec![start]),
            _ => {
                let spacing = (end - start) / (points - 1) as f64;
                let mut values: Vec<f64> = (0..points - 1)
                    .map(|k| start + k as f64 * spacing)
                    .collect();
                values.push(end);
                Self::new(values)
            }
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-temperature sweep record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BifurcationSample {
    pub temperature: f64,
    pub equilibrium: EquilibriumPoint,
    pub stability: StabilityResult,
    /// Predator growth rate at `(K, 0)`: `b a0 K - d(T)`. Positive exactly
    /// when coexistence exists.
    pub invasion_rate: f64,
}

/// Quantity whose sign change located the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingIndicator {
    /// `exists` flipped; interpolated on the invasion rate.
    Existence,
    /// Dominant eigenvalue real part changed sign.
    DominantEigenvalue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalCrossing {
    pub temperature: f64,
    /// Index of the last sample before the crossing.
    pub lower_index: usize,
    pub indicator: CrossingIndicator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BifurcationRecord {
    pub samples: Vec<BifurcationSample>,
    pub crossing: Option<CriticalCrossing>,
    /// Closed-form `Tc` for comparison with the observed crossing.
    pub analytic_critical_temperature: f64,
}

impl BifurcationRecord {
    pub fn observed_critical_temperature(&self) -> Option<f64> {
        self.crossing.map(|c| c.temperature)
    }

    /// Observed minus analytic critical temperature.
    pub fn discrepancy(&self) -> Option<f64> {
        self.observed_critical_temperature()
            .map(|t| t - self.analytic_critical_temperature)
    }

    pub fn coexisting_count(&self) -> usize {
        self.samples.iter().filter(|s| s.equilibrium.exists).count()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BifurcationScanner {
    pub analyzer: StabilityAnalyzer,
    pub parallel: bool,
}

impl Default for BifurcationScanner {
    fn default() -> Self {
        Self {
            analyzer: StabilityAnalyzer::default(),
            parallel: true,
        }
    }
}

impl BifurcationScanner {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn sample(&self, params: &ParameterSet, temperature: f64) -> BifurcationSample {
        let equilibrium = coexistence_equilibrium(params, temperature);
        let stability = self.analyzer.analyze(params, &equilibrium);
        let invasion_rate = params.coexistence_bound() - Rates::at(params, temperature).mortality;
        BifurcationSample {
            temperature,
            equilibrium,
            stability,
            invasion_rate,
        }
    }

    /// Samples every grid temperature; output order follows the grid
    /// regardless of `parallel`.
    #[instrument(level = "debug", skip_all, fields(points = grid.len(), parallel = self.parallel))]
    pub fn scan(&self, params: &ParameterSet, grid: &TemperatureGrid) -> BifurcationRecord {
        let samples: Vec<BifurcationSample> = if self.parallel {
            grid.values()
                .par_iter()
                .map(|&t| self.sample(params, t))
                .collect()
        } else {
            grid.values()
                .iter()
                .map(|&t| self.sample(params, t))
                .collect()
        };

        let crossing = locate_crossing(&samples);
        let record = BifurcationRecord {
            samples,
            crossing,
            analytic_critical_temperature: params.critical_temperature(),
        };

        match record.crossing {
            Some(c) => info!(
                observed = c.temperature,
                analytic = record.analytic_critical_temperature,
                indicator = ?c.indicator,
                "critical temperature located"
            ),
            None => info!(
                analytic = record.analytic_critical_temperature,
                coexisting = record.coexisting_count(),
                "no crossing inside the temperature grid"
            ),
        }
        record
    }
}

/// [`BifurcationScanner::scan`] with default settings.
pub fn scan(params: &ParameterSet, grid: &TemperatureGrid) -> BifurcationRecord {
    BifurcationScanner::default().scan(params, grid)
}

/// First interval where coexistence switches, or failing that, where the
/// dominant real part changes sign.
pub fn locate_crossing(samples: &[BifurcationSample]) -> Option<CriticalCrossing> {
    let interpolate = |idx: usize, v0: f64, v1: f64, indicator: CrossingIndicator| {
        let (t0, t1) = (samples[idx].temperature, samples[idx + 1].temperature);
        let temperature = t0 + interpolate_factor(v0, v1) * (t1 - t0);
        debug!(lower = t0, upper = t1, temperature, "crossing bracketed");
        CriticalCrossing {
            temperature,
            lower_index: idx,
            indicator,
        }
    };

    let existence = samples
        .windows(2)
        .position(|w| w[0].equilibrium.exists != w[1].equilibrium.exists);
    if let Some(idx) = existence {
        return Some(interpolate(
            idx,
            samples[idx].invasion_rate,
            samples[idx + 1].invasion_rate,
            CrossingIndicator::Existence,
        ));
    }

    samples
        .windows(2)
        .position(|w| w[0].stability.dominant_real_part() * w[1].stability.dominant_real_part() < 0.0)
        .map(|idx| {
            interpolate(
                idx,
                samples[idx].stability.dominant_real_part(),
                samples[idx + 1].stability.dominant_real_part(),
                CrossingIndicator::DominantEigenvalue,
            )
        })
}

fn interpolate_factor(v0: f64, v1: f64) -> f64 {
    let denominator = v0 - v1;
    if denominator.abs() <= 1e-12 {
        0.5
    } else {
        (v0 / denominator).clamp(0.0, 1.0)
    }
}
