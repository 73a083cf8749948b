use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Raw model constants as they appear in a configuration file.
///
/// Units: rates are per day, sensitivities per °C, densities in individuals/m³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Baseline prey growth rate.
    pub r0: f64,
    /// Prey carrying capacity.
    #[serde(rename = "K")]
    pub carrying_capacity: f64,
    /// Temperature sensitivity of prey growth.
    pub alpha_r: f64,
    /// Attack rate per predator.
    pub a0: f64,
    /// Conversion efficiency of eaten prey into predators.
    pub b: f64,
    /// Baseline predator mortality.
    pub d0: f64,
    /// Temperature sensitivity of predator mortality.
    pub alpha_d: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            r0: 0.5,
            carrying_capacity: 100.0,
            alpha_r: 0.02,
            a0: 0.01,
            b: 0.2,
            d0: 0.1,
            alpha_d: 0.05,
        }
    }
}

impl ModelParameters {
    fn fields(&self) -> [(&'static str, f64); 7] {
        [
            ("r0", self.r0),
            ("K", self.carrying_capacity),
            ("alpha_r", self.alpha_r),
            ("a0", self.a0),
            ("b", self.b),
            ("d0", self.d0),
            ("alpha_d", self.alpha_d),
        ]
    }
}

/// Validated, immutable parameter set.
///
/// Every constant is finite and strictly positive, so the critical
/// temperature is always defined and is cached at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelParameters", into = "ModelParameters")]
pub struct ParameterSet {
    values: ModelParameters,
    critical_temperature: f64,
}

impl ParameterSet {
    pub fn new(values: ModelParameters) -> Result<Self> {
        for (field, value) in values.fields() {
            if !value.is_finite() {
                return Err(ModelError::invalid(field, value, "must be finite"));
            }
            if value <= 0.0 {
                return Err(ModelError::invalid(field, value, "must be positive"));
            }
        }

        let critical_temperature =
            (values.b * values.a0 * values.carrying_capacity / values.d0).ln() / values.alpha_d;

        Ok(Self {
            values,
            critical_temperature,
        })
    }

    /// The reference parameterisation (`Tc ≈ 13.86 °C`).
    pub fn reference() -> Self {
        Self::new(ModelParameters::default()).expect("reference parameters are valid")
    }

    pub fn values(&self) -> &ModelParameters {
        &self.values
    }

    pub fn carrying_capacity(&self) -> f64 {
        self.values.carrying_capacity
    }

    /// Temperature at which `d(T) = b * a0 * K`, i.e. where the interior
    /// equilibrium merges with the prey-only one.
    pub fn critical_temperature(&self) -> f64 {
        self.critical_temperature
    }

    /// Upper bound on predator mortality that still permits coexistence.
    pub fn coexistence_bound(&self) -> f64 {
        self.values.b * self.values.a0 * self.values.carrying_capacity
    }
}

impl TryFrom<ModelParameters> for ParameterSet {
    type Error = ModelError;

    fn try_from(values: ModelParameters) -> Result<Self> {
        Self::new(values)
    }
}

impl From<ParameterSet> for ModelParameters {
    fn from(params: ParameterSet) -> Self {
        params.values
    }
}
