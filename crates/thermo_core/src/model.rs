//! Temperature-scaled rates and the predator-prey vector field.
//!
//! ```text
//! dR/dt = r(T) R (1 - R/K) - a0 R P
//! dP/dt = b a0 R P - d(T) P
//! ```

use crate::params::ParameterSet;
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};

/// Temperature-dependent rates at a single temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// Prey growth rate `r(T) = r0 exp(alpha_r T)`.
    pub growth: f64,
    /// Predator mortality `d(T) = d0 exp(alpha_d T)`.
    pub mortality: f64,
}

impl Rates {
    pub fn at(params: &ParameterSet, temperature: f64) -> Self {
        let p = params.values();
        Self {
            growth: p.r0 * (p.alpha_r * temperature).exp(),
            mortality: p.d0 * (p.alpha_d * temperature).exp(),
        }
    }
}

/// Population densities: prey `R` and predator `P`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(rename = "R")]
    pub prey: f64,
    #[serde(rename = "P")]
    pub predator: f64,
}

impl State {
    pub const fn new(prey: f64, predator: f64) -> Self {
        Self { prey, predator }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.prey, self.predator]
    }

    /// Builds a state from the first two entries of a slice; `None` if shorter.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [prey, predator, ..] => Some(Self::new(*prey, *predator)),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.prey.is_finite() && self.predator.is_finite()
    }
}

/// Right-hand side of the model at a fixed temperature.
///
/// Negative densities (solver overshoot) are evaluated as-is.
#[derive(Debug, Clone, Copy)]
pub struct PredatorPrey {
    params: ParameterSet,
    temperature: f64,
    rates: Rates,
}

impl PredatorPrey {
    pub fn new(params: ParameterSet, temperature: f64) -> Self {
        Self {
            params,
            temperature,
            rates: Rates::at(&params, temperature),
        }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn rates(&self) -> Rates {
        self.rates
    }

    pub fn derivative(&self, state: State) -> State {
        let p = self.params.values();
        let State { prey, predator } = state;
        let predation = p.a0 * prey * predator;
        State {
            prey: self.rates.growth * prey * (1.0 - prey / p.carrying_capacity) - predation,
            predator: p.b * predation - self.rates.mortality * predator,
        }
    }
}

impl DynamicalSystem<f64> for PredatorPrey {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let state = State::from_slice(x).unwrap_or(State::new(f64::NAN, f64::NAN));
        let d = self.derivative(state);
        out[0] = d.prey;
        out[1] = d.predator;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_at_zero_are_baselines() {
        let params = ParameterSet::reference();
        let rates = Rates::at(&params, 0.0);
        assert_eq!(rates.growth, 0.5);
        assert_eq!(rates.mortality, 0.1);
    }

    #[test]
    fn rates_scale_exponentially() {
        let params = ParameterSet::reference();
        let rates = Rates::at(&params, 15.0);
        assert!((rates.growth - 0.5 * 0.3_f64.exp()).abs() < 1e-12);
        assert!((rates.mortality - 0.1 * 0.75_f64.exp()).abs() < 1e-12);
        // d(Tc) hits the coexistence bound.
        let at_tc = Rates::at(&params, params.critical_temperature());
        assert!((at_tc.mortality - params.coexistence_bound()).abs() < 1e-12);
    }

    #[test]
    fn vector_field_matches_formula() {
        let params = ParameterSet::reference();
        let field = PredatorPrey::new(params, 15.0);
        let r = 0.5 * 0.3_f64.exp();
        let d = 0.1 * 0.75_f64.exp();
        let mut out = [0.0; 2];
        field.apply(0.0, &[50.0, 10.0], &mut out);
        assert!((out[0] - (r * 50.0 * 0.5 - 0.01 * 50.0 * 10.0)).abs() < 1e-12);
        assert!((out[1] - (0.2 * 0.01 * 50.0 * 10.0 - d * 10.0)).abs() < 1e-12);
    }

    #[test]
    fn vector_field_vanishes_on_trivial_equilibria() {
        let field = PredatorPrey::new(ParameterSet::reference(), 12.0);
        assert_eq!(field.derivative(State::new(0.0, 0.0)), State::new(0.0, 0.0));
        let prey_only = field.derivative(State::new(100.0, 0.0));
        assert!(prey_only.prey.abs() < 1e-12);
        assert_eq!(prey_only.predator, 0.0);
    }

    #[test]
    fn from_slice_needs_two_entries() {
        assert_eq!(State::from_slice(&[3.0, 4.0, 9.0]), Some(State::new(3.0, 4.0)));
        assert_eq!(State::from_slice(&[3.0]), None);
        assert_eq!(State::from_slice(&[]), None);

        let field = PredatorPrey::new(ParameterSet::reference(), 10.0);
        let mut out = [0.0; 2];
        field.apply(0.0, &[1.0], &mut out);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn vector_field_accepts_negative_states() {
        let field = PredatorPrey::new(ParameterSet::reference(), 20.0);
        let d = field.derivative(State::new(-1.0, -0.5));
        assert!(d.is_finite());
    }
}
