use crate::model::{Rates, State};
use crate::params::ParameterSet;
use crate::stability::{analyze, StabilityResult};
use serde::{Deserialize, Serialize};

/// Equilibrium reported for one temperature.
///
/// When coexistence is impossible `exists` is false and the record carries the
/// prey-only boundary equilibrium `(K, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumPoint {
    pub temperature: f64,
    #[serde(rename = "R_star")]
    pub prey: f64,
    #[serde(rename = "P_star")]
    pub predator: f64,
    pub exists: bool,
}

impl EquilibriumPoint {
    pub fn state(&self) -> State {
        State::new(self.prey, self.predator)
    }
}

/// Closed-form interior (coexistence) equilibrium.
///
/// `R* = d(T) / (b a0)`, `P* = (r(T) / a0) (1 - R*/K)`. Coexistence exists iff
/// `d(T) < b a0 K`; otherwise the boundary `(K, 0)` is returned. `P*` is never
/// negative.
pub fn coexistence_equilibrium(params: &ParameterSet, temperature: f64) -> EquilibriumPoint {
    let p = params.values();
    let rates = Rates::at(params, temperature);

    if rates.mortality >= params.coexistence_bound() {
        return EquilibriumPoint {
            temperature,
            prey: p.carrying_capacity,
            predator: 0.0,
            exists: false,
        };
    }

    let prey = rates.mortality / (p.b * p.a0);
    let predator = ((rates.growth / p.a0) * (1.0 - prey / p.carrying_capacity)).max(0.0);

    EquilibriumPoint {
        temperature,
        prey,
        predator,
        exists: true,
    }
}

/// Prey-only equilibrium `(K, 0)`; exists at every temperature.
pub fn prey_only_equilibrium(params: &ParameterSet, temperature: f64) -> EquilibriumPoint {
    EquilibriumPoint {
        temperature,
        prey: params.carrying_capacity(),
        predator: 0.0,
        exists: true,
    }
}

/// Trivial equilibrium `(0, 0)`; exists at every temperature.
pub fn extinction_equilibrium(temperature: f64) -> EquilibriumPoint {
    EquilibriumPoint {
        temperature,
        prey: 0.0,
        predator: 0.0,
        exists: true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedEquilibrium {
    pub point: EquilibriumPoint,
    pub stability: StabilityResult,
}

/// All equilibria of the model at one temperature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumSummary {
    pub temperature: f64,
    pub critical_temperature: f64,
    pub extinction: ClassifiedEquilibrium,
    pub prey_only: ClassifiedEquilibrium,
    /// `None` when `d(T) >= b a0 K`.
    pub coexistence: Option<ClassifiedEquilibrium>,
}

pub fn equilibrium_summary(params: &ParameterSet, temperature: f64) -> EquilibriumSummary {
    let classify = |point: EquilibriumPoint| ClassifiedEquilibrium {
        stability: analyze(params, &point),
        point,
    };

    let coexistence = coexistence_equilibrium(params, temperature);
    EquilibriumSummary {
        temperature,
        critical_temperature: params.critical_temperature(),
        extinction: classify(extinction_equilibrium(temperature)),
        prey_only: classify(prey_only_equilibrium(params, temperature)),
        coexistence: coexistence.exists.then(|| classify(coexistence)),
    }
}
