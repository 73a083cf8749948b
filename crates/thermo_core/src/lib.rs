//! Analysis engine for a temperature-dependent Lotka-Volterra predator-prey
//! model with logistic prey growth.
//!
//! Key components:
//! - **Parameters / model**: validated constants, Arrhenius-style rates and the
//!   two-species vector field.
//! - **Equilibrium / stability**: closed-form equilibria and Jacobian-based
//!   classification.
//! - **Solvers**: adaptive Dormand-Prince 4(5) and fixed-step RK4 behind the
//!   `Integrator` trait.
//! - **Scenario / bifurcation**: fixed-temperature simulations and temperature
//!   sweeps that locate the critical temperature.
pub mod bifurcation;
pub mod config;
pub mod equilibrium;
pub mod error;
pub mod model;
pub mod params;
pub mod scenario;
pub mod solvers;
pub mod stability;
pub mod traits;

pub use error::{ModelError, Result};
pub use params::{ModelParameters, ParameterSet};
