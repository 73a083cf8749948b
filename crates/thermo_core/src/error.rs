//! Error taxonomy for the analysis core.
//!
//! Rate, vector-field, equilibrium and stability evaluations are total for
//! finite inputs. Everything that can fail is either input validation
//! (rejected before any computation) or an integrator giving up.

use crate::solvers::OdeSolution;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("invalid parameter `{field}` = {value}: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("state dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Integration(Box<IntegrationFailure>),

    #[error("scenario at T = {temperature} °C failed: {failure}")]
    Scenario {
        temperature: f64,
        #[source]
        failure: Box<IntegrationFailure>,
    },
}

impl ModelError {
    pub(crate) fn invalid(field: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            field,
            value,
            reason,
        }
    }

    /// Returns the underlying integration failure, if any.
    pub fn integration_failure(&self) -> Option<&IntegrationFailure> {
        match self {
            Self::Integration(failure) | Self::Scenario { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Why an integrator stopped before the end of its span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureReason {
    /// Adaptive step fell below the precision floor.
    StepSizeCollapse { step: f64 },
    /// `max_steps` attempts used up.
    StepBudgetExhausted { max_steps: usize },
    /// The state or its derivative became NaN/inf.
    NonFiniteState,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepSizeCollapse { step } => write!(f, "step size collapsed to {step:e}"),
            Self::StepBudgetExhausted { max_steps } => {
                write!(f, "step budget of {max_steps} exhausted")
            }
            Self::NonFiniteState => write!(f, "state became non-finite"),
        }
    }
}

/// An integration that stopped short of its end time.
///
/// `partial` holds every output sample that was reached before the failure;
/// `time`/`state` are the last accepted solver point.
#[derive(Debug, Clone, Error)]
#[error("integration stopped at t = {time} ({reason})")]
pub struct IntegrationFailure {
    pub time: f64,
    pub state: Vec<f64>,
    pub partial: OdeSolution,
    pub reason: FailureReason,
}
