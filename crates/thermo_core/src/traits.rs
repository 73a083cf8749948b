use crate::error::ModelError;
use crate::solvers::OdeSolution;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Floating-point type the vector fields and steppers are generic over.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A flow `dx/dt = f(t, x)` on a fixed-dimensional state space.
pub trait DynamicalSystem<T: Scalar> {
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out` (length `dimension()`).
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// One fixed step of size `dt`; advances `t` and `state` in place.
pub trait Steppable<T: Scalar> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

/// Integration strategy used by the scenario runner.
///
/// An implementation advances `system` from `span.0` to `span.1` starting at
/// `initial` and reports the state at every entry of `output_times`. Output
/// times must be strictly increasing and lie inside the span.
pub trait Integrator {
    fn integrate<S: DynamicalSystem<f64>>(
        &self,
        system: &S,
        span: (f64, f64),
        initial: &[f64],
        output_times: &[f64],
    ) -> Result<OdeSolution, ModelError>;
}
