//! Time integrators.
//!
//! - [`DormandPrince45`]: adaptive explicit Runge-Kutta 4(5) pair with local
//!   extrapolation, sampled at the requested output times through the
//!   method's own fourth-order continuous extension.
//! - [`FixedStepRk4`]: classic RK4 that lands exactly on every output time.
//!
//! Both implement [`Integrator`] and share [`OdeSolution`] as output.

use crate::error::{FailureReason, IntegrationFailure, ModelError, Result};
use crate::traits::{DynamicalSystem, Integrator, Scalar, Steppable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Samples of an integration, states stored row-major (`dimension` per row).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OdeSolution {
    pub dimension: usize,
    pub times: Vec<f64>,
    pub states: Vec<f64>,
}

impl OdeSolution {
    pub fn with_capacity(dimension: usize, samples: usize) -> Self {
        Self {
            dimension,
            times: Vec::with_capacity(samples),
            states: Vec::with_capacity(samples * dimension),
        }
    }

    pub fn push(&mut self, t: f64, state: &[f64]) {
        self.times.push(t);
        self.states.extend_from_slice(&state[..self.dimension]);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn state(&self, index: usize) -> &[f64] {
        &self.states[index * self.dimension..(index + 1) * self.dimension]
    }

    pub fn last_state(&self) -> Option<&[f64]> {
        self.len().checked_sub(1).map(|idx| self.state(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        self.times
            .iter()
            .copied()
            .zip(self.states.chunks_exact(self.dimension.max(1)))
    }
}

/// Tolerances and step bounds for [`DormandPrince45`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Largest step the controller may take.
    pub max_step: f64,
    /// Absolute lower bound on the step; the effective floor also scales with `|t|`.
    pub min_step: f64,
    /// Budget of attempted steps (accepted and rejected).
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_step: 1.0,
            min_step: 1e-12,
            max_steps: 1_000_000,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(ModelError::invalid("rtol", self.rtol, "must be finite and positive"));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(ModelError::invalid("atol", self.atol, "must be finite and positive"));
        }
        if self.max_step.is_nan() || self.max_step <= 0.0 {
            return Err(ModelError::invalid("max_step", self.max_step, "must be positive"));
        }
        if !self.min_step.is_finite() || self.min_step < 0.0 {
            return Err(ModelError::invalid(
                "min_step",
                self.min_step,
                "must be finite and non-negative",
            ));
        }
        if self.min_step >= self.max_step {
            return Err(ModelError::invalid(
                "min_step",
                self.min_step,
                "must be smaller than max_step",
            ));
        }
        if self.max_steps == 0 {
            return Err(ModelError::invalid(
                "max_steps",
                self.max_steps as f64,
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn step_floor(&self, t: f64) -> f64 {
        self.min_step.max(16.0 * f64::EPSILON * t.abs())
    }
}

fn validate_request(
    dimension: usize,
    span: (f64, f64),
    initial: &[f64],
    output_times: &[f64],
) -> Result<()> {
    let (t0, t1) = span;
    if !t0.is_finite() || !t1.is_finite() {
        return Err(ModelError::InvalidGrid(format!(
            "time span [{t0}, {t1}] must be finite"
        )));
    }
    if t1 < t0 {
        return Err(ModelError::InvalidGrid(format!(
            "time span end {t1} precedes start {t0}"
        )));
    }
    if initial.len() != dimension {
        return Err(ModelError::DimensionMismatch {
            expected: dimension,
            actual: initial.len(),
        });
    }
    if let Some(&bad) = initial.iter().find(|v| !v.is_finite()) {
        return Err(ModelError::invalid("initial_state", bad, "must be finite"));
    }
    for (idx, &t) in output_times.iter().enumerate() {
        if !(t0..=t1).contains(&t) {
            return Err(ModelError::InvalidGrid(format!(
                "output time {t} at index {idx} lies outside [{t0}, {t1}]"
            )));
        }
        if idx > 0 && t <= output_times[idx - 1] {
            return Err(ModelError::InvalidGrid(format!(
                "output times must be strictly increasing (index {idx})"
            )));
        }
    }
    Ok(())
}

fn failure(
    time: f64,
    state: &[f64],
    partial: OdeSolution,
    reason: FailureReason,
) -> ModelError {
    warn!(time, %reason, samples = partial.len(), "integration failed");
    ModelError::Integration(Box::new(IntegrationFailure {
        time,
        state: state.to_vec(),
        partial,
        reason,
    }))
}

/// Fourth-order continuous extension of the Dormand-Prince step (Shampine),
/// evaluated at fraction `x` of the step `h` taken from `y`.
fn dense_output(y: &[f64], k: [&[f64]; 7], h: f64, x: f64, out: &mut [f64]) {
    let powers = [x, x * x, x * x * x, x * x * x * x];
    let weights: [f64; 7] = std::array::from_fn(|stage| {
        DENSE[stage]
            .iter()
            .zip(powers.iter())
            .map(|(coeff, power)| coeff * power)
            .sum()
    });
    for i in 0..out.len() {
        let mut increment = 0.0;
        for (stage, weight) in weights.iter().enumerate() {
            increment += weight * k[stage][i];
        }
        out[i] = y[i] + h * increment;
    }
}

fn rms_norm(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    (values.map(|v| v * v).sum::<f64>() / n as f64).sqrt()
}

// Dormand-Prince tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (advancing solution).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// 4th-order embedded weights.
const BS1: f64 = 5179.0 / 57600.0;
const BS3: f64 = 7571.0 / 16695.0;
const BS4: f64 = 393.0 / 640.0;
const BS5: f64 = -92097.0 / 339200.0;
const BS6: f64 = 187.0 / 2100.0;
const BS7: f64 = 1.0 / 40.0;

const E1: f64 = B1 - BS1;
const E3: f64 = B3 - BS3;
const E4: f64 = B4 - BS4;
const E5: f64 = B5 - BS5;
const E6: f64 = B6 - BS6;
const E7: f64 = -BS7;

// Coefficients of x, x², x³, x⁴ in the dense-output weight of each stage.
const DENSE: [[f64; 4]; 7] = [
    [
        1.0,
        -8048581381.0 / 2820520608.0,
        8663915743.0 / 2820520608.0,
        -12715105075.0 / 11282082432.0,
    ],
    [0.0, 0.0, 0.0, 0.0],
    [
        0.0,
        131558114200.0 / 32700410799.0,
        -68118460800.0 / 10900136933.0,
        87487479700.0 / 32700410799.0,
    ],
    [
        0.0,
        -1754552775.0 / 470086768.0,
        14199869525.0 / 1410260304.0,
        -10690763975.0 / 1880347072.0,
    ],
    [
        0.0,
        127303824393.0 / 49829197408.0,
        -318862633887.0 / 49829197408.0,
        701980252875.0 / 199316789632.0,
    ],
    [
        0.0,
        -282668133.0 / 205662961.0,
        2019193451.0 / 616988883.0,
        -1453857185.0 / 822651844.0,
    ],
    [
        0.0,
        40617522.0 / 29380423.0,
        -110615467.0 / 29380423.0,
        69997945.0 / 29380423.0,
    ],
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const MAX_RELATIVE_CHANGE: f64 = 0.5;

/// Adaptive Dormand-Prince 4(5) integrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DormandPrince45 {
    pub settings: IntegratorSettings,
}

impl DormandPrince45 {
    pub fn new(settings: IntegratorSettings) -> Self {
        Self { settings }
    }

    /// Starting step from the local derivative scale (Hairer, Nørsett & Wanner, II.4).
    fn initial_step<S: DynamicalSystem<f64>>(
        &self,
        system: &S,
        t0: f64,
        y0: &[f64],
        f0: &[f64],
        span: f64,
    ) -> f64 {
        let n = y0.len();
        let s = &self.settings;
        let scale: Vec<f64> = y0.iter().map(|y| s.atol + y.abs() * s.rtol).collect();

        let d0 = rms_norm(y0.iter().zip(&scale).map(|(y, sc)| y / sc), n);
        let d1 = rms_norm(f0.iter().zip(&scale).map(|(f, sc)| f / sc), n);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(span);

        let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
        let mut f1 = vec![0.0; n];
        system.apply(t0 + h0, &y1, &mut f1);
        let d2 = rms_norm(
            f1.iter().zip(f0).zip(&scale).map(|((a, b), sc)| (a - b) / sc),
            n,
        ) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(0.2)
        };

        let h = (100.0 * h0).min(h1).min(span).min(s.max_step);
        if h.is_finite() && h > 0.0 {
            h
        } else {
            span.min(s.max_step)
        }
    }
}

impl Integrator for DormandPrince45 {
    fn integrate<S: DynamicalSystem<f64>>(
        &self,
        system: &S,
        span: (f64, f64),
        initial: &[f64],
        output_times: &[f64],
    ) -> Result<OdeSolution> {
        self.settings.validate()?;
        let n = system.dimension();
        validate_request(n, span, initial, output_times)?;
        let settings = &self.settings;
        let (t0, t1) = span;

        let mut solution = OdeSolution::with_capacity(n, output_times.len());
        let mut next_out = 0usize;
        while next_out < output_times.len() && output_times[next_out] <= t0 {
            solution.push(output_times[next_out], initial);
            next_out += 1;
        }

        let mut t = t0;
        let mut y = initial.to_vec();
        let mut k1 = vec![0.0; n];
        system.apply(t, &y, &mut k1);
        if k1.iter().any(|v| !v.is_finite()) {
            return Err(failure(t, &y, solution, FailureReason::NonFiniteState));
        }
        if t1 == t0 {
            return Ok(solution);
        }

        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut k5 = vec![0.0; n];
        let mut k6 = vec![0.0; n];
        let mut k7 = vec![0.0; n];
        let mut tmp = vec![0.0; n];
        let mut y_new = vec![0.0; n];
        let mut dense = vec![0.0; n];

        let mut h = self.initial_step(system, t0, &y, &k1, t1 - t0);
        let mut attempts = 0usize;
        let mut rejections = 0usize;
        let mut rejected_last = false;

        while t < t1 {
            if attempts >= settings.max_steps {
                return Err(failure(
                    t,
                    &y,
                    solution,
                    FailureReason::StepBudgetExhausted {
                        max_steps: settings.max_steps,
                    },
                ));
            }
            attempts += 1;

            // A step never exceeds half the state's e-folding time, so a
            // finite-time blow-up is approached but not stepped across.
            let rate = rms_norm(k1.iter().copied(), n)
                / (rms_norm(y.iter().copied(), n) + settings.atol);
            if rate > 0.0 {
                h = h.min(MAX_RELATIVE_CHANGE / rate);
            }

            if h < settings.step_floor(t) {
                return Err(failure(
                    t,
                    &y,
                    solution,
                    FailureReason::StepSizeCollapse { step: h },
                ));
            }

            let remaining = t1 - t;
            let last = h >= remaining;
            let h_step = if last { remaining } else { h };

            for i in 0..n {
                tmp[i] = y[i] + h_step * A21 * k1[i];
            }
            system.apply(t + C2 * h_step, &tmp, &mut k2);

            for i in 0..n {
                tmp[i] = y[i] + h_step * (A31 * k1[i] + A32 * k2[i]);
            }
            system.apply(t + C3 * h_step, &tmp, &mut k3);

            for i in 0..n {
                tmp[i] = y[i] + h_step * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
            }
            system.apply(t + C4 * h_step, &tmp, &mut k4);

            for i in 0..n {
                tmp[i] = y[i] + h_step * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
            }
            system.apply(t + C5 * h_step, &tmp, &mut k5);

            for i in 0..n {
                tmp[i] = y[i]
                    + h_step
                        * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
            }
            system.apply(t + h_step, &tmp, &mut k6);

            for i in 0..n {
                y_new[i] = y[i]
                    + h_step * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
            }
            // FSAL: k7 is the derivative at the new point.
            system.apply(t + h_step, &y_new, &mut k7);
            if y_new.iter().chain(&k7).any(|v| !v.is_finite()) {
                return Err(failure(t, &y, solution, FailureReason::NonFiniteState));
            }

            let err_norm = rms_norm(
                (0..n).map(|i| {
                    let err = h_step
                        * (E1 * k1[i]
                            + E3 * k3[i]
                            + E4 * k4[i]
                            + E5 * k5[i]
                            + E6 * k6[i]
                            + E7 * k7[i]);
                    err / (settings.atol + settings.rtol * y[i].abs().max(y_new[i].abs()))
                }),
                n,
            );

            if !err_norm.is_finite() || err_norm > 1.0 {
                let factor = if err_norm.is_finite() {
                    (SAFETY * err_norm.powf(-0.2)).max(MIN_FACTOR)
                } else {
                    MIN_FACTOR
                };
                h = h_step * factor;
                rejected_last = true;
                rejections += 1;
                continue;
            }

            let t_new = if last { t1 } else { t + h_step };
            while next_out < output_times.len() && output_times[next_out] <= t_new {
                let tau = output_times[next_out];
                if tau == t_new {
                    solution.push(tau, &y_new);
                } else {
                    let x = (tau - t) / h_step;
                    let stages = [&k1[..], &k2[..], &k3[..], &k4[..], &k5[..], &k6[..], &k7[..]];
                    dense_output(&y, stages, h_step, x, &mut dense);
                    solution.push(tau, &dense);
                }
                next_out += 1;
            }

            t = t_new;
            y.copy_from_slice(&y_new);
            k1.copy_from_slice(&k7);

            let mut factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            if rejected_last {
                factor = factor.min(1.0);
            }
            rejected_last = false;
            // A clipped final step must not shrink the controller's proposal.
            let base = if last { h.max(h_step) } else { h_step };
            h = (base * factor).min(settings.max_step);
        }

        debug!(attempts, rejections, samples = solution.len(), "integration finished");
        Ok(solution)
    }
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let two = T::one() + T::one();
        let half = T::one() / two;
        let sixth = T::one() / (two + two + two);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Fixed-step RK4 backend. Each interval between consecutive targets is split
/// into equal substeps no longer than `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedStepRk4 {
    pub step: f64,
    pub max_steps: usize,
}

impl FixedStepRk4 {
    pub fn new(step: f64) -> Self {
        Self {
            step,
            max_steps: 10_000_000,
        }
    }
}

impl Integrator for FixedStepRk4 {
    fn integrate<S: DynamicalSystem<f64>>(
        &self,
        system: &S,
        span: (f64, f64),
        initial: &[f64],
        output_times: &[f64],
    ) -> Result<OdeSolution> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(ModelError::invalid("step", self.step, "must be finite and positive"));
        }
        let n = system.dimension();
        validate_request(n, span, initial, output_times)?;
        let (t0, t1) = span;

        let mut solution = OdeSolution::with_capacity(n, output_times.len());
        let mut stepper = RK4::new(n);
        let mut t = t0;
        let mut y = initial.to_vec();
        let mut steps = 0usize;

        let targets = output_times
            .iter()
            .map(|&tau| (tau, true))
            .chain(std::iter::once((t1, false)));
        for (target, record) in targets {
            let interval = target - t;
            if interval > 0.0 {
                let substeps = (interval / self.step).ceil().max(1.0) as usize;
                let dt = interval / substeps as f64;
                for k in 0..substeps {
                    if steps >= self.max_steps {
                        return Err(failure(
                            t,
                            &y,
                            solution,
                            FailureReason::StepBudgetExhausted {
                                max_steps: self.max_steps,
                            },
                        ));
                    }
                    steps += 1;
                    stepper.step(system, &mut t, &mut y, dt);
                    if k + 1 == substeps {
                        t = target;
                    }
                    if y.iter().any(|v| !v.is_finite()) {
                        return Err(failure(t, &y, solution, FailureReason::NonFiniteState));
                    }
                }
            }
            if record {
                solution.push(target, &y);
            }
        }

        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay {
        rate: f64,
    }

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -self.rate * x[0];
        }
    }

    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    /// `dx/dt = x²` blows up at `t = 1/x0`.
    struct BlowUp;

    impl DynamicalSystem<f64> for BlowUp {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[0] * x[0];
        }
    }

    fn grid(t_end: f64, samples: usize) -> Vec<f64> {
        (0..samples)
            .map(|i| t_end * i as f64 / (samples - 1) as f64)
            .collect()
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn dormand_prince_tracks_exponential_decay_at_output_times() {
        let times = grid(10.0, 101);
        let solution = DormandPrince45::default()
            .integrate(&Decay { rate: 0.7 }, (0.0, 10.0), &[2.0], &times)
            .expect("decay should integrate");
        assert_eq!(solution.len(), 101);
        for (t, state) in solution.iter() {
            let exact = 2.0 * (-0.7 * t).exp();
            assert!((state[0] - exact).abs() < 1e-5, "t = {t}: {} vs {exact}", state[0]);
        }
        assert_eq!(solution.times[0], 0.0);
        assert_eq!(solution.state(0), &[2.0]);
        assert_eq!(*solution.times.last().unwrap(), 10.0);
    }

    #[test]
    fn dormand_prince_conserves_oscillator_amplitude() {
        let times = grid(20.0, 201);
        let solution = DormandPrince45::default()
            .integrate(&Oscillator, (0.0, 20.0), &[1.0, 0.0], &times)
            .expect("oscillator should integrate");
        for (t, state) in solution.iter() {
            assert!((state[0] - t.cos()).abs() < 1e-4, "t = {t}");
            assert!((state[1] + t.sin()).abs() < 1e-4, "t = {t}");
        }
    }

    #[test]
    fn dense_output_between_steps_is_accurate() {
        // Sparse solver steps (max_step large), dense samples in between.
        let settings = IntegratorSettings {
            max_step: f64::INFINITY,
            ..IntegratorSettings::default()
        };
        let times = grid(5.0, 501);
        let solution = DormandPrince45::new(settings)
            .integrate(&Decay { rate: 1.0 }, (0.0, 5.0), &[1.0], &times)
            .expect("decay should integrate");
        for (t, state) in solution.iter() {
            assert!((state[0] - (-t).exp()).abs() < 1e-5, "t = {t}");
        }
    }

    #[test]
    fn tighter_tolerance_reduces_error() {
        let times = [0.0, 3.0];
        let loose = IntegratorSettings {
            rtol: 1e-3,
            atol: 1e-6,
            ..IntegratorSettings::default()
        };
        let tight = IntegratorSettings {
            rtol: 1e-10,
            atol: 1e-12,
            ..IntegratorSettings::default()
        };
        let exact = (-3.0_f64).exp();
        let err = |settings| {
            let solution = DormandPrince45::new(settings)
                .integrate(&Decay { rate: 1.0 }, (0.0, 3.0), &[1.0], &times)
                .expect("decay should integrate");
            (solution.state(1)[0] - exact).abs()
        };
        assert!(err(tight) < err(loose));
        assert!(err(tight) < 1e-9);
    }

    #[test]
    fn blow_up_reports_step_collapse_with_partial_output() {
        let times = grid(2.0, 21);
        let err = DormandPrince45::default()
            .integrate(&BlowUp, (0.0, 2.0), &[1.0], &times)
            .expect_err("finite-time blow-up must fail");
        let failure = err.integration_failure().expect("integration failure");
        assert!((failure.time - 1.0).abs() < 1e-5, "stopped at {}", failure.time);
        assert!(matches!(failure.reason, FailureReason::StepSizeCollapse { .. }));

        // The reported state is the last accepted point, finite and near the pole.
        assert_eq!(failure.state.len(), 1);
        assert!(failure.state[0].is_finite() && failure.state[0] > 1e6);

        // Nothing is reported past the last accepted point.
        assert!(failure.partial.len() >= 10);
        assert!(failure.partial.times.iter().all(|&t| t <= failure.time));
        for (t, x) in failure.partial.iter().filter(|(t, _)| *t < 0.95) {
            let exact = 1.0 / (1.0 - t);
            assert!((x[0] - exact).abs() / exact < 1e-4, "t = {t}");
        }
    }

    /// Finite below `t = 0.5`, NaN from there on.
    struct Poisoned;

    impl DynamicalSystem<f64> for Poisoned {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = if t < 0.5 { 1.0 } else { f64::NAN };
        }
    }

    #[test]
    fn non_finite_step_stops_at_last_valid_point() {
        let times = grid(1.0, 11);
        let err = DormandPrince45::default()
            .integrate(&Poisoned, (0.0, 1.0), &[1.0], &times)
            .expect_err("NaN derivative must fail");
        let failure = err.integration_failure().expect("integration failure");
        assert_eq!(failure.reason, FailureReason::NonFiniteState);
        assert!(failure.time < 0.5);
        assert!(failure.state[0].is_finite());
        assert!((failure.state[0] - (1.0 + failure.time)).abs() < 1e-9);
        assert!(failure.partial.times.iter().all(|&t| t <= failure.time));
        assert!(failure.partial.states.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn step_budget_is_enforced() {
        let settings = IntegratorSettings {
            max_step: 0.01,
            max_steps: 10,
            ..IntegratorSettings::default()
        };
        let err = DormandPrince45::new(settings)
            .integrate(&Decay { rate: 1.0 }, (0.0, 1.0), &[1.0], &[0.0, 1.0])
            .expect_err("budget too small");
        match err.integration_failure().map(|f| f.reason) {
            Some(FailureReason::StepBudgetExhausted { max_steps }) => assert_eq!(max_steps, 10),
            other => panic!("unexpected failure reason {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_requests() {
        let dp = DormandPrince45::default();
        let system = Decay { rate: 1.0 };
        assert_err_contains(dp.integrate(&system, (0.0, 1.0), &[1.0, 2.0], &[]), "dimension");
        assert_err_contains(dp.integrate(&system, (1.0, 0.0), &[1.0], &[]), "precedes");
        assert_err_contains(
            dp.integrate(&system, (0.0, 1.0), &[1.0], &[0.0, 0.5, 0.5]),
            "strictly increasing",
        );
        assert_err_contains(dp.integrate(&system, (0.0, 1.0), &[1.0], &[1.5]), "outside");
        assert_err_contains(dp.integrate(&system, (0.0, 1.0), &[f64::NAN], &[]), "initial_state");

        let bad = DormandPrince45::new(IntegratorSettings {
            rtol: 0.0,
            ..IntegratorSettings::default()
        });
        assert_err_contains(bad.integrate(&system, (0.0, 1.0), &[1.0], &[]), "`rtol`");
    }

    #[test]
    fn rk4_step_matches_taylor_expansion() {
        let mut stepper = RK4::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        stepper.step(&Decay { rate: 1.0 }, &mut t, &mut state, 0.1);
        // 1 - h + h²/2 - h³/6 + h⁴/24
        let expected = 1.0 - 0.1 + 0.005 - 0.1_f64.powi(3) / 6.0 + 0.1_f64.powi(4) / 24.0;
        assert!((state[0] - expected).abs() < 1e-14);
        assert!((t - 0.1).abs() < 1e-15);
    }

    #[test]
    fn fixed_step_rk4_lands_on_output_times() {
        let times = grid(4.0, 9);
        let solution = FixedStepRk4::new(0.01)
            .integrate(&Oscillator, (0.0, 4.0), &[1.0, 0.0], &times)
            .expect("oscillator should integrate");
        assert_eq!(solution.times, times);
        for (t, state) in solution.iter() {
            assert!((state[0] - t.cos()).abs() < 1e-8, "t = {t}");
        }
    }

    #[test]
    fn fixed_step_rk4_reports_non_finite_state() {
        let err = FixedStepRk4::new(0.5)
            .integrate(&BlowUp, (0.0, 3.0), &[1.0], &[0.0, 3.0])
            .expect_err("blow-up must fail");
        let failure = err.integration_failure().expect("integration failure");
        assert_eq!(failure.reason, FailureReason::NonFiniteState);
        assert_eq!(failure.partial.len(), 1);
    }
}
