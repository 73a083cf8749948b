//! Linear stability of equilibria via the trace-determinant plane.

use crate::equilibrium::EquilibriumPoint;
use crate::model::{Rates, State};
use crate::params::ParameterSet;
use nalgebra::Matrix2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Real parts closer to zero than this are treated as a bifurcation.
pub const DEFAULT_ZERO_TOLERANCE: f64 = 1e-6;

/// Roots of `λ² - tr λ + det = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Eigenvalues {
    /// Two real roots, `lambda1 >= lambda2`.
    RealPair { lambda1: f64, lambda2: f64 },
    /// `re ± i im` with `im > 0`.
    ComplexConjugatePair { re: f64, im: f64 },
}

impl Eigenvalues {
    pub fn from_trace_determinant(trace: f64, determinant: f64) -> Self {
        let discriminant = trace * trace - 4.0 * determinant;
        if discriminant < 0.0 {
            return Self::ComplexConjugatePair {
                re: 0.5 * trace,
                im: 0.5 * (-discriminant).sqrt(),
            };
        }

        // Larger-magnitude root first, then the other from the product, to
        // avoid cancellation when det is small.
        let root = discriminant.sqrt();
        let q = 0.5 * (trace + root.copysign(trace));
        let (a, b) = if q == 0.0 { (0.0, 0.0) } else { (q, determinant / q) };
        Self::RealPair {
            lambda1: a.max(b),
            lambda2: a.min(b),
        }
    }

    pub fn real_parts(&self) -> [f64; 2] {
        match *self {
            Self::RealPair { lambda1, lambda2 } => [lambda1, lambda2],
            Self::ComplexConjugatePair { re, .. } => [re, re],
        }
    }

    /// Largest real part; its sign decides local stability.
    pub fn dominant_real_part(&self) -> f64 {
        let [a, b] = self.real_parts();
        a.max(b)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::ComplexConjugatePair { .. })
    }

    /// Dominant eigenvalue first; for a complex pair the positive imaginary part first.
    pub fn to_complex(&self) -> [Complex<f64>; 2] {
        match *self {
            Self::RealPair { lambda1, lambda2 } => {
                [Complex::new(lambda1, 0.0), Complex::new(lambda2, 0.0)]
            }
            Self::ComplexConjugatePair { re, im } => [Complex::new(re, im), Complex::new(re, -im)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityClass {
    StableFocus,
    StableNode,
    Unstable,
    Saddle,
    BifurcationPoint,
}

impl StabilityClass {
    pub fn is_stable(self) -> bool {
        matches!(self, Self::StableFocus | Self::StableNode)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StableFocus => "stable_focus",
            Self::StableNode => "stable_node",
            Self::Unstable => "unstable",
            Self::Saddle => "saddle",
            Self::BifurcationPoint => "bifurcation_point",
        }
    }
}

impl fmt::Display for StabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityResult {
    pub eigenvalues: Eigenvalues,
    pub trace: f64,
    pub determinant: f64,
    pub classification: StabilityClass,
}

impl StabilityResult {
    pub fn dominant_real_part(&self) -> f64 {
        self.eigenvalues.dominant_real_part()
    }
}

/// Jacobian of the vector field at an arbitrary state.
///
/// ```text
/// [[ r(1 - 2R/K) - a0 P,   -a0 R      ],
///  [ b a0 P,               b a0 R - d ]]
/// ```
pub fn jacobian_at(params: &ParameterSet, temperature: f64, state: State) -> Matrix2<f64> {
    let p = params.values();
    let rates = Rates::at(params, temperature);
    let State { prey, predator } = state;
    Matrix2::new(
        rates.growth * (1.0 - 2.0 * prey / p.carrying_capacity) - p.a0 * predator,
        -p.a0 * prey,
        p.b * p.a0 * predator,
        p.b * p.a0 * prey - rates.mortality,
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StabilityAnalyzer {
    pub zero_tolerance: f64,
}

impl Default for StabilityAnalyzer {
    fn default() -> Self {
        Self {
            zero_tolerance: DEFAULT_ZERO_TOLERANCE,
        }
    }
}

impl StabilityAnalyzer {
    /// Classifies the equilibrium carried by `point` (the boundary `(K, 0)`
    /// when coexistence does not exist).
    pub fn analyze(&self, params: &ParameterSet, point: &EquilibriumPoint) -> StabilityResult {
        let jacobian = jacobian_at(params, point.temperature, point.state());
        self.classify(&jacobian)
    }

    pub fn classify(&self, jacobian: &Matrix2<f64>) -> StabilityResult {
        let trace = jacobian.trace();
        let determinant = jacobian.determinant();
        let eigenvalues = Eigenvalues::from_trace_determinant(trace, determinant);
        let [re1, re2] = eigenvalues.real_parts();

        let classification = if eigenvalues.dominant_real_part().abs() <= self.zero_tolerance {
            StabilityClass::BifurcationPoint
        } else if determinant < 0.0 {
            StabilityClass::Saddle
        } else if re1.abs() <= self.zero_tolerance || re2.abs() <= self.zero_tolerance {
            StabilityClass::BifurcationPoint
        } else if re1 < 0.0 && re2 < 0.0 {
            if eigenvalues.is_complex() {
                StabilityClass::StableFocus
            } else {
                StabilityClass::StableNode
            }
        } else {
            StabilityClass::Unstable
        };

        StabilityResult {
            eigenvalues,
            trace,
            determinant,
            classification,
        }
    }
}

/// [`StabilityAnalyzer::analyze`] with the default tolerance.
pub fn analyze(params: &ParameterSet, point: &EquilibriumPoint) -> StabilityResult {
    StabilityAnalyzer::default().analyze(params, point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::coexistence_equilibrium;
    use nalgebra::DMatrix;

    fn sorted_reference_eigenvalues(j: &Matrix2<f64>) -> Vec<Complex<f64>> {
        let matrix = DMatrix::from_row_slice(2, 2, &[j[(0, 0)], j[(0, 1)], j[(1, 0)], j[(1, 1)]]);
        let mut values: Vec<Complex<f64>> = matrix.complex_eigenvalues().iter().cloned().collect();
        values.sort_by(|a, b| {
            b.re.partial_cmp(&a.re)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.im.partial_cmp(&a.im).unwrap_or(std::cmp::Ordering::Equal))
        });
        values
    }

    #[test]
    fn closed_form_eigenvalues_agree_with_nalgebra() {
        let analyzer = StabilityAnalyzer::default();
        let cases = [
            Matrix2::new(-0.5, -0.8, 0.02, 0.0),
            Matrix2::new(-0.1, -2.0, 1.5, 0.0),
            Matrix2::new(0.6, 0.0, 0.0, -0.16),
            Matrix2::new(0.3, -1.0, 1.0, 0.2),
            Matrix2::new(-0.6, -1.0, 0.0, -0.07),
        ];
        for j in cases {
            let result = analyzer.classify(&j);
            let ours = result.eigenvalues.to_complex();
            let reference = sorted_reference_eigenvalues(&j);
            for (a, b) in ours.iter().zip(reference.iter()) {
                assert!((a - b).norm() < 1e-9, "{a} vs {b} for {j}");
            }
            assert!((result.trace - (j[(0, 0)] + j[(1, 1)])).abs() < 1e-15);
        }
    }

    #[test]
    fn small_determinant_root_keeps_precision() {
        let eig = Eigenvalues::from_trace_determinant(-1.0, 1e-14);
        match eig {
            Eigenvalues::RealPair { lambda1, lambda2 } => {
                assert!((lambda1 + 1e-14).abs() < 1e-24);
                assert!((lambda2 + 1.0).abs() < 1e-12);
            }
            other => panic!("expected real pair, got {other:?}"),
        }
    }

    #[test]
    fn classification_follows_trace_determinant_plane() {
        let analyzer = StabilityAnalyzer::default();
        let class = |j: Matrix2<f64>| analyzer.classify(&j).classification;

        assert_eq!(class(Matrix2::new(-0.1, -2.0, 1.5, 0.0)), StabilityClass::StableFocus);
        assert_eq!(class(Matrix2::new(-1.0, 0.0, 0.0, -2.0)), StabilityClass::StableNode);
        assert_eq!(class(Matrix2::new(1.0, 0.0, 0.0, -2.0)), StabilityClass::Saddle);
        assert_eq!(class(Matrix2::new(1.0, 0.0, 0.0, 2.0)), StabilityClass::Unstable);
        assert_eq!(class(Matrix2::new(0.3, -1.0, 1.0, 0.2)), StabilityClass::Unstable);
        assert_eq!(class(Matrix2::new(-1.0, 0.0, 0.0, 1e-8)), StabilityClass::BifurcationPoint);
        // Zero eigenvalue behind a positive dominant one.
        assert_eq!(class(Matrix2::new(1.0, 0.0, 0.0, 1e-8)), StabilityClass::BifurcationPoint);
        // Center: purely imaginary pair.
        assert_eq!(class(Matrix2::new(0.0, -1.0, 1.0, 0.0)), StabilityClass::BifurcationPoint);
    }

    #[test]
    fn general_jacobian_matches_reduced_form_at_coexistence() {
        let params = ParameterSet::reference();
        let p = params.values();
        for temperature in [5.0, 10.0, 13.0] {
            let eq = coexistence_equilibrium(&params, temperature);
            let r = Rates::at(&params, temperature).growth;
            let j = jacobian_at(&params, temperature, eq.state());
            assert!((j[(0, 0)] + r * eq.prey / p.carrying_capacity).abs() < 1e-12);
            assert!((j[(0, 1)] + p.a0 * eq.prey).abs() < 1e-12);
            assert!((j[(1, 0)] - p.b * p.a0 * eq.predator).abs() < 1e-12);
            assert!(j[(1, 1)].abs() < 1e-12);
        }
    }

    #[test]
    fn coexistence_is_stable_below_critical_temperature() {
        let params = ParameterSet::reference();
        let tc = params.critical_temperature();
        let mut temperature = 0.0;
        while temperature < tc - 1e-3 {
            let eq = coexistence_equilibrium(&params, temperature);
            let result = analyze(&params, &eq);
            assert!(
                result.classification.is_stable(),
                "T = {temperature}: {:?}",
                result.classification
            );
            assert!(result.trace < 0.0 && result.determinant > 0.0);
            temperature += 0.1;
        }
    }

    #[test]
    fn prey_only_is_stable_above_critical_temperature() {
        let params = ParameterSet::reference();
        for temperature in [14.0, 15.0, 20.0, 22.0, 25.0] {
            let eq = coexistence_equilibrium(&params, temperature);
            assert!(!eq.exists);
            let result = analyze(&params, &eq);
            assert_eq!(result.classification, StabilityClass::StableNode);
            assert!(result.dominant_real_part() < 0.0);
        }
    }

    #[test]
    fn dominant_eigenvalue_vanishes_at_critical_temperature() {
        let params = ParameterSet::reference();
        let eq = coexistence_equilibrium(&params, params.critical_temperature());
        let result = analyze(&params, &eq);
        assert!(result.dominant_real_part().abs() < 1e-6);
        assert_eq!(result.classification, StabilityClass::BifurcationPoint);
    }

    #[test]
    fn ten_degrees_is_a_stable_node() {
        let params = ParameterSet::reference();
        let eq = coexistence_equilibrium(&params, 10.0);
        let result = analyze(&params, &eq);
        assert_eq!(result.classification, StabilityClass::StableNode);
        match result.eigenvalues {
            Eigenvalues::RealPair { lambda1, lambda2 } => {
                assert!(lambda1 < 0.0 && lambda2 < lambda1);
                assert!((lambda1 * lambda2 - result.determinant).abs() < 1e-12);
                assert!((lambda1 + lambda2 - result.trace).abs() < 1e-12);
            }
            other => panic!("expected real eigenvalues, got {other:?}"),
        }
    }

    #[test]
    fn eigenvalues_serialize_with_kind_tag() {
        let json = serde_json::to_string(&Eigenvalues::ComplexConjugatePair { re: -0.1, im: 0.5 })
            .expect("serialize");
        assert!(json.contains("\"kind\":\"complex_conjugate_pair\""));
        let class = serde_json::to_string(&StabilityClass::StableFocus).expect("serialize");
        assert_eq!(class, "\"stable_focus\"");
    }
}
