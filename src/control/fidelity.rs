// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fidelity error measures and their exact amplitude gradients.
//!
//! With T the target and X = X_n the full evolution, and g = Tr(T† X),
//! N = Re Tr(T† T):
//!
//! - `Psu`: ε = 1 − |g| / N  (insensitive to global phase)
//! - `Su`:  ε = 1 − Re(g) / N
//! - `TraceDiff`: ε = s · ‖T − X‖²_F
//!
//! Gradients use ∂X/∂u[k, j] = O_{k+1} · ∂P_k/∂u[k, j] · X_k.
//!
//! Ref: Machnes et al. (2011), "Comparing, optimizing, and benchmarking
//! quantum-control algorithms in a unifying programming framework",
//! Phys. Rev. A 84, 022305.

use std::time::Instant;

use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::dynamics::Dynamics;
use super::expm::{dagger, inner_product};
use super::stats::OptimStats;

/// Fidelity error measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FidelityMeasure {
    /// Phase-insensitive overlap.
    Psu,
    /// Phase-sensitive overlap.
    Su,
    /// Scaled squared Frobenius distance.
    TraceDiff,
}

/// Evaluates fidelity error and gradient against a fixed target.
#[derive(Debug, Clone)]
pub struct FidelityComputer {
    measure: FidelityMeasure,
    target: Array2<Complex64>,
    /// N = Re Tr(T† T)
    norm: f64,
    /// s for `TraceDiff`
    scale: f64,
}

impl FidelityComputer {
    /// Create a computer for `target`. `scale` overrides the default 1/(2d)
    /// trace-difference scale factor.
    pub fn new(measure: FidelityMeasure, target: &Array2<Complex64>, scale: Option<f64>) -> Self {
        let norm = inner_product(target, target).re;
        let d = target.nrows().max(1) as f64;
        Self {
            measure,
            target: target.clone(),
            norm,
            scale: scale.unwrap_or(1.0 / (2.0 * d)),
        }
    }

    /// Fidelity error of an evolution `evo` against the target.
    pub fn fid_err_of(&self, evo: &Array2<Complex64>) -> f64 {
        match self.measure {
            FidelityMeasure::Psu => 1.0 - inner_product(&self.target, evo).norm() / self.norm,
            FidelityMeasure::Su => 1.0 - inner_product(&self.target, evo).re / self.norm,
            FidelityMeasure::TraceDiff => {
                let diff = &self.target - evo;
                self.scale * inner_product(&diff, &diff).re
            }
        }
    }

    /// Fidelity error of the current full evolution.
    pub fn fid_err(&self, dynamics: &Dynamics<'_>, stats: &mut OptimStats) -> f64 {
        let start = Instant::now();
        let err = self.fid_err_of(dynamics.full_evo());
        stats.wall_time_fid += start.elapsed();
        stats.num_fidelity_computes += 1;
        err
    }

    /// Gradient of the fidelity error with respect to every amplitude.
    ///
    /// Requires `dynamics` to have been updated with gradients. Returns an
    /// (n_ts × n_ctrls) array.
    pub fn gradient(&self, dynamics: &Dynamics<'_>, stats: &mut OptimStats) -> Array2<f64> {
        let start = Instant::now();
        let problem = dynamics.problem();
        let (n_ts, n_ctrls) = (problem.n_ts, problem.n_ctrls());
        let evo = dynamics.full_evo();

        // Every measure reduces to dε = Re(c · Tr(M† dX)) for a fixed M and c.
        let (m, coeff) = match self.measure {
            FidelityMeasure::Psu => {
                let g = inner_product(&self.target, evo);
                let abs = g.norm();
                let c = if abs > f64::MIN_POSITIVE {
                    -g.conj() / (abs * self.norm)
                } else {
                    Complex64::new(-1.0 / self.norm, 0.0)
                };
                (self.target.clone(), c)
            }
            FidelityMeasure::Su => (
                self.target.clone(),
                Complex64::new(-1.0 / self.norm, 0.0),
            ),
            FidelityMeasure::TraceDiff => (
                &self.target - evo,
                Complex64::new(-2.0 * self.scale, 0.0),
            ),
        };

        let rows: Vec<Vec<f64>> = (0..n_ts)
            .into_par_iter()
            .map(|k| {
                // Tr(M† O_{k+1} L X_k) = Tr((O_{k+1}† M)† (L X_k))
                let lam = dagger(dynamics.onwd_evo(k + 1)).dot(&m);
                (0..n_ctrls)
                    .map(|j| match dynamics.prop_grad(k, j) {
                        Some(l) => {
                            let dx = l.dot(dynamics.fwd_evo(k));
                            (coeff * inner_product(&lam, &dx)).re
                        }
                        None => 0.0,
                    })
                    .collect()
            })
            .collect();

        let mut grad = Array2::zeros((n_ts, n_ctrls));
        for (k, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                grad[[k, j]] = v;
            }
        }

        stats.wall_time_grad += start.elapsed();
        stats.num_grad_computes += 1;
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::dynamics::{ControlProblem, DynamicsType};
    use crate::control::expm::{from_real, identity};
    use crate::test_utils::{pauli_x, pauli_z, qubit_x_problem};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn numerical_gradient(
        problem: &ControlProblem,
        fid: &FidelityComputer,
        amps: &Array2<f64>,
    ) -> Array2<f64> {
        let h = 1e-6;
        let mut stats = OptimStats::default();
        let mut dynamics = Dynamics::new(problem).unwrap();
        let mut grad = Array2::zeros(amps.dim());
        for ((k, j), _) in amps.indexed_iter() {
            let mut a = amps.clone();
            a[[k, j]] += h;
            dynamics.update(&a, false, &mut stats);
            let plus = fid.fid_err(&dynamics, &mut stats);
            a[[k, j]] -= 2.0 * h;
            dynamics.update(&a, false, &mut stats);
            let minus = fid.fid_err(&dynamics, &mut stats);
            grad[[k, j]] = (plus - minus) / (2.0 * h);
        }
        grad
    }

    fn check_gradient(problem: &ControlProblem, measure: FidelityMeasure, amps: &Array2<f64>) {
        let fid = FidelityComputer::new(measure, &problem.target, None);
        let mut stats = OptimStats::default();
        let mut dynamics = Dynamics::new(problem).unwrap();
        dynamics.update(amps, true, &mut stats);
        let analytic = fid.gradient(&dynamics, &mut stats);
        let numeric = numerical_gradient(problem, &fid, amps);
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert_relative_eq!(*a, *n, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_psu_ignores_global_phase() {
        let fid = FidelityComputer::new(FidelityMeasure::Psu, &pauli_x(), None);
        let phased = pauli_x() * Complex64::from_polar(1.0, 0.7);
        assert_relative_eq!(fid.fid_err_of(&phased), 0.0, epsilon = 1e-12);

        let su = FidelityComputer::new(FidelityMeasure::Su, &pauli_x(), None);
        assert!(su.fid_err_of(&phased) > 0.1);
    }

    #[test]
    fn test_orthogonal_gates_have_unit_error() {
        // Tr(Z† X) = 0
        let fid = FidelityComputer::new(FidelityMeasure::Psu, &pauli_z(), None);
        assert_relative_eq!(fid.fid_err_of(&pauli_x()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_trace_diff_default_scale() {
        // ‖I − (−I)‖² = 4·d, scale 1/(2d) → 2
        let fid = FidelityComputer::new(FidelityMeasure::TraceDiff, &identity(4), None);
        let minus_i = identity(4) * Complex64::new(-1.0, 0.0);
        assert_relative_eq!(fid.fid_err_of(&minus_i), 2.0, epsilon = 1e-12);
        assert_relative_eq!(fid.fid_err_of(&identity(4)), 0.0, epsilon = 1e-15);

        let scaled = FidelityComputer::new(FidelityMeasure::TraceDiff, &identity(4), Some(1.0));
        assert_relative_eq!(scaled.fid_err_of(&minus_i), 16.0, epsilon = 1e-12);
    }

    #[test]
    fn test_state_target_normalisation() {
        // |ψ⟩ = |1⟩ as a column; X|0⟩ = |1⟩
        let target = array![[Complex64::new(0.0, 0.0)], [Complex64::new(1.0, 0.0)]];
        let evolved = pauli_x().dot(&array![[Complex64::new(1.0, 0.0)], [Complex64::new(0.0, 0.0)]]);
        let fid = FidelityComputer::new(FidelityMeasure::Psu, &target, None);
        assert_relative_eq!(fid.fid_err_of(&evolved), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_psu_gradient_matches_finite_difference() {
        let problem = qubit_x_problem(4);
        let amps = array![[0.3, -0.2], [0.1, 0.5], [-0.4, 0.2], [0.25, 0.0]];
        check_gradient(&problem, FidelityMeasure::Psu, &amps);
    }

    #[test]
    fn test_su_gradient_matches_finite_difference() {
        let problem = qubit_x_problem(3);
        let amps = array![[0.3, -0.2], [0.1, 0.5], [-0.4, 0.2]];
        check_gradient(&problem, FidelityMeasure::Su, &amps);
    }

    #[test]
    fn test_trace_diff_gradient_symplectic() {
        let drift = from_real(&array![
            [1.0, 0.0, 0.5, 0.0],
            [0.0, 1.0, 0.0, 0.5],
            [0.5, 0.0, 1.0, 0.0],
            [0.0, 0.5, 0.0, 1.0]
        ]);
        let ctrl = from_real(&array![
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0]
        ]);
        let target = from_real(&array![
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0]
        ]);
        let problem = ControlProblem {
            name: "osc".into(),
            dyn_type: DynamicsType::Symplectic,
            drift,
            ctrls: vec![ctrl],
            initial: identity(4),
            target,
            n_ts: 4,
            evo_time: 2.0,
            tau: None,
        };
        let amps = array![[0.2], [-0.3], [0.6], [0.1]];
        check_gradient(&problem, FidelityMeasure::TraceDiff, &amps);
    }
}
