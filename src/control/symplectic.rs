// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Symplectic structure for linear bosonic (oscillator) systems.
//!
//! Quadratures are ordered (x₁, p₁, x₂, p₂, …). For a quadratic Hamiltonian
//! matrix H the phase-space propagator is S = exp(−H·Ω·t), which preserves
//! the symplectic form: Sᵀ Ω S = Ω.
//!
//! Ref: Weedbrook et al. (2012), Rev. Mod. Phys. 84, 621.

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::ValidationError;

/// Symplectic structure matrix Ω = ⊕ [[0, 1], [−1, 0]].
pub fn symplectic_omega(dim: usize) -> Result<Array2<Complex64>, ValidationError> {
    if dim == 0 || dim % 2 != 0 {
        return Err(ValidationError::PhysicsConstraint(format!(
            "symplectic dimension must be even and non-zero, got {dim}"
        )));
    }
    let mut omega = Array2::zeros((dim, dim));
    for j in (0..dim).step_by(2) {
        omega[[j, j + 1]] = Complex64::new(1.0, 0.0);
        omega[[j + 1, j]] = Complex64::new(-1.0, 0.0);
    }
    Ok(omega)
}

/// Check whether `s` preserves the symplectic form within `tol`.
///
/// Returns false for non-square or odd-dimensional matrices.
pub fn is_symplectic(s: &Array2<Complex64>, tol: f64) -> bool {
    if s.nrows() != s.ncols() {
        return false;
    }
    let Ok(omega) = symplectic_omega(s.nrows()) else {
        return false;
    };
    let lhs = s.t().dot(&omega).dot(s);
    lhs.iter()
        .zip(omega.iter())
        .all(|(a, b)| (a - b).norm() <= tol)
}
