// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Matrix exponential and its Fréchet derivative.
//!
//! The exponential uses scaling-and-squaring with a Padé(13) approximant:
//!   Higham (2005), "The Scaling and Squaring Method for the Matrix
//!   Exponential Revisited", SIAM J. Matrix Anal. Appl. 26(4), 1179.
//!
//! The Fréchet derivative L(A, E) is read off the upper-right block of
//! exp([[A, E], [0, A]]):
//!   Najfeld & Havel (1995), Adv. Appl. Math. 16, 321.
//!
//! Propagators in this crate are small (d ≤ 16 in practice), so all routines
//! work on dense `ndarray` matrices without BLAS.

use ndarray::{s, Array2};
use num_complex::Complex64;

/// Complex identity matrix of size `d`.
pub fn identity(d: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(d, Complex64::new(1.0, 0.0))
}

/// Conjugate transpose.
pub fn dagger(a: &Array2<Complex64>) -> Array2<Complex64> {
    a.t().mapv(|z| z.conj())
}

/// Trace of a square matrix.
pub fn trace(a: &Array2<Complex64>) -> Complex64 {
    a.diag().iter().sum()
}

/// Tr(A† B) without forming the product.
pub fn inner_product(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

/// Frobenius norm ‖A‖_F.
pub fn frobenius_norm(a: &Array2<Complex64>) -> f64 {
    a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// Lift a real matrix into the complex field.
pub fn from_real(a: &Array2<f64>) -> Array2<Complex64> {
    a.mapv(|x| Complex64::new(x, 0.0))
}

/// Compute exp(A) using scaling-and-squaring with Padé(13).
///
/// If the Padé denominator is numerically singular the result is filled with
/// NaN so that callers checking for finite fidelity report the failure.
///
/// # Panics
/// Panics if `a` is not square.
pub fn matrix_exp(a: &Array2<Complex64>) -> Array2<Complex64> {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "matrix_exp requires a square matrix");

    if n == 0 {
        return Array2::zeros((0, 0));
    }
    if n == 1 {
        let mut result = Array2::zeros((1, 1));
        result[[0, 0]] = a[[0, 0]].exp();
        return result;
    }

    // theta_13 from Higham Table 10.2
    let theta_13: f64 = 5.37;
    let norm = matrix_1_norm(a);
    let s = if norm > theta_13 {
        (norm / theta_13).log2().ceil() as u32
    } else {
        0
    };

    let a_scaled = a * c(1.0 / 2f64.powi(s as i32));
    let result = pade13(&a_scaled);
    square_repeatedly(result, s)
}

/// Compute exp(A) together with the Fréchet derivative L(A, E).
///
/// L(A, E) is the first-order change of exp(A) in direction E:
///   exp(A + tE) = exp(A) + t·L(A, E) + O(t²)
pub fn matrix_exp_frechet(
    a: &Array2<Complex64>,
    e: &Array2<Complex64>,
) -> (Array2<Complex64>, Array2<Complex64>) {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "matrix_exp_frechet requires a square matrix");
    assert_eq!(e.dim(), a.dim(), "direction must match the matrix shape");

    let mut aug = Array2::zeros((2 * n, 2 * n));
    aug.slice_mut(s![..n, ..n]).assign(a);
    aug.slice_mut(s![..n, n..]).assign(e);
    aug.slice_mut(s![n.., n..]).assign(a);

    let exp_aug = matrix_exp(&aug);
    (
        exp_aug.slice(s![..n, ..n]).to_owned(),
        exp_aug.slice(s![..n, n..]).to_owned(),
    )
}

/// Padé(13,13) coefficients b_k / b_0 from Higham (2005), eq. (10.33).
const PADE_COEFFS: [f64; 14] = [
    1.0,
    0.5,
    0.12,
    1.833_333_333_333_333_3e-2,
    1.992_753_623_188_405_7e-3,
    1.630_434_782_608_695_8e-4,
    1.035_196_687_370_600_3e-5,
    5.175_983_436_853_002e-7,
    2.043_151_356_652_500_8e-8,
    6.306_022_705_717_595e-10,
    1.483_770_048_404_14e-11,
    2.529_153_491_597_966e-13,
    2.810_170_546_219_962_3e-15,
    1.544_049_750_670_308_8e-17,
];

fn pade13(a: &Array2<Complex64>) -> Array2<Complex64> {
    let eye = identity(a.nrows());
    let b = |k: usize| c(PADE_COEFFS[k]);

    let a2 = a.dot(a);
    let a4 = a2.dot(&a2);
    let a6 = a2.dot(&a4);

    // Odd part U = A·(A6·(b13 A6 + b11 A4 + b9 A2) + b7 A6 + b5 A4 + b3 A2 + b1 I)
    let u_inner = &a6 * b(13) + &a4 * b(11) + &a2 * b(9);
    let u = a.dot(
        &(u_inner.dot(&a6) + &a6 * b(7) + &a4 * b(5) + &a2 * b(3) + &eye * b(1)),
    );

    // Even part V = A6·(b12 A6 + b10 A4 + b8 A2) + b6 A6 + b4 A4 + b2 A2 + b0 I
    let v_inner = &a6 * b(12) + &a4 * b(10) + &a2 * b(8);
    let v = v_inner.dot(&a6) + &a6 * b(6) + &a4 * b(4) + &a2 * b(2) + &eye * b(0);

    // exp(A) ≈ (V − U)⁻¹ (V + U)
    solve_linear(&v - &u, &v + &u)
}

#[inline]
fn c(x: f64) -> Complex64 {
    Complex64::new(x, 0.0)
}

/// Solve A·X = B by Gaussian elimination with partial pivoting.
fn solve_linear(a: Array2<Complex64>, b: Array2<Complex64>) -> Array2<Complex64> {
    let n = a.nrows();
    let m = b.ncols();

    let mut aug = Array2::zeros((n, n + m));
    aug.slice_mut(s![.., ..n]).assign(&a);
    aug.slice_mut(s![.., n..]).assign(&b);

    for col in 0..n {
        let (pivot_row, pivot_norm) = (col..n)
            .map(|row| (row, aug[[row, col]].norm()))
            .fold((col, 0.0), |best, cand| if cand.1 > best.1 { cand } else { best });

        if pivot_norm < 1e-15 {
            return Array2::from_elem((n, m), Complex64::new(f64::NAN, f64::NAN));
        }

        if pivot_row != col {
            for j in 0..(n + m) {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for row in (col + 1)..n {
            let factor = aug[[row, col]] / pivot;
            if factor == Complex64::new(0.0, 0.0) {
                continue;
            }
            for j in col..(n + m) {
                let val = aug[[col, j]];
                aug[[row, j]] -= factor * val;
            }
        }
    }

    let mut x = Array2::<Complex64>::zeros((n, m));
    for row in (0..n).rev() {
        let pivot = aug[[row, row]];
        for j in 0..m {
            let mut sum = aug[[row, n + j]];
            for k in (row + 1)..n {
                sum -= aug[[row, k]] * x[[k, j]];
            }
            x[[row, j]] = sum / pivot;
        }
    }
    x
}

/// M^(2^s) by repeated squaring.
fn square_repeatedly(mut m: Array2<Complex64>, s: u32) -> Array2<Complex64> {
    for _ in 0..s {
        m = m.dot(&m);
    }
    m
}

/// Max column sum of absolute values.
fn matrix_1_norm(a: &Array2<Complex64>) -> f64 {
    a.columns()
        .into_iter()
        .map(|col| col.iter().map(|z| z.norm()).sum::<f64>())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_matrix_close, pauli_x, pauli_z};
    use std::f64::consts::PI;

    #[test]
    fn test_expm_zero_is_identity() {
        let zero = Array2::<Complex64>::zeros((4, 4));
        assert_matrix_close(&matrix_exp(&zero), &identity(4), 1e-14);
    }

    #[test]
    fn test_expm_diagonal() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = c(1.0);
        a[[1, 1]] = c(2.0);
        let result = matrix_exp(&a);

        assert!((result[[0, 0]] - c(1.0_f64.exp())).norm() < 1e-12);
        assert!((result[[1, 1]] - c(2.0_f64.exp())).norm() < 1e-12);
        assert!(result[[0, 1]].norm() < 1e-14);
    }

    #[test]
    fn test_expm_pauli_x_rotation() {
        // exp(-iθ/2 σx) = cos(θ/2) I − i sin(θ/2) σx
        let theta = PI / 2.0;
        let a = pauli_x() * Complex64::new(0.0, -theta / 2.0);
        let result = matrix_exp(&a);

        let (cs, sn) = ((theta / 2.0).cos(), (theta / 2.0).sin());
        assert!((result[[0, 0]] - c(cs)).norm() < 1e-12);
        assert!((result[[0, 1]] - Complex64::new(0.0, -sn)).norm() < 1e-12);
        assert!((result[[1, 0]] - Complex64::new(0.0, -sn)).norm() < 1e-12);
    }

    #[test]
    fn test_expm_large_norm_needs_scaling() {
        let mut a = Array2::zeros((2, 2));
        a[[0, 0]] = c(40.0);
        a[[1, 1]] = c(-40.0);
        let result = matrix_exp(&a);
        let e40 = 40.0_f64.exp();
        assert!((result[[0, 0]].re - e40).abs() / e40 < 1e-10);
    }

    #[test]
    fn test_expm_unscaled_is_exact_to_rounding() {
        // ‖A‖₁ below theta_13, so Padé alone must reach double precision
        for x in [1.0_f64, 2.5, 5.0] {
            let mut a = Array2::zeros((2, 2));
            a[[0, 0]] = c(x);
            a[[1, 1]] = c(-x);
            let result = matrix_exp(&a);
            assert!((result[[0, 0]].re - x.exp()).abs() / x.exp() < 1e-13, "x = {x}");
            assert!((result[[1, 1]].re - (-x).exp()).abs() / (-x).exp() < 1e-13, "x = {x}");
        }
    }

    #[test]
    fn test_expm_pade_coefficients_match_integer_ratios() {
        const B: [f64; 14] = [
            64764752532480000.0,
            32382376266240000.0,
            7771770303897600.0,
            1187353796428800.0,
            129060195264000.0,
            10559470521600.0,
            670442572800.0,
            33522128640.0,
            1323241920.0,
            40840800.0,
            960960.0,
            16380.0,
            182.0,
            1.0,
        ];
        for (k, coeff) in PADE_COEFFS.iter().enumerate() {
            let exact = B[k] / B[0];
            assert!((coeff - exact).abs() <= 1e-15 * exact, "b{k}");
        }
    }

    #[test]
    fn test_expm_real_rotation_generator() {
        // exp(t·[[0, 1], [-1, 0]]) is a real rotation by angle t
        let mut a = Array2::zeros((2, 2));
        a[[0, 1]] = c(0.7);
        a[[1, 0]] = c(-0.7);
        let result = matrix_exp(&a);
        assert!((result[[0, 0]] - c(0.7_f64.cos())).norm() < 1e-12);
        assert!((result[[0, 1]] - c(0.7_f64.sin())).norm() < 1e-12);
        assert!(result.iter().all(|z| z.im.abs() < 1e-14));
    }

    #[test]
    fn test_frechet_commuting_direction() {
        // For E = A the derivative is A·exp(A)
        let a = pauli_z() * Complex64::new(0.0, -0.3);
        let (exp_a, l) = matrix_exp_frechet(&a, &a);
        assert_matrix_close(&exp_a, &matrix_exp(&a), 1e-13);
        assert_matrix_close(&l, &a.dot(&exp_a), 1e-12);
    }

    #[test]
    fn test_frechet_matches_finite_difference() {
        let a = pauli_z() * Complex64::new(0.0, -0.8) + pauli_x() * Complex64::new(0.0, -0.2);
        let e = pauli_x() * Complex64::new(0.0, -0.5);
        let (_, l) = matrix_exp_frechet(&a, &e);

        let h = 1e-6;
        let plus = matrix_exp(&(&a + &(&e * c(h))));
        let minus = matrix_exp(&(&a - &(&e * c(h))));
        let fd = (plus - minus) * c(1.0 / (2.0 * h));
        assert_matrix_close(&l, &fd, 1e-8);
    }

    #[test]
    fn test_helpers() {
        let x = pauli_x();
        assert_eq!(trace(&x), c(0.0));
        assert_eq!(trace(&identity(3)), c(3.0));
        assert!((frobenius_norm(&identity(4)) - 2.0).abs() < 1e-15);
        assert_eq!(inner_product(&x, &x), c(2.0));
        assert_matrix_close(&dagger(&(&x * Complex64::new(0.0, 1.0))), &(&x * Complex64::new(0.0, -1.0)), 1e-15);
    }
}
