// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities.

use ndarray::Array2;
use num_complex::Complex64;

use crate::control::dynamics::{ControlProblem, DynamicsType};
use crate::control::expm::identity;

pub fn pauli_x() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = Complex64::new(1.0, 0.0);
    m[[1, 0]] = Complex64::new(1.0, 0.0);
    m
}

pub fn pauli_y() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 1]] = Complex64::new(0.0, -1.0);
    m[[1, 0]] = Complex64::new(0.0, 1.0);
    m
}

pub fn pauli_z() -> Array2<Complex64> {
    let mut m = Array2::zeros((2, 2));
    m[[0, 0]] = Complex64::new(1.0, 0.0);
    m[[1, 1]] = Complex64::new(-1.0, 0.0);
    m
}

/// Check element-wise closeness of two matrices.
pub fn assert_matrix_close(a: &Array2<Complex64>, b: &Array2<Complex64>, tol: f64) {
    assert_eq!(a.shape(), b.shape());
    for ((i, j), val) in a.indexed_iter() {
        let diff = (val - b[[i, j]]).norm();
        assert!(
            diff < tol,
            "Mismatch at ({}, {}): {:?} vs {:?} (diff={})",
            i,
            j,
            val,
            b[[i, j]],
            diff
        );
    }
}

/// Small qubit problem: drift σz, controls σx and σy, target X gate.
pub fn qubit_x_problem(n_ts: usize) -> ControlProblem {
    ControlProblem {
        name: "test_qubit".into(),
        dyn_type: DynamicsType::Unitary,
        drift: pauli_z() * Complex64::new(0.5, 0.0),
        ctrls: vec![pauli_x(), pauli_y()],
        initial: identity(2),
        target: pauli_x(),
        n_ts,
        evo_time: 3.0,
        tau: None,
    }
}
