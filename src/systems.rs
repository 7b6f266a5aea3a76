// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in example control problems.

use ndarray::{array, Array2};
use num_complex::Complex64;

use crate::control::dynamics::{ControlProblem, DynamicsType};
use crate::control::expm::{from_real, identity, matrix_exp};
use crate::control::symplectic::symplectic_omega;
use crate::error::{Error, Result};

/// Names and descriptions of the built-in systems.
pub const SYSTEMS: &[(&str, &str)] = &[
    (
        "two-oscillator",
        "Two coupled oscillators, symplectic dynamics, swap target",
    ),
    ("hadamard", "Single qubit, unitary dynamics, Hadamard gate target"),
];

/// Look up a built-in system by name.
pub fn builtin(name: &str) -> Result<ControlProblem> {
    match name {
        "two-oscillator" | "symplectic" => two_oscillator(),
        "hadamard" => Ok(qubit_hadamard()),
        other => Err(Error::Config(format!(
            "unknown system '{}', expected one of: {}",
            other,
            SYSTEMS
                .iter()
                .map(|(n, _)| *n)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Two coupled oscillators with a control on the first one.
///
/// Quadratic Hamiltonian in (x1, p1, x2, p2) ordering with ω1 = ω2 = 1 and
/// coupling g = 0.5. The target is the symplectic map generated by the
/// oscillator swap A_g over unit time, exp(−A_g Ω).
pub fn two_oscillator() -> Result<ControlProblem> {
    let (w1, w2, g) = (1.0, 1.0, 0.5);
    let drift = from_real(&array![
        [w1, 0.0, g, 0.0],
        [0.0, w1, 0.0, g],
        [g, 0.0, w2, 0.0],
        [0.0, g, 0.0, w2]
    ]);
    let ctrl = from_real(&array![
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0]
    ]);

    let a = 1.0;
    let swap = from_real(&array![
        [0.0, 0.0, a, 0.0],
        [0.0, 0.0, 0.0, a],
        [a, 0.0, 0.0, 0.0],
        [0.0, a, 0.0, 0.0]
    ]);
    let omega = symplectic_omega(4)?;
    let target = matrix_exp(&(swap.dot(&omega) * Complex64::new(-1.0, 0.0)));

    Ok(ControlProblem {
        name: "Symplectic".into(),
        dyn_type: DynamicsType::Symplectic,
        drift,
        ctrls: vec![ctrl],
        initial: identity(4),
        target,
        n_ts: 1000,
        evo_time: 10.0,
        tau: None,
    })
}

/// Single-qubit Hadamard gate with σx and σy controls.
pub fn qubit_hadamard() -> ControlProblem {
    let c = |re: f64, im: f64| Complex64::new(re, im);
    let sigma_x: Array2<Complex64> = array![[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]];
    let sigma_y: Array2<Complex64> =
        array![[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]];
    let sigma_z: Array2<Complex64> =
        array![[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]];
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let hadamard = array![[c(h, 0.0), c(h, 0.0)], [c(h, 0.0), c(-h, 0.0)]];

    ControlProblem {
        name: "Hadamard".into(),
        dyn_type: DynamicsType::Unitary,
        drift: sigma_z,
        ctrls: vec![sigma_x, sigma_y],
        initial: identity(2),
        target: hadamard,
        n_ts: 10,
        evo_time: 10.0,
        tau: None,
    }
}
