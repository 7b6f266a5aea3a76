// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Input validation for control problems and amplitudes.

use ndarray::Array2;
use num_complex::Complex64;
use tracing::warn;

use crate::config::ResourceLimits;
use crate::control::dynamics::{ControlProblem, DynamicsType};
use crate::control::expm::{dagger, inner_product};
use crate::error::{Result, ValidationError};

/// Tolerance for Hermiticity / symmetry checks.
const PHYSICS_TOL: f64 = 1e-10;

fn shape_str(m: &Array2<Complex64>) -> String {
    let (r, c) = m.dim();
    format!("{}x{}", r, c)
}

fn check_finite(what: &str, m: &Array2<Complex64>) -> Result<()> {
    if let Some(((i, j), _)) = m
        .indexed_iter()
        .find(|(_, v)| !v.re.is_finite() || !v.im.is_finite())
    {
        return Err(ValidationError::Field {
            field: what.into(),
            message: format!("contains a non-finite entry at ({}, {})", i, j),
        }
        .into());
    }
    Ok(())
}

/// Validate problem shapes and time grid.
pub fn validate_problem(problem: &ControlProblem) -> Result<()> {
    let d = problem.drift.nrows();
    if d == 0 || problem.drift.ncols() != d {
        return Err(ValidationError::Shape {
            what: "drift".into(),
            expected: "non-empty square matrix".into(),
            actual: shape_str(&problem.drift),
        }
        .into());
    }

    if problem.ctrls.is_empty() {
        return Err(ValidationError::Field {
            field: "ctrls".into(),
            message: "at least one control generator is required".into(),
        }
        .into());
    }
    for (j, ctrl) in problem.ctrls.iter().enumerate() {
        if ctrl.dim() != (d, d) {
            return Err(ValidationError::Shape {
                what: format!("ctrls[{}]", j),
                expected: format!("{}x{}", d, d),
                actual: shape_str(ctrl),
            }
            .into());
        }
    }

    if problem.initial.nrows() != d || problem.initial.ncols() == 0 {
        return Err(ValidationError::Shape {
            what: "initial".into(),
            expected: format!("{}xm", d),
            actual: shape_str(&problem.initial),
        }
        .into());
    }
    if problem.target.dim() != problem.initial.dim() {
        return Err(ValidationError::Shape {
            what: "target".into(),
            expected: shape_str(&problem.initial),
            actual: shape_str(&problem.target),
        }
        .into());
    }

    if problem.dyn_type == DynamicsType::Symplectic && d % 2 != 0 {
        return Err(ValidationError::PhysicsConstraint(format!(
            "symplectic dynamics need an even dimension, got {}",
            d
        ))
        .into());
    }

    check_finite("drift", &problem.drift)?;
    for (j, ctrl) in problem.ctrls.iter().enumerate() {
        check_finite(&format!("ctrls[{}]", j), ctrl)?;
    }
    check_finite("initial", &problem.initial)?;
    check_finite("target", &problem.target)?;

    if inner_product(&problem.target, &problem.target).re <= 0.0 {
        return Err(ValidationError::Field {
            field: "target".into(),
            message: "must not be the zero matrix".into(),
        }
        .into());
    }

    if problem.n_ts == 0 {
        return Err(ValidationError::Field {
            field: "n_ts".into(),
            message: "must be greater than 0".into(),
        }
        .into());
    }

    match &problem.tau {
        Some(tau) => {
            if tau.len() != problem.n_ts {
                return Err(ValidationError::Field {
                    field: "tau".into(),
                    message: format!(
                        "length {} does not match n_ts {}",
                        tau.len(),
                        problem.n_ts
                    ),
                }
                .into());
            }
            if let Some(i) = tau.iter().position(|t| !(t.is_finite() && *t > 0.0)) {
                return Err(ValidationError::Field {
                    field: "tau".into(),
                    message: format!("duration at index {} must be finite and > 0", i),
                }
                .into());
            }
        }
        None => {
            if !(problem.evo_time.is_finite() && problem.evo_time > 0.0) {
                return Err(ValidationError::Field {
                    field: "evo_time".into(),
                    message: format!("must be finite and > 0, got {}", problem.evo_time),
                }
                .into());
            }
        }
    }

    Ok(())
}

/// Check that generators match the dynamics type.
///
/// Unitary dynamics need Hermitian generators and symplectic dynamics need
/// real symmetric ones. Violations are errors in strict mode and warnings
/// otherwise.
pub fn validate_physics(problem: &ControlProblem, strict: bool) -> Result<()> {
    let generators = std::iter::once(("drift".to_string(), &problem.drift)).chain(
        problem
            .ctrls
            .iter()
            .enumerate()
            .map(|(j, c)| (format!("ctrls[{}]", j), c)),
    );

    for (name, m) in generators {
        let violation = match problem.dyn_type {
            DynamicsType::Unitary => {
                let diff = m - &dagger(m);
                (diff.iter().map(|v| v.norm()).fold(0.0, f64::max) > PHYSICS_TOL)
                    .then(|| format!("{} is not Hermitian", name))
            }
            DynamicsType::Symplectic => {
                let not_real = m.iter().any(|v| v.im.abs() > PHYSICS_TOL);
                let diff = m - &m.t();
                let not_symmetric = diff.iter().map(|v| v.norm()).fold(0.0, f64::max) > PHYSICS_TOL;
                (not_real || not_symmetric).then(|| format!("{} is not real symmetric", name))
            }
            DynamicsType::GenMat => None,
        };

        if let Some(msg) = violation {
            if strict {
                return Err(ValidationError::PhysicsConstraint(msg).into());
            }
            warn!(generator = %name, dyn_type = ?problem.dyn_type, "{}", msg);
        }
    }
    Ok(())
}

/// Check problem size and iteration budget against resource limits.
pub fn validate_resource_limits(
    problem: &ControlProblem,
    max_iter: usize,
    limits: &ResourceLimits,
) -> Result<()> {
    for (resource, requested, limit) in [
        ("dim", problem.dim(), limits.max_dim),
        ("n_ts", problem.n_ts, limits.max_timeslots),
        ("n_ctrls", problem.n_ctrls(), limits.max_controls),
        ("max_iter", max_iter, limits.max_iterations),
    ] {
        if requested > limit {
            return Err(ValidationError::ResourceLimit {
                resource: resource.into(),
                limit: limit as u64,
                requested: requested as u64,
            }
            .into());
        }
    }
    Ok(())
}

/// Validate an amplitude array for a problem with `n_ts` slots and
/// `n_ctrls` controls.
pub fn validate_amplitudes(amps: &Array2<f64>, n_ts: usize, n_ctrls: usize) -> Result<()> {
    if amps.dim() != (n_ts, n_ctrls) {
        let (r, c) = amps.dim();
        return Err(ValidationError::Shape {
            what: "amplitudes".into(),
            expected: format!("{}x{}", n_ts, n_ctrls),
            actual: format!("{}x{}", r, c),
        }
        .into());
    }

    for ((k, j), val) in amps.indexed_iter() {
        if val.is_nan() {
            return Err(ValidationError::Field {
                field: "amplitudes".into(),
                message: format!("contains NaN at slot {}, control {}", k, j),
            }
            .into());
        }
        if val.is_infinite() {
            return Err(ValidationError::Field {
                field: "amplitudes".into(),
                message: format!("contains Inf at slot {}, control {}", k, j),
            }
            .into());
        }
    }

    Ok(())
}
