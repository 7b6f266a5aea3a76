// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Problem description files (YAML or JSON).
//!
//! Matrices are nested lists of rows. Each entry is either a real number or
//! a `[re, im]` pair:
//!
//! ```yaml
//! name: x_gate
//! dyn_type: unitary
//! drift: [[1, 0], [0, -1]]
//! ctrls:
//!   - [[0, 1], [1, 0]]
//!   - [[0, [0, -1]], [[0, 1], 0]]
//! target: [[0, 1], [1, 0]]
//! n_ts: 20
//! evo_time: 3.0
//! ```
//!
//! `initial` defaults to the identity when omitted.

use std::path::Path;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::control::dynamics::{ControlProblem, DynamicsType};
use crate::control::expm::identity;
use crate::error::{Result, ValidationError};

/// A single matrix entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Real(f64),
    Complex([f64; 2]),
}

impl From<Entry> for Complex64 {
    fn from(e: Entry) -> Self {
        match e {
            Entry::Real(re) => Complex64::new(re, 0.0),
            Entry::Complex([re, im]) => Complex64::new(re, im),
        }
    }
}

/// Matrix as a list of rows.
pub type MatrixRows = Vec<Vec<Entry>>;

/// Serialized control problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFile {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub dyn_type: DynamicsType,
    pub drift: MatrixRows,
    pub ctrls: Vec<MatrixRows>,
    #[serde(default)]
    pub initial: Option<MatrixRows>,
    pub target: MatrixRows,
    pub n_ts: usize,
    #[serde(default)]
    pub evo_time: f64,
    #[serde(default)]
    pub tau: Option<Vec<f64>>,
}

fn default_name() -> String {
    "problem".into()
}

fn to_matrix(what: &str, rows: &MatrixRows) -> Result<Array2<Complex64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, |r| r.len());
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(ValidationError::Shape {
            what: format!("{} row {}", what, i),
            expected: format!("{} columns", n_cols),
            actual: format!("{} columns", row.len()),
        }
        .into());
    }
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| {
        rows[i][j].into()
    }))
}

fn to_rows(m: &Array2<Complex64>) -> MatrixRows {
    m.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|v| {
                    if v.im == 0.0 {
                        Entry::Real(v.re)
                    } else {
                        Entry::Complex([v.re, v.im])
                    }
                })
                .collect()
        })
        .collect()
}

impl ProblemFile {
    /// Read a problem file; `.json` files are parsed as JSON, anything else
    /// as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    /// Convert into a [`ControlProblem`].
    ///
    /// Only checks that every matrix is rectangular; dimensional consistency
    /// is left to problem validation.
    pub fn into_problem(self) -> Result<ControlProblem> {
        let drift = to_matrix("drift", &self.drift)?;
        let ctrls = self
            .ctrls
            .iter()
            .enumerate()
            .map(|(j, c)| to_matrix(&format!("ctrls[{}]", j), c))
            .collect::<Result<Vec<_>>>()?;
        let initial = match &self.initial {
            Some(rows) => to_matrix("initial", rows)?,
            None => identity(drift.nrows()),
        };
        let target = to_matrix("target", &self.target)?;

        Ok(ControlProblem {
            name: self.name,
            dyn_type: self.dyn_type,
            drift,
            ctrls,
            initial,
            target,
            n_ts: self.n_ts,
            evo_time: self.evo_time,
            tau: self.tau,
        })
    }
}

impl From<&ControlProblem> for ProblemFile {
    fn from(problem: &ControlProblem) -> Self {
        Self {
            name: problem.name.clone(),
            dyn_type: problem.dyn_type,
            drift: to_rows(&problem.drift),
            ctrls: problem.ctrls.iter().map(to_rows).collect(),
            initial: Some(to_rows(&problem.initial)),
            target: to_rows(&problem.target),
            n_ts: problem.n_ts,
            evo_time: problem.evo_time,
            tau: problem.tau.clone(),
        }
    }
}
