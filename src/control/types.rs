// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Optimizer configuration and result types.

use std::fmt;
use std::time::Duration;

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::fidelity::FidelityMeasure;
use super::stats::OptimStats;

/// Optimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Limited-memory BFGS with box constraints on the amplitudes.
    #[default]
    Lbfgsb,
    /// Projected gradient descent with an adaptive learning rate.
    Grape,
}

/// Optimizer settings and termination conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Optimization algorithm
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Fidelity error at which the goal is considered achieved
    #[serde(default = "default_fid_err_targ")]
    pub fid_err_targ: f64,

    /// Maximum number of iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Maximum wall time in seconds
    #[serde(default = "default_max_wall_time")]
    pub max_wall_time_sec: f64,

    /// Stop when the gradient 2-norm drops below this value
    #[serde(default = "default_min_grad")]
    pub min_grad: f64,

    /// Maximum number of fidelity error evaluations
    #[serde(default = "default_max_fid_func_calls")]
    pub max_fid_func_calls: usize,

    /// Number of correction pairs kept by L-BFGS-B
    #[serde(default = "default_max_metric_corr")]
    pub max_metric_corr: usize,

    /// Relative reduction tolerance, in units of machine epsilon
    #[serde(default = "default_accuracy_factor")]
    pub accuracy_factor: f64,

    /// Initial learning rate (GRAPE only)
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Fidelity measure (defaults per dynamics type)
    #[serde(default)]
    pub fidelity: Option<FidelityMeasure>,

    /// Scale factor for the trace-difference measure (defaults to 1/(2d))
    #[serde(default)]
    pub fid_err_scale_factor: Option<f64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            fid_err_targ: default_fid_err_targ(),
            max_iter: default_max_iter(),
            max_wall_time_sec: default_max_wall_time(),
            min_grad: default_min_grad(),
            max_fid_func_calls: default_max_fid_func_calls(),
            max_metric_corr: default_max_metric_corr(),
            accuracy_factor: default_accuracy_factor(),
            learning_rate: default_learning_rate(),
            fidelity: None,
            fid_err_scale_factor: None,
        }
    }
}

fn default_fid_err_targ() -> f64 {
    1e-10
}

fn default_max_iter() -> usize {
    500
}

fn default_max_wall_time() -> f64 {
    180.0
}

fn default_min_grad() -> f64 {
    1e-10
}

fn default_max_fid_func_calls() -> usize {
    10_000
}

fn default_max_metric_corr() -> usize {
    10
}

fn default_accuracy_factor() -> f64 {
    1e7
}

fn default_learning_rate() -> f64 {
    1.0
}

impl OptimizerConfig {
    /// Wall time limit as a `Duration`.
    pub fn max_wall_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_wall_time_sec.max(0.0))
    }

    /// Relative function reduction below which L-BFGS-B stops.
    pub fn ftol(&self) -> f64 {
        self.accuracy_factor * f64::EPSILON
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fid_err_targ >= 0.0) {
            return Err("fid_err_targ must be >= 0".into());
        }
        if self.max_iter == 0 {
            return Err("max_iter must be > 0".into());
        }
        if !(self.max_wall_time_sec > 0.0) {
            return Err("max_wall_time_sec must be > 0".into());
        }
        if self.min_grad < 0.0 {
            return Err("min_grad must be >= 0".into());
        }
        if self.max_fid_func_calls == 0 {
            return Err("max_fid_func_calls must be > 0".into());
        }
        if self.max_metric_corr == 0 {
            return Err("max_metric_corr must be > 0".into());
        }
        if self.accuracy_factor < 0.0 {
            return Err("accuracy_factor must be >= 0".into());
        }
        if self.learning_rate <= 0.0 {
            return Err("learning_rate must be > 0".into());
        }
        if let Some(s) = self.fid_err_scale_factor {
            if s <= 0.0 {
                return Err("fid_err_scale_factor must be > 0".into());
            }
        }
        Ok(())
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    GoalAchieved,
    GradMinReached,
    MaxIterReached,
    MaxFidFuncCallsReached,
    MaxWallTimeExceeded,
    FunctionConverged,
    LineSearchFailed,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TerminationReason::GoalAchieved => "Goal achieved",
            TerminationReason::GradMinReached => "Gradient normal minimum reached",
            TerminationReason::MaxIterReached => "Iteration limit reached",
            TerminationReason::MaxFidFuncCallsReached => "Fidelity function call limit reached",
            TerminationReason::MaxWallTimeExceeded => "Max wall time exceeded",
            TerminationReason::FunctionConverged => {
                "Relative reduction of fidelity error below tolerance"
            }
            TerminationReason::LineSearchFailed => "Line search could not reduce fidelity error",
        };
        f.write_str(msg)
    }
}

/// Result of a pulse optimization run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimResult {
    /// Fidelity error of the initial amplitudes.
    pub initial_fid_err: f64,
    /// Fidelity error of the final amplitudes.
    pub fid_err: f64,
    /// Whether `fid_err <= fid_err_targ`.
    pub goal_achieved: bool,
    pub termination_reason: TerminationReason,
    /// Number of optimizer iterations.
    pub num_iter: usize,
    /// Number of fidelity error function calls.
    pub num_fid_func_calls: usize,
    pub wall_time: Duration,
    /// Initial control amplitudes (n_ts × n_ctrls).
    pub initial_amps: Array2<f64>,
    /// Optimized control amplitudes (n_ts × n_ctrls).
    pub final_amps: Array2<f64>,
    /// Evolution produced by the final amplitudes.
    pub evo_full_final: Array2<Complex64>,
    /// 2-norm of the gradient at the final amplitudes.
    pub grad_norm_final: f64,
    /// Slot start times, for writing amplitude files.
    pub time: Vec<f64>,
    pub stats: OptimStats,
}
