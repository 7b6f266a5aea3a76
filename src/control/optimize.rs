// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse optimizer: ties dynamics, fidelity and the minimisers together.
//!
//! Ref: Khaneja et al. (2005), J. Magn. Reson. 172, 296.
//! Ref: Machnes et al. (2011), Phys. Rev. A 84, 022305.

use std::time::Instant;

use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use super::dynamics::{ControlProblem, Dynamics};
use super::fidelity::FidelityComputer;
use super::lbfgsb::{self, Bounds, Checkpoint, LbfgsbSettings, Minimum, Objective};
use super::pulsegen::{initial_amps, PulseConfig};
use super::stats::OptimStats;
use super::types::{Algorithm, OptimResult, OptimizerConfig, TerminationReason};
use crate::config::Config;
use crate::error::{Error, OptimizationError, Result};
use crate::validation::{
    validate_amplitudes, validate_physics, validate_problem, validate_resource_limits,
};

/// Optimize control pulses for `problem` using settings from `config`.
///
/// Checks the problem against the configured resource limits and physics
/// constraints, generates the initial pulse and runs the configured algorithm.
pub fn optimize_pulse(problem: &ControlProblem, config: &Config) -> Result<OptimResult> {
    checked_optimizer(problem, config)?.optimize(problem)
}

/// Like [`optimize_pulse`], but starting from explicit amplitudes, e.g. read
/// back from an amplitude file.
pub fn optimize_pulse_from(
    problem: &ControlProblem,
    config: &Config,
    initial: Array2<f64>,
) -> Result<OptimResult> {
    checked_optimizer(problem, config)?.optimize_from(problem, initial)
}

fn checked_optimizer(problem: &ControlProblem, config: &Config) -> Result<PulseOptimizer> {
    validate_problem(problem)?;
    validate_resource_limits(problem, config.optimizer.max_iter, &config.validation.limits)?;
    validate_physics(problem, config.validation.strict)?;
    PulseOptimizer::new(config.optimizer.clone(), config.pulse.clone())
}

/// Pulse optimizer.
pub struct PulseOptimizer {
    config: OptimizerConfig,
    pulse: PulseConfig,
}

impl PulseOptimizer {
    /// Create a new optimizer with the given configuration.
    pub fn new(config: OptimizerConfig, pulse: PulseConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        pulse.validate().map_err(Error::Config)?;
        Ok(Self { config, pulse })
    }

    /// Optimize starting from the configured initial pulse shape.
    pub fn optimize(&self, problem: &ControlProblem) -> Result<OptimResult> {
        validate_problem(problem)?;
        let amps = initial_amps(
            &self.pulse,
            &problem.slot_start_times(),
            problem.total_time(),
            problem.n_ctrls(),
        );
        self.optimize_from(problem, amps)
    }

    /// Optimize starting from explicit initial amplitudes (n_ts × n_ctrls).
    ///
    /// Amplitudes outside the bounds are clipped before the first evaluation.
    pub fn optimize_from(
        &self,
        problem: &ControlProblem,
        initial: Array2<f64>,
    ) -> Result<OptimResult> {
        validate_problem(problem)?;
        validate_amplitudes(&initial, problem.n_ts, problem.n_ctrls())?;

        let start = Instant::now();
        let (n_ts, n_ctrls) = (problem.n_ts, problem.n_ctrls());
        let measure = self
            .config
            .fidelity
            .unwrap_or_else(|| problem.dyn_type.default_fidelity());
        let fidelity =
            FidelityComputer::new(measure, &problem.target, self.config.fid_err_scale_factor);
        let mut objective = PulseObjective::new(Dynamics::new(problem)?, fidelity, n_ctrls);

        let bounds = Bounds::uniform(n_ts * n_ctrls, self.pulse.lower(), self.pulse.upper());
        let x0 = bounds.project(&Array1::from_iter(initial.iter().copied()));
        let initial_amps = objective.to_amps(&x0);

        info!(
            problem = %problem.name,
            dyn_type = ?problem.dyn_type,
            dim = problem.dim(),
            n_ts,
            n_ctrls,
            algorithm = ?self.config.algorithm,
            fidelity = ?measure,
            fid_err_targ = self.config.fid_err_targ,
            "Starting pulse optimization"
        );

        let initial_fid_err = objective.value(&x0)?;
        let check = self.termination_check(start, objective.stats.num_fidelity_func_calls);

        let minimum = match self.config.algorithm {
            Algorithm::Lbfgsb => {
                let settings = LbfgsbSettings {
                    memory: self.config.max_metric_corr,
                    ftol: self.config.ftol(),
                    ..Default::default()
                };
                lbfgsb::minimize(&mut objective, &x0, &bounds, &settings, check)?
            }
            Algorithm::Grape => grape_descent(
                &mut objective,
                &x0,
                &bounds,
                self.config.learning_rate,
                check,
            )?,
        };

        let grad = objective.gradient(&minimum.x)?;
        let grad_norm_final = grad.dot(&grad).sqrt();
        let final_amps = objective.to_amps(&minimum.x);
        let evo_full_final = objective.dynamics.full_evo().clone();

        let mut stats = objective.stats;
        stats.num_iter = minimum.iterations;
        stats.wall_time_total = start.elapsed();

        let goal_achieved = minimum.f <= self.config.fid_err_targ;
        if !goal_achieved {
            warn!(
                fid_err = minimum.f,
                reason = %minimum.reason,
                "Fidelity error target not reached"
            );
        }
        info!(
            initial_fid_err,
            fid_err = minimum.f,
            reason = %minimum.reason,
            iterations = minimum.iterations,
            wall_time_sec = stats.wall_time_total.as_secs_f64(),
            "Pulse optimization finished"
        );

        Ok(OptimResult {
            initial_fid_err,
            fid_err: minimum.f,
            goal_achieved,
            termination_reason: minimum.reason,
            num_iter: minimum.iterations,
            num_fid_func_calls: stats.num_fidelity_func_calls,
            wall_time: stats.wall_time_total,
            initial_amps,
            final_amps,
            evo_full_final,
            grad_norm_final,
            time: problem.slot_start_times(),
            stats,
        })
    }

    /// Build the termination check shared by both algorithms.
    ///
    /// `fid_calls` is the number of fidelity evaluations already made.
    fn termination_check(
        &self,
        start: Instant,
        mut fid_calls: usize,
    ) -> impl FnMut(Checkpoint) -> Option<TerminationReason> {
        let config = self.config.clone();
        let max_wall_time = config.max_wall_time();

        move |cp| match cp {
            Checkpoint::Evaluation { f } => {
                fid_calls += 1;
                if f <= config.fid_err_targ {
                    Some(TerminationReason::GoalAchieved)
                } else if start.elapsed() >= max_wall_time {
                    Some(TerminationReason::MaxWallTimeExceeded)
                } else if fid_calls >= config.max_fid_func_calls {
                    Some(TerminationReason::MaxFidFuncCallsReached)
                } else {
                    None
                }
            }
            Checkpoint::Iteration { iter, f, grad_norm } => {
                debug!(iter, fid_err = f, grad_norm, "Optimizer iteration");
                if f <= config.fid_err_targ {
                    Some(TerminationReason::GoalAchieved)
                } else if grad_norm < config.min_grad {
                    Some(TerminationReason::GradMinReached)
                } else if iter >= config.max_iter {
                    Some(TerminationReason::MaxIterReached)
                } else if start.elapsed() >= max_wall_time {
                    Some(TerminationReason::MaxWallTimeExceeded)
                } else {
                    None
                }
            }
        }
    }
}

/// Fidelity error as a function of the flattened amplitudes.
///
/// Amplitudes are flattened row-major: x[k·n_ctrls + j] = u[k, j]. The last
/// evaluated point is cached so that a gradient request at the same point
/// reuses the propagators.
struct PulseObjective<'a> {
    dynamics: Dynamics<'a>,
    fidelity: FidelityComputer,
    n_ctrls: usize,
    stats: OptimStats,
    last_x: Option<Array1<f64>>,
    last_err: f64,
    last_grad: Option<Array1<f64>>,
}

impl<'a> PulseObjective<'a> {
    fn new(dynamics: Dynamics<'a>, fidelity: FidelityComputer, n_ctrls: usize) -> Self {
        Self {
            dynamics,
            fidelity,
            n_ctrls,
            stats: OptimStats::default(),
            last_x: None,
            last_err: f64::NAN,
            last_grad: None,
        }
    }

    fn to_amps(&self, x: &Array1<f64>) -> Array2<f64> {
        let n_ts = x.len() / self.n_ctrls;
        Array2::from_shape_fn((n_ts, self.n_ctrls), |(k, j)| x[k * self.n_ctrls + j])
    }

    fn evaluate(&mut self, x: &Array1<f64>, with_grads: bool) -> Result<()> {
        let amps = self.to_amps(x);
        self.dynamics.update(&amps, with_grads, &mut self.stats);
        let err = self.fidelity.fid_err(&self.dynamics, &mut self.stats);
        if !err.is_finite() {
            return Err(OptimizationError::NumericalInstability(format!(
                "fidelity error is {err}"
            ))
            .into());
        }
        self.last_x = Some(x.clone());
        self.last_err = err;
        self.last_grad = None;
        Ok(())
    }
}

impl Objective for PulseObjective<'_> {
    fn value(&mut self, x: &Array1<f64>) -> Result<f64> {
        self.stats.num_fidelity_func_calls += 1;
        if self.last_x.as_ref() != Some(x) {
            self.evaluate(x, false)?;
        }
        Ok(self.last_err)
    }

    fn gradient(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
        self.stats.num_grad_func_calls += 1;
        if self.last_x.as_ref() == Some(x) {
            if let Some(grad) = &self.last_grad {
                return Ok(grad.clone());
            }
            let amps = self.to_amps(x);
            self.dynamics.update(&amps, true, &mut self.stats);
        } else {
            self.evaluate(x, true)?;
        }

        let grad = self.fidelity.gradient(&self.dynamics, &mut self.stats);
        let flat = Array1::from_iter(grad.iter().copied());
        if flat.iter().any(|g| !g.is_finite()) {
            return Err(OptimizationError::NumericalInstability(
                "gradient contains non-finite values".into(),
            )
            .into());
        }
        self.last_grad = Some(flat.clone());
        Ok(flat)
    }
}

/// Projected gradient descent with an adaptive learning rate.
///
/// The rate grows by 1.5× after every five consecutive accepted steps and
/// halves on every rejected step.
fn grape_descent<O, C>(
    objective: &mut O,
    x0: &Array1<f64>,
    bounds: &Bounds,
    learning_rate: f64,
    mut check: C,
) -> Result<Minimum>
where
    O: Objective,
    C: FnMut(Checkpoint) -> Option<TerminationReason>,
{
    let mut x = bounds.project(x0);
    let mut f = objective.value(&x)?;
    if let Some(reason) = check(Checkpoint::Evaluation { f }) {
        return Ok(Minimum {
            x,
            f,
            iterations: 0,
            reason,
        });
    }
    let mut g = objective.gradient(&x)?;
    let mut lr = learning_rate;
    let mut streak = 0;
    let mut iter = 0;

    loop {
        let grad_norm = g.dot(&g).sqrt();
        if let Some(reason) = check(Checkpoint::Iteration { iter, f, grad_norm }) {
            return Ok(Minimum {
                x,
                f,
                iterations: iter,
                reason,
            });
        }

        let trial = bounds.project(&(&x - &(&g * lr)));
        if trial == x {
            return Ok(Minimum {
                x,
                f,
                iterations: iter,
                reason: TerminationReason::GradMinReached,
            });
        }

        let f_trial = objective.value(&trial)?;
        if let Some(reason) = check(Checkpoint::Evaluation { f: f_trial }) {
            let (x, f) = if f_trial < f { (trial, f_trial) } else { (x, f) };
            return Ok(Minimum {
                x,
                f,
                iterations: iter + 1,
                reason,
            });
        }

        if f_trial < f {
            x = trial;
            f = f_trial;
            g = objective.gradient(&x)?;
            streak += 1;
            if streak % 5 == 0 {
                lr *= 1.5;
            }
        } else {
            streak = 0;
            lr *= 0.5;
            if lr < learning_rate * 1e-12 {
                return Ok(Minimum {
                    x,
                    f,
                    iterations: iter,
                    reason: TerminationReason::LineSearchFailed,
                });
            }
        }
        iter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::dynamics::DynamicsType;
    use crate::control::expm::identity;
    use crate::control::pulsegen::PulseType;
    use crate::test_utils::{pauli_x, qubit_x_problem};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn quick_config() -> OptimizerConfig {
        OptimizerConfig {
            fid_err_targ: 1e-6,
            max_iter: 200,
            max_wall_time_sec: 60.0,
            ..Default::default()
        }
    }

    fn rnd_pulse(seed: u64) -> PulseConfig {
        PulseConfig {
            init_pulse_type: PulseType::Rnd,
            scaling: 0.5,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_lbfgsb_reaches_x_gate() {
        let problem = qubit_x_problem(10);
        let optimizer = PulseOptimizer::new(quick_config(), rnd_pulse(7)).unwrap();
        let result = optimizer.optimize(&problem).unwrap();

        assert!(result.fid_err < result.initial_fid_err);
        assert!(
            result.goal_achieved,
            "fid_err {} after {} iterations ({})",
            result.fid_err,
            result.num_iter,
            result.termination_reason
        );
        assert_eq!(result.termination_reason, TerminationReason::GoalAchieved);
        assert_eq!(result.final_amps.dim(), (10, 2));
        assert_eq!(result.time.len(), 10);
        assert!(result.stats.num_grad_computes > 0);
    }

    #[test]
    fn test_grape_reduces_fidelity_error() {
        let problem = qubit_x_problem(10);
        let config = OptimizerConfig {
            algorithm: Algorithm::Grape,
            max_iter: 100,
            learning_rate: 0.5,
            ..quick_config()
        };
        let optimizer = PulseOptimizer::new(config, rnd_pulse(3)).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert!(result.fid_err < result.initial_fid_err);
        assert!(result.num_iter <= 100);
    }

    #[test]
    fn test_bounds_are_respected() {
        let problem = qubit_x_problem(8);
        let pulse = PulseConfig {
            amp_lbound: Some(-0.3),
            amp_ubound: Some(0.3),
            ..rnd_pulse(11)
        };
        let optimizer = PulseOptimizer::new(quick_config(), pulse).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert!(result.final_amps.iter().all(|&a| (-0.3..=0.3).contains(&a)));
        assert!(result.initial_amps.iter().all(|&a| (-0.3..=0.3).contains(&a)));
    }

    #[test]
    fn test_max_iter_terminates() {
        let problem = qubit_x_problem(10);
        let config = OptimizerConfig {
            fid_err_targ: 0.0,
            max_iter: 3,
            min_grad: 0.0,
            accuracy_factor: 0.0,
            ..quick_config()
        };
        let optimizer = PulseOptimizer::new(config, rnd_pulse(5)).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert_eq!(result.termination_reason, TerminationReason::MaxIterReached);
        assert_eq!(result.num_iter, 3);
        assert!(!result.goal_achieved);
    }

    #[test]
    fn test_fid_func_call_limit_terminates() {
        let problem = qubit_x_problem(10);
        let config = OptimizerConfig {
            fid_err_targ: 0.0,
            max_fid_func_calls: 4,
            ..quick_config()
        };
        let optimizer = PulseOptimizer::new(config, rnd_pulse(5)).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert_eq!(
            result.termination_reason,
            TerminationReason::MaxFidFuncCallsReached
        );
        assert_eq!(result.num_fid_func_calls, 4);
        assert_eq!(result.stats.num_fidelity_func_calls, 4);
    }

    #[test]
    fn test_wall_time_limit_terminates() {
        let problem = qubit_x_problem(10);
        let config = OptimizerConfig {
            fid_err_targ: 0.0,
            max_wall_time_sec: 1e-9,
            ..quick_config()
        };
        let optimizer = PulseOptimizer::new(config, rnd_pulse(5)).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert_eq!(
            result.termination_reason,
            TerminationReason::MaxWallTimeExceeded
        );
        assert_eq!(result.num_iter, 0);
        assert!(!result.goal_achieved);
    }

    #[test]
    fn test_min_grad_terminates() {
        let problem = qubit_x_problem(10);
        let config = OptimizerConfig {
            min_grad: 1e3,
            ..quick_config()
        };
        for algorithm in [Algorithm::Lbfgsb, Algorithm::Grape] {
            let config = OptimizerConfig {
                algorithm,
                ..config.clone()
            };
            let optimizer = PulseOptimizer::new(config, rnd_pulse(5)).unwrap();
            let result = optimizer.optimize(&problem).unwrap();
            assert_eq!(result.termination_reason, TerminationReason::GradMinReached);
            assert_eq!(result.num_iter, 0);
            assert!(result.grad_norm_final < 1e3);
            assert_relative_eq!(result.fid_err, result.initial_fid_err);
        }
    }

    /// f(x) = |x|² with a gradient of the wrong sign, so no descent step helps.
    struct UphillBowl;

    impl Objective for UphillBowl {
        fn value(&mut self, x: &Array1<f64>) -> Result<f64> {
            Ok(x.dot(x))
        }

        fn gradient(&mut self, x: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(x * -2.0)
        }
    }

    #[test]
    fn test_grape_line_search_failure() {
        let x0 = Array1::from_vec(vec![1.0, -0.5]);
        let bounds = Bounds::uniform(2, f64::NEG_INFINITY, f64::INFINITY);
        let minimum = grape_descent(&mut UphillBowl, &x0, &bounds, 0.1, |_| None).unwrap();
        assert_eq!(minimum.reason, TerminationReason::LineSearchFailed);
        assert_eq!(minimum.x, x0);
        assert_relative_eq!(minimum.f, 1.25);
    }

    #[test]
    fn test_overflowing_propagator_is_numerical_instability() {
        // exp(1000) overflows, so the evolution and the error are not finite
        let mut problem = qubit_x_problem(1);
        problem.dyn_type = DynamicsType::GenMat;
        problem.drift = Array2::zeros((2, 2));
        problem.ctrls = vec![crate::test_utils::pauli_z()];
        problem.evo_time = 1.0;
        let optimizer = PulseOptimizer::new(quick_config(), PulseConfig::default()).unwrap();
        let err = optimizer
            .optimize_from(&problem, Array2::from_elem((1, 1), 1000.0))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Optimization(OptimizationError::NumericalInstability(_))
        ));
    }

    #[test]
    fn test_already_optimal_start_stops_immediately() {
        // Identity target with zero drift and zero controls: U = I at u = 0
        let mut problem = qubit_x_problem(4);
        problem.drift = Array2::zeros((2, 2));
        problem.target = identity(2);
        let optimizer = PulseOptimizer::new(quick_config(), PulseConfig::default()).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert_eq!(result.termination_reason, TerminationReason::GoalAchieved);
        assert_eq!(result.num_iter, 0);
        assert_relative_eq!(result.fid_err, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_optimize_from_rejects_wrong_shape() {
        let problem = qubit_x_problem(4);
        let optimizer = PulseOptimizer::new(quick_config(), PulseConfig::default()).unwrap();
        let err = optimizer
            .optimize_from(&problem, Array2::zeros((3, 2)))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OptimizerConfig {
            learning_rate: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            PulseOptimizer::new(config, PulseConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_optimize_pulse_applies_limits() {
        let problem = qubit_x_problem(20);
        let mut config = Config::default();
        config.validation.limits.max_timeslots = 10;
        assert!(matches!(
            optimize_pulse(&problem, &config),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_optimize_pulse_from_amplitudes() {
        let problem = qubit_x_problem(6);
        let mut config = Config::default();
        config.optimizer = quick_config();
        let start = Array2::from_elem((6, 2), 0.1);
        let result = optimize_pulse_from(&problem, &config, start.clone()).unwrap();
        assert_eq!(result.initial_amps, start);
        assert!(result.fid_err < result.initial_fid_err);
    }

    #[test]
    fn test_two_oscillator_improves() {
        let mut problem = crate::systems::two_oscillator().unwrap();
        problem.n_ts = 100;
        let config = OptimizerConfig {
            max_iter: 50,
            ..quick_config()
        };
        let optimizer = PulseOptimizer::new(config, PulseConfig::default()).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert!(result.fid_err < result.initial_fid_err);
        assert_eq!(result.final_amps.dim(), (100, 1));
        assert!(result.evo_full_final.iter().all(|z| z.im.abs() < 1e-10));
    }

    #[test]
    #[ignore] // Full-size run, slow in debug builds
    fn test_two_oscillator_full() {
        let problem = crate::systems::two_oscillator().unwrap();
        let result = optimize_pulse(&problem, &Config::default()).unwrap();
        assert!(result.fid_err < result.initial_fid_err);
        assert!(crate::control::symplectic::is_symplectic(
            &result.evo_full_final,
            1e-8
        ));
    }

    #[test]
    fn test_state_transfer() {
        // |0⟩ → |1⟩ with a single σx control
        let mut problem = qubit_x_problem(5);
        problem.dyn_type = DynamicsType::Unitary;
        problem.ctrls = vec![pauli_x()];
        problem.initial = Array2::from_shape_fn((2, 1), |(i, _)| {
            num_complex::Complex64::new(if i == 0 { 1.0 } else { 0.0 }, 0.0)
        });
        problem.target = Array2::from_shape_fn((2, 1), |(i, _)| {
            num_complex::Complex64::new(if i == 1 { 1.0 } else { 0.0 }, 0.0)
        });
        let optimizer = PulseOptimizer::new(quick_config(), rnd_pulse(1)).unwrap();
        let result = optimizer.optimize(&problem).unwrap();
        assert!(result.goal_achieved, "fid_err {}", result.fid_err);
        assert_eq!(result.evo_full_final.dim(), (2, 1));
    }
}
