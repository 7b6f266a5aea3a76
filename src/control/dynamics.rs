// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Piecewise-constant control dynamics.
//!
//! For timeslot k the combined generator is
//!
//!   H_k = H_drift + Σ_j u[k, j] · H_j
//!
//! and the slot propagator is P_k = exp(G_k · Δt_k), where G_k is H_k with
//! the phase of the dynamics type applied:
//!
//! | Dynamics     | G_k         |
//! |--------------|-------------|
//! | `Unitary`    | −i · H_k    |
//! | `GenMat`     | H_k         |
//! | `Symplectic` | −H_k · Ω    |
//!
//! The phase is linear, so ∂P_k/∂u[k, j] is the Fréchet derivative of the
//! exponential at G_k·Δt_k in direction phase(H_j)·Δt_k.
//!
//! Evolution chains:
//! - forward:  X_0 = X_init, X_{k+1} = P_k · X_k
//! - onward:   O_n = I,      O_k = O_{k+1} · P_k
//!
//! so that for any k, X_n = O_{k+1} · P_k · X_k.

use std::time::Instant;

use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::expm::{identity, matrix_exp, matrix_exp_frechet};
use super::fidelity::FidelityMeasure;
use super::stats::OptimStats;
use super::symplectic::symplectic_omega;
use crate::error::ValidationError;

/// Kind of dynamics generated by the drift and control matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicsType {
    /// Hamiltonians; propagators are unitaries exp(−iHt).
    #[default]
    Unitary,
    /// General (e.g. Lindbladian) generators used without phase.
    #[serde(rename = "genmat")]
    GenMat,
    /// Quadratic bosonic Hamiltonians; propagators exp(−HΩt) are symplectic.
    Symplectic,
}

impl DynamicsType {
    /// Fidelity measure used when none is configured.
    pub fn default_fidelity(self) -> FidelityMeasure {
        match self {
            DynamicsType::Unitary => FidelityMeasure::Psu,
            DynamicsType::GenMat | DynamicsType::Symplectic => FidelityMeasure::TraceDiff,
        }
    }

    /// Map a Hamiltonian-like matrix to its generator.
    fn apply_phase(
        self,
        h: &Array2<Complex64>,
        omega: Option<&Array2<Complex64>>,
    ) -> Array2<Complex64> {
        match (self, omega) {
            (DynamicsType::Unitary, _) => h * Complex64::new(0.0, -1.0),
            (DynamicsType::Symplectic, Some(omega)) => h.dot(omega) * Complex64::new(-1.0, 0.0),
            _ => h.clone(),
        }
    }
}

/// A control problem: generators, boundary operators and time grid.
#[derive(Debug, Clone)]
pub struct ControlProblem {
    /// Label used for output file names.
    pub name: String,
    pub dyn_type: DynamicsType,
    /// Drift generator (d × d).
    pub drift: Array2<Complex64>,
    /// Control generators (each d × d).
    pub ctrls: Vec<Array2<Complex64>>,
    /// Initial operator or state (d × m).
    pub initial: Array2<Complex64>,
    /// Target operator or state (d × m).
    pub target: Array2<Complex64>,
    /// Number of timeslots.
    pub n_ts: usize,
    /// Total evolution time.
    pub evo_time: f64,
    /// Optional per-slot durations; overrides the uniform grid.
    pub tau: Option<Vec<f64>>,
}

impl ControlProblem {
    /// Hilbert (or phase) space dimension.
    pub fn dim(&self) -> usize {
        self.drift.nrows()
    }

    pub fn n_ctrls(&self) -> usize {
        self.ctrls.len()
    }

    /// Duration of each timeslot.
    pub fn timeslot_durations(&self) -> Vec<f64> {
        match &self.tau {
            Some(tau) => tau.clone(),
            None => vec![self.evo_time / self.n_ts as f64; self.n_ts],
        }
    }

    /// Start time of each timeslot.
    pub fn slot_start_times(&self) -> Vec<f64> {
        let mut t = 0.0;
        self.timeslot_durations()
            .into_iter()
            .map(|dt| {
                let start = t;
                t += dt;
                start
            })
            .collect()
    }

    /// Total evolution time implied by the time grid.
    pub fn total_time(&self) -> f64 {
        match &self.tau {
            Some(tau) => tau.iter().sum(),
            None => self.evo_time,
        }
    }
}

/// Per-slot cached propagator and its amplitude derivatives.
#[derive(Debug, Clone)]
struct SlotCache {
    amps: Vec<f64>,
    prop: Array2<Complex64>,
    prop_grads: Option<Vec<Array2<Complex64>>>,
}

/// Evolution engine for a single [`ControlProblem`].
///
/// Caches propagators per timeslot and only recomputes slots whose
/// amplitudes changed since the previous update.
pub struct Dynamics<'a> {
    problem: &'a ControlProblem,
    drift_gen: Array2<Complex64>,
    ctrl_gens: Vec<Array2<Complex64>>,
    durations: Vec<f64>,
    slots: Vec<Option<SlotCache>>,
    fwd: Vec<Array2<Complex64>>,
    onwd: Vec<Array2<Complex64>>,
    chains_valid: bool,
}

impl<'a> Dynamics<'a> {
    /// Prepare phased generators for `problem`.
    ///
    /// The problem must already have passed shape validation.
    pub fn new(problem: &'a ControlProblem) -> Result<Self, ValidationError> {
        let omega = match problem.dyn_type {
            DynamicsType::Symplectic => Some(symplectic_omega(problem.dim())?),
            _ => None,
        };
        let drift_gen = problem.dyn_type.apply_phase(&problem.drift, omega.as_ref());
        let ctrl_gens = problem
            .ctrls
            .iter()
            .map(|c| problem.dyn_type.apply_phase(c, omega.as_ref()))
            .collect();

        Ok(Self {
            problem,
            drift_gen,
            ctrl_gens,
            durations: problem.timeslot_durations(),
            slots: vec![None; problem.n_ts],
            fwd: Vec::new(),
            onwd: Vec::new(),
            chains_valid: false,
        })
    }

    pub fn problem(&self) -> &ControlProblem {
        self.problem
    }

    /// Bring propagators and evolution chains up to date with `amps`.
    ///
    /// `amps` has shape (n_ts × n_ctrls). With `with_grads` the propagator
    /// derivatives are computed as well.
    pub fn update(&mut self, amps: &Array2<f64>, with_grads: bool, stats: &mut OptimStats) {
        let n_ts = self.problem.n_ts;
        let mut changed_slots = 0;
        let mut changed_values = 0;

        let todo: Vec<usize> = (0..n_ts)
            .filter(|&k| match &self.slots[k] {
                None => true,
                Some(cache) => {
                    let row = amps.row(k);
                    let diff = cache
                        .amps
                        .iter()
                        .zip(row.iter())
                        .filter(|(a, b)| a != b)
                        .count();
                    if diff > 0 {
                        changed_slots += 1;
                        changed_values += diff;
                    }
                    diff > 0 || (with_grads && cache.prop_grads.is_none())
                }
            })
            .collect();

        if changed_slots > 0 {
            stats.num_ctrl_amp_updates += 1;
            stats.num_timeslot_changes += changed_slots;
            stats.num_ctrl_amp_changes += changed_values;
        }

        if todo.is_empty() {
            if !self.chains_valid {
                self.recompute_chains(stats);
            }
            return;
        }

        let start = Instant::now();
        let computed: Vec<(usize, SlotCache)> = todo
            .par_iter()
            .map(|&k| (k, self.compute_slot(k, amps.row(k).to_vec(), with_grads)))
            .collect();
        stats.wall_time_props += start.elapsed();
        stats.num_tslot_recompute += computed.len();
        trace!(slots = computed.len(), with_grads, "Recomputed propagators");

        for (k, cache) in computed {
            self.slots[k] = Some(cache);
        }
        self.recompute_chains(stats);
    }

    /// Compute P_k (and optionally ∂P_k/∂u[k, j]) for one slot.
    fn compute_slot(&self, k: usize, amps: Vec<f64>, with_grads: bool) -> SlotCache {
        let dt = Complex64::new(self.durations[k], 0.0);
        let mut gen = self.drift_gen.clone();
        for (gen_j, &u) in self.ctrl_gens.iter().zip(amps.iter()) {
            gen.scaled_add(Complex64::new(u, 0.0), gen_j);
        }
        let gen_dt = gen * dt;

        if !with_grads {
            return SlotCache {
                amps,
                prop: matrix_exp(&gen_dt),
                prop_grads: None,
            };
        }

        let mut prop = None;
        let mut grads = Vec::with_capacity(self.ctrl_gens.len());
        for gen_j in &self.ctrl_gens {
            let (p, l) = matrix_exp_frechet(&gen_dt, &(gen_j * dt));
            prop.get_or_insert(p);
            grads.push(l);
        }

        SlotCache {
            amps,
            prop: prop.unwrap_or_else(|| matrix_exp(&gen_dt)),
            prop_grads: Some(grads),
        }
    }

    fn recompute_chains(&mut self, stats: &mut OptimStats) {
        let n_ts = self.problem.n_ts;
        let props: Vec<&Array2<Complex64>> = self
            .slots
            .iter()
            .flatten()
            .map(|cache| &cache.prop)
            .collect();
        debug_assert_eq!(props.len(), n_ts);

        let start = Instant::now();
        let mut fwd = Vec::with_capacity(n_ts + 1);
        fwd.push(self.problem.initial.clone());
        for p in &props {
            let next = p.dot(&fwd[fwd.len() - 1]);
            fwd.push(next);
        }
        stats.wall_time_fwd += start.elapsed();

        let start = Instant::now();
        let mut onwd = vec![identity(self.problem.dim()); n_ts + 1];
        for k in (0..n_ts).rev() {
            onwd[k] = onwd[k + 1].dot(props[k]);
        }
        stats.wall_time_onwd += start.elapsed();

        self.fwd = fwd;
        self.onwd = onwd;
        self.chains_valid = true;
    }

    /// Forward evolution X_k (k = 0 ..= n_ts).
    pub fn fwd_evo(&self, k: usize) -> &Array2<Complex64> {
        &self.fwd[k]
    }

    /// Onward evolution O_k (k = 0 ..= n_ts).
    pub fn onwd_evo(&self, k: usize) -> &Array2<Complex64> {
        &self.onwd[k]
    }

    /// Full evolution X_n.
    pub fn full_evo(&self) -> &Array2<Complex64> {
        &self.fwd[self.problem.n_ts]
    }

    /// Propagator of slot k.
    pub fn prop(&self, k: usize) -> Option<&Array2<Complex64>> {
        self.slots[k].as_ref().map(|c| &c.prop)
    }

    /// ∂P_k/∂u[k, j], if gradients were requested in the last update.
    pub fn prop_grad(&self, k: usize, j: usize) -> Option<&Array2<Complex64>> {
        self.slots[k]
            .as_ref()
            .and_then(|c| c.prop_grads.as_ref())
            .map(|g| &g[j])
    }
}
