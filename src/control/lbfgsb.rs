// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Limited-memory BFGS with simple box constraints.
//!
//! Variables that sit on a bound with the gradient pointing outward are
//! frozen for the iteration; the quasi-Newton direction is computed on the
//! remaining free variables with the two-loop recursion and the step is
//! projected back into the box. The line search backtracks along the
//! projected path until the Armijo condition holds.
//!
//! Ref: Byrd, Lu, Nocedal & Zhu (1995), SIAM J. Sci. Comput. 16, 1190.
//! Ref: Nocedal & Wright (2006), "Numerical Optimization", Alg. 7.4.

use std::collections::VecDeque;

use ndarray::{Array1, Zip};
use tracing::debug;

use super::types::TerminationReason;
use crate::error::Result;

/// Function to minimise.
pub trait Objective {
    fn value(&mut self, x: &Array1<f64>) -> Result<f64>;
    fn gradient(&mut self, x: &Array1<f64>) -> Result<Array1<f64>>;
}

/// Where the termination check is being made.
#[derive(Debug, Clone, Copy)]
pub enum Checkpoint {
    /// After any function evaluation (including line-search trials).
    Evaluation { f: f64 },
    /// At the start of an iteration, with the gradient norm at the iterate.
    Iteration { iter: usize, f: f64, grad_norm: f64 },
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LbfgsbSettings {
    /// Number of correction pairs kept.
    pub memory: usize,
    /// Relative reduction tolerance.
    pub ftol: f64,
    /// Maximum backtracking steps per line search.
    pub max_line_search: usize,
    /// Armijo sufficient-decrease constant.
    pub c1: f64,
}

impl Default for LbfgsbSettings {
    fn default() -> Self {
        Self {
            memory: 10,
            ftol: 1e7 * f64::EPSILON,
            max_line_search: 20,
            c1: 1e-4,
        }
    }
}

/// Outcome of a minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Array1<f64>,
    pub f: f64,
    pub iterations: usize,
    pub reason: TerminationReason,
}

/// Box constraints.
#[derive(Debug, Clone)]
pub struct Bounds {
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
}

impl Bounds {
    /// Same bounds for all `n` variables.
    pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
        Self {
            lower: Array1::from_elem(n, lower),
            upper: Array1::from_elem(n, upper),
        }
    }

    pub fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        Zip::from(x)
            .and(&self.lower)
            .and(&self.upper)
            .map_collect(|&v, &l, &u| v.max(l).min(u))
    }

    /// Mask of variables free to move given gradient `g`.
    fn free_mask(&self, x: &Array1<f64>, g: &Array1<f64>) -> Array1<f64> {
        Zip::from(x)
            .and(g)
            .and(&self.lower)
            .and(&self.upper)
            .map_collect(|&v, &gi, &l, &u| {
                let pinned = (v <= l && gi > 0.0) || (v >= u && gi < 0.0);
                if pinned {
                    0.0
                } else {
                    1.0
                }
            })
    }
}

struct Correction {
    s: Array1<f64>,
    y: Array1<f64>,
    rho: f64,
}

/// Minimise `objective` from `x0` within `bounds`.
///
/// `check` is consulted after every function evaluation and at the start of
/// every iteration; returning `Some(reason)` stops the solver. When a stop is
/// requested during a line search, the trial point is returned if it improves
/// on the current iterate.
pub fn minimize<O, C>(
    objective: &mut O,
    x0: &Array1<f64>,
    bounds: &Bounds,
    settings: &LbfgsbSettings,
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
    let mut memory: VecDeque<Correction> = VecDeque::with_capacity(settings.memory);
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

        let free = bounds.free_mask(&x, &g);
        let g_free = &g * &free;
        let mut d = two_loop(&g_free, &free, &memory).mapv(|v| -v);
        if d.dot(&g) >= 0.0 {
            memory.clear();
            d = g_free.mapv(|v| -v);
        }
        if d.dot(&d) == 0.0 {
            // Every variable is pinned at a bound with an outward gradient.
            return Ok(Minimum {
                x,
                f,
                iterations: iter,
                reason: TerminationReason::GradMinReached,
            });
        }

        let mut alpha = if memory.is_empty() {
            1.0_f64.min(1.0 / g_free.dot(&g_free).sqrt())
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..settings.max_line_search {
            let trial = bounds.project(&(&x + &(&d * alpha)));
            let step = &trial - &x;
            if step.iter().all(|&s| s == 0.0) {
                break;
            }
            let f_trial = objective.value(&trial)?;
            if let Some(reason) = check(Checkpoint::Evaluation { f: f_trial }) {
                let (x, f) = if f_trial < f { (trial, f_trial) } else { (x, f) };
                return Ok(Minimum {
                    x,
                    f,
                    iterations: iter,
                    reason,
                });
            }
            if f_trial <= f + settings.c1 * g.dot(&step) {
                accepted = Some((trial, f_trial, step));
                break;
            }
            alpha *= 0.5;
        }

        let Some((x_new, f_new, s)) = accepted else {
            if !memory.is_empty() {
                debug!(iter, "Line search failed, resetting L-BFGS memory");
                memory.clear();
                continue;
            }
            return Ok(Minimum {
                x,
                f,
                iterations: iter,
                reason: TerminationReason::LineSearchFailed,
            });
        };

        let g_new = objective.gradient(&x_new)?;
        let y = &g_new - &g;
        let sy = s.dot(&y);
        if sy > f64::EPSILON * y.dot(&y) {
            if memory.len() == settings.memory {
                memory.pop_front();
            }
            memory.push_back(Correction { s, y, rho: 1.0 / sy });
        }

        let reduction = (f - f_new) / f.abs().max(f_new.abs()).max(1.0);
        x = x_new;
        f = f_new;
        g = g_new;
        iter += 1;
        debug!(iter, f, reduction, "L-BFGS-B step accepted");

        if reduction <= settings.ftol {
            // Let goal checks take precedence over convergence.
            let grad_norm = g.dot(&g).sqrt();
            let reason = check(Checkpoint::Iteration { iter, f, grad_norm })
                .unwrap_or(TerminationReason::FunctionConverged);
            return Ok(Minimum {
                x,
                f,
                iterations: iter,
                reason,
            });
        }
    }
}

/// Two-loop recursion: returns H·q restricted to the free variables.
fn two_loop(q: &Array1<f64>, free: &Array1<f64>, memory: &VecDeque<Correction>) -> Array1<f64> {
    let mut q = q.clone();
    let mut alphas = Vec::with_capacity(memory.len());

    for c in memory.iter().rev() {
        let s = &c.s * free;
        let y = &c.y * free;
        let a = c.rho * s.dot(&q);
        q.scaled_add(-a, &y);
        alphas.push(a);
    }

    let gamma = memory
        .back()
        .map(|c| {
            let y = &c.y * free;
            let yy = y.dot(&y);
            if yy > 0.0 {
                (&c.s * free).dot(&y) / yy
            } else {
                1.0
            }
        })
        .filter(|g| g.is_finite() && *g > 0.0)
        .unwrap_or(1.0);
    let mut r = q * gamma;

    for (c, a) in memory.iter().zip(alphas.into_iter().rev()) {
        let s = &c.s * free;
        let y = &c.y * free;
        let b = c.rho * y.dot(&r);
        r.scaled_add(a - b, &s);
    }
    r * free
}
