// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Piecewise-constant pulse optimization.
//!
//! Given a drift generator, control generators, an initial and a target
//! operator and a time grid, find control amplitudes u[k, j] (one per
//! timeslot and control) that minimise a fidelity error.
//!
//! # Architecture
//!
//! - [`expm`]: Matrix exponential and its Fréchet derivative
//! - [`dynamics`]: Slot propagators and forward/onward evolution with
//!   per-slot caching
//! - [`symplectic`]: Symplectic structure matrix for oscillator dynamics
//! - [`fidelity`]: Fidelity error measures and exact gradients
//! - [`pulsegen`]: Initial pulse shapes
//! - [`lbfgsb`]: Bound-constrained limited-memory BFGS
//! - [`optimize`]: [`PulseOptimizer`] and [`optimize_pulse`]
//! - [`stats`]: Run statistics and report
//!
//! # References
//!
//! - Khaneja et al. (2005), "Optimal control of coupled spin dynamics",
//!   J. Magn. Reson. 172, 296. doi:10.1016/j.jmr.2004.11.004
//! - Machnes et al. (2011), Phys. Rev. A 84, 022305. arXiv:1011.4874
//! - Al-Mohy & Higham (2009), "Computing the Fréchet derivative of the
//!   matrix exponential", SIAM J. Matrix Anal. Appl. 30(4), 1639.
//! - Byrd, Lu, Nocedal & Zhu (1995), "A limited memory algorithm for bound
//!   constrained optimization", SIAM J. Sci. Comput. 16(5), 1190.

pub mod dynamics;
pub mod expm;
pub mod fidelity;
pub mod lbfgsb;
pub mod optimize;
pub mod pulsegen;
pub mod stats;
pub mod symplectic;
pub mod types;

pub use dynamics::{ControlProblem, Dynamics, DynamicsType};
pub use expm::matrix_exp;
pub use fidelity::{FidelityComputer, FidelityMeasure};
pub use optimize::{optimize_pulse, optimize_pulse_from, PulseOptimizer};
pub use pulsegen::{PulseConfig, PulseType};
pub use stats::OptimStats;
pub use types::{Algorithm, OptimResult, OptimizerConfig, TerminationReason};
