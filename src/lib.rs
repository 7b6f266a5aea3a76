// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS pulse control
//!
//! This crate optimizes piecewise-constant control pulses for closed quantum
//! and linear bosonic (symplectic) systems.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          qubit-os-control CLI            │
//! ├──────────────────┬──────────────────────┤
//! │  Problem files   │  Built-in systems    │
//! ├──────────────────┴──────────────────────┤
//! │            Pulse Optimizer               │
//! │   (L-BFGS-B / GRAPE, rayon per slot)     │
//! ├────────────────┬────────────────────────┤
//! │   Dynamics     │  Fidelity + gradient   │
//! └────────────────┴────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`control`]: Dynamics, fidelity and optimizers
//! - [`output`]: Control amplitude files
//! - [`problem`]: Problem description files
//! - [`systems`]: Built-in example systems
//! - [`validation`]: Input validation utilities
//! - [`error`]: Error types

pub mod config;
pub mod control;
pub mod error;
pub mod output;
pub mod problem;
pub mod systems;
pub mod validation;

pub use config::Config;
pub use control::{optimize_pulse, ControlProblem, OptimResult};
pub use error::{Error, Result};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
