// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for pulse optimization.

use std::fmt;

/// Result type alias for control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),
    /// Validation error
    Validation(ValidationError),
    /// Optimization error
    Optimization(OptimizationError),
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Optimization(e) => write!(f, "Optimization error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Validation(e) => Some(e),
            Error::Optimization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<OptimizationError> for Error {
    fn from(e: OptimizationError) -> Self {
        Error::Optimization(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Input validation errors.
#[derive(Debug)]
pub enum ValidationError {
    /// Field validation failed
    Field { field: String, message: String },
    /// Matrix or array shape mismatch
    Shape {
        what: String,
        expected: String,
        actual: String,
    },
    /// Physics constraint violated
    PhysicsConstraint(String),
    /// Resource limit exceeded
    ResourceLimit {
        resource: String,
        limit: u64,
        requested: u64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::Shape {
                what,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Shape mismatch for {}: expected {}, got {}",
                    what, expected, actual
                )
            }
            ValidationError::PhysicsConstraint(msg) => {
                write!(f, "Physics constraint violated: {}", msg)
            }
            ValidationError::ResourceLimit {
                resource,
                limit,
                requested,
            } => {
                write!(
                    f,
                    "Resource limit exceeded for {}: limit={}, requested={}",
                    resource, limit, requested
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failures raised while the optimizer is running.
#[derive(Debug)]
pub enum OptimizationError {
    /// Fidelity or gradient became NaN/Inf
    NumericalInstability(String),
    /// Line search could not make progress from the start point
    LineSearch(String),
    /// Malformed control amplitude file
    AmplitudeFile(String),
}

impl fmt::Display for OptimizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationError::NumericalInstability(msg) => {
                write!(f, "Numerical instability: {}", msg)
            }
            OptimizationError::LineSearch(msg) => write!(f, "Line search failed: {}", msg),
            OptimizationError::AmplitudeFile(msg) => {
                write!(f, "Invalid amplitude file: {}", msg)
            }
        }
    }
}

impl std::error::Error for OptimizationError {}
