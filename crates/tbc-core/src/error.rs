// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the TBC pipeline substrate.
//!
//! All errors implement `Display` and can be converted to/from `String` for
//! call sites that build an error message ad hoc (e.g. parameter validation).

use thiserror::Error;

/// Main error type for pipeline substrate operations.
///
/// Cancellation is represented separately (`TriggerableStage::trigger`
/// returns `Ok(false)` with a status string, never an `Err`) so it has no
/// variant here.
#[derive(Debug, Error)]
pub enum TbcError {
    /// Stage construction failed (unknown parameter, failed factory).
    #[error("construction error: {0}")]
    Construction(String),

    /// Parameter validation failed (out of range, wrong type, missing required).
    #[error("parameter error: {0}")]
    Parameter(String),

    /// A stage failed while executing or triggering.
    #[error("execution error: {0}")]
    Execution(String),

    /// DAG structure is invalid (cycle, dangling edge, arity mismatch).
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced node, field, or artifact does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource exhaustion (cache overflow that could not be resolved by eviction).
    #[error("resource exhaustion: {0}")]
    ResourceExhausted(String),

    /// I/O error from the buffered field reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `TbcError`.
pub type Result<T> = std::result::Result<T, TbcError>;

impl From<TbcError> for String {
    fn from(err: TbcError) -> Self {
        err.to_string()
    }
}

impl From<String> for TbcError {
    fn from(s: String) -> Self {
        Self::Execution(s)
    }
}

impl From<&str> for TbcError {
    fn from(s: &str) -> Self {
        Self::Execution(s.to_string())
    }
}
