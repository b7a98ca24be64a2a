// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier broadcast engine.

use thiserror::Error;

/// The primary error type used across all Courier adapter traits and core operations.
///
/// Per-recipient provider failures are NOT errors: they travel as
/// [`SendOutcome::Failed`](crate::types::SendOutcome::Failed) values and are
/// recorded on the job. Only faults that the caller must act on surface here.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// A campaign request was rejected before anything was persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport-level failure talking to the messaging provider.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The dispatcher could not accept or complete a submission.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// A ledger record was not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CourierError::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true for errors caused by a bad caller request.
    pub fn is_validation(&self) -> bool {
        matches!(self, CourierError::Validation(_))
    }
}
