// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Error taxonomy
//!
//! Replaces exceptions-as-control-flow in validation with a result carrying
//! either the parsed payload or one of the tagged variants below.

use thiserror::Error;

/// Errors surfaced by the core runtime.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Envelope or method-fragment schema validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The socket was interrupted or the peer became unreachable.
    #[error("transport error: {0}")]
    Transport(String),

    /// An outbound reply was not received within the poll deadline.
    #[error("timeout waiting for reply")]
    Timeout,

    /// A paradigm handler raised an error while computing a response.
    #[error("handler error: {0}")]
    Handler(String),

    /// Filesystem or process-level I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Startup failed (bind conflict, permission, pidfile already present).
    #[error("startup failed: {0}")]
    Startup(String),
}

impl CoreError {
    /// The wire-level error code this variant corresponds to (§6, §7).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Timeout => "TIMEOUT",
            CoreError::Transport(_) => "TRANSPORT_ERROR",
            CoreError::Io(_) | CoreError::Handler(_) | CoreError::Startup(_) => "UNKNOWN_ERROR",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
