//! Error types for the layer separation engine.
//!
//! Only configuration problems, cancellation and internal failures are errors.
//! Geometry trouble met during a run (repairs, exclusions, unresolved pairs)
//! and strategy fallbacks are reported as [`Warning`](crate::result::Warning)s
//! in the result instead.

use thiserror::Error;

/// Errors that can stop a separation run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The configuration is inconsistent (e.g. `force_k` without a target).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An algorithm name did not match any known coloring strategy.
    #[error("unknown coloring algorithm '{name}' (available: {available})")]
    UnknownAlgorithm {
        /// The name that was requested.
        name: String,
        /// Comma-separated list of accepted names.
        available: String,
    },

    /// A policy or mode name did not match any known option.
    #[error("unknown {kind} '{name}'")]
    UnknownOption {
        /// Which option was being parsed (`mode`, `touch_policy`, ...).
        kind: &'static str,
        /// The name that was requested.
        name: String,
    },

    /// A shape failed explicit validation.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The run observed the cancellation flag and stopped without output.
    #[error("separation cancelled")]
    Cancelled,

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::UnknownAlgorithm { .. } | Error::UnknownOption { .. }
        )
    }
}

/// Result type alias for the separation engine.
pub type Result<T> = std::result::Result<T, Error>;
