//! Error types for the session bridge.

use thiserror::Error;

/// Errors reported to the calling layer. None of them is fatal to the shell.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A request was attempted without an established connection.
    #[error("not connected to the VSS server; run 'connect' first")]
    NotConnected,

    /// The worker did not report liveness within the polling budget.
    #[error("connection not established after {attempts} polls at {interval_ms} ms intervals")]
    ConnectTimeout {
        /// Number of liveness polls performed.
        attempts: u32,
        /// Interval between polls in milliseconds.
        interval_ms: u64,
    },

    /// A reply did not have the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What was wrong with the reply.
        reason: String,
    },

    /// The transport worker reported a failure.
    #[error("transport failure: {reason}")]
    TransportFailure {
        /// Description supplied by the worker.
        reason: String,
    },

    /// No reply arrived before the request deadline.
    #[error("no reply within {timeout_ms} ms")]
    Timeout {
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The pending request was cancelled by the operator.
    #[error("request cancelled")]
    Cancelled,

    /// A request could not be serialised.
    #[error("JSON codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl BridgeError {
    /// Builds a [`BridgeError::TransportFailure`] from any displayable reason.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            reason: reason.into(),
        }
    }

    /// Builds a [`BridgeError::MalformedResponse`] from any displayable reason.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}
