//! Lease error taxonomy

use thiserror::Error;

/// Errors surfaced by the lease subsystem.
#[derive(Debug, Clone, Error)]
pub enum LeaseError {
    /// Timeout, connection drop or 5xx-class response. Retriable.
    #[error("network error: {0}")]
    NetworkTransient(String),

    /// The bearer credential is no longer accepted. Escalated to the
    /// session provider, never retried here.
    #[error("session expired, re-authentication required")]
    SessionExpired,

    /// A contract precondition was violated (e.g. installing a reservation
    /// whose expiry is not after its issue instant).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A transition the state machine forbids (e.g. refreshing an already
    /// expired lease, or a stale response landing on a newer generation).
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The server refused the operation on business grounds. Surfaced
    /// verbatim to the UI.
    #[error("server rejected the request: {0}")]
    ServerRejected(String),

    /// The server answered with a payload this client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local token-artifact I/O failure. Does not affect lease state.
    #[error("token artifact error: {0}")]
    Artifact(String),
}

impl LeaseError {
    /// Whether the operation may succeed if simply retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkTransient(_))
    }
}

/// Result type for lease operations
pub type LeaseResult<T> = Result<T, LeaseError>;
