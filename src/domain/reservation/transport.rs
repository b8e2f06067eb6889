//! Lease transport interface
//!
//! The network boundary of the lease subsystem. Implementations own
//! retry/backoff and error classification; callers see the domain error
//! taxonomy only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Reservation, ReservationId, TokenRef};
use crate::domain::LeaseResult;

/// A freshly fetched reservation together with the server's own clock
/// observation, so the caller can reconcile clock skew.
#[derive(Debug, Clone)]
pub struct FetchedLease {
    pub reservation: Reservation,
    pub server_time: DateTime<Utc>,
}

/// A re-issued credential with its fresh validity window.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub token: TokenRef,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait LeaseTransport: Send + Sync {
    /// Fetch the reservation record. Transient failures are retried with
    /// bounded backoff inside the implementation.
    async fn fetch(&self, id: &ReservationId) -> LeaseResult<FetchedLease>;

    /// Request a token re-issue with a fresh window. User-initiated:
    /// never silently retried, errors surface to the caller.
    async fn refresh(&self, id: &ReservationId) -> LeaseResult<RefreshGrant>;

    /// Request cancellation. User-initiated: never silently retried.
    async fn cancel(&self, id: &ReservationId) -> LeaseResult<()>;

    /// Report the locally observed expiry. Best-effort with a single
    /// retry; failure must not block the local transition.
    async fn notify_expired(&self, id: &ReservationId) -> LeaseResult<()>;

    /// Resolve the bytes behind a remote token artifact reference.
    async fn fetch_artifact(&self, token: &TokenRef) -> LeaseResult<Vec<u8>>;
}

/// Supplies the bearer credential attached to every transport call.
///
/// Invalidation lives with the session provider; this subsystem only
/// reports [`crate::domain::LeaseError::SessionExpired`] upward.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}
