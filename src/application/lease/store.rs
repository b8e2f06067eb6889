//! Reservation lease store
//!
//! Single source of truth for the current reservation record and its
//! derived lease state. Every mutation is synchronous and atomic behind
//! one mutex; readers get a consistent snapshot. The generation counter
//! increments on `install` and `replace_token` so asynchronous results
//! dispatched against an older generation can be recognized and dropped.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{
    LeaseError, LeasePhase, LeaseResult, LeaseState, Reservation, ReservationStatus, TokenRef,
};

struct Inner {
    reservation: Option<Reservation>,
    phase: LeasePhase,
    remaining: Duration,
    generation: u64,
}

pub struct ReservationLeaseStore {
    warning_threshold: Duration,
    inner: Mutex<Inner>,
}

impl ReservationLeaseStore {
    pub fn new(warning_threshold: Duration) -> Self {
        Self {
            warning_threshold,
            inner: Mutex::new(Inner {
                reservation: None,
                phase: LeasePhase::Loading,
                remaining: Duration::ZERO,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("lease store mutex poisoned")
    }

    fn phase_for(&self, status: ReservationStatus, remaining: Duration) -> LeasePhase {
        match status {
            ReservationStatus::Active => {
                if remaining <= self.warning_threshold {
                    LeasePhase::Warning
                } else {
                    LeasePhase::Counting
                }
            }
            ReservationStatus::Expired => LeasePhase::Expired,
            ReservationStatus::Used
            | ReservationStatus::Cancelled
            | ReservationStatus::Completed => LeasePhase::Terminal,
        }
    }

    /// Install a freshly fetched reservation, replacing whatever was held.
    /// The only entry into a live phase. Returns the new generation.
    ///
    /// Rejects records whose expiry is not after their issue instant.
    pub fn install(&self, reservation: Reservation, now: DateTime<Utc>) -> LeaseResult<u64> {
        if reservation.expires_at <= reservation.issued_at {
            return Err(LeaseError::InvalidState(format!(
                "reservation {} has a non-positive validity window",
                reservation.id
            )));
        }

        let remaining = (reservation.expires_at - now).to_std().unwrap_or_default();
        let phase = self.phase_for(reservation.status, remaining);

        let mut inner = self.lock();
        inner.generation += 1;
        inner.remaining = if phase.is_live() {
            remaining
        } else {
            Duration::ZERO
        };
        inner.phase = phase;
        inner.reservation = Some(reservation);
        debug!(generation = inner.generation, phase = %inner.phase, "reservation installed");
        Ok(inner.generation)
    }

    /// Apply a backend-confirmed terminal status. Authoritative: overrides
    /// a locally inferred `Expired` (e.g. a gate scan that raced the
    /// countdown). Idempotent: reapplying the current status is a no-op.
    pub fn apply_server_status(&self, status: ReservationStatus) -> LeaseResult<()> {
        if !status.is_terminal() {
            return Err(LeaseError::InvalidTransition(format!(
                "only terminal statuses can be applied from the server, got {}",
                status
            )));
        }

        let mut inner = self.lock();
        let reservation = inner
            .reservation
            .as_mut()
            .ok_or_else(|| LeaseError::InvalidState("no reservation installed".to_string()))?;

        if reservation.status == status {
            return Ok(());
        }

        reservation.status = status;
        inner.phase = if status == ReservationStatus::Expired {
            LeasePhase::Expired
        } else {
            LeasePhase::Terminal
        };
        inner.remaining = Duration::ZERO;
        debug!(status = %status, "server status applied");
        Ok(())
    }

    /// Locally infer expiry from the elapsed countdown. Returns `true`
    /// only for the call that performed the transition, so the caller can
    /// trigger the backend notification at most once per window.
    pub fn mark_expired(&self) -> bool {
        let mut inner = self.lock();
        if !inner.phase.is_live() {
            return false;
        }
        let Some(reservation) = inner.reservation.as_mut() else {
            return false;
        };
        reservation.status = ReservationStatus::Expired;
        inner.phase = LeasePhase::Expired;
        inner.remaining = Duration::ZERO;
        true
    }

    /// Swap in a re-issued credential and its fresh window. Valid only
    /// while the lease is live and only when the response belongs to the
    /// current generation; a refresh must never resurrect an expired
    /// lease, and a stale response must never clobber a newer record.
    /// Returns the new generation.
    pub fn replace_token(
        &self,
        dispatched_generation: u64,
        token: TokenRef,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LeaseResult<u64> {
        let mut inner = self.lock();

        if inner.generation != dispatched_generation {
            return Err(LeaseError::InvalidTransition(format!(
                "stale refresh response discarded (generation {} behind {})",
                dispatched_generation, inner.generation
            )));
        }
        if !inner.phase.is_live() {
            return Err(LeaseError::InvalidTransition(format!(
                "token refresh rejected in phase {}",
                inner.phase
            )));
        }

        let remaining = (expires_at - now).to_std().unwrap_or_default();
        let phase = self.phase_for(ReservationStatus::Active, remaining);

        let reservation = inner
            .reservation
            .as_mut()
            .ok_or_else(|| LeaseError::InvalidState("no reservation installed".to_string()))?;
        reservation.token = token;
        reservation.expires_at = expires_at;

        inner.remaining = remaining;
        inner.phase = phase;
        inner.generation += 1;
        debug!(generation = inner.generation, expires_at = %expires_at, "token replaced");
        Ok(inner.generation)
    }

    /// Fold a countdown tick into the state. Ticks from a superseded
    /// generation, or arriving after the lease left a live phase, are
    /// no-ops. Returns the new phase when the tick caused a transition.
    pub fn on_tick(&self, generation: u64, remaining: Duration) -> Option<LeasePhase> {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.phase.is_live() {
            return None;
        }
        inner.remaining = remaining;
        if inner.phase == LeasePhase::Counting && remaining <= self.warning_threshold {
            inner.phase = LeasePhase::Warning;
            return Some(LeasePhase::Warning);
        }
        None
    }

    /// Consistent snapshot for the UI.
    pub fn read(&self) -> LeaseState {
        let inner = self.lock();
        LeaseState {
            reservation: inner.reservation.clone(),
            remaining: inner.remaining,
            phase: inner.phase,
            generation: inner.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn phase(&self) -> LeasePhase {
        self.lock().phase
    }

    /// Invalidate all in-flight work keyed to earlier generations, used
    /// on teardown so a late response cannot mutate a discarded lease.
    pub fn bump_generation(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.generation
    }
}

// ── Tests ──────────────────────────────────────────────────────
