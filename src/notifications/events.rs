//! Lease lifecycle events

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::LeasePhase;

/// Event types pushed to UI subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum LeaseEvent {
    /// The lease entered a new phase (counting, warning, expired, terminal)
    PhaseChanged(PhaseChangedEvent),
    /// The credential was replaced by a successful refresh
    TokenReplaced(TokenReplacedEvent),
}

impl LeaseEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            LeaseEvent::PhaseChanged(_) => "phase_changed",
            LeaseEvent::TokenReplaced(_) => "token_replaced",
        }
    }

    /// Reservation the event belongs to
    pub fn reservation_id(&self) -> &str {
        match self {
            LeaseEvent::PhaseChanged(e) => &e.reservation_id,
            LeaseEvent::TokenReplaced(e) => &e.reservation_id,
        }
    }
}

/// Phase transition event
#[derive(Debug, Clone, Serialize)]
pub struct PhaseChangedEvent {
    pub reservation_id: String,
    #[serde(serialize_with = "serialize_phase")]
    pub phase: LeasePhase,
    pub remaining_ms: u64,
}

/// Token replacement event
#[derive(Debug, Clone, Serialize)]
pub struct TokenReplacedEvent {
    pub reservation_id: String,
    pub expires_at: DateTime<Utc>,
}

fn serialize_phase<S: serde::Serializer>(phase: &LeasePhase, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(phase.as_str())
}

/// An event with its publication timestamp
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    pub event: LeaseEvent,
    pub published_at: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(event: LeaseEvent) -> Self {
        Self {
            event,
            published_at: Utc::now(),
        }
    }
}
