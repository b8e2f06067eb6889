//! Reservation domain entity and the derived lease read model

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Opaque reservation identifier, assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReservationId(String);

impl ReservationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to the current credential artifact.
///
/// Either a URL the artifact can be fetched from, or an inline
/// `data:...;base64,` URI. Replaced wholesale on refresh, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef(String);

impl TokenRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base64 payload of an inline `data:` URI, if this is one.
    pub fn data_uri_payload(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        if meta.ends_with(";base64") {
            Some(payload)
        } else {
            None
        }
    }
}

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    /// Holds a valid access credential
    Active,
    /// Validity window elapsed before the credential was used
    Expired,
    /// Credential consumed at the gate
    Used,
    /// Cancelled by user or system
    Cancelled,
    /// Parking session finished normally
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Expired => "Expired",
            Self::Used => "Used",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }

    /// Parse a wire status. Unknown values are rejected at the boundary
    /// rather than coerced into a default.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(Self::Active),
            "Expired" => Some(Self::Expired),
            "Used" => Some(Self::Used),
            "Cancelled" => Some(Self::Cancelled),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Used, Cancelled and Completed are confirmed endings; Expired can
    /// additionally be inferred locally from the countdown.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One parking authorization, as handed over by the booking flow.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Backend identifier
    pub id: ReservationId,
    /// Human-readable reservation code
    pub code: String,
    /// Current status
    pub status: ReservationStatus,
    /// Authoritative issue instant
    pub issued_at: DateTime<Utc>,
    /// Authoritative expiry instant
    pub expires_at: DateTime<Utc>,
    /// Current credential artifact
    pub token: TokenRef,
    /// Vehicle/location/purpose attributes, passed through unmodified
    pub subject: Value,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}

/// Phase of the local lease lifecycle, derived from the reservation and
/// the countdown. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeasePhase {
    /// No reservation installed yet
    Loading,
    /// Counting down, comfortably inside the window
    Counting,
    /// Counting down, remaining validity under the warning threshold
    Warning,
    /// Window elapsed; entered exactly once per seeded window
    Expired,
    /// Used, Cancelled or Completed, confirmed by the backend
    Terminal,
}

impl LeasePhase {
    /// Whether the lease still holds a usable credential. Refresh, cancel
    /// and token download/share are only allowed while live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Counting | Self::Warning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Counting => "counting",
            Self::Warning => "warning",
            Self::Expired => "expired",
            Self::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for LeasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of the lease exposed to the UI.
#[derive(Debug, Clone)]
pub struct LeaseState {
    pub reservation: Option<Reservation>,
    pub remaining: Duration,
    pub phase: LeasePhase,
    pub generation: u64,
}

impl LeaseState {
    /// Countdown rendered as `mm:ss`, or `h:mm:ss` past an hour.
    pub fn remaining_label(&self) -> String {
        let total = self.remaining.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Whether refresh/cancel/download/share affordances should be enabled.
    pub fn actions_enabled(&self) -> bool {
        self.phase.is_live()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn sample_reservation() -> Reservation {
        let now = Utc::now();
        Reservation {
            id: ReservationId::new("res-001"),
            code: "PK-4821".to_string(),
            status: ReservationStatus::Active,
            issued_at: now,
            expires_at: now + ChronoDuration::minutes(15),
            token: TokenRef::new("https://api.example.edu/artifacts/res-001.png"),
            subject: serde_json::json!({"plate": "ABC-123", "lot": "North Deck"}),
        }
    }

    #[test]
    fn status_roundtrip() {
        for status in &[
            ReservationStatus::Active,
            ReservationStatus::Expired,
            ReservationStatus::Used,
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(*status));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(ReservationStatus::parse("Pending"), None);
        assert_eq!(ReservationStatus::parse(""), None);
    }

    #[test]
    fn only_active_is_non_terminal() {
        assert!(!ReservationStatus::Active.is_terminal());
        assert!(ReservationStatus::Used.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
    }

    #[test]
    fn active_reservation() {
        let r = sample_reservation();
        assert!(r.is_active());
        assert_eq!(r.code, "PK-4821");
    }

    #[test]
    fn phase_liveness() {
        assert!(LeasePhase::Counting.is_live());
        assert!(LeasePhase::Warning.is_live());
        assert!(!LeasePhase::Loading.is_live());
        assert!(!LeasePhase::Expired.is_live());
        assert!(!LeasePhase::Terminal.is_live());
    }

    #[test]
    fn remaining_label_formats() {
        let mut state = LeaseState {
            reservation: None,
            remaining: Duration::from_secs(9 * 60 + 5),
            phase: LeasePhase::Counting,
            generation: 1,
        };
        assert_eq!(state.remaining_label(), "09:05");

        state.remaining = Duration::from_secs(3661);
        assert_eq!(state.remaining_label(), "1:01:01");

        state.remaining = Duration::ZERO;
        assert_eq!(state.remaining_label(), "00:00");
    }

    #[test]
    fn data_uri_payload_extraction() {
        let inline = TokenRef::new("data:image/png;base64,aGVsbG8=");
        assert_eq!(inline.data_uri_payload(), Some("aGVsbG8="));

        let url = TokenRef::new("https://api.example.edu/artifacts/t.png");
        assert_eq!(url.data_uri_payload(), None);

        let plain = TokenRef::new("data:text/plain,hello");
        assert_eq!(plain.data_uri_payload(), None);
    }
}
