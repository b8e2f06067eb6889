//! Wire DTOs for the reservation API
//!
//! The wire layer is mapped into domain types explicitly; unknown status
//! strings are rejected here instead of leaking into the state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    LeaseError, Reservation, ReservationId, ReservationStatus, TokenRef,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDto {
    pub id: String,
    pub code: String,
    pub status: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token: String,
    #[serde(default)]
    pub subject: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponseDto {
    pub reservation: ReservationDto,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponseDto {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequestDto {
    pub window_secs: u64,
}

impl TryFrom<ReservationDto> for Reservation {
    type Error = LeaseError;

    fn try_from(dto: ReservationDto) -> Result<Self, Self::Error> {
        let status = ReservationStatus::parse(&dto.status).ok_or_else(|| {
            LeaseError::Protocol(format!("unknown reservation status: {}", dto.status))
        })?;
        Ok(Reservation {
            id: ReservationId::new(dto.id),
            code: dto.code,
            status,
            issued_at: dto.issued_at,
            expires_at: dto.expires_at,
            token: TokenRef::new(dto.token),
            subject: dto.subject,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "id": "res-001",
        "code": "PK-4821",
        "status": "Active",
        "issuedAt": "2026-03-02T10:00:00Z",
        "expiresAt": "2026-03-02T10:15:00Z",
        "token": "https://parking.example.edu/artifacts/res-001.png",
        "subject": {"plate": "ABC-123", "lot": "North Deck"}
    }"#;

    #[test]
    fn reservation_maps_into_domain() {
        let dto: ReservationDto = serde_json::from_str(PAYLOAD).unwrap();
        let reservation = Reservation::try_from(dto).unwrap();
        assert_eq!(reservation.id.as_str(), "res-001");
        assert_eq!(reservation.status, ReservationStatus::Active);
        assert_eq!(reservation.subject["lot"], "North Deck");
        assert!(reservation.expires_at > reservation.issued_at);
    }

    #[test]
    fn unknown_status_is_a_protocol_error() {
        let mut dto: ReservationDto = serde_json::from_str(PAYLOAD).unwrap();
        dto.status = "OnHold".to_string();
        let err = Reservation::try_from(dto).unwrap_err();
        assert!(matches!(err, LeaseError::Protocol(_)));
    }

    #[test]
    fn missing_subject_defaults_to_null() {
        let trimmed = r#"{
            "id": "res-002",
            "code": "PK-9",
            "status": "Active",
            "issuedAt": "2026-03-02T10:00:00Z",
            "expiresAt": "2026-03-02T10:15:00Z",
            "token": "t"
        }"#;
        let dto: ReservationDto = serde_json::from_str(trimmed).unwrap();
        assert!(dto.subject.is_null());
    }

    #[test]
    fn refresh_request_serializes_window() {
        let body = serde_json::to_value(RefreshRequestDto { window_secs: 900 }).unwrap();
        assert_eq!(body["windowSecs"], 900);
    }
}
