//! HTTP implementation of the lease transport
//!
//! Talks to the reservation REST API with a bearer credential from the
//! session provider. Error classification lives here: the rest of the
//! subsystem only ever sees the domain taxonomy. Read-style calls retry
//! transient failures with bounded backoff; user-initiated mutations
//! (refresh, cancel) get exactly one attempt, because a silent duplicate
//! could double-consume a one-time token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::config::LeaseConfig;
use crate::domain::{
    CredentialProvider, FetchedLease, LeaseError, LeaseResult, LeaseTransport, RefreshGrant,
    ReservationId, TokenRef,
};
use crate::shared::retry::{retry_with_backoff, RetryPolicy};

use super::dto::{FetchResponseDto, RefreshRequestDto, RefreshResponseDto};

pub struct HttpLeaseTransport {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    fetch_retry: RetryPolicy,
    refresh_window_secs: u64,
}

impl HttpLeaseTransport {
    pub fn new(
        config: &LeaseConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> LeaseResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.transport.request_timeout())
            .build()
            .map_err(|e| LeaseError::Protocol(format!("http client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.transport.base_url.trim_end_matches('/').to_string(),
            credentials,
            fetch_retry: config.transport.fetch_retry_policy(),
            refresh_window_secs: config.lease.refresh_window_secs,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach credential and correlation id, send, and map any non-2xx
    /// response into the domain taxonomy.
    async fn send(&self, request: reqwest::RequestBuilder) -> LeaseResult<reqwest::Response> {
        let mut request = request.header("x-request-id", Uuid::new_v4().to_string());
        if let Some(token) = self.credentials.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LeaseError::NetworkTransient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "reservation api error response");
        Err(classify_status(status, &body))
    }
}

#[async_trait]
impl LeaseTransport for HttpLeaseTransport {
    async fn fetch(&self, id: &ReservationId) -> LeaseResult<FetchedLease> {
        let url = self.endpoint(&format!("/reservations/{}", id));
        let dto = retry_with_backoff(
            &self.fetch_retry,
            || async {
                let response = self.send(self.http.get(&url)).await?;
                response
                    .json::<FetchResponseDto>()
                    .await
                    .map_err(|e| LeaseError::Protocol(format!("malformed reservation payload: {}", e)))
            },
            LeaseError::is_transient,
            "fetch_reservation",
        )
        .await?;

        Ok(FetchedLease {
            reservation: dto.reservation.try_into()?,
            server_time: dto.server_time,
        })
    }

    async fn refresh(&self, id: &ReservationId) -> LeaseResult<RefreshGrant> {
        let url = self.endpoint(&format!("/reservations/{}/token", id));
        let body = RefreshRequestDto {
            window_secs: self.refresh_window_secs,
        };
        let response = self.send(self.http.post(&url).json(&body)).await?;
        let dto = response
            .json::<RefreshResponseDto>()
            .await
            .map_err(|e| LeaseError::Protocol(format!("malformed refresh payload: {}", e)))?;

        Ok(RefreshGrant {
            token: TokenRef::new(dto.token),
            expires_at: dto.expires_at,
        })
    }

    async fn cancel(&self, id: &ReservationId) -> LeaseResult<()> {
        let url = self.endpoint(&format!("/reservations/{}/cancel", id));
        self.send(self.http.post(&url)).await?;
        Ok(())
    }

    async fn notify_expired(&self, id: &ReservationId) -> LeaseResult<()> {
        let url = self.endpoint(&format!("/reservations/{}/expired", id));
        match self.send(self.http.post(&url)).await {
            Ok(_) => Ok(()),
            // One immediate retry; beyond that the caller only logs.
            Err(e) if e.is_transient() => self.send(self.http.post(&url)).await.map(|_| ()),
            Err(e) => Err(e),
        }
    }

    async fn fetch_artifact(&self, token: &TokenRef) -> LeaseResult<Vec<u8>> {
        let url = token.as_str().to_string();
        retry_with_backoff(
            &self.fetch_retry,
            || async {
                let response = self.send(self.http.get(&url)).await?;
                response
                    .bytes()
                    .await
                    .map(|b| b.to_vec())
                    .map_err(|e| LeaseError::Artifact(e.to_string()))
            },
            LeaseError::is_transient,
            "fetch_token_artifact",
        )
        .await
    }
}

/// Map a non-2xx response onto the domain taxonomy.
fn classify_status(status: StatusCode, body: &str) -> LeaseError {
    let detail = extract_message(body).unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else {
            body.to_string()
        }
    });

    match status {
        StatusCode::UNAUTHORIZED => LeaseError::SessionExpired,
        // Some gateways report an elapsed auth token as 419.
        s if s.as_u16() == 419 => LeaseError::SessionExpired,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            LeaseError::NetworkTransient(detail)
        }
        s if s.is_server_error() => LeaseError::NetworkTransient(detail),
        _ => LeaseError::ServerRejected(detail),
    }
}

/// Pull the `message` field out of a JSON error body, if there is one.
fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(String::from)
}

// ── Tests ──────────────────────────────────────────────────────
