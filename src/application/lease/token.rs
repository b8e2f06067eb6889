//! Token artifact handle
//!
//! Wraps the current credential reference with download/share operations.
//! Phase guarding (no token actions after expiry) happens at the
//! controller boundary, not here. Failures in this module are local I/O
//! concerns and never touch lease state.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::domain::{LeaseError, LeaseResult, LeaseTransport, TokenRef};

/// Delivery target for `share`, e.g. a platform share sheet. Registered
/// by the embedding application.
pub trait ShareSink: Send + Sync {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> LeaseResult<()>;
}

/// Handle to the current credential artifact. Rebuilt from the store on
/// every use; a refresh replaces the underlying reference wholesale.
pub struct TokenArtifact {
    token: TokenRef,
    reservation_code: String,
    transport: Arc<dyn LeaseTransport>,
}

impl TokenArtifact {
    pub fn new(
        token: TokenRef,
        reservation_code: String,
        transport: Arc<dyn LeaseTransport>,
    ) -> Self {
        Self {
            token,
            reservation_code,
            transport,
        }
    }

    pub fn current(&self) -> &TokenRef {
        &self.token
    }

    /// Resolve the artifact bytes. Inline `data:` URIs decode locally;
    /// anything else goes through the transport.
    pub async fn download(&self) -> LeaseResult<Vec<u8>> {
        if let Some(payload) = self.token.data_uri_payload() {
            return BASE64
                .decode(payload)
                .map_err(|e| LeaseError::Artifact(format!("inline token decode failed: {}", e)));
        }
        self.transport.fetch_artifact(&self.token).await
    }

    /// Resolve the bytes and hand them to the share target.
    pub async fn share(&self, sink: &dyn ShareSink) -> LeaseResult<()> {
        let bytes = self.download().await?;
        sink.deliver(&self.filename(), &bytes)
    }

    fn filename(&self) -> String {
        format!("reservation-{}.png", self.reservation_code)
    }
}

// ── Tests ──────────────────────────────────────────────────────
