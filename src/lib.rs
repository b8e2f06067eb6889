//! # ParkPass Reservation Lease
//!
//! Client subsystem managing the time-boxed access credential of a campus
//! parking reservation: a QR token issued for a bounded window, counted
//! down locally against the server-authoritative expiry instant,
//! refreshable while live, and transitioned to expired exactly once —
//! with a best-effort notification to the backend that never blocks the
//! local state change.
//!
//! ## Architecture
//!
//! - **domain**: reservation entity, lease phases, error taxonomy and the
//!   transport trait
//! - **application**: the countdown clock, the lease store (single source
//!   of truth plus generation counter) and the lifecycle controller
//! - **infrastructure**: reqwest-based transport against the reservation
//!   REST API
//! - **notifications**: broadcast event bus for UI re-render
//! - **shared**: retry policy and the wall-clock abstraction
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use parkpass_lease::{
//!     create_event_bus, HttpLeaseTransport, LeaseConfig, LifecycleController, ReservationId,
//! };
//! use parkpass_lease::shared::time::system_time_source;
//!
//! # async fn run(credentials: Arc<dyn parkpass_lease::CredentialProvider>) -> parkpass_lease::LeaseResult<()> {
//! let config = LeaseConfig::default();
//! let transport = Arc::new(HttpLeaseTransport::new(&config, credentials)?);
//! let controller = LifecycleController::new(
//!     transport,
//!     &config.lease,
//!     create_event_bus(),
//!     system_time_source(),
//! );
//!
//! controller.load(ReservationId::new("res-001")).await?;
//! let state = controller.read();
//! println!("{} ({})", state.remaining_label(), state.phase);
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod notifications;
pub mod shared;

pub use config::{default_config_path, LeaseConfig, LeaseSettings, TransportSettings};

// Re-export the lease lifecycle types for easy access
pub use application::lease::{
    ExpiryClock, LifecycleController, ReservationLeaseStore, ShareSink, TokenArtifact,
};
pub use domain::{
    CredentialProvider, FetchedLease, LeaseError, LeasePhase, LeaseResult, LeaseState,
    LeaseTransport, RefreshGrant, Reservation, ReservationId, ReservationStatus, TokenRef,
};
pub use infrastructure::HttpLeaseTransport;
pub use notifications::{create_event_bus, EventBus, LeaseEvent, SharedEventBus};
