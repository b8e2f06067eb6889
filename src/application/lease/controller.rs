//! Lease lifecycle controller
//!
//! Orchestrates the state machine around the store: consumes countdown
//! events and transport responses, decides transitions, fires the
//! at-most-once expired notification and publishes phase changes for the
//! UI. Tick-driven and user-driven transitions are serialized through the
//! store's atomic mutations; in-flight transport responses are keyed to
//! the lease generation observed at dispatch so a stale result can never
//! mutate a newer lease.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LeaseSettings;
use crate::domain::{
    LeaseError, LeasePhase, LeaseResult, LeaseState, LeaseTransport, ReservationId,
    ReservationStatus,
};
use crate::notifications::{
    EventSubscriber, LeaseEvent, PhaseChangedEvent, SharedEventBus, TokenReplacedEvent,
};
use crate::shared::time::TimeSource;

use super::clock::{ClockEvent, ExpiryClock};
use super::store::ReservationLeaseStore;
use super::token::{ShareSink, TokenArtifact};

pub struct LifecycleController {
    store: Arc<ReservationLeaseStore>,
    transport: Arc<dyn LeaseTransport>,
    clock: ExpiryClock,
    bus: SharedEventBus,
    time: Arc<dyn TimeSource>,
    /// Last requested reservation, kept so a failed initial fetch can be
    /// retried without the caller re-supplying the id.
    target: Mutex<Option<ReservationId>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleController {
    pub fn new(
        transport: Arc<dyn LeaseTransport>,
        settings: &LeaseSettings,
        bus: SharedEventBus,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let store = Arc::new(ReservationLeaseStore::new(settings.warning_threshold()));
        let clock = ExpiryClock::new(events_tx, settings.tick_interval(), time.clone());
        let event_loop = spawn_clock_consumer(
            events_rx,
            store.clone(),
            transport.clone(),
            bus.clone(),
        );

        Self {
            store,
            transport,
            clock,
            bus,
            time,
            target: Mutex::new(None),
            event_loop: Mutex::new(Some(event_loop)),
        }
    }

    /// Fetch and install the reservation, then start the countdown.
    pub async fn load(&self, id: ReservationId) -> LeaseResult<()> {
        *self.target.lock().expect("controller mutex poisoned") = Some(id.clone());

        info!(reservation = %id, "loading reservation lease");
        let fetched = self.transport.fetch(&id).await?;

        // Reconcile clocks: all countdown arithmetic uses the server's
        // notion of "now" from here on.
        let skew = fetched.server_time - self.time.now();
        self.clock.set_skew(skew);

        let expires_at = fetched.reservation.expires_at;
        let generation = self.store.install(fetched.reservation, self.skewed_now())?;

        let state = self.store.read();
        if state.phase.is_live() {
            self.clock.seed(expires_at, generation);
        } else {
            self.clock.stop();
        }
        self.publish_phase(&state);
        Ok(())
    }

    /// Retry the last requested fetch, e.g. after a transient failure.
    pub async fn retry_fetch(&self) -> LeaseResult<()> {
        let id = self
            .target
            .lock()
            .expect("controller mutex poisoned")
            .clone()
            .ok_or_else(|| LeaseError::InvalidState("no reservation requested yet".to_string()))?;
        self.load(id).await
    }

    /// Request a token re-issue with a fresh validity window.
    ///
    /// Disallowed once the lease is expired or terminal; an expiry
    /// observed while the request is in flight wins, and the late
    /// response is discarded.
    pub async fn request_refresh(&self) -> LeaseResult<()> {
        let (id, dispatched) = self.live_target("refresh")?;

        debug!(reservation = %id, generation = dispatched, "requesting token refresh");
        let grant = self.transport.refresh(&id).await?;

        let generation = self.store.replace_token(
            dispatched,
            grant.token,
            grant.expires_at,
            self.skewed_now(),
        )?;
        self.clock.seed(grant.expires_at, generation);

        info!(reservation = %id, expires_at = %grant.expires_at, "token refreshed");
        self.bus.publish(LeaseEvent::TokenReplaced(TokenReplacedEvent {
            reservation_id: id.as_str().to_string(),
            expires_at: grant.expires_at,
        }));
        Ok(())
    }

    /// Request cancellation of the reservation.
    pub async fn request_cancel(&self) -> LeaseResult<()> {
        let (id, dispatched) = self.live_target("cancel")?;

        debug!(reservation = %id, "requesting cancellation");
        self.transport.cancel(&id).await?;

        if self.store.generation() != dispatched {
            return Err(LeaseError::InvalidTransition(
                "stale cancel response discarded".to_string(),
            ));
        }
        self.store
            .apply_server_status(ReservationStatus::Cancelled)?;
        self.clock.stop();

        info!(reservation = %id, "reservation cancelled");
        self.publish_phase(&self.store.read());
        Ok(())
    }

    /// Fold in a terminal status confirmed by the backend out of band
    /// (e.g. a gate scan pushed over a notification channel). Overrides a
    /// locally inferred expiry.
    pub fn apply_server_status(&self, status: ReservationStatus) -> LeaseResult<()> {
        self.store.apply_server_status(status)?;
        self.clock.stop();
        self.publish_phase(&self.store.read());
        Ok(())
    }

    /// Resolve the current credential bytes, e.g. to save the QR image.
    pub async fn download_token(&self) -> LeaseResult<Vec<u8>> {
        self.token_artifact()?.download().await
    }

    /// Resolve the current credential bytes and hand them to the share
    /// target.
    pub async fn share_token(&self, sink: &dyn ShareSink) -> LeaseResult<()> {
        self.token_artifact()?.share(sink).await
    }

    /// Snapshot of the lease for rendering.
    pub fn read(&self) -> LeaseState {
        self.store.read()
    }

    /// Subscribe to phase-change and token-replacement events.
    pub fn subscribe(&self) -> EventSubscriber {
        self.bus.subscribe()
    }

    /// Tear down: stop the countdown and invalidate in-flight responses
    /// so a late callback cannot mutate a discarded lease.
    pub fn shutdown(&self) {
        info!("🛑 lease controller shutting down");
        self.clock.stop();
        self.store.bump_generation();
        if let Some(handle) = self
            .event_loop
            .lock()
            .expect("controller mutex poisoned")
            .take()
        {
            handle.abort();
        }
    }

    fn skewed_now(&self) -> DateTime<Utc> {
        self.time.now() + self.clock.skew()
    }

    /// Id and dispatch generation for a user command, or the guard error
    /// when the lease no longer holds a usable credential.
    fn live_target(&self, operation: &str) -> LeaseResult<(ReservationId, u64)> {
        let state = self.store.read();
        if !state.phase.is_live() {
            return Err(LeaseError::InvalidTransition(format!(
                "{} not allowed in phase {}",
                operation, state.phase
            )));
        }
        let reservation = state
            .reservation
            .ok_or_else(|| LeaseError::InvalidState("no reservation loaded".to_string()))?;
        Ok((reservation.id, state.generation))
    }

    fn token_artifact(&self) -> LeaseResult<TokenArtifact> {
        let state = self.store.read();
        if !state.phase.is_live() {
            return Err(LeaseError::InvalidTransition(format!(
                "token actions disabled in phase {}",
                state.phase
            )));
        }
        let reservation = state
            .reservation
            .ok_or_else(|| LeaseError::InvalidState("no reservation loaded".to_string()))?;
        Ok(TokenArtifact::new(
            reservation.token.clone(),
            reservation.code.clone(),
            self.transport.clone(),
        ))
    }

    fn publish_phase(&self, state: &LeaseState) {
        publish_phase(&self.bus, state);
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if let Some(handle) = self
            .event_loop
            .lock()
            .expect("controller mutex poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

fn publish_phase(bus: &SharedEventBus, state: &LeaseState) {
    if let Some(reservation) = &state.reservation {
        bus.publish(LeaseEvent::PhaseChanged(PhaseChangedEvent {
            reservation_id: reservation.id.as_str().to_string(),
            phase: state.phase,
            remaining_ms: state.remaining.as_millis() as u64,
        }));
    }
}

/// Consume countdown events, fold them into the store and fire the
/// at-most-once expired notification.
fn spawn_clock_consumer(
    mut events: mpsc::UnboundedReceiver<ClockEvent>,
    store: Arc<ReservationLeaseStore>,
    transport: Arc<dyn LeaseTransport>,
    bus: SharedEventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClockEvent::Tick {
                    generation,
                    remaining,
                } => {
                    if store.on_tick(generation, remaining).is_some() {
                        publish_phase(&bus, &store.read());
                    }
                }
                ClockEvent::Expired { generation } => {
                    if store.generation() != generation {
                        debug!(generation, "expiry from a superseded countdown ignored");
                        continue;
                    }
                    if !store.mark_expired() {
                        continue;
                    }

                    let state = store.read();
                    publish_phase(&bus, &state);

                    // The local transition is already done; the backend
                    // notification is best-effort and must not block it.
                    if let Some(id) = state.reservation.map(|r| r.id) {
                        info!(reservation = %id, "⌛ lease expired locally, notifying backend");
                        let transport = transport.clone();
                        tokio::spawn(async move {
                            if let Err(e) = transport.notify_expired(&id).await {
                                warn!(
                                    reservation = %id,
                                    error = %e,
                                    "expired notification not delivered"
                                );
                            }
                        });
                    }
                }
            }
        }
    })
}

// ── Tests ──────────────────────────────────────────────────────
