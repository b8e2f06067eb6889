//! Countdown engine for the lease validity window
//!
//! Seeded from an absolute, server-authoritative expiry instant. Each tick
//! recomputes the remaining validity from the wall clock instead of
//! decrementing a counter, so interval drift never accumulates and a
//! suspended timer (backgrounded host) is corrected on the first tick
//! after resume — including firing `Expired` retroactively when the
//! deadline passed during the suspension.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::shared::time::TimeSource;

/// Events emitted by the countdown task.
///
/// Every event carries the lease generation it was seeded for, so the
/// consumer can drop events from a superseded countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { generation: u64, remaining: Duration },
    /// Fired exactly once per seed; the countdown task stops afterwards.
    Expired { generation: u64 },
}

/// Countdown engine, one seeded window at a time.
pub struct ExpiryClock {
    events: mpsc::UnboundedSender<ClockEvent>,
    tick_interval: Duration,
    time: Arc<dyn TimeSource>,
    /// Server-minus-client offset applied to every wall-clock read.
    skew: Mutex<TimeDelta>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ExpiryClock {
    pub fn new(
        events: mpsc::UnboundedSender<ClockEvent>,
        tick_interval: Duration,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            events,
            tick_interval,
            time,
            skew: Mutex::new(TimeDelta::zero()),
            task: Mutex::new(None),
        }
    }

    /// Record the server-minus-client clock offset observed at load time.
    /// Takes effect on the next `seed`.
    pub fn set_skew(&self, offset: TimeDelta) {
        *self.skew.lock().expect("clock mutex poisoned") = offset;
        debug!(skew_ms = offset.num_milliseconds(), "clock skew updated");
    }

    pub fn skew(&self) -> TimeDelta {
        *self.skew.lock().expect("clock mutex poisoned")
    }

    /// Start counting down toward `expires_at`, replacing any prior
    /// countdown. Re-arms the fire-once guard: a window seeded after a
    /// previous `Expired` counts down and may expire again.
    pub fn seed(&self, expires_at: DateTime<Utc>, generation: u64) {
        let events = self.events.clone();
        let time = self.time.clone();
        let skew = self.skew();
        let tick_interval = self.tick_interval;

        debug!(
            generation,
            expires_at = %expires_at,
            "countdown seeded"
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            // After a long suspension, one corrective tick is enough.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let now = time.now() + skew;
                let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);

                if remaining.is_zero() {
                    let _ = events.send(ClockEvent::Expired { generation });
                    break;
                }
                let _ = events.send(ClockEvent::Tick {
                    generation,
                    remaining,
                });
            }
        });

        if let Some(previous) = self
            .task
            .lock()
            .expect("clock mutex poisoned")
            .replace(handle)
        {
            previous.abort();
        }
    }

    /// Stop the current countdown, if any. No further events until the
    /// next `seed`.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().expect("clock mutex poisoned").take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .expect("clock mutex poisoned")
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ExpiryClock {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::time::ManualTimeSource;

    fn fixture() -> (
        Arc<ManualTimeSource>,
        ExpiryClock,
        mpsc::UnboundedReceiver<ClockEvent>,
    ) {
        let start = Utc::now();
        let time = Arc::new(ManualTimeSource::new(start));
        let (tx, rx) = mpsc::unbounded_channel();
        let clock = ExpiryClock::new(tx, Duration::from_secs(1), time.clone());
        (time, clock, rx)
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<ClockEvent>) -> Vec<ClockEvent> {
        // Let the countdown task run a few scheduler turns, then collect.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_fires_expired_once() {
        let (time, clock, mut rx) = fixture();
        clock.seed(time.now() - TimeDelta::seconds(5), 1);

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![ClockEvent::Expired { generation: 1 }]);

        // Task stopped; advancing time produces nothing further.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_is_monotonically_non_increasing() {
        let (time, clock, mut rx) = fixture();
        clock.seed(time.now() + TimeDelta::seconds(10), 1);

        let mut observed = Vec::new();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            time.advance(TimeDelta::seconds(1));
            for event in drain(&mut rx).await {
                if let ClockEvent::Tick { remaining, .. } = event {
                    observed.push(remaining);
                }
            }
        }

        assert!(observed.len() >= 2);
        for pair in observed.windows(2) {
            assert!(pair[1] <= pair[0], "remaining must not increase: {:?}", observed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn suspension_gap_fires_expired_retroactively() {
        let (time, clock, mut rx) = fixture();
        clock.seed(time.now() + TimeDelta::seconds(30), 7);
        drain(&mut rx).await;

        // Host suspends for a minute; deadline passes meanwhile.
        time.advance(TimeDelta::seconds(60));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let events = drain(&mut rx).await;
        assert!(events.contains(&ClockEvent::Expired { generation: 7 }));
    }

    #[tokio::test(start_paused = true)]
    async fn reseed_rearms_after_expiry() {
        let (time, clock, mut rx) = fixture();
        clock.seed(time.now() - TimeDelta::seconds(1), 1);
        let events = drain(&mut rx).await;
        assert_eq!(events, vec![ClockEvent::Expired { generation: 1 }]);

        clock.seed(time.now() + TimeDelta::seconds(5), 2);
        let events = drain(&mut rx).await;
        assert!(matches!(
            events.first(),
            Some(ClockEvent::Tick { generation: 2, .. })
        ));

        time.advance(TimeDelta::seconds(6));
        tokio::time::sleep(Duration::from_secs(2)).await;
        let events = drain(&mut rx).await;
        assert!(events.contains(&ClockEvent::Expired { generation: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticking() {
        let (time, clock, mut rx) = fixture();
        clock.seed(time.now() + TimeDelta::seconds(30), 1);
        drain(&mut rx).await;

        clock.stop();
        assert!(!clock.is_running());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skew_shifts_the_deadline() {
        let (time, clock, mut rx) = fixture();
        // Server is 10 s ahead of the client: the deadline arrives sooner.
        clock.set_skew(TimeDelta::seconds(10));
        clock.seed(time.now() + TimeDelta::seconds(8), 1);

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![ClockEvent::Expired { generation: 1 }]);
    }
}
