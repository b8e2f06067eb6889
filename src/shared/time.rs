//! Wall-clock abstraction
//!
//! All lease arithmetic goes through a [`TimeSource`] so the countdown can
//! be driven deterministically in tests. Production code uses
//! [`SystemTimeSource`]; tests pin the clock with [`ManualTimeSource`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of the current wall-clock instant.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Create the default shared time source.
pub fn system_time_source() -> Arc<dyn TimeSource> {
    Arc::new(SystemTimeSource)
}

/// A hand-driven clock for tests and demos.
///
/// Starts at a fixed instant and only moves when told to.
pub struct ManualTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("time source mutex poisoned") = instant;
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("time source mutex poisoned");
        *now += delta;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("time source mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_source_only_moves_when_told() {
        let start = Utc::now();
        let source = ManualTimeSource::new(start);
        assert_eq!(source.now(), start);

        source.advance(Duration::seconds(42));
        assert_eq!(source.now(), start + Duration::seconds(42));

        let later = start + Duration::minutes(5);
        source.set(later);
        assert_eq!(source.now(), later);
    }
}
