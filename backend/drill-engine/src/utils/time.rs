use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of wall-clock time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. May be set backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, value: i64) {
        self.now.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Seconds between two epoch timestamps, never negative.
pub fn elapsed_seconds(started_at: i64, completed_at: i64) -> u64 {
    completed_at.saturating_sub(started_at).max(0) as u64
}

/// Converts stored epoch seconds for display at the presentation boundary.
pub fn to_datetime(epoch_seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch_seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_clamped_under_clock_skew() {
        assert_eq!(elapsed_seconds(100, 145), 45);
        assert_eq!(elapsed_seconds(100, 100), 0);
        assert_eq!(elapsed_seconds(100, 40), 0);
    }

    #[test]
    fn manual_clock_moves_both_ways() {
        let clock = ManualClock::new(1_000);
        clock.advance(30);
        assert_eq!(clock.now(), 1_030);
        clock.set(900);
        assert_eq!(clock.now(), 900);
    }

    #[test]
    fn to_datetime_converts_epoch_seconds() {
        let dt = to_datetime(0).unwrap();
        assert_eq!(dt.to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }
}
