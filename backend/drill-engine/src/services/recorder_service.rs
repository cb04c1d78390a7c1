use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::models::{AttemptEvent, EventKind};
use crate::utils::time::Clock;

#[derive(Default)]
struct AttemptLog {
    last_sequence: u64,
    events: Vec<AttemptEvent>,
}

/// Append-only event log, one ordered stream per attempt.
///
/// Sequence numbers start at 1 and are assigned under the attempt's own
/// log lock, so ordering never depends on the caller's clock.
pub struct Recorder {
    logs: RwLock<HashMap<String, Arc<Mutex<AttemptLog>>>>,
    clock: Arc<dyn Clock>,
}

impl Recorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            clock,
        }
    }

    async fn log_for(&self, attempt_id: &str) -> Arc<Mutex<AttemptLog>> {
        if let Some(log) = self.logs.read().await.get(attempt_id) {
            return log.clone();
        }

        self.logs
            .write()
            .await
            .entry(attempt_id.to_string())
            .or_default()
            .clone()
    }

    /// Appends an event and returns it as stored.
    pub async fn record(&self, attempt_id: &str, kind: EventKind) -> AttemptEvent {
        let log = self.log_for(attempt_id).await;
        let mut log = log.lock().await;

        log.last_sequence += 1;
        let event = AttemptEvent {
            attempt_id: attempt_id.to_string(),
            sequence: log.last_sequence,
            recorded_at: self.clock.now(),
            kind,
        };
        log.events.push(event.clone());

        tracing::debug!(
            "Recorded event: attempt={}, seq={}, kind={}",
            attempt_id,
            event.sequence,
            event.kind.name()
        );

        event
    }

    /// Ordered events of one attempt; empty when nothing was recorded.
    pub async fn timeline(&self, attempt_id: &str) -> Vec<AttemptEvent> {
        let log = self.logs.read().await.get(attempt_id).cloned();
        match log {
            Some(log) => log.lock().await.events.clone(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttemptState;
    use crate::utils::time::ManualClock;

    fn stage(to: AttemptState) -> EventKind {
        EventKind::StageAdvanced { from: None, to }
    }

    #[tokio::test]
    async fn sequence_increases_per_attempt() {
        let recorder = Recorder::new(Arc::new(ManualClock::new(100)));

        let first = recorder.record("a", stage(AttemptState::Created)).await;
        let other = recorder.record("b", stage(AttemptState::Created)).await;
        let second = recorder.record("a", stage(AttemptState::Briefed)).await;

        assert_eq!(first.sequence, 1);
        assert_eq!(other.sequence, 1);
        assert_eq!(second.sequence, 2);
    }

    #[tokio::test]
    async fn ordering_ignores_wall_clock() {
        let clock = Arc::new(ManualClock::new(500));
        let recorder = Recorder::new(clock.clone());

        recorder.record("a", stage(AttemptState::Created)).await;
        clock.set(10);
        recorder.record("a", stage(AttemptState::Briefed)).await;

        let timeline = recorder.timeline("a").await;
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].kind, stage(AttemptState::Created));
        assert_eq!(timeline[1].sequence, 2);
        assert!(timeline[1].recorded_at < timeline[0].recorded_at);
    }

    #[tokio::test]
    async fn concurrent_appends_keep_gapless_sequence() {
        let recorder = Arc::new(Recorder::new(Arc::new(ManualClock::new(0))));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder.record("a", stage(AttemptState::Created)).await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let sequences: Vec<u64> = recorder
            .timeline("a")
            .await
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn unknown_attempt_has_empty_timeline() {
        let recorder = Recorder::new(Arc::new(ManualClock::new(0)));
        assert!(recorder.timeline("missing").await.is_empty());
    }
}
