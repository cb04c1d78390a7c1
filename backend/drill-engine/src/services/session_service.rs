use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::attempt_store::{AttemptStore, MemoryAttemptStore, SwapOutcome};
use super::catalog_service::Catalog;
use super::feedback_service;
use super::notification_service::{notify, NotificationPublisher};
use super::recorder_service::Recorder;
use super::report_service::{MemoryReportStore, ReportAssembler, ReportStore};
use super::scoring_service;
use crate::error::{EngineError, EngineResult};
use crate::metrics::{record_rejection, ACTIONS_CHOSEN_TOTAL, ATTEMPTS_ACTIVE, ATTEMPTS_TOTAL};
use crate::models::{
    ActionFeedback, ActionOutcome, Attempt, AttemptEvent, AttemptNotification, AttemptState,
    EventKind, FlagsRecorded, Report, ReportReady, StageAdvanced,
};
use crate::utils::time::{elapsed_seconds, to_datetime, Clock};

/// One async mutex per attempt id; mutating operations hold it throughout.
/// An entry lives only while some operation holds or waits for it.
#[derive(Default)]
struct AttemptLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AttemptLocks {
    async fn acquire(&self, attempt_id: &str) -> AttemptGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(attempt_id.to_string()).or_default().clone()
        };
        AttemptGuard {
            locks: self,
            attempt_id: attempt_id.to_string(),
            _held: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

struct AttemptGuard<'a> {
    locks: &'a AttemptLocks,
    attempt_id: String,
    _held: OwnedMutexGuard<()>,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock().unwrap_or_else(|p| p.into_inner());
        // The map and this guard are the only holders: nobody is waiting.
        let idle = locks
            .get(&self.attempt_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(&self.attempt_id);
        }
    }
}

/// Drives attempts through the exercise stages.
///
/// Stages advance strictly in order:
/// `Created → Briefed → Presented → ActionChosen → FlagsSubmitted → Scored → Completed`.
/// Every mutating call checks the exact required state, both before doing
/// any work and again atomically when the new state is written.
pub struct SessionController {
    catalog: Arc<Catalog>,
    attempts: Arc<dyn AttemptStore>,
    recorder: Recorder,
    reports: ReportAssembler,
    publisher: Arc<dyn NotificationPublisher>,
    clock: Arc<dyn Clock>,
    locks: AttemptLocks,
}

impl SessionController {
    pub fn new(
        catalog: Arc<Catalog>,
        attempts: Arc<dyn AttemptStore>,
        reports: Arc<dyn ReportStore>,
        publisher: Arc<dyn NotificationPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            attempts,
            recorder: Recorder::new(clock.clone()),
            reports: ReportAssembler::new(reports),
            publisher,
            clock,
            locks: AttemptLocks::default(),
        }
    }

    /// Controller backed by the in-memory attempt and report stores.
    pub fn in_memory(
        catalog: Arc<Catalog>,
        publisher: Arc<dyn NotificationPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            catalog,
            Arc::new(MemoryAttemptStore::new()),
            Arc::new(MemoryReportStore::new()),
            publisher,
            clock,
        )
    }

    pub async fn start(&self, definition_id: &str, owner_id: &str) -> EngineResult<Attempt> {
        let definition = self.catalog.get(definition_id)?;

        let attempt = Attempt {
            id: Uuid::new_v4().to_string(),
            definition_id: definition.id.clone(),
            owner_id: owner_id.to_string(),
            state: AttemptState::Created,
            started_at: self.clock.now(),
            completed_at: None,
            chosen_action_id: None,
            chosen_flag_ids: BTreeSet::new(),
            score_percentage: None,
        };

        // Held until the Created event is recorded, so no other operation on
        // this attempt can append first.
        let guard = self.locks.acquire(&attempt.id).await;
        self.attempts.insert(attempt.clone()).await?;
        self.record_stage(&attempt.id, None, AttemptState::Created)
            .await;
        drop(guard);

        ATTEMPTS_TOTAL.with_label_values(&["started"]).inc();
        ATTEMPTS_ACTIVE.inc();

        tracing::info!(
            "Attempt started: {} for owner: {} on definition: {} at {}",
            attempt.id,
            owner_id,
            definition_id,
            to_datetime(attempt.started_at)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| attempt.started_at.to_string())
        );

        Ok(attempt)
    }

    pub async fn advance_to_briefed(&self, attempt_id: &str) -> EngineResult<Attempt> {
        self.advance_stage(attempt_id, AttemptState::Created).await
    }

    pub async fn advance_to_presented(&self, attempt_id: &str) -> EngineResult<Attempt> {
        self.advance_stage(attempt_id, AttemptState::Briefed).await
    }

    /// Records the decision and returns its correctness right away.
    /// The score is not finalized until `complete`.
    pub async fn choose_action(
        &self,
        attempt_id: &str,
        action_id: &str,
    ) -> EngineResult<ActionOutcome> {
        let _guard = self.locks.acquire(attempt_id).await;
        let attempt = self.load(attempt_id).await?;
        require_state(&attempt, AttemptState::Presented)?;

        let definition = self.catalog.get(&attempt.definition_id)?;
        let action = definition.action(action_id).ok_or_else(|| {
            record_rejection("unknown_reference");
            EngineError::unknown_action(action_id)
        })?;

        let mut updated = attempt;
        updated.state = AttemptState::ActionChosen;
        updated.chosen_action_id = Some(action.id.clone());
        self.commit(AttemptState::Presented, updated).await?;

        self.recorder
            .record(
                attempt_id,
                EventKind::ActionChosen {
                    action_id: action.id.clone(),
                    correct: action.correct,
                },
            )
            .await;

        let correct_label = if action.correct { "true" } else { "false" };
        ACTIONS_CHOSEN_TOTAL
            .with_label_values(&[correct_label])
            .inc();

        let outcome = ActionOutcome {
            action_id: action.id.clone(),
            correct: action.correct,
            feedback: action.feedback.clone(),
        };

        notify(
            self.publisher.as_ref(),
            AttemptNotification::ActionFeedback(ActionFeedback {
                attempt_id: attempt_id.to_string(),
                action_id: outcome.action_id.clone(),
                correct: outcome.correct,
                feedback: outcome.feedback.clone(),
            }),
        );

        tracing::info!(
            "Action chosen: attempt={}, action={}, correct={}",
            attempt_id,
            action_id,
            outcome.correct
        );

        Ok(outcome)
    }

    /// Stores the identified red flags. Duplicates collapse; ids the
    /// definition does not declare are dropped without error or penalty.
    pub async fn submit_flags<I, S>(
        &self,
        attempt_id: &str,
        flag_ids: I,
    ) -> EngineResult<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _guard = self.locks.acquire(attempt_id).await;
        let attempt = self.load(attempt_id).await?;
        require_state(&attempt, AttemptState::ActionChosen)?;

        let definition = self.catalog.get(&attempt.definition_id)?;
        let submitted: BTreeSet<String> = flag_ids.into_iter().map(Into::into).collect();
        let accepted: BTreeSet<String> = submitted
            .iter()
            .filter(|id| definition.has_red_flag(id))
            .cloned()
            .collect();

        if accepted.len() < submitted.len() {
            tracing::debug!(
                "Ignoring {} unknown flag id(s) for attempt {}",
                submitted.len() - accepted.len(),
                attempt_id
            );
        }

        let mut updated = attempt;
        updated.state = AttemptState::FlagsSubmitted;
        updated.chosen_flag_ids = accepted.clone();
        self.commit(AttemptState::ActionChosen, updated).await?;

        self.recorder
            .record(
                attempt_id,
                EventKind::FlagsSubmitted {
                    flag_ids: accepted.clone(),
                },
            )
            .await;

        notify(
            self.publisher.as_ref(),
            AttemptNotification::FlagsRecorded(FlagsRecorded {
                attempt_id: attempt_id.to_string(),
                accepted: accepted.len(),
                total: definition.red_flags.len(),
            }),
        );

        Ok(accepted)
    }

    /// Scores the attempt and produces its single report.
    ///
    /// Not idempotent: once the attempt has been scored every further call
    /// fails with `AlreadyCompleted`. If the report cannot be stored the
    /// attempt stays in `FlagsSubmitted`.
    pub async fn complete(&self, attempt_id: &str) -> EngineResult<Report> {
        let _guard = self.locks.acquire(attempt_id).await;
        let attempt = self.load(attempt_id).await?;
        require_state(&attempt, AttemptState::FlagsSubmitted)?;

        let definition = self.catalog.get(&attempt.definition_id)?;
        let action_id = attempt.chosen_action_id.clone().ok_or_else(|| {
            EngineError::Store(format!("Attempt {} has no chosen action", attempt_id))
        })?;

        let completed_at = self.clock.now();
        let elapsed = elapsed_seconds(attempt.started_at, completed_at);

        let breakdown =
            scoring_service::score(&definition, &action_id, &attempt.chosen_flag_ids, elapsed)?;
        let feedback = feedback_service::compose(
            &definition,
            &breakdown,
            &action_id,
            &attempt.chosen_flag_ids,
        )?;

        let mut scored = attempt.clone();
        scored.state = AttemptState::Scored;
        scored.completed_at = Some(completed_at);
        scored.score_percentage = Some(breakdown.percentage);
        self.commit(AttemptState::FlagsSubmitted, scored.clone())
            .await?;

        let report = match self
            .reports
            .assemble(&scored, breakdown, feedback, elapsed, completed_at)
            .await
        {
            Ok(report) => report,
            Err(e @ EngineError::AlreadyCompleted(_)) => return Err(e),
            Err(e) => {
                // No report was stored, so the attempt goes back to FlagsSubmitted
                // and may be completed again.
                tracing::warn!(
                    "Report for attempt {} not stored, reverting to {}: {}",
                    attempt_id,
                    AttemptState::FlagsSubmitted,
                    e
                );
                if let Err(revert) = self.commit(AttemptState::Scored, attempt).await {
                    tracing::error!("Failed to revert attempt {}: {}", attempt_id, revert);
                }
                return Err(e);
            }
        };

        self.record_stage(
            attempt_id,
            Some(AttemptState::FlagsSubmitted),
            AttemptState::Scored,
        )
        .await;

        let mut completed = scored;
        completed.state = AttemptState::Completed;
        self.commit(AttemptState::Scored, completed).await?;
        self.record_stage(
            attempt_id,
            Some(AttemptState::Scored),
            AttemptState::Completed,
        )
        .await;

        ATTEMPTS_TOTAL.with_label_values(&["completed"]).inc();
        ATTEMPTS_ACTIVE.dec();

        notify(
            self.publisher.as_ref(),
            AttemptNotification::ReportReady(ReportReady {
                attempt_id: attempt_id.to_string(),
                report_id: report.id().to_string(),
                percentage: report.breakdown().percentage,
                tier: report.tier(),
            }),
        );

        tracing::info!(
            "Attempt completed: {} in {}s, score {:.1}%",
            attempt_id,
            elapsed,
            report.breakdown().percentage
        );

        Ok(report)
    }

    pub async fn get_state(&self, attempt_id: &str) -> EngineResult<AttemptState> {
        Ok(self.load(attempt_id).await?.state)
    }

    pub async fn get_attempt(&self, attempt_id: &str) -> EngineResult<Attempt> {
        self.load(attempt_id).await
    }

    pub async fn get_timeline(&self, attempt_id: &str) -> EngineResult<Vec<AttemptEvent>> {
        self.load(attempt_id).await?;
        Ok(self.recorder.timeline(attempt_id).await)
    }

    pub async fn get_report(&self, attempt_id: &str) -> EngineResult<Report> {
        self.load(attempt_id).await?;
        self.reports
            .get(attempt_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                kind: "Report",
                id: attempt_id.to_string(),
            })
    }

    /// Attempts owned by `owner_id`, oldest first.
    pub async fn list_attempts(&self, owner_id: &str) -> EngineResult<Vec<Attempt>> {
        self.attempts.list_by_owner(owner_id).await
    }

    async fn load(&self, attempt_id: &str) -> EngineResult<Attempt> {
        self.attempts
            .get(attempt_id)
            .await?
            .ok_or_else(|| EngineError::attempt_not_found(attempt_id))
    }

    async fn advance_stage(
        &self,
        attempt_id: &str,
        required: AttemptState,
    ) -> EngineResult<Attempt> {
        let _guard = self.locks.acquire(attempt_id).await;
        let attempt = self.load(attempt_id).await?;
        require_state(&attempt, required)?;

        let next = required.next().ok_or(EngineError::InvalidTransition {
            expected: required,
            actual: attempt.state,
        })?;

        let mut updated = attempt;
        updated.state = next;
        self.commit(required, updated.clone()).await?;
        self.record_stage(attempt_id, Some(required), next).await;

        Ok(updated)
    }

    async fn commit(&self, expected: AttemptState, updated: Attempt) -> EngineResult<()> {
        let attempt_id = updated.id.clone();
        match self.attempts.compare_and_swap(expected, updated).await? {
            SwapOutcome::Applied => Ok(()),
            SwapOutcome::Conflict(actual) => {
                tracing::warn!(
                    "State of {} changed underneath operation: expected {}, found {}",
                    attempt_id,
                    expected,
                    actual
                );
                Err(transition_error(&attempt_id, expected, actual))
            }
        }
    }

    async fn record_stage(&self, attempt_id: &str, from: Option<AttemptState>, to: AttemptState) {
        let event = self
            .recorder
            .record(attempt_id, EventKind::StageAdvanced { from, to })
            .await;

        notify(
            self.publisher.as_ref(),
            AttemptNotification::StageAdvanced(StageAdvanced {
                attempt_id: attempt_id.to_string(),
                stage: to,
                timestamp: event.recorded_at,
            }),
        );
    }
}

fn require_state(attempt: &Attempt, expected: AttemptState) -> EngineResult<()> {
    if attempt.state == expected {
        return Ok(());
    }
    tracing::debug!(
        "Rejected operation on {}: expected {}, found {}",
        attempt.id,
        expected,
        attempt.state
    );
    Err(transition_error(&attempt.id, expected, attempt.state))
}

fn transition_error(attempt_id: &str, expected: AttemptState, actual: AttemptState) -> EngineError {
    // Past FlagsSubmitted the only possible request is a repeated completion.
    if expected == AttemptState::FlagsSubmitted && actual.is_finalized() {
        record_rejection("already_completed");
        return EngineError::AlreadyCompleted(attempt_id.to_string());
    }
    record_rejection("invalid_transition");
    EngineError::InvalidTransition { expected, actual }
}
