use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::models::{Attempt, AttemptState};

/// Result of a conditional state write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Applied,
    Conflict(AttemptState),
}

/// Persistence boundary for attempts.
///
/// `compare_and_swap` must be atomic: the write only happens when the stored
/// state still equals `expected`.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn insert(&self, attempt: Attempt) -> EngineResult<()>;

    async fn get(&self, attempt_id: &str) -> EngineResult<Option<Attempt>>;

    async fn list_by_owner(&self, owner_id: &str) -> EngineResult<Vec<Attempt>>;

    async fn compare_and_swap(
        &self,
        expected: AttemptState,
        updated: Attempt,
    ) -> EngineResult<SwapOutcome>;
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    attempts: RwLock<HashMap<String, Attempt>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert(&self, attempt: Attempt) -> EngineResult<()> {
        let mut attempts = self.attempts.write().await;
        if attempts.contains_key(&attempt.id) {
            return Err(EngineError::Store(format!(
                "Attempt {} already exists",
                attempt.id
            )));
        }
        attempts.insert(attempt.id.clone(), attempt);
        Ok(())
    }

    async fn get(&self, attempt_id: &str) -> EngineResult<Option<Attempt>> {
        Ok(self.attempts.read().await.get(attempt_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> EngineResult<Vec<Attempt>> {
        let mut owned: Vec<Attempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| (a.started_at, &a.id).cmp(&(b.started_at, &b.id)));
        Ok(owned)
    }

    async fn compare_and_swap(
        &self,
        expected: AttemptState,
        updated: Attempt,
    ) -> EngineResult<SwapOutcome> {
        let mut attempts = self.attempts.write().await;
        let current = attempts
            .get_mut(&updated.id)
            .ok_or_else(|| EngineError::attempt_not_found(&updated.id))?;

        if current.state != expected {
            return Ok(SwapOutcome::Conflict(current.state));
        }

        *current = updated;
        Ok(SwapOutcome::Applied)
    }
}
