use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::metrics::REPORTS_TOTAL;
use crate::models::{Attempt, FeedbackSummary, Report, ScoreBreakdown};

/// Persistence boundary for reports, unique on attempt id.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Must fail with `AlreadyCompleted` if a report exists for the attempt.
    async fn insert(&self, report: Report) -> EngineResult<()>;

    async fn get(&self, attempt_id: &str) -> EngineResult<Option<Report>>;
}

#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<String, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.reports.read().await.len()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(&self, report: Report) -> EngineResult<()> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(report.attempt_id()) {
            return Err(EngineError::AlreadyCompleted(report.attempt_id().to_string()));
        }
        reports.insert(report.attempt_id().to_string(), report);
        Ok(())
    }

    async fn get(&self, attempt_id: &str) -> EngineResult<Option<Report>> {
        Ok(self.reports.read().await.get(attempt_id).cloned())
    }
}

/// Sole creator of reports.
pub struct ReportAssembler {
    store: Arc<dyn ReportStore>,
}

impl ReportAssembler {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Builds the report for `attempt` and stores it. A second call for the
    /// same attempt fails with `AlreadyCompleted` and stores nothing.
    pub async fn assemble(
        &self,
        attempt: &Attempt,
        breakdown: ScoreBreakdown,
        feedback: FeedbackSummary,
        elapsed_seconds: u64,
        created_at: i64,
    ) -> EngineResult<Report> {
        let tier = feedback.tier;
        let report = Report::new(
            Uuid::new_v4().to_string(),
            attempt.id.clone(),
            attempt.definition_id.clone(),
            attempt.owner_id.clone(),
            breakdown,
            feedback,
            elapsed_seconds,
            created_at,
        );

        self.store.insert(report.clone()).await?;
        REPORTS_TOTAL.with_label_values(&[tier.as_str()]).inc();

        tracing::info!(
            "Report assembled: attempt={}, report={}, score={}/{}, tier={}",
            report.attempt_id(),
            report.id(),
            report.breakdown().total,
            report.breakdown().max_possible,
            tier.as_str()
        );

        Ok(report)
    }

    pub async fn get(&self, attempt_id: &str) -> EngineResult<Option<Report>> {
        self.store.get(attempt_id).await
    }
}
