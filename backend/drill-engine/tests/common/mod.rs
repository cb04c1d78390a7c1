#![allow(dead_code)]

use phishdrill_engine::models::AttemptState;
use phishdrill_engine::services::attempt_store::{AttemptStore, MemoryAttemptStore};
use phishdrill_engine::services::catalog_service::{Catalog, StaticSource};
use phishdrill_engine::services::notification_service::{
    NotificationError, NotificationPublisher, PushMessage,
};
use phishdrill_engine::services::report_service::{MemoryReportStore, ReportStore};
use phishdrill_engine::services::session_service::SessionController;
use phishdrill_engine::utils::time::ManualClock;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const START_TIME: i64 = 1_700_000_000;

pub struct TestEngine {
    pub controller: Arc<SessionController>,
    pub catalog: Arc<Catalog>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingPublisher>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub async fn create_test_engine() -> TestEngine {
    let publisher = Arc::new(RecordingPublisher::default());
    let (controller, catalog, clock) = build(publisher.clone()).await;
    TestEngine {
        controller,
        catalog,
        clock,
        publisher,
    }
}

/// Engine whose publisher rejects every message.
pub async fn create_engine_with_failing_publisher() -> (Arc<SessionController>, Arc<ManualClock>) {
    let (controller, _, clock) = build(Arc::new(FailingPublisher)).await;
    (controller, clock)
}

/// Engine over caller-supplied stores.
pub async fn create_engine_with_stores(
    attempts: Arc<dyn AttemptStore>,
    reports: Arc<dyn ReportStore>,
) -> (Arc<SessionController>, Arc<ManualClock>) {
    let catalog = load_catalog().await;
    let clock = Arc::new(ManualClock::new(START_TIME));
    let controller = Arc::new(SessionController::new(
        catalog,
        attempts,
        reports,
        Arc::new(RecordingPublisher::default()),
        clock.clone(),
    ));
    (controller, clock)
}

async fn load_catalog() -> Arc<Catalog> {
    init_tracing();

    let source = StaticSource::new(vec![prize_email(), parcel_sms()]);
    let (catalog, report) = Catalog::from_source(Arc::new(source))
        .await
        .expect("Failed to load test catalog");
    assert!(report.is_clean(), "fixtures must validate: {:?}", report);
    Arc::new(catalog)
}

async fn build(
    publisher: Arc<dyn NotificationPublisher>,
) -> (Arc<SessionController>, Arc<Catalog>, Arc<ManualClock>) {
    let catalog = load_catalog().await;
    let clock = Arc::new(ManualClock::new(START_TIME));
    let controller = Arc::new(SessionController::new(
        catalog.clone(),
        Arc::new(MemoryAttemptStore::new()),
        Arc::new(MemoryReportStore::new()),
        publisher,
        clock.clone(),
    ));
    (controller, catalog, clock)
}

/// Starts an attempt and walks it up to the given stage.
pub async fn attempt_at(
    controller: &SessionController,
    definition_id: &str,
    owner_id: &str,
    stage: AttemptState,
) -> String {
    let attempt = controller
        .start(definition_id, owner_id)
        .await
        .expect("start failed");
    let id = attempt.id;

    if stage >= AttemptState::Briefed {
        controller.advance_to_briefed(&id).await.unwrap();
    }
    if stage >= AttemptState::Presented {
        controller.advance_to_presented(&id).await.unwrap();
    }
    if stage >= AttemptState::ActionChosen {
        let action = if definition_id == "prize-email" {
            "report"
        } else {
            "delete_report"
        };
        controller.choose_action(&id, action).await.unwrap();
    }
    if stage >= AttemptState::FlagsSubmitted {
        controller
            .submit_flags(&id, Vec::<String>::new())
            .await
            .unwrap();
    }
    if stage >= AttemptState::Scored {
        controller.complete(&id).await.unwrap();
    }
    id
}

/// Email definition with two red flags.
pub fn prize_email() -> serde_json::Value {
    json!({
        "id": "prize-email",
        "title": "You've Won a Prize!",
        "category": "beginner",
        "medium": "email",
        "description": "An email claiming you won a gift card",
        "context": "You receive this at your work address.",
        "content": {
            "sender": "rewards@amaz0n-prizes.com",
            "subject": "Claim your $500 gift card",
            "body": "Click within 24 hours or lose your prize."
        },
        "red_flags": [
            { "id": "urgency", "label": "Urgency", "detail": "Deadline pressure to act now" },
            { "id": "sender", "label": "Lookalike sender", "detail": "amaz0n is not amazon" }
        ],
        "actions": [
            { "id": "report", "label": "Report as phishing", "correct": true,
              "feedback": "Reporting lets the security team block it." },
            { "id": "click", "label": "Click the link", "correct": false,
              "feedback": "The link leads to a credential harvesting page." }
        ],
        "learning_notes": ["Unexpected prizes are a classic lure"]
    })
}

/// SMS definition with three red flags.
pub fn parcel_sms() -> serde_json::Value {
    json!({
        "id": "parcel-sms",
        "title": "Missed Delivery",
        "difficulty": "intermediate",
        "type": "sms",
        "description": "A text about a parcel awaiting a fee",
        "context": "You are expecting a package this week.",
        "content": { "sender": "+44 7700 900123", "message": "Your parcel is held. Pay 1.99 at bit.ly/xyz" },
        "red_flags": [
            { "id": "link", "label": "Shortened link", "detail": "Hides the real destination" },
            { "id": "fee", "label": "Unexpected fee", "detail": "Couriers rarely ask for fees by SMS" },
            { "id": "number", "label": "Unknown number", "detail": "Not the courier's short code" }
        ],
        "actions": [
            { "id": "delete_report", "label": "Delete and report", "is_correct": true,
              "feedback": "Reporting helps protect others." },
            { "id": "check_app", "label": "Check the courier app", "is_correct": true,
              "feedback": "Going to the source is always safe." },
            { "id": "pay", "label": "Pay the fee", "is_correct": false,
              "feedback": "The payment page harvests card details." }
        ],
        "learning_objectives": ["Couriers do not charge surprise fees by text"]
    })
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("scenarios")
}

#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PushMessage>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<PushMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn events_for(&self, attempt_id: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.payload["attempt_id"] == attempt_id)
            .map(|m| m.event_type)
            .collect()
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        self.messages.lock().unwrap().push(PushMessage {
            event_type: event_type.to_string(),
            payload,
        });
        Ok(())
    }
}

pub struct FailingPublisher;

impl NotificationPublisher for FailingPublisher {
    fn publish(
        &self,
        _event_type: &str,
        _payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::SendFailed("connection refused".to_string()))
    }
}
