use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::metrics::NOTIFICATIONS_TOTAL;
use crate::models::AttemptNotification;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
}

/// Message as delivered to push subscribers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// External push-notification collaborator. Delivery is at-most-once.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, event_type: &str, payload: serde_json::Value)
        -> Result<(), NotificationError>;
}

/// Fans messages out to every live subscriber.
///
/// With no subscribers, or a subscriber that lags past the channel
/// capacity, messages are dropped.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<PushMessage>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.tx.subscribe()
    }
}

impl NotificationPublisher for BroadcastPublisher {
    fn publish(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        // no receivers is not an error
        let _ = self.tx.send(PushMessage {
            event_type: event_type.to_string(),
            payload,
        });
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl NotificationPublisher for NoopPublisher {
    fn publish(
        &self,
        _event_type: &str,
        _payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Publishes a notification, swallowing failures.
pub fn notify(publisher: &dyn NotificationPublisher, notification: AttemptNotification) {
    let event = notification.event_name();
    match publisher.publish(event, notification.to_payload()) {
        Ok(()) => {
            NOTIFICATIONS_TOTAL.with_label_values(&[event, "sent"]).inc();
        }
        Err(e) => {
            NOTIFICATIONS_TOTAL
                .with_label_values(&[event, "failed"])
                .inc();
            tracing::warn!(
                "Dropping {} notification for attempt {}: {}",
                event,
                notification.attempt_id(),
                e
            );
        }
    }
}
