//! Reminder delivery — the notification port and a logging adapter.
//!
//! The lifecycle manager builds a [`ReminderPayload`] and hands it to a
//! [`Notifier`]. Real transports (email, chat, webhook) live outside
//! this crate and implement the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqflow_core::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Payload handed to a notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub workflow_id: String,
    pub recipient: String,
    pub recipient_name: String,
    #[serde(default)]
    pub custom_message: String,
    pub sent_at: DateTime<Utc>,
}

/// What a notifier reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAck {
    pub success: bool,
    pub message: String,
}

impl DeliveryAck {
    pub fn delivered(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Notification port.
///
/// Returning `Err`, or `Ok` with `success == false`, counts as a failed
/// delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, payload: &ReminderPayload) -> Result<DeliveryAck>;
}

const HISTORY_LIMIT: usize = 100;

/// Notifier that logs every reminder and keeps the last 100 in memory.
/// Always succeeds.
#[derive(Debug, Default)]
pub struct LogNotifier {
    history: Mutex<Vec<ReminderPayload>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered payloads, oldest first.
    pub async fn history(&self) -> Vec<ReminderPayload> {
        self.history.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, payload: &ReminderPayload) -> Result<DeliveryAck> {
        tracing::info!(
            "📧 Reminder for {} → {} <{}>{}",
            payload.workflow_id,
            payload.recipient_name,
            payload.recipient,
            if payload.custom_message.is_empty() {
                String::new()
            } else {
                format!(": {}", payload.custom_message)
            }
        );
        let mut history = self.history.lock().await;
        history.push(payload.clone());
        if history.len() > HISTORY_LIMIT {
            history.remove(0);
        }
        Ok(DeliveryAck::delivered(format!(
            "Reminder sent to {}",
            payload.recipient
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: &str) -> ReminderPayload {
        ReminderPayload {
            workflow_id: id.into(),
            recipient: "jane@example.com".into(),
            recipient_name: "Jane Doe".into(),
            custom_message: String::new(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_notifier_acks_and_records() {
        let notifier = LogNotifier::new();
        let ack = notifier.deliver(&payload("WF-1")).await.unwrap();
        assert!(ack.success);
        assert_eq!(ack.message, "Reminder sent to jane@example.com");
        assert_eq!(notifier.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let notifier = LogNotifier::new();
        for i in 0..(HISTORY_LIMIT + 5) {
            notifier.deliver(&payload(&format!("WF-{i}"))).await.unwrap();
        }
        let history = notifier.history().await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].workflow_id, "WF-5");
    }

    #[test]
    fn test_payload_json_shape() {
        let json = serde_json::to_value(payload("WF-1")).unwrap();
        assert_eq!(json["workflowId"], "WF-1");
        assert_eq!(json["recipientName"], "Jane Doe");
        assert_eq!(json["customMessage"], "");
    }
}
