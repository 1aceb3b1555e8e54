//! Webhook payload shapes for C10/C11, grounded on
//! `src/schemas/webhooks.py::BaseWebhook`/`MandrillWebhook` and
//! `src/worker/webhooks.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::MessageStatus;

/// A single normalized status-update event, regardless of which provider it
/// came from. `extra` participates in the dedup hash (spec.md §3
/// `event-<md5(...)>`), so it must serialize deterministically; callers
/// should keep its keys sorted before hashing (see `morpheus-worker`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub message_id: String,
    pub status: MessageStatus,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Body of `POST /webhook/test/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestWebhook {
    #[serde(flatten)]
    pub event: WebhookEvent,
}

/// One element of the Mandrill `mandrill_events` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandrillEvent {
    pub event: String,
    pub ts: i64,
    pub msg: MandrillMsg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandrillMsg {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl MandrillEvent {
    /// Maps a Mandrill event name to our status domain. Unknown event
    /// names are treated as permanent validation errors by the caller.
    pub fn status(&self) -> Option<MessageStatus> {
        Some(match self.event.as_str() {
            "send" => MessageStatus::Send,
            "deferral" => MessageStatus::Deferral,
            "hard_bounce" => MessageStatus::HardBounce,
            "soft_bounce" => MessageStatus::SoftBounce,
            "open" => MessageStatus::Open,
            "click" => MessageStatus::Click,
            "spam" => MessageStatus::Spam,
            "unsub" => MessageStatus::Unsub,
            "reject" => MessageStatus::Reject,
            _ => return None,
        })
    }

    pub fn into_webhook_event(self) -> Option<WebhookEvent> {
        let status = self.status()?;
        let ts = DateTime::from_timestamp(self.ts, 0)?;
        Some(WebhookEvent {
            message_id: self.msg.id,
            status,
            ts,
            extra: self.msg.extra,
        })
    }
}

/// Query-string fields for `GET /webhook/messagebird/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBirdWebhook {
    pub id: String,
    #[serde(rename = "statusDatetime")]
    pub status_datetime: DateTime<Utc>,
    pub status: String,
    #[serde(rename = "statusErrorCode")]
    pub status_error_code: Option<i64>,
}

impl MessageBirdWebhook {
    pub fn status(&self) -> Option<MessageStatus> {
        Some(match self.status.as_str() {
            "scheduled" => MessageStatus::Scheduled,
            "buffered" => MessageStatus::Buffered,
            "delivered" => MessageStatus::Delivered,
            "expired" => MessageStatus::Expired,
            "delivery_failed" => MessageStatus::DeliveryFailed,
            "sent" => MessageStatus::Send,
            _ => return None,
        })
    }

    pub fn into_webhook_event(self) -> Option<WebhookEvent> {
        let status = self.status()?;
        let extra = if let Some(code) = self.status_error_code {
            serde_json::json!({ "statusErrorCode": code })
        } else {
            serde_json::json!({})
        };
        Some(WebhookEvent {
            message_id: self.id,
            status,
            ts: self.status_datetime,
            extra,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mandrill_event_maps_known_statuses() {
        let ev = MandrillEvent {
            event: "hard_bounce".into(),
            ts: 1_700_000_000,
            msg: MandrillMsg {
                id: "abc".into(),
                extra: serde_json::json!({}),
            },
        };
        let we = ev.into_webhook_event().unwrap();
        assert_eq!(we.status, MessageStatus::HardBounce);
        assert_eq!(we.message_id, "abc");
    }

    #[test]
    fn messagebird_unknown_status_is_none() {
        let wh = MessageBirdWebhook {
            id: "1".into(),
            status_datetime: Utc::now(),
            status: "bogus".into(),
            status_error_code: None,
        };
        assert!(wh.into_webhook_event().is_none());
    }
}
