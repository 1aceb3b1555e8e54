//! Status Updater (spec.md §4.10 "Status update for one event"). One event
//! at a time, regardless of which ingest endpoint produced it — the
//! webhook handlers in the server crate normalize Test/Mandrill/MessageBird
//! payloads down to `morpheus_types::webhook::WebhookEvent` before this
//! ever runs.

use md5::{Digest, Md5};
use morpheus_db::queries::{find_message_by_external_id, insert_event};
use morpheus_kv::{ops::claim_webhook_event, KvPool};
use morpheus_types::{webhook::WebhookEvent, Method};
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Added,
    Duplicate,
    Missing,
}

/// Applies one normalized webhook event to the store. Lookup precedes the
/// dedup hash since the hash is keyed on our internal message id, not the
/// provider's `external_id` the event itself carries.
pub async fn update_message_status(
    db: &PgPool,
    kv: &KvPool,
    method: Method,
    external_id: &str,
    event: WebhookEvent,
) -> anyhow::Result<UpdateOutcome> {
    let Some(message) = find_message_by_external_id(db, method, external_id).await? else {
        return Ok(UpdateOutcome::Missing);
    };

    let r#ref = dedup_ref(message.id, &event);
    if !claim_webhook_event(kv, &r#ref).await? {
        return Ok(UpdateOutcome::Duplicate);
    }

    insert_event(db, message.id, event.status, event.ts, event.extra).await?;
    Ok(UpdateOutcome::Added)
}

/// `event-<md5(message_id|unix_ms(ts)|status|sorted_extra_json)>` (spec.md
/// §4.10 step 1). `extra`'s keys are sorted by `serde_json::Value`'s
/// `BTreeMap`-backed `Object` variant, so `to_string()` is already
/// deterministic.
fn dedup_ref(message_id: i64, event: &WebhookEvent) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        message_id,
        event.ts.timestamp_millis(),
        event.status,
        sorted_extra(&event.extra),
    );
    let digest = Md5::digest(material.as_bytes());
    format!("{digest:x}")
}

fn sorted_extra(extra: &Value) -> String {
    match extra {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<_, _> = map.iter().collect();
            serde_json::to_string(&sorted).unwrap_or_default()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use morpheus_types::MessageStatus;

    #[test]
    fn dedup_ref_is_order_independent_for_extra_keys() {
        let ts = Utc::now();
        let a = WebhookEvent { message_id: "x".into(), status: MessageStatus::Send, ts, extra: serde_json::json!({"a": 1, "b": 2}) };
        let b = WebhookEvent { message_id: "x".into(), status: MessageStatus::Send, ts, extra: serde_json::json!({"b": 2, "a": 1}) };
        assert_eq!(dedup_ref(7, &a), dedup_ref(7, &b));
    }

    #[test]
    fn dedup_ref_differs_on_status() {
        let ts = Utc::now();
        let extra = serde_json::json!({});
        let a = WebhookEvent { message_id: "x".into(), status: MessageStatus::Send, ts, extra: extra.clone() };
        let b = WebhookEvent { message_id: "x".into(), status: MessageStatus::Open, ts, extra };
        assert_ne!(dedup_ref(7, &a), dedup_ref(7, &b));
    }
}
