//! C10: webhook ingest. Each handler normalizes its provider's payload
//! down to a job the worker's status updater consumes, grounded on
//! `src/views/webhooks.py`.

use crate::auth::verify_mandrill_signature;
use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use morpheus_queue::{enqueue, Job};
use morpheus_types::webhook::{MandrillEvent, MessageBirdWebhook, TestWebhook};
use serde_json::{json, Value};

const MANDRILL_SIGNATURE_HEADER: &str = "X-Mandrill-Signature";

pub async fn webhook_test(State(state): State<AppState>, Json(body): Json<TestWebhook>) -> Result<Json<Value>, AppError> {
    let job = morpheus_worker::jobs::UpdateMessageStatusJob {
        method: "email-test".to_string(),
        external_id: body.event.message_id,
        status: body.event.status,
        ts: body.event.ts,
        extra: body.event.extra,
    };
    enqueue(&state.kv, &Job::new("update_message_status", serde_json::to_value(&job)?), None).await?;
    Ok(Json(json!({ "message": "testing webhook processed" })))
}

/// Mandrill POSTs `application/x-www-form-urlencoded` with a single
/// `mandrill_events` field holding a JSON array. The signature is computed
/// over the raw decoded field value, so it must be read from the form body
/// directly rather than through `axum::Form` (which would hand back a
/// parsed struct, not the original bytes).
pub async fn webhook_mandrill(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(MANDRILL_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::forbidden("missing signature header"))?;

    let raw_events = form_urlencoded::parse(&body)
        .find(|(k, _)| k == "mandrill_events")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| AppError::bad_request("missing mandrill_events field"))?;

    if !verify_mandrill_signature(&state.secrets.webhook_auth_key, &state.mandrill_webhook_url, &raw_events, signature) {
        return Err(AppError::forbidden("invalid signature"));
    }

    let events: Vec<MandrillEvent> =
        serde_json::from_str(&raw_events).map_err(|_| AppError::bad_request("malformed mandrill_events"))?;

    enqueue(&state.kv, &Job::new("update_mandrill_webhooks", serde_json::to_value(&events)?), None).await?;
    Ok(Json(json!({ "message": "mandrill webhook processed" })))
}

pub async fn webhook_messagebird(
    State(state): State<AppState>,
    Query(wh): Query<MessageBirdWebhook>,
) -> Result<Json<Value>, AppError> {
    let Some(event) = wh.clone().into_webhook_event() else {
        return Ok(Json(json!({ "message": "status ignored" })));
    };
    let job = morpheus_worker::jobs::UpdateMessageStatusJob {
        method: "sms-messagebird".to_string(),
        external_id: wh.id,
        status: event.status,
        ts: event.ts,
        extra: event.extra,
    };
    enqueue(&state.kv, &Job::new("update_message_status", serde_json::to_value(&job)?), None).await?;
    Ok(Json(json!({ "message": "messagebird webhook processed" })))
}
