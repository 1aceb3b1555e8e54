//! C12: the click tracker redirect. Dedup admission happens here, inline
//! with the redirect; the resulting Event is written asynchronously by the
//! worker's `store_click` job handler (spec.md §4.12).

use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header::USER_AGENT, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_client_ip::ClientIp;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use morpheus_db::queries::find_link_by_token;
use morpheus_queue::{enqueue, Job};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    /// Fallback redirect target when `token` isn't a known link, carried
    /// as a query param by some older outbound templates.
    u: Option<String>,
}

pub async fn click(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(q): Query<ClickQuery>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Response {
    let token = token.trim_end_matches('.');

    let link = match find_link_by_token(&state.db, token).await {
        Ok(link) => link,
        Err(err) => {
            tracing::error!(error = %err, "link lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(link) = link else {
        let fallback = q.u.as_deref().and_then(|u| URL_SAFE_NO_PAD.decode(u).ok()).and_then(|bytes| String::from_utf8(bytes).ok());
        return match fallback.as_deref().filter(|u| u.starts_with("http://") || u.starts_with("https://")) {
            Some(url) => {
                tracing::warn!(token, url, "redirecting unknown token via fallback ?u= param");
                Redirect::to(url).into_response()
            }
            None => StatusCode::NOT_FOUND.into_response(),
        };
    };

    let ip = ip.to_string();
    let admitted = match morpheus_kv::ops::claim_click(&state.kv, link.id, &ip).await {
        Ok(admitted) => admitted,
        Err(err) => {
            tracing::error!(error = %err, "click dedup check failed");
            false
        }
    };

    if admitted {
        let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string);
        let job = morpheus_worker::jobs::StoreClickJob { link_id: link.id, ip, ts: Utc::now(), user_agent };
        match serde_json::to_value(&job) {
            Ok(payload) => {
                if let Err(err) = enqueue(&state.kv, &Job::new("store_click", payload), None).await {
                    tracing::error!(error = %err, "failed to enqueue click job");
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to serialize click job"),
        }
    }

    Redirect::to(&link.url).into_response()
}
