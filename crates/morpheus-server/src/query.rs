//! C13: the Query API, grounded on `src/views/messages.py`. Every handler
//! takes a `UserSession` (HMAC-signed `?company=&expires=&signature=`
//! token); `company: None` means the `__all__` bypass applies no filter.

use crate::auth::UserSession;
use crate::error::{not_found_or_internal, AppError};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use morpheus_db::model::Message;
use morpheus_db::queries;
use morpheus_types::Method;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::LazyLock;

const PAGE_SIZE: i64 = 100;

async fn company_id_filter(state: &AppState, session: &UserSession) -> Result<Option<i64>, AppError> {
    match &session.company {
        None => Ok(None),
        Some(code) => {
            let company = queries::find_company_by_code(&state.db, code)
                .await
                .map_err(|e| not_found_or_internal(e, "company not found"))?;
            Ok(Some(company.ok_or_else(|| AppError::not_found("company not found"))?.id))
        }
    }
}

fn summarize(m: &Message) -> Value {
    json!({
        "id": m.id,
        "external_id": m.external_id,
        "method": m.method.to_string(),
        "status": m.status.to_string(),
        "send_ts": m.send_ts,
        "update_ts": m.update_ts,
        "to_address": m.to_address,
        "to_first_name": m.to_first_name,
        "to_last_name": m.to_last_name,
        "tags": m.tags,
        "subject": m.subject,
        "cost": m.cost,
    })
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    tags: Option<String>,
    q: Option<String>,
    #[serde(default)]
    offset: i64,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Query(params): Query<ListQuery>,
    session: UserSession,
) -> Result<Json<Value>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;
    let company_id = company_id_filter(&state, &session).await?;
    let tags: Vec<String> = params.tags.as_deref().map(|t| t.split(',').map(str::to_string).collect()).unwrap_or_default();

    let page = queries::list_messages(&state.db, company_id, method, &tags, params.q.as_deref(), params.offset).await?;

    let next = if params.offset + PAGE_SIZE < page.count {
        Some(params.offset + PAGE_SIZE)
    } else {
        None
    };
    let previous = if params.offset > 0 { Some((params.offset - PAGE_SIZE).max(0)) } else { None };

    Ok(Json(json!({
        "items": page.items.iter().map(summarize).collect::<Vec<_>>(),
        "count": page.count,
        "next": next,
        "previous": previous,
        "spend": page.spend,
    })))
}

static HREF_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href\s*=\s*"[^"]*""#).unwrap());

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    #[serde(default = "default_safe")]
    safe: bool,
}

fn default_safe() -> bool {
    true
}

pub async fn message_detail(
    State(state): State<AppState>,
    Path((method, id)): Path<(String, i64)>,
    Query(q): Query<DetailQuery>,
    session: UserSession,
) -> Result<Json<Value>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;
    let message = queries::get_message(&state.db, method, id).await.map_err(|e| not_found_or_internal(e, "message not found"))?;
    authorize_company(&state, &session, message.company_id).await?;

    let (events, total) = queries::list_events(&state.db, id).await?;
    let more = (total - events.len() as i64).max(0);

    let body = message.body.as_deref().map(|b| if q.safe { HREF_ATTR.replace_all(b, r#"href="#""#).into_owned() } else { b.to_string() });

    Ok(Json(json!({
        "id": message.id,
        "external_id": message.external_id,
        "method": method.to_string(),
        "status": message.status.to_string(),
        "send_ts": message.send_ts,
        "update_ts": message.update_ts,
        "to_address": message.to_address,
        "to_first_name": message.to_first_name,
        "to_last_name": message.to_last_name,
        "tags": message.tags,
        "subject": message.subject,
        "body": body,
        "attachments": message.attachments,
        "cost": message.cost,
        "events": events.iter().map(|e| json!({
            "status": e.status.to_string(),
            "ts": e.ts,
            "extra": e.extra,
        })).collect::<Vec<_>>(),
        "more_events": more,
    })))
}

pub async fn message_preview(
    State(state): State<AppState>,
    Path((method, id)): Path<(String, i64)>,
    session: UserSession,
) -> Result<Json<Value>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;
    let message = queries::get_message(&state.db, method, id).await.map_err(|e| not_found_or_internal(e, "message not found"))?;
    authorize_company(&state, &session, message.company_id).await?;

    if method.is_sms() {
        let group = queries::get_message_group(&state.db, message.group_id).await?;
        Ok(Json(json!({
            "from_name": group.from_name,
            "to": message.to_address,
            "body": message.body,
            "status": message.status.to_string(),
        })))
    } else {
        Ok(Json(json!({ "body": message.body.unwrap_or_default() })))
    }
}

#[derive(Serialize)]
struct AggregationResult {
    histogram: Vec<Value>,
    rolling_7_day: i64,
    rolling_28_day: i64,
    rolling_90_day: i64,
    open_count: i64,
}

pub async fn aggregation(
    State(state): State<AppState>,
    Path(method): Path<String>,
    session: UserSession,
) -> Result<Json<AggregationResult>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;
    let company_id = company_id_filter(&state, &session).await?;

    let rows = queries::aggregation(&state.db, company_id, method).await?;
    let histogram = rows
        .iter()
        .map(|r| json!({ "status": r.status.to_string(), "date": r.date, "count": r.count }))
        .collect();

    Ok(Json(AggregationResult {
        histogram,
        rolling_7_day: queries::rolling_total(&state.db, company_id, method, 7).await?,
        rolling_28_day: queries::rolling_total(&state.db, company_id, method, 28).await?,
        rolling_90_day: queries::rolling_total(&state.db, company_id, method, 90).await?,
        open_count: queries::open_count(&state.db, company_id, method).await?,
    }))
}

/// A signed token's company must own the message being looked up directly
/// by id; list/aggregation endpoints filter at the query level instead, but
/// detail/preview take an id that could belong to any tenant.
async fn authorize_company(state: &AppState, session: &UserSession, message_company_id: i64) -> Result<(), AppError> {
    let Some(code) = &session.company else { return Ok(()) };
    let company = queries::find_company_by_code(&state.db, code)
        .await
        .map_err(|e| not_found_or_internal(e, "company not found"))?
        .ok_or_else(|| AppError::not_found("company not found"))?;
    if company.id != message_company_id {
        return Err(AppError::not_found("message not found"));
    }
    Ok(())
}
