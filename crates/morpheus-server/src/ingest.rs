//! C8: the Ingest API. One admission algorithm (spec.md §4.8) shared by
//! `/send/email/` and `/send/sms/`, plus the validation/subaccount/billing
//! proxy endpoints, grounded on `src/views/email.py` and `src/views/sms.py`.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use morpheus_db::queries;
use morpheus_kv::ops::claim_group;
use morpheus_queue::{enqueue, Job};
use morpheus_types::send::{EmailSendModel, SmsNumbersModel, SmsSendModel, SubaccountModel};
use morpheus_types::{send::FromAddress, Method};
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;

pub async fn send_email(State(state): State<AppState>, Json(m): Json<EmailSendModel>) -> Result<(StatusCode, Json<Value>), AppError> {
    if !claim_group(&state.kv, &m.uid.to_string()).await? {
        return Err(AppError::conflict(format!("Send group with id \"{}\" already exists", m.uid)));
    }

    let company = queries::get_or_create_company(&state.db, &m.company_code).await?;
    let from = FromAddress::parse(&m.from_address);
    let group = queries::insert_message_group(
        &state.db,
        &m.uid.to_string(),
        company.id,
        m.method.into(),
        Some(&from.email),
        from.name.as_deref(),
    )
    .await?;

    let job_message = morpheus_worker::jobs::EmailJobMessage {
        main_template: m.main_template,
        mustache_partials: m.mustache_partials,
        macros: m.macros,
        subject_template: m.subject_template,
        from_address: m.from_address,
        method: m.method,
        subaccount: m.subaccount,
        tags: m.tags,
        context: m.context,
        headers: m.headers,
        important: m.important,
    };

    for recipient in m.recipients {
        let job = morpheus_worker::jobs::SendEmailJob {
            group_id: group.id,
            company_id: company.id,
            recipient,
            message: job_message.clone(),
        };
        enqueue(&state.kv, &Job::new("send_email", serde_json::to_value(&job)?), None).await?;
    }

    Ok((StatusCode::CREATED, Json(json!({ "message": "201 job enqueued" }))))
}

pub async fn send_sms(State(state): State<AppState>, Json(m): Json<SmsSendModel>) -> Result<(StatusCode, Json<Value>), AppError> {
    if !claim_group(&state.kv, &m.uid).await? {
        return Err(AppError::conflict(format!("Send group with id \"{}\" already exists", m.uid)));
    }

    let company = queries::get_or_create_company(&state.db, &m.company_code).await?;
    let method: Method = m.method.into();

    let mut month_spend = None;
    if let Some(cost_limit) = m.cost_limit {
        let spend = queries::sms_month_to_date_spend(&state.db, company.id, method).await?;
        if spend >= cost_limit {
            return Err(AppError::PaymentRequired(
                json!({ "status": "send limit exceeded", "cost_limit": cost_limit, "spend": spend }),
            ));
        }
        month_spend = Some(spend);
    }

    let group =
        queries::insert_message_group(&state.db, &m.uid, company.id, method, None, Some(&m.from_name)).await?;

    let job_message = morpheus_worker::jobs::SmsJobMessage {
        main_template: m.main_template,
        cost_limit: m.cost_limit,
        country_code: m.country_code,
        from_name: m.from_name,
        method: m.method,
        tags: m.tags,
        context: m.context,
    };

    for recipient in m.recipients {
        let job = morpheus_worker::jobs::SendSmsJob {
            group_id: group.id,
            company_id: company.id,
            recipient,
            message: job_message.clone(),
        };
        enqueue(&state.kv, &Job::new("send_sms", serde_json::to_value(&job)?), None).await?;
    }

    Ok((StatusCode::CREATED, Json(json!({ "status": "enqueued", "spend": month_spend }))))
}

pub async fn validate_sms(Json(m): Json<SmsNumbersModel>) -> Result<Json<Value>, AppError> {
    let mut out = serde_json::Map::new();
    for (key, raw) in &m.numbers {
        let value = match morpheus_phone::validate_number(raw, &m.country_code) {
            Ok(v) => serde_json::to_value(v)?,
            Err(_) => Value::Null,
        };
        out.insert(key.clone(), value);
    }
    Ok(Json(Value::Object(out)))
}

pub async fn create_subaccount(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Option<Json<SubaccountModel>>,
) -> Result<Json<Value>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;
    if method != Method::EmailMandrill {
        return Ok(Json(json!({ "message": format!("no subaccount creation required for \"{method}\"") })));
    }
    let Some(Json(m)) = body else {
        return Err(AppError::bad_request("missing subaccount body"));
    };

    let (status, data) = state.mandrill.subaccount_add(&m.company_code, m.company_name.as_deref().unwrap_or("")).await?;
    if status == 200 {
        return Ok(Json(json!({ "message": "subaccount created" })));
    }

    let already_exists_msg = format!("A subaccount with id {} already exists", m.company_code);
    let message = data.get("message").and_then(Value::as_str).unwrap_or("");
    if !message.contains(&already_exists_msg) {
        return Err(AppError::bad_request(format!("error from mandrill: {data}")));
    }

    let info = state.mandrill.subaccount_info(&m.company_code).await?;
    let total_sent = info.get("sent_total").and_then(Value::as_f64).unwrap_or(0.0);
    if total_sent > 100.0 {
        return Err(AppError::conflict(format!(
            "subaccount already exists with {total_sent} emails sent, reuse of subaccount id not permitted"
        )));
    }
    Ok(Json(json!({
        "message": format!("subaccount already exists with only {total_sent} emails sent, reuse of subaccount id permitted")
    })))
}

#[derive(Serialize)]
struct DeleteSubaccountResult {
    message: String,
}

pub async fn delete_subaccount(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Json(m): Json<SubaccountModel>,
) -> Result<Json<DeleteSubaccountResult>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;

    let (messages_deleted, groups_deleted) = queries::delete_company_branches(&state.db, &m.company_code).await?;
    let msg = format!("deleted_messages={messages_deleted} deleted_message_groups={groups_deleted}");
    tracing::info!(company = %m.company_code, %msg, "deleting company");

    if method == Method::EmailMandrill {
        let (status, data) = state.mandrill.subaccount_delete(&m.company_code).await?;
        if data.get("name").and_then(Value::as_str) == Some("Unknown_Subaccount") {
            let not_found_msg = data.get("message").and_then(Value::as_str).unwrap_or("sub-account not found");
            return Err(AppError::not_found(not_found_msg));
        } else if status != 200 {
            return Err(AppError::bad_request(format!("error from mandrill: {data}")));
        }
    }

    Ok(Json(DeleteSubaccountResult { message: msg }))
}

#[derive(serde::Deserialize)]
pub struct BillingQuery {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Serialize)]
struct BillingResult {
    company: String,
    start: String,
    end: String,
    spend: f64,
}

pub async fn billing(
    State(state): State<AppState>,
    Path((method, company_code)): Path<(String, String)>,
    Query(range): Query<BillingQuery>,
) -> Result<Json<BillingResult>, AppError> {
    let method = Method::from_str(&method).map_err(|_| AppError::bad_request("unknown method"))?;
    let company = queries::find_company_by_code(&state.db, &company_code)
        .await?
        .ok_or_else(|| AppError::not_found("company not found"))?;

    let start = range.start.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let end = range.end.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let spend = queries::billing_total(&state.db, company.id, method, start, end).await?;

    Ok(Json(BillingResult {
        company: company.code,
        start: range.start.format("%Y-%m-%d").to_string(),
        end: range.end.format("%Y-%m-%d").to_string(),
        spend,
    }))
}
