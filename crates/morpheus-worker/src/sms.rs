//! SMS state machine (spec.md §4.9): **pending → validating → rendering →
//! sizing → sending → stored(send)**, with a single failure branch
//! **render_failed** covering invalid numbers, render errors, and
//! too-long messages.

use crate::config::{WorkerConfig, SMS_LINK_TOKEN_LEN, SMS_TEST_COST_PER_PART};
use crate::email::JobOutcome;
use crate::jobs::SendSmsJob;
use crate::retry::{defer_ms_for_try, retries_exhausted};
use morpheus_db::queries::{insert_message_with_links, NewMessage};
use morpheus_kv::KvPool;
use morpheus_phone::validate_number;
use morpheus_providers::ApiError;
use morpheus_sms_sizer::sms_length;
use morpheus_template::{apply_short_links, TemplateEngine};
use morpheus_types::MessageStatus;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub async fn handle_send_sms(cfg: &WorkerConfig, job_try: u32, args: SendSmsJob) -> anyhow::Result<JobOutcome> {
    let SendSmsJob { group_id, company_id, recipient, message } = args;
    let method: morpheus_types::Method = message.method.into();

    if retries_exhausted(job_try) {
        write_terminal(cfg, group_id, company_id, method, &recipient.number, MessageStatus::SendRequestFailed, "upstream error").await?;
        return Ok(JobOutcome::Done);
    }

    // Step 1: validate number, require mobile.
    let validated = match validate_number(&recipient.number, &message.country_code) {
        Ok(v) if v.is_mobile => v,
        Ok(_) => {
            write_terminal(cfg, group_id, company_id, method, &recipient.number, MessageStatus::RenderFailed, "number is not mobile").await?;
            return Ok(JobOutcome::Done);
        }
        Err(err) => {
            write_terminal(cfg, group_id, company_id, method, &recipient.number, MessageStatus::RenderFailed, &err.to_string()).await?;
            return Ok(JobOutcome::Done);
        }
    };

    // Step 2: merge context, recipient wins; apply short links.
    let mut context: Map<String, Value> = Map::new();
    for (k, v) in message.context.iter() {
        context.insert(k.clone(), v.clone());
    }
    for (k, v) in recipient.context.iter() {
        context.insert(k.clone(), v.clone());
    }
    let mut links = Vec::new();
    if let Some(click_url) = &cfg.click_host_name {
        links = apply_short_links(&mut context, click_url, SMS_LINK_TOKEN_LEN, false);
    }

    // Step 3: render, no partials/macros for SMS bodies.
    let engine = match TemplateEngine::new(&HashMap::new()) {
        Ok(e) => e,
        Err(err) => {
            write_terminal(cfg, group_id, company_id, method, &recipient.number, MessageStatus::RenderFailed, &err.to_string()).await?;
            return Ok(JobOutcome::Done);
        }
    };
    let body = match engine.render(&message.main_template, &Value::Object(context)) {
        Ok(b) => b,
        Err(err) => {
            write_terminal(cfg, group_id, company_id, method, &recipient.number, MessageStatus::RenderFailed, &err.to_string()).await?;
            return Ok(JobOutcome::Done);
        }
    };

    // Step 4: size.
    let sized = match sms_length(&body) {
        Ok(s) => s,
        Err(err) => {
            write_terminal(cfg, group_id, company_id, method, &recipient.number, MessageStatus::RenderFailed, &err.to_string()).await?;
            return Ok(JobOutcome::Done);
        }
    };

    // Step 6: choose originator by the request's declared country (not the
    // validated number's calling code, which can differ e.g. for toll-free
    // or ported numbers).
    let originator = match message.country_code.as_str() {
        "US" => cfg.us_send_number.clone().unwrap_or_else(|| message.from_name.clone()),
        "CA" => cfg.ca_send_number.clone().unwrap_or_else(|| message.from_name.clone()),
        _ => cfg.tc_registered_originator.clone().unwrap_or_else(|| message.from_name.clone()),
    };

    match message.method {
        morpheus_types::SmsSendMethod::SmsTest => {
            if let Some(dir) = &cfg.test_output {
                write_test_output(dir, &validated.number, &body).await;
            }
            let extra = json!({"length": sized.length, "parts": sized.parts});
            store(
                cfg, group_id, company_id, method, &recipient, &validated.number, &body,
                None, Some(SMS_TEST_COST_PER_PART * sized.parts as f64), extra, &message.tags, &links,
            )
            .await
        }
        morpheus_types::SmsSendMethod::SmsMessagebird => {
            let cost = compute_cost(&cfg.kv, &cfg.messagebird, &message.country_code, &validated.number, sized.parts).await;
            match cfg.messagebird.send_sms(&originator, &body, &validated.number).await {
                Ok(result) => {
                    if result.recipients.total_count != 1 {
                        tracing::error!(number = %validated.number, count = result.recipients.total_count, "unexpected recipient count, persisting anyway");
                    }
                    let extra = json!({"length": sized.length, "parts": sized.parts});
                    store(cfg, group_id, company_id, method, &recipient, &validated.number, &body, Some(&result.id), cost, extra, &message.tags, &links).await
                }
                Err(err) => classify_send_failure(cfg, group_id, company_id, method, &recipient.number, job_try, err).await,
            }
        }
    }
}

async fn compute_cost(
    kv: &KvPool,
    messagebird: &morpheus_providers::MessageBirdClient,
    country_code: &str,
    e164_number: &str,
    parts: u32,
) -> Option<f64> {
    let mcc = match morpheus_kv::ops::get_messagebird_mcc(kv, country_code).await {
        Ok(Some(mcc)) => mcc,
        _ => {
            if let Err(err) = messagebird.hlr_lookup(e164_number).await {
                tracing::warn!(error = %err, "hlr lookup request failed");
                return None;
            }
            match messagebird.poll_lookup_until_active(e164_number).await {
                Ok(lookup) => {
                    let Some(network) = lookup.network else { return None };
                    let mcc = network.to_string().chars().take(3).collect::<String>();
                    let _ = morpheus_kv::ops::set_messagebird_mcc(kv, country_code, &mcc).await;
                    mcc
                }
                Err(err) => {
                    tracing::warn!(error = %err, "hlr lookup polling failed");
                    return None;
                }
            }
        }
    };

    let rates = morpheus_kv::ops::get_messagebird_rates(kv).await.ok()?;
    let rate: f64 = rates.get(&mcc).or_else(|| rates.get("0")).and_then(|r| r.parse().ok())?;
    Some(rate * parts as f64)
}

async fn classify_send_failure(
    cfg: &WorkerConfig,
    group_id: i64,
    company_id: i64,
    method: morpheus_types::Method,
    number: &str,
    job_try: u32,
    err: ApiError,
) -> anyhow::Result<JobOutcome> {
    if err.is_transient() {
        return Ok(JobOutcome::Retry { defer_ms: defer_ms_for_try(job_try) });
    }
    write_terminal(cfg, group_id, company_id, method, number, MessageStatus::SendRequestFailed, &err.to_string()).await?;
    Ok(JobOutcome::Done)
}

#[allow(clippy::too_many_arguments)]
async fn store(
    cfg: &WorkerConfig,
    group_id: i64,
    company_id: i64,
    method: morpheus_types::Method,
    recipient: &morpheus_types::SmsRecipientModel,
    number: &str,
    body: &str,
    external_id: Option<&str>,
    cost: Option<f64>,
    extra: Value,
    tags: &[String],
    links: &morpheus_template::ShortenedLinks,
) -> anyhow::Result<JobOutcome> {
    let mut all_tags = tags.to_vec();
    all_tags.extend(recipient.tags.iter().cloned());

    insert_message_with_links(
        &cfg.db,
        NewMessage {
            external_id,
            group_id,
            company_id,
            method,
            status: MessageStatus::Send,
            to_first_name: recipient.first_name.as_deref(),
            to_last_name: recipient.last_name.as_deref(),
            to_user_link: recipient.user_link.as_deref(),
            to_address: number,
            tags: &all_tags,
            subject: None,
            body: Some(body),
            attachments: &[],
            cost,
            extra,
        },
        links,
    )
    .await?;
    Ok(JobOutcome::Done)
}

async fn write_terminal(
    cfg: &WorkerConfig,
    group_id: i64,
    company_id: i64,
    method: morpheus_types::Method,
    number: &str,
    status: MessageStatus,
    body: &str,
) -> anyhow::Result<()> {
    insert_message_with_links(
        &cfg.db,
        NewMessage {
            external_id: None,
            group_id,
            company_id,
            method,
            status,
            to_first_name: None,
            to_last_name: None,
            to_user_link: None,
            to_address: number,
            tags: &[],
            subject: None,
            body: Some(body),
            attachments: &[],
            cost: None,
            extra: Value::Object(Map::new()),
        },
        &[],
    )
    .await?;
    Ok(())
}

async fn write_test_output(dir: &std::path::Path, number: &str, body: &str) {
    let sanitized: String = number.chars().filter(|c| c.is_alphanumeric()).collect();
    let path = dir.join(format!("{sanitized}.txt"));
    if let Err(err) = tokio::fs::write(&path, body).await {
        tracing::warn!(error = %err, path = %path.display(), "failed to write test output");
    }
}
