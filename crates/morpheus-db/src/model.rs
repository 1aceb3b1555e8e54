//! Row types for C4's five durable tables (spec.md §3 DATA MODEL).

use chrono::{DateTime, Utc};
use morpheus_types::{MessageStatus, Method};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Company {
    pub id: i64,
    pub code: String,
}

impl FromRow<'_, PgRow> for Company {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self { id: row.try_get("id")?, code: row.try_get("code")? })
    }
}

#[derive(Debug, Clone)]
pub struct MessageGroup {
    pub id: i64,
    pub uuid: String,
    pub company_id: i64,
    pub method: Method,
    pub created_ts: DateTime<Utc>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

impl FromRow<'_, PgRow> for MessageGroup {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            company_id: row.try_get("company_id")?,
            method: parse_method(row, "method")?,
            created_ts: row.try_get("created_ts")?,
            from_email: row.try_get("from_email")?,
            from_name: row.try_get("from_name")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub external_id: Option<String>,
    pub group_id: i64,
    pub company_id: i64,
    pub method: Method,
    pub send_ts: DateTime<Utc>,
    pub update_ts: DateTime<Utc>,
    pub status: MessageStatus,
    pub to_first_name: Option<String>,
    pub to_last_name: Option<String>,
    pub to_user_link: Option<String>,
    pub to_address: String,
    pub tags: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub attachments: Vec<String>,
    pub cost: Option<f64>,
    pub extra: Value,
}

impl FromRow<'_, PgRow> for Message {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            group_id: row.try_get("group_id")?,
            company_id: row.try_get("company_id")?,
            method: parse_method(row, "method")?,
            send_ts: row.try_get("send_ts")?,
            update_ts: row.try_get("update_ts")?,
            status: parse_status(row, "status")?,
            to_first_name: row.try_get("to_first_name")?,
            to_last_name: row.try_get("to_last_name")?,
            to_user_link: row.try_get("to_user_link")?,
            to_address: row.try_get("to_address")?,
            tags: row.try_get("tags")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            attachments: row.try_get("attachments")?,
            cost: row.try_get("cost")?,
            extra: row.try_get("extra")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub message_id: i64,
    pub status: MessageStatus,
    pub ts: DateTime<Utc>,
    pub extra: Value,
}

impl FromRow<'_, PgRow> for Event {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            message_id: row.try_get("message_id")?,
            status: parse_status(row, "status")?,
            ts: row.try_get("ts")?,
            extra: row.try_get("extra")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Link {
    pub id: i64,
    pub message_id: i64,
    pub token: String,
    pub url: String,
}

impl FromRow<'_, PgRow> for Link {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            message_id: row.try_get("message_id")?,
            token: row.try_get("token")?,
            url: row.try_get("url")?,
        })
    }
}

/// One row of `message_aggregation` (spec.md §4.4 / §4.13).
#[derive(Debug, Clone)]
pub struct AggregationRow {
    pub status: MessageStatus,
    pub date: chrono::NaiveDate,
    pub count: i64,
}

impl FromRow<'_, PgRow> for AggregationRow {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            status: parse_status(row, "status")?,
            date: row.try_get("date")?,
            count: row.try_get("count")?,
        })
    }
}

fn parse_method(row: &PgRow, col: &str) -> sqlx::Result<Method> {
    let raw: String = row.try_get(col)?;
    Method::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

fn parse_status(row: &PgRow, col: &str) -> sqlx::Result<MessageStatus> {
    let raw: String = row.try_get(col)?;
    MessageStatus::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}
