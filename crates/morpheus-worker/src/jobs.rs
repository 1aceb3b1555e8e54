//! Job payload shapes enqueued by the Ingest/Webhook/Click APIs and
//! consumed by this crate's handlers. Kept separate from the wire request
//! types in `morpheus-types`: a job only ever carries one recipient plus
//! the group's shared message fields (spec.md §4.8 admission step 5,
//! "`(group_id, company_id, recipient, m_without_recipients)`").

use chrono::{DateTime, Utc};
use morpheus_types::{EmailRecipientModel, EmailSendMethod, SmsRecipientModel, SmsSendMethod};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJobMessage {
    pub main_template: String,
    pub mustache_partials: HashMap<String, String>,
    pub macros: BTreeMap<String, String>,
    pub subject_template: String,
    pub from_address: String,
    pub method: EmailSendMethod,
    pub subaccount: Option<String>,
    pub tags: Vec<String>,
    pub context: HashMap<String, serde_json::Value>,
    pub headers: HashMap<String, String>,
    pub important: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailJob {
    pub group_id: i64,
    pub company_id: i64,
    pub recipient: EmailRecipientModel,
    pub message: EmailJobMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsJobMessage {
    pub main_template: String,
    pub cost_limit: Option<f64>,
    pub country_code: String,
    pub from_name: String,
    pub method: SmsSendMethod,
    pub tags: Vec<String>,
    pub context: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSmsJob {
    pub group_id: i64,
    pub company_id: i64,
    pub recipient: SmsRecipientModel,
    pub message: SmsJobMessage,
}

/// One incoming webhook event, normalized by the ingest endpoint before
/// enqueue (spec.md §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessageStatusJob {
    pub method: String,
    pub external_id: String,
    pub status: morpheus_types::MessageStatus,
    pub ts: DateTime<Utc>,
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreClickJob {
    pub link_id: i64,
    pub ip: String,
    pub ts: DateTime<Utc>,
    pub user_agent: Option<String>,
}
