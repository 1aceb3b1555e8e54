//! Request bodies for the Ingest API (spec.md §6 "EmailSend" / "SmsSend").

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::method::{EmailSendMethod, SmsSendMethod};

fn default_main_template() -> String {
    "{{{ message }}}".to_string()
}

fn default_from_name() -> String {
    "Morpheus".to_string()
}

fn default_country_code() -> String {
    "GB".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentModel {
    pub name: String,
    pub mime_type: String,
    /// base64 if already encoded by the caller, otherwise raw bytes are
    /// accepted and re-encoded by the worker (spec.md §4.9 step 4).
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfAttachmentModel {
    pub name: String,
    pub html: Option<String>,
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipientModel {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_link: Option<String>,
    pub address: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub pdf_attachments: Vec<PdfAttachmentModel>,
    #[serde(default)]
    pub attachments: Vec<AttachmentModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSendModel {
    pub uid: Uuid,
    #[serde(default = "default_main_template")]
    pub main_template: String,
    #[serde(default)]
    pub mustache_partials: HashMap<String, String>,
    /// `BTreeMap` rather than `HashMap`: macro application order must be
    /// deterministic so that render output is reproducible (spec.md §8
    /// property 2) even when several macros could textually overlap.
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
    pub subject_template: String,
    pub company_code: String,
    pub from_address: String,
    pub method: EmailSendMethod,
    pub subaccount: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub important: bool,
    pub recipients: Vec<EmailRecipientModel>,
}

/// `from_address` parsed into `Name <email>` or just `email`.
#[derive(Debug, Clone)]
pub struct FromAddress {
    pub name: Option<String>,
    pub email: String,
}

impl FromAddress {
    pub fn parse(raw: &str) -> Self {
        if let Some(lt) = raw.find('<') {
            if let Some(gt) = raw.rfind('>') {
                if gt > lt {
                    let name = raw[..lt].trim().trim_matches('"').to_string();
                    let email = raw[lt + 1..gt].trim().to_string();
                    return Self {
                        name: if name.is_empty() { None } else { Some(name) },
                        email,
                    };
                }
            }
        }
        Self {
            name: None,
            email: raw.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsRecipientModel {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_link: Option<String>,
    pub number: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSendModel {
    pub uid: String,
    #[serde(default = "default_main_template")]
    pub main_template: String,
    pub company_code: String,
    pub cost_limit: Option<f64>,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    pub method: SmsSendMethod,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub recipients: Vec<SmsRecipientModel>,
}

/// Body of `POST /create-subaccount/{method}/` and `/delete-subaccount/{method}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubaccountModel {
    pub company_code: String,
    pub company_name: Option<String>,
}

/// Body of `GET /validate/sms/`: an index-keyed batch of raw numbers to
/// validate against one shared default country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsNumbersModel {
    pub numbers: BTreeMap<String, String>,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_name_and_email() {
        let f = FromAddress::parse("Acme <hello@acme.test>");
        assert_eq!(f.name.as_deref(), Some("Acme"));
        assert_eq!(f.email, "hello@acme.test");

        let f = FromAddress::parse("hello@acme.test");
        assert_eq!(f.name, None);
        assert_eq!(f.email, "hello@acme.test");
    }
}
