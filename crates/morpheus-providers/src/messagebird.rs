//! MessageBird-style SMS provider client (spec.md §6). Auth is injected as
//! an `Authorization: AccessKey <key>` header, per `MessageBird.request` in
//! the original implementation.

use crate::error::ApiError;
use crate::request::{request_json, DEFAULT_TIMEOUT};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub struct MessageBirdClient {
    http: reqwest::Client,
    base_url: Url,
    key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendResult {
    pub id: String,
    pub recipients: RecipientsSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipientsSummary {
    #[serde(rename = "totalCount")]
    pub total_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HlrLookup {
    pub status: String,
    pub network: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingResponse {
    pub prices: Vec<PriceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceEntry {
    pub mcc: String,
    pub price: f64,
}

impl MessageBirdClient {
    pub fn new(base_url: Url, key: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url, key: key.into() }
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("AccessKey {}", self.key))
            .expect("access key has no invalid header characters");
        headers.insert(AUTHORIZATION, value);
        headers
    }

    /// `messages`, `allowed_statuses=201` (spec.md §4.9 step 8).
    pub async fn send_sms(
        &self,
        originator: &str,
        body: &str,
        recipient_e164: &str,
    ) -> Result<SendResult, ApiError> {
        let url = self.base_url.join("messages").expect("valid messagebird path");
        let payload = json!({
            "originator": originator,
            "body": body,
            "recipients": [recipient_e164],
            "datacoding": "auto",
            "reference": "morpheus",
        });
        let resp = request_json(
            &self.http,
            Method::POST,
            url,
            &[201],
            DEFAULT_TIMEOUT,
            self.auth_headers(),
            Some(&payload),
        )
        .await?;
        serde_json::from_value(resp.clone()).map_err(|_| ApiError::Decode {
            method: "POST".into(),
            url: "messages".into(),
            body: resp.to_string(),
        })
    }

    /// Triggers an HLR (Home Location Register) lookup for `number`
    /// (spec.md §4.9 step 5).
    pub async fn hlr_lookup(&self, number: &str) -> Result<Value, ApiError> {
        let url = self
            .base_url
            .join(&format!("lookup/{number}/hlr"))
            .expect("valid messagebird path");
        request_json(&self.http, Method::POST, url, &[201, 200], DEFAULT_TIMEOUT, self.auth_headers(), None)
            .await
    }

    /// Polls the lookup result; the caller retries until `status=="active"`
    /// (spec.md §4.9 step 5, up to 30 times at 1s intervals).
    pub async fn get_lookup(&self, number: &str) -> Result<HlrLookup, ApiError> {
        let url = self.base_url.join(&format!("lookup/{number}")).expect("valid messagebird path");
        let resp =
            request_json(&self.http, Method::GET, url, &[200], DEFAULT_TIMEOUT, self.auth_headers(), None)
                .await?;
        let hlr = resp.get("hlr").cloned().unwrap_or(Value::Null);
        serde_json::from_value(hlr.clone()).map_err(|_| ApiError::Decode {
            method: "GET".into(),
            url: format!("lookup/{number}"),
            body: hlr.to_string(),
        })
    }

    /// Polls [`Self::get_lookup`] every second up to 30 times, returning the
    /// first result whose status is `"active"`.
    pub async fn poll_lookup_until_active(&self, number: &str) -> Result<HlrLookup, ApiError> {
        for _ in 0..30 {
            let lookup = self.get_lookup(number).await?;
            if lookup.status == "active" {
                return Ok(lookup);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        self.get_lookup(number).await
    }

    /// `pricing/sms/outbound`, refreshed every 24h by the worker and cached
    /// in C5 (spec.md §4.9 step 5).
    pub async fn pricing_outbound(&self) -> Result<PricingResponse, ApiError> {
        let url = self.base_url.join("pricing/sms/outbound").expect("valid messagebird path");
        let resp =
            request_json(&self.http, Method::GET, url, &[200], DEFAULT_TIMEOUT, self.auth_headers(), None)
                .await?;
        serde_json::from_value(resp.clone()).map_err(|_| ApiError::Decode {
            method: "GET".into(),
            url: "pricing/sms/outbound".into(),
            body: resp.to_string(),
        })
    }
}
