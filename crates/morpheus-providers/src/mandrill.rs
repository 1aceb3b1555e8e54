//! Mandrill-style email provider client (spec.md §6 "Provider requests
//! (egress)"). Auth is injected as a `key` field merged into every request
//! body, per `Mandrill.request` in the original implementation.

use crate::error::ApiError;
use crate::request::{request_json, request_json_with_status, DEFAULT_TIMEOUT};
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const SUBACCOUNT_TIMEOUT: Duration = Duration::from_secs(12);
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

pub struct MandrillClient {
    http: reqwest::Client,
    base_url: Url,
    key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandrillRecipient {
    pub email: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandrillAttachment {
    #[serde(rename = "type")]
    pub mime_type: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MandrillMessage {
    pub html: String,
    pub subject: String,
    pub from_email: String,
    pub from_name: Option<String>,
    pub to: Vec<MandrillRecipient>,
    pub headers: std::collections::HashMap<String, String>,
    pub track_opens: bool,
    pub auto_text: bool,
    pub view_content_link: bool,
    pub signing_domain: Option<String>,
    pub subaccount: Option<String>,
    pub tags: Vec<String>,
    pub inline_css: bool,
    pub important: bool,
    pub attachments: Vec<MandrillAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MandrillSendResult {
    pub email: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub status: String,
}

impl MandrillClient {
    pub fn new(base_url: Url, key: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url, key: key.into() }
    }

    fn with_key(&self, mut body: Value) -> Value {
        body["key"] = json!(self.key);
        body
    }

    async fn post(
        &self,
        path: &str,
        body: Value,
        timeout: Duration,
        allowed_statuses: &[u16],
    ) -> Result<Value, ApiError> {
        let url = self.base_url.join(path).expect("valid mandrill path");
        request_json(
            &self.http,
            Method::POST,
            url,
            allowed_statuses,
            timeout,
            HeaderMap::new(),
            Some(&self.with_key(body)),
        )
        .await
    }

    /// `messages/send.json`, 15s timeout (spec.md §4.9 step 6).
    pub async fn send(&self, message: &MandrillMessage) -> Result<Vec<MandrillSendResult>, ApiError> {
        let body = json!({ "async": true, "message": message });
        let resp = self.post("messages/send.json", body, SEND_TIMEOUT, &[200]).await?;
        serde_json::from_value(resp.clone()).map_err(|_| ApiError::Decode {
            method: "POST".into(),
            url: "messages/send.json".into(),
            body: resp.to_string(),
        })
    }

    /// A 500 here can still mean "subaccount already exists" with a
    /// usable body, so the status is handed back rather than turned into
    /// an error (spec.md §6 `create-subaccount`).
    pub async fn subaccount_add(&self, id: &str, name: &str) -> Result<(u16, Value), ApiError> {
        let url = self.base_url.join("subaccounts/add.json").expect("valid mandrill path");
        request_json_with_status(
            &self.http,
            Method::POST,
            url,
            &[200, 500],
            SUBACCOUNT_TIMEOUT,
            HeaderMap::new(),
            Some(&self.with_key(json!({"id": id, "name": name}))),
        )
        .await
    }

    pub async fn subaccount_info(&self, id: &str) -> Result<Value, ApiError> {
        self.post("subaccounts/info.json", json!({"id": id}), SUBACCOUNT_TIMEOUT, &[200]).await
    }

    pub async fn subaccount_delete(&self, id: &str) -> Result<(u16, Value), ApiError> {
        let url = self.base_url.join("subaccounts/delete.json").expect("valid mandrill path");
        request_json_with_status(
            &self.http,
            Method::POST,
            url,
            &[200, 500],
            SUBACCOUNT_TIMEOUT,
            HeaderMap::new(),
            Some(&self.with_key(json!({"id": id}))),
        )
        .await
    }

    pub async fn webhooks_list(&self) -> Result<Value, ApiError> {
        self.post("webhooks/list.json", json!({}), DEFAULT_TIMEOUT, &[200]).await
    }

    pub async fn webhooks_add(&self, url: &str, events: &[String]) -> Result<Value, ApiError> {
        self.post("webhooks/add.json", json!({"url": url, "events": events}), DEFAULT_TIMEOUT, &[200]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::ServerGuard) -> MandrillClient {
        MandrillClient::new(Url::parse(&server.url()).unwrap(), "test-key")
    }

    #[tokio::test]
    async fn subaccount_add_reports_200_as_created() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/subaccounts/add.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "acme", "name": "Acme"}"#)
            .create_async()
            .await;

        let (status, body) = client(&server).subaccount_add("acme", "Acme").await.unwrap();

        mock.assert_async().await;
        assert_eq!(status, 200);
        assert_eq!(body["id"], "acme");
    }

    #[tokio::test]
    async fn subaccount_add_surfaces_500_body_instead_of_erroring() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/subaccounts/add.json")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "ValidationError", "message": "A subaccount with id acme already exists"}"#)
            .create_async()
            .await;

        let (status, body) = client(&server).subaccount_add("acme", "Acme").await.unwrap();

        assert_eq!(status, 500);
        assert_eq!(body["name"], "ValidationError");
    }

    #[tokio::test]
    async fn subaccount_add_rejects_unexpected_status() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/subaccounts/add.json").with_status(403).create_async().await;

        let err = client(&server).subaccount_add("acme", "Acme").await.unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn send_decodes_into_typed_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/messages/send.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"email": "a@example.com", "_id": "abc123", "status": "sent"}]"#)
            .create_async()
            .await;

        let message = MandrillMessage {
            html: "<p>hi</p>".into(),
            subject: "hi".into(),
            from_email: "from@example.com".into(),
            from_name: None,
            to: vec![MandrillRecipient { email: "a@example.com".into(), name: None, kind: "to" }],
            headers: Default::default(),
            track_opens: true,
            auto_text: true,
            view_content_link: false,
            signing_domain: None,
            subaccount: None,
            tags: vec![],
            inline_css: false,
            important: false,
            attachments: vec![],
        };

        let results = client(&server).send(&message).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "abc123");
        assert_eq!(results[0].status, "sent");
    }
}
