//! The shared `GET/POST/PUT/DELETE(uri, allowed_statuses, timeout?,
//! headers?, body)` primitive every provider client is built on (spec.md
//! §4.7), ported from `ApiSession.request` in the original implementation
//! and restructured around `kumo-api-client`'s single `request_with_*`
//! chokepoint.

use crate::error::ApiError;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues one HTTP call and returns the parsed JSON body, or a typed
/// [`ApiError`] if the transport failed or the status fell outside
/// `allowed_statuses`.
pub async fn request_json(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    allowed_statuses: &[u16],
    timeout: Duration,
    headers: HeaderMap,
    body: Option<&Value>,
) -> Result<Value, ApiError> {
    let err_method = method.to_string();
    let err_url = url.to_string();

    let mut req = client.request(method, url).timeout(timeout).headers(headers);
    if let Some(body) = body {
        req = req.json(body);
    }

    let response = req.send().await.map_err(|source| ApiError::Transport {
        method: err_method.clone(),
        url: err_url.clone(),
        source,
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
        method: err_method.clone(),
        url: err_url.clone(),
        source,
    })?;
    let body_text = String::from_utf8_lossy(&bytes).into_owned();

    if !allowed_statuses.contains(&status.as_u16()) {
        return Err(ApiError::Status {
            method: err_method,
            url: err_url,
            status: status.as_u16(),
            body: body_text,
        });
    }

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::Decode { method: err_method, url: err_url, body: body_text })
}

/// Like [`request_json`] but hands the status code back to the caller
/// instead of collapsing it into an error, for endpoints where an
/// "unexpected" status still carries a meaningful body (Mandrill's
/// subaccount endpoints return 500 for an already-existing subaccount).
pub async fn request_json_with_status(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    allowed_statuses: &[u16],
    timeout: Duration,
    headers: HeaderMap,
    body: Option<&Value>,
) -> Result<(u16, Value), ApiError> {
    let err_method = method.to_string();
    let err_url = url.to_string();

    let mut req = client.request(method, url).timeout(timeout).headers(headers);
    if let Some(body) = body {
        req = req.json(body);
    }

    let response = req.send().await.map_err(|source| ApiError::Transport {
        method: err_method.clone(),
        url: err_url.clone(),
        source,
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
        method: err_method.clone(),
        url: err_url.clone(),
        source,
    })?;
    let body_text = String::from_utf8_lossy(&bytes).into_owned();

    if !allowed_statuses.contains(&status.as_u16()) {
        return Err(ApiError::Status {
            method: err_method,
            url: err_url,
            status: status.as_u16(),
            body: body_text,
        });
    }

    if bytes.is_empty() {
        return Ok((status.as_u16(), Value::Null));
    }
    let json = serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::Decode { method: err_method, url: err_url, body: body_text })?;
    Ok((status.as_u16(), json))
}

/// Issues one HTTP call and returns the raw response bytes, used by the PDF
/// client whose response is a binary payload, not JSON.
pub async fn request_bytes(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    allowed_statuses: &[u16],
    timeout: Duration,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
) -> Result<Vec<u8>, ApiError> {
    let err_method = method.to_string();
    let err_url = url.to_string();

    let mut req = client.request(method, url).timeout(timeout).headers(headers);
    if let Some(body) = body {
        req = req.body(body);
    }

    let response = req.send().await.map_err(|source| ApiError::Transport {
        method: err_method.clone(),
        url: err_url.clone(),
        source,
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
        method: err_method.clone(),
        url: err_url.clone(),
        source,
    })?;

    if !allowed_statuses.contains(&status.as_u16()) {
        return Err(ApiError::Status {
            method: err_method,
            url: err_url,
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok(bytes.to_vec())
}
