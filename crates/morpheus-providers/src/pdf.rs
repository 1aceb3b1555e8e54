//! PDF rendering service client (a black-box collaborator per spec.md §2
//! Non-goals; only its contract is implemented here).

use crate::error::ApiError;
use crate::request::{request_bytes, DEFAULT_TIMEOUT};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};

pub struct PdfOptions {
    pub page_size: String,
    pub zoom: String,
    pub margin_left: String,
    pub margin_right: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            zoom: "1".to_string(),
            margin_left: "10mm".to_string(),
            margin_right: "10mm".to_string(),
        }
    }
}

pub struct PdfClient {
    http: reqwest::Client,
    base_url: Url,
}

impl PdfClient {
    pub fn new(base_url: Url) -> Self {
        Self { http: reqwest::Client::new(), base_url }
    }

    /// POSTs `html`, returning the rendered PDF bytes. PDF failures are
    /// logged and skipped by the caller, not retried (spec.md §4.9 step 4).
    pub async fn render(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        headers.insert(
            HeaderName::from_static("pdf_page_size"),
            HeaderValue::from_str(&options.page_size).unwrap_or(HeaderValue::from_static("A4")),
        );
        headers.insert(
            HeaderName::from_static("pdf_zoom"),
            HeaderValue::from_str(&options.zoom).unwrap_or(HeaderValue::from_static("1")),
        );
        headers.insert(
            HeaderName::from_static("pdf_margin_left"),
            HeaderValue::from_str(&options.margin_left).unwrap_or(HeaderValue::from_static("10mm")),
        );
        headers.insert(
            HeaderName::from_static("pdf_margin_right"),
            HeaderValue::from_str(&options.margin_right).unwrap_or(HeaderValue::from_static("10mm")),
        );

        request_bytes(
            &self.http,
            Method::POST,
            self.base_url.clone(),
            &[200],
            DEFAULT_TIMEOUT,
            headers,
            Some(html.as_bytes().to_vec()),
        )
        .await
    }
}
