//! The typed `ApiError(method, url, status, body)` spec.md §4.7 calls for,
//! grounded on `kumo-api-client`'s request/response plumbing but using
//! `thiserror` instead of `anyhow::bail!` so callers (the send workers) can
//! pattern-match transient-vs-permanent without string inspection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} returned {status}: {body}")]
    Status { method: String, url: String, status: u16, body: String },

    #[error("{method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url}: invalid response body: {body}")]
    Decode { method: String, url: String, body: String },
}

impl ApiError {
    /// Transport errors, 502/504, and 500-with-nginx-marker are transient
    /// (spec.md §4.9 "Retry/failure classification"); everything else is
    /// permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, body, .. } => {
                matches!(status, 502 | 504) || (*status == 500 && body.contains("<center>nginx/"))
            }
            Self::Decode { .. } => false,
        }
    }
}
