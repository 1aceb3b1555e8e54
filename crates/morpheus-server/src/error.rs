//! Typed response errors for the HTTP surface, grounded on kumod's
//! `AppError(anyhow::Error)` newtype but widened into a small enum: unlike
//! `kumod`'s admin API, Morpheus's ingest/query endpoints distinguish
//! validation failures (4xx, spec.md §7) from unexpected internal errors,
//! so a single "everything is a 500" wrapper isn't enough.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PaymentRequired(Value),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "message": msg })),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            Self::Conflict(msg) => (StatusCode::CONFLICT, json!({ "message": msg })),
            Self::PaymentRequired(body) => (StatusCode::PAYMENT_REQUIRED, body),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "unhandled request error");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": "internal error" }))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

/// Maps `DbError::NotFound` onto a 404, everything else onto a 500. Call
/// this explicitly rather than relying on the blanket `From` impl wherever
/// a missing row is a client-facing 404 (message/company lookups).
pub fn not_found_or_internal(err: morpheus_db::error::DbError, msg: &str) -> AppError {
    match err {
        morpheus_db::error::DbError::NotFound => AppError::not_found(msg),
        other => AppError::Internal(other.into()),
    }
}
