//! The HTTP surface: Ingest API (C8), webhook ingest (C10), click tracker
//! (C12), and Query API (C13), grounded on `kumod::http_server`'s
//! router-assembly shape but without its TLS/ACL machinery — Morpheus's
//! three auth schemes are concrete and fixed (spec.md §6).

pub mod auth;
pub mod click;
pub mod error;
pub mod ingest;
pub mod query;
pub mod state;
pub mod webhook;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::net::SocketAddr;

pub fn build_router(state: AppState) -> Router {
    let ingest_routes = Router::new()
        .route("/send/email/", post(ingest::send_email))
        .route("/send/sms/", post(ingest::send_sms))
        .route("/validate/sms/", get(ingest::validate_sms))
        .route("/create-subaccount/{method}/", post(ingest::create_subaccount))
        .route("/delete-subaccount/{method}/", post(ingest::delete_subaccount))
        .route("/billing/{method}/{company_code}/", get(ingest::billing))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::ingest_auth));

    let webhook_routes = Router::new()
        .route("/webhook/test/", post(webhook::webhook_test))
        .route("/webhook/mandrill/", post(webhook::webhook_mandrill))
        .route("/webhook/messagebird/", get(webhook::webhook_messagebird));

    let query_routes = Router::new()
        .route("/messages/{method}/", get(query::list_messages))
        .route("/messages/{method}/{id}/", get(query::message_detail))
        .route("/messages/{method}/{id}/preview/", get(query::message_preview))
        .route("/messages/{method}/aggregation/", get(query::aggregation));

    Router::new()
        .route("/metrics", get(report_metrics))
        .route("/l{token}", get(click::click))
        .merge(ingest_routes)
        .merge(webhook_routes)
        .merge(query_routes)
        .with_state(state)
}

async fn report_metrics() -> Result<String, error::AppError> {
    let report = prometheus::TextEncoder::new().encode_to_string(&prometheus::default_registry().gather())?;
    Ok(report)
}

pub async fn serve(state: AppState, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding listen address {listen_addr}"))?;
    tracing::info!(%listen_addr, "http listener starting");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("http server exited")
}
