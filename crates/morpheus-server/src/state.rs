//! Shared server state, grounded on the teacher's rule that global mutable
//! state (provider clients, db pool, kv pool, secrets) is lifted into an
//! explicit context struct rather than process-wide singletons (spec.md §9
//! "Global mutable state"). `morpheus-worker::WorkerConfig` does the same
//! thing for the worker process; this is the server's analogue.

use morpheus_kv::KvPool;
use morpheus_providers::{MandrillClient, MessageBirdClient, PdfClient};
use sqlx::PgPool;
use std::sync::Arc;

pub struct Secrets {
    /// Ingest API shared secret (spec.md §6 `Authorization: <shared-secret>`).
    pub auth_key: String,
    /// HMAC-SHA256 key for query-API signed tokens.
    pub user_auth_key: Vec<u8>,
    /// HMAC-SHA1 key for Mandrill webhook signatures.
    pub webhook_auth_key: Vec<u8>,
}

pub struct Inner {
    pub db: PgPool,
    pub kv: KvPool,
    pub mandrill: MandrillClient,
    pub messagebird: MessageBirdClient,
    pub pdf: PdfClient,
    pub secrets: Secrets,
    /// Base URL Mandrill signs against (spec.md §4.10): the webhook
    /// endpoint's own externally-visible URL, not `host_name` itself.
    pub mandrill_webhook_url: String,
    pub click_host_name: Option<String>,
}

#[derive(Clone)]
pub struct AppState(Arc<Inner>);

impl AppState {
    pub fn new(inner: Inner) -> Self {
        Self(Arc::new(inner))
    }
}

impl std::ops::Deref for AppState {
    type Target = Inner;

    fn deref(&self) -> &Inner {
        &self.0
    }
}
