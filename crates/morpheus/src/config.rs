//! TOML configuration, keyed exactly on spec.md §6's recognized options.
//! Secrets (`auth_key`, `user_auth_key`, `webhook_auth_key`, the two
//! provider keys) may also be supplied via environment variables so they
//! don't need to sit in a file on disk; env wins when both are set.

use serde::Deserialize;
use std::path::PathBuf;

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_host_name() -> String {
    "localhost".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> i64 {
    365
}

fn default_aggregation_window_days() -> i64 {
    90
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    pub pg_dsn: String,
    pub redis_url: String,

    pub auth_key: String,
    pub user_auth_key: String,
    pub webhook_auth_key: String,

    pub mandrill_key: String,
    pub mandrill_url: String,
    pub messagebird_key: String,
    pub messagebird_url: String,
    /// Webhook endpoint's own externally-visible URL; Mandrill signs
    /// against this, not `host_name` (spec.md §4.10).
    pub mandrill_webhook_url: String,

    #[serde(default)]
    pub click_host_name: Option<String>,
    #[serde(default = "default_host_name")]
    pub host_name: String,

    #[serde(default)]
    pub us_send_number: Option<String>,
    #[serde(default)]
    pub ca_send_number: Option<String>,
    #[serde(default)]
    pub tc_registered_originator: Option<String>,

    #[serde(default)]
    pub test_output: Option<PathBuf>,
    pub pdf_service_url: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub verbose_http_errors: bool,

    #[serde(default = "default_true")]
    pub update_aggregation_view: bool,
    #[serde(default = "default_true")]
    pub delete_old_emails: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_aggregation_window_days")]
    pub aggregation_window_days: i64,
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let mut cfg: Config = toml::from_str(&raw)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MORPHEUS_AUTH_KEY") {
            self.auth_key = v;
        }
        if let Ok(v) = std::env::var("MORPHEUS_USER_AUTH_KEY") {
            self.user_auth_key = v;
        }
        if let Ok(v) = std::env::var("MORPHEUS_WEBHOOK_AUTH_KEY") {
            self.webhook_auth_key = v;
        }
        if let Ok(v) = std::env::var("MORPHEUS_MANDRILL_KEY") {
            self.mandrill_key = v;
        }
        if let Ok(v) = std::env::var("MORPHEUS_MESSAGEBIRD_KEY") {
            self.messagebird_key = v;
        }
        if let Ok(v) = std::env::var("MORPHEUS_PG_DSN") {
            self.pg_dsn = v;
        }
        if let Ok(v) = std::env::var("MORPHEUS_REDIS_URL") {
            self.redis_url = v;
        }
    }
}
