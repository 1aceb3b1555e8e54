//! Everything a job handler needs to do its work, assembled once at
//! startup by the `morpheus` binary and shared (behind an `Arc`) across
//! every concurrent job execution.

use morpheus_providers::{MandrillClient, MessageBirdClient, PdfClient};
use std::path::PathBuf;

pub struct WorkerConfig {
    pub db: sqlx::PgPool,
    pub kv: morpheus_kv::KvPool,
    pub mandrill: MandrillClient,
    pub messagebird: MessageBirdClient,
    pub pdf: PdfClient,
    pub click_host_name: Option<String>,
    pub host_name: String,
    pub test_output: Option<PathBuf>,
    pub us_send_number: Option<String>,
    pub ca_send_number: Option<String>,
    pub tc_registered_originator: Option<String>,
}

/// Token length for shortened links: SMS bodies get the shorter 12-char
/// token (airtime is precious), email bodies get 30 (spec.md §3 Link).
pub const EMAIL_LINK_TOKEN_LEN: usize = 30;
pub const SMS_LINK_TOKEN_LEN: usize = 12;

/// Test-mode cost for `sms-test` sends, `$0.012` per part (spec.md §4.9
/// step 7).
pub const SMS_TEST_COST_PER_PART: f64 = 0.012;
