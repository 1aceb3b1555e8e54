//! Click Tracker job handler (spec.md §4.12 `store_click`). The redirect
//! itself, including the per-(link,ip) dedup via `claim_click`, lives in
//! the server crate; this only writes the resulting Event once the click
//! has been admitted.

use crate::jobs::StoreClickJob;
use morpheus_db::queries::{get_link, insert_event};
use morpheus_types::MessageStatus;
use serde_json::json;
use sqlx::PgPool;
use woothee::parser::Parser;

pub async fn store_click(db: &PgPool, job: StoreClickJob) -> anyhow::Result<()> {
    let link = get_link(db, job.link_id).await?;
    let user_agent_display = job.user_agent.as_deref().map(display_user_agent);

    let extra = json!({
        "target": link.url,
        "ip": job.ip,
        "user_agent": job.user_agent,
        "user_agent_display": user_agent_display,
    });

    insert_event(db, link.message_id, MessageStatus::Click, job.ts, extra).await?;
    Ok(())
}

/// `"{family} {major} on {platform}"`, e.g. `"Chrome 120 on Windows 10"`.
/// Falls back to the raw string when `woothee` can't classify it.
fn display_user_agent(ua: &str) -> String {
    let Some(result) = Parser::new().parse(ua) else {
        return ua.to_string();
    };
    let major = result.version.split('.').next().unwrap_or(&result.version);
    format!("{} {} on {}", result.name, major, result.os)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unparseable_user_agent_falls_back_to_raw() {
        assert_eq!(display_user_agent("totally-not-a-browser"), "totally-not-a-browser");
    }

    #[test]
    fn chrome_on_windows_formats_family_major_platform() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let display = display_user_agent(ua);
        assert!(display.starts_with("Chrome 120 on "), "got: {display}");
    }
}
