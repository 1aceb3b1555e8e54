//! C1: the Template Engine. A pure function (modulo shortened-link token
//! randomness) from a message definition to a rendered email, composed of
//! small ordered transforms over a `(context, headers, subject, body)`
//! tuple, per spec.md §9 "templating pipeline composition".
//!
//! Grounded on `src/render/main.py::render_email` in the original
//! implementation, rebuilt on the teacher's `kumo-template` wrapper idiom
//! (one `TemplateEngine` owning a registry, `render()` as the sole escape
//! hatch into the underlying library).

pub mod engine;
pub mod links;
pub mod macros;
pub mod markdown;

pub use engine::{TemplateEngine, TemplateError};
pub use links::{apply_short_links, apply_short_links_with_rng, ShortenedLinks};

use rand::RngCore;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Everything C1 needs to render one recipient's email. Recipient-level
/// context/headers must already be merged into `context`/`headers` by the
/// caller (spec.md §4.9 step 2): C1 itself does no merging across sources.
#[derive(Debug, Clone)]
pub struct MessageDef {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub main_template: String,
    pub subject_template: String,
    pub mustache_partials: HashMap<String, String>,
    pub macros: BTreeMap<String, String>,
    pub context: Map<String, Value>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct EmailInfo {
    pub full_name: String,
    pub subject: String,
    pub html_body: String,
    pub headers: HashMap<String, String>,
    pub shortened_link: ShortenedLinks,
}

static STYLES_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{ *styles *\}\}\}").unwrap());

/// True if `main_template` references `{{{ styles }}}`, used by the worker
/// to decide whether to inject a default stylesheet (spec.md §4.9 step 2).
pub fn references_styles_placeholder(main_template: &str) -> bool {
    STYLES_PLACEHOLDER_RE.is_match(main_template)
}

/// Runs the full pipeline for one recipient.
///
/// `click_url`/`token_len` are `None` to disable link shortening entirely
/// (used when no click-tracking host is configured).
pub fn render_email(
    mut m: MessageDef,
    click_url: Option<&str>,
    token_len: usize,
) -> Result<EmailInfo, TemplateError> {
    render_email_with_rng(&mut rand::thread_rng(), m_take(&mut m), click_url, token_len)
}

/// Same as [`render_email`] with an injectable RNG for deterministic token
/// generation (spec.md §8 property 2).
pub fn render_email_with_rng(
    rng: &mut impl RngCore,
    mut m: MessageDef,
    click_url: Option<&str>,
    token_len: usize,
) -> Result<EmailInfo, TemplateError> {
    // Step 1: derive full_name and default context fields.
    let full_name = format!(
        "{} {}",
        m.first_name.as_deref().unwrap_or(""),
        m.last_name.as_deref().unwrap_or("")
    )
    .trim()
    .to_string();

    m.context
        .entry("recipient_name".to_string())
        .or_insert(Value::String(full_name.clone()));
    m.context.entry("recipient_first_name".to_string()).or_insert(Value::String(
        m.first_name.clone().unwrap_or_else(|| full_name.clone()),
    ));
    if let Some(last) = &m.last_name {
        m.context
            .entry("recipient_last_name".to_string())
            .or_insert(Value::String(last.clone()));
    }

    let engine = TemplateEngine::new(&m.mustache_partials)?;

    // Step 2: subject, falling back to the verbatim template on failure.
    let subject = match engine.render(&m.subject_template, &Value::Object(m.context.clone())) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(error = %err, "invalid subject template, passing through verbatim");
            m.subject_template.clone()
        }
    };

    // Step 3: link shortening over top-level context values.
    let shortened_link = match click_url {
        Some(url) => apply_short_links_with_rng(rng, &mut m.context, url, token_len, true),
        None => Vec::new(),
    };

    // Step 4: __md / __sass / __render context post-processing.
    let mut overrides = Map::new();
    for (key, value) in m.context.iter() {
        if let Some(base) = key.strip_suffix("__md") {
            if let Some(s) = value.as_str() {
                overrides.insert(base.to_string(), Value::String(markdown::render_markdown(s)));
            }
        } else if let Some(base) = key.strip_suffix("__sass") {
            if let Some(s) = value.as_str() {
                match markdown::compile_sass(s) {
                    Ok(css) => {
                        overrides.insert(base.to_string(), Value::String(css));
                    }
                    Err(err) => tracing::warn!(error = %err, key, "sass compile failed"),
                }
            }
        } else if let Some(base) = key.strip_suffix("__render") {
            if let Some(s) = value.as_str() {
                let expanded = macros::apply_macros(s, &m.macros);
                let rendered = engine
                    .render(&expanded, &Value::Object(m.context.clone()))
                    .unwrap_or_else(|_| expanded.clone());
                overrides.insert(base.to_string(), Value::String(markdown::render_markdown(&rendered)));
            }
        }
    }
    m.context.insert("email_subject".to_string(), Value::String(subject.clone()));
    for (k, v) in overrides {
        m.context.insert(k, v);
    }

    // Step 5: List-Unsubscribe header.
    if let Some(Value::String(link)) = m.context.get("unsubscribe_link") {
        m.headers
            .entry("List-Unsubscribe".to_string())
            .or_insert_with(|| format!("<{link}>"));
    }

    // Step 6: macro-expand then render the main template.
    let expanded_main = macros::apply_macros(&m.main_template, &m.macros);
    let html_body = engine.render(&expanded_main, &Value::Object(m.context.clone()))?;

    Ok(EmailInfo {
        full_name,
        subject,
        html_body,
        headers: m.headers,
        shortened_link,
    })
}

fn m_take(m: &mut MessageDef) -> MessageDef {
    MessageDef {
        first_name: m.first_name.take(),
        last_name: m.last_name.take(),
        main_template: std::mem::take(&mut m.main_template),
        subject_template: std::mem::take(&mut m.subject_template),
        mustache_partials: std::mem::take(&mut m.mustache_partials),
        macros: std::mem::take(&mut m.macros),
        context: std::mem::take(&mut m.context),
        headers: std::mem::take(&mut m.headers),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn base_def() -> MessageDef {
        MessageDef {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            main_template: "{{{ message }}}".into(),
            subject_template: "Hi {{recipient_first_name}}".into(),
            mustache_partials: HashMap::new(),
            macros: BTreeMap::new(),
            context: serde_json::Map::new(),
            headers: HashMap::new(),
        }
    }

    #[test]
    fn renders_markdown_context_value() {
        let mut m = base_def();
        m.context.insert("message__md".into(), json!("# hi"));
        let info = render_email(m, None, 30).unwrap();
        assert!(info.html_body.contains("<h1>hi</h1>"));
        assert_eq!(info.subject, "Hi Ada");
    }

    #[test]
    fn invalid_subject_template_passes_through_verbatim() {
        let mut m = base_def();
        m.subject_template = "{{x".into();
        m.context.insert("message__md".into(), json!("body"));
        let info = render_email(m, None, 30).unwrap();
        assert_eq!(info.subject, "{{x");
    }

    #[test]
    fn deterministic_with_seeded_rng() {
        let mut m = base_def();
        m.context.insert("signup_link".into(), json!("https://example.com/go"));
        m.context.insert("message__md".into(), json!("hi"));

        let mut rng1 = StdRng::seed_from_u64(42);
        let out1 = render_email_with_rng(&mut rng1, m.clone(), Some("https://c.example/l"), 12).unwrap();
        let mut rng2 = StdRng::seed_from_u64(42);
        let out2 = render_email_with_rng(&mut rng2, m, Some("https://c.example/l"), 12).unwrap();

        assert_eq!(out1.html_body, out2.html_body);
        assert_eq!(out1.shortened_link, out2.shortened_link);
    }

    #[test]
    fn unsubscribe_link_sets_header_when_absent() {
        let mut m = base_def();
        m.context.insert("unsubscribe_link".into(), json!("https://example.com/unsub"));
        m.context.insert("message__md".into(), json!("bye"));
        let info = render_email(m, None, 30).unwrap();
        assert_eq!(
            info.headers.get("List-Unsubscribe").map(String::as_str),
            Some("<https://example.com/unsub>")
        );
    }
}
