//! Link shortening, ported from `apply_short_links`/`looks_like_link` in
//! `src/render/main.py` (spec.md §4.1 step 3).

use base64::Engine as _;
use rand::{Rng, RngCore};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://").unwrap());
static SKIP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\.(?:png|jpg|bmp)$").unwrap(),
        Regex::new(r"^https?://maps\.googleapis\.com").unwrap(),
        Regex::new(r"^https?://maps\.google\.com").unwrap(),
    ]
});

pub fn looks_like_link(v: &Value) -> Option<&str> {
    let s = v.as_str()?;
    if !LINK_RE.is_match(s) {
        return None;
    }
    if SKIP_RES.iter().any(|re| re.is_match(s)) {
        return None;
    }
    Some(s)
}

/// `(original_url, token)` pairs produced for every shortened link, in the
/// order they were encountered in `context`.
pub type ShortenedLinks = Vec<(String, String)>;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn random_token(rng: &mut impl RngCore, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Replaces every top-level link-shaped string value in `context` (except
/// `unsubscribe_link`) with `click_url + token`, optionally appending a
/// base64url-encoded backup of the original URL as `?u=`. Returns the
/// `(original, token)` pairs so the caller can persist `Link` rows.
pub fn apply_short_links(
    context: &mut serde_json::Map<String, Value>,
    click_url: &str,
    token_len: usize,
    backup_arg: bool,
) -> ShortenedLinks {
    apply_short_links_with_rng(&mut rand::thread_rng(), context, click_url, token_len, backup_arg)
}

/// Same as [`apply_short_links`] but with an injectable RNG, so callers that
/// need byte-identical output (spec.md §8 property 2) can seed it.
pub fn apply_short_links_with_rng(
    rng: &mut impl RngCore,
    context: &mut serde_json::Map<String, Value>,
    click_url: &str,
    token_len: usize,
    backup_arg: bool,
) -> ShortenedLinks {
    let mut shortened = ShortenedLinks::new();
    let keys: Vec<String> = context.keys().cloned().collect();

    for key in keys {
        if key == "unsubscribe_link" {
            continue;
        }
        let Some(original) = context.get(&key).and_then(looks_like_link) else {
            continue;
        };
        let original = original.to_string();
        let token = random_token(rng, token_len);
        let mut new_url = format!("{click_url}{token}");
        if backup_arg {
            let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&original);
            new_url.push_str("?u=");
            new_url.push_str(&encoded);
        }
        context.insert(key.clone(), Value::String(new_url));
        context.insert(format!("{key}_original"), Value::String(original.clone()));
        shortened.push((original, token));
    }

    shortened
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn shortens_plain_links_and_skips_images() {
        let mut context = serde_json::Map::new();
        context.insert("signup_link".into(), json!("https://example.com/signup"));
        context.insert("logo".into(), json!("https://example.com/logo.png"));
        context.insert("unsubscribe_link".into(), json!("https://example.com/unsub"));

        let shortened = apply_short_links(&mut context, "https://click.example.com/l", 12, false);

        assert_eq!(shortened.len(), 1);
        assert_eq!(shortened[0].0, "https://example.com/signup");
        assert!(context["signup_link"]
            .as_str()
            .unwrap()
            .starts_with("https://click.example.com/l"));
        // image and unsubscribe link are untouched
        assert_eq!(context["logo"], json!("https://example.com/logo.png"));
        assert_eq!(context["unsubscribe_link"], json!("https://example.com/unsub"));
    }

    #[test]
    fn backup_arg_appends_encoded_original() {
        let mut context = serde_json::Map::new();
        context.insert("link".into(), json!("https://example.com/x"));
        apply_short_links(&mut context, "https://click.example.com/l", 12, true);
        assert!(context["link"].as_str().unwrap().contains("?u="));
    }
}
