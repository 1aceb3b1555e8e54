//! Macro expansion, ported from `_apply_macros` in `src/render/main.py`.
//!
//! A macro definition has the form `name(arg1 | arg2 | …): body` — the
//! signature is the key of the `macros` map, the body is the value. Call
//! sites look like `name(v1 | v2 | …)`; mismatched argument counts leave the
//! call site untouched and log a warning rather than failing the whole
//! render (spec.md §4.1 step 6).

use crate::engine::TemplateEngine;
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static SIGNATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\((.*)\) *$").unwrap());

fn split_args(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Applies every macro in `macros` (in key order, for deterministic output)
/// to `s`, returning the expanded string.
pub fn apply_macros(s: &str, macros: &BTreeMap<String, String>) -> String {
    let mut s = s.to_string();
    let empty_partials: HashMap<String, String> = HashMap::new();
    let Ok(engine) = TemplateEngine::new(&empty_partials) else {
        return s;
    };

    for (signature, body) in macros {
        let Some(caps) = SIGNATURE_RE.captures(signature.trim()) else {
            tracing::warn!(signature = %signature, "invalid macro, skipping it");
            continue;
        };
        let name = caps.get(1).unwrap().as_str();
        let arg_defs = split_args(caps.get(2).unwrap().as_str());

        let Ok(call_re) = Regex::new(&format!(r"{}\((.*?)\)", regex::escape(name))) else {
            continue;
        };

        s = call_re
            .replace_all(&s, |call: &regex::Captures| {
                let arg_values = split_args(&call[1]);
                if arg_values.len() != arg_defs.len() {
                    tracing::warn!(call = %(&call[0]), "invalid macro call, not replacing");
                    return call[0].to_string();
                }
                let mut data = serde_json::Map::new();
                for (k, v) in arg_defs.iter().zip(arg_values.iter()) {
                    data.insert(k.clone(), json!(v));
                }
                engine
                    .render(body, &serde_json::Value::Object(data))
                    .unwrap_or_else(|_| call[0].to_string())
            })
            .into_owned();
    }

    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expands_macro_call() {
        let mut macros = BTreeMap::new();
        macros.insert("greet(name | title)".to_string(), "Hi {{title}} {{name}}".to_string());
        let out = apply_macros("before greet(Ada | Dr) after", &macros);
        assert_eq!(out, "before Hi Dr Ada after");
    }

    #[test]
    fn leaves_call_unreplaced_on_arity_mismatch() {
        let mut macros = BTreeMap::new();
        macros.insert("greet(name | title)".to_string(), "Hi {{title}} {{name}}".to_string());
        let out = apply_macros("before greet(OnlyOne) after", &macros);
        assert_eq!(out, "before greet(OnlyOne) after");
    }

    #[test]
    fn invalid_signature_is_skipped() {
        let mut macros = BTreeMap::new();
        macros.insert("not a signature".to_string(), "body".to_string());
        let out = apply_macros("text", &macros);
        assert_eq!(out, "text");
    }
}
