//! Thin wrapper over `handlebars`, in the spirit of the teacher's
//! `kumo-template::TemplateEngine`: a single place that owns the registry,
//! registers named partials once, and exposes one `render` entry point so
//! the rest of this crate never touches `handlebars` directly.

use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("template error: {0}")]
pub struct TemplateError(String);

impl From<handlebars::RenderError> for TemplateError {
    fn from(e: handlebars::RenderError) -> Self {
        Self(e.to_string())
    }
}

impl From<handlebars::TemplateError> for TemplateError {
    fn from(e: handlebars::TemplateError) -> Self {
        Self(e.to_string())
    }
}

pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    /// Builds an engine with `partials` registered by name, so `{{> name}}`
    /// includes resolve against the caller-supplied
    /// `mustache_partials` map (spec.md §4.1).
    pub fn new(partials: &HashMap<String, String>) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        for (name, source) in partials {
            registry.register_partial(name, source)?;
        }
        Ok(Self { registry })
    }

    /// Renders an anonymous template string against `data`.
    pub fn render<S: Serialize>(&self, template: &str, data: &S) -> Result<String, TemplateError> {
        Ok(self.registry.render_template(template, data)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_partial() {
        let mut partials = HashMap::new();
        partials.insert("greeting".to_string(), "Hi {{name}}".to_string());
        let engine = TemplateEngine::new(&partials).unwrap();
        let out = engine
            .render("{{> greeting}}!", &json!({"name": "Ada"}))
            .unwrap();
        assert_eq!(out, "Hi Ada!");
    }

    #[test]
    fn missing_variable_renders_empty_in_non_strict_mode() {
        let engine = TemplateEngine::new(&HashMap::new()).unwrap();
        let out = engine.render("hello {{missing}}", &json!({})).unwrap();
        assert_eq!(out, "hello ");
    }
}
