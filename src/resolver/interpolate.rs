//! # Template Interpolator
//!
//! Renders argument and config-file templates against resolved config values.
//!
//! Templates are written in Go-template style, `{{.Config.serverName}}`, and
//! rendered with minijinja. Before rendering, every `.Config.<key>` reference
//! inside a `{{ ... }}` action is rewritten to `Config["<key>"]` so keys with
//! hyphens survive and the leading dot is accepted.
//!
//! - Only `{{ ... }}` is an action. Block and comment markers are moved to
//!   delimiters that never occur in game config, so shell snippets such as
//!   `${#ARR[@]}` or a literal `{% ... %}` pass through untouched.
//! - A reference to an unknown key renders as `<no value>`.
//! - A malformed template is a hard error. The raw template text is never
//!   substituted for a failed render.

use minijinja::syntax::SyntaxConfig;
use minijinja::value::Value;
use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::constants::MISSING_VALUE_PLACEHOLDER;

/// Matches a `{{ ... }}` action
static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(-?)(.*?)(-?)\}\}").expect("action regex is hardcoded and valid")
});

/// Matches `.Config.<key>` inside an action
static CONFIG_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^A-Za-z0-9_\]\)])\.Config\.([A-Za-z0-9_][A-Za-z0-9_\-]*)")
        .expect("config reference regex is hardcoded and valid")
});

/// Template render failure
#[derive(Debug, Error)]
#[error("failed to render template {template:?}: {source}")]
pub struct TemplateError {
    pub template: String,
    #[source]
    pub source: minijinja::Error,
}

/// Renders config templates
pub struct Interpolator {
    env: Environment<'static>,
}

impl std::fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpolator").finish_non_exhaustive()
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpolator {
    #[must_use]
    pub fn new() -> Self {
        let syntax = SyntaxConfig::builder()
            .variable_delimiters("{{", "}}")
            .block_delimiters("\u{1}{%", "%}\u{1}")
            .comment_delimiters("\u{1}{#", "#}\u{1}")
            .build()
            .expect("template syntax configuration is hardcoded and valid");

        let mut env = Environment::new();
        env.set_syntax(syntax);
        // Chainable so that `Config["missing"]` is undefined rather than an error
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        env.set_formatter(|out, state, value| {
            if value.is_undefined() {
                out.write_str(MISSING_VALUE_PLACEHOLDER).map_err(|e| {
                    minijinja::Error::new(minijinja::ErrorKind::WriteFailure, "write failed")
                        .with_source(e)
                })
            } else {
                minijinja::escape_formatter(out, state, value)
            }
        });
        Self { env }
    }

    /// Render one template
    ///
    /// # Errors
    ///
    /// Returns `TemplateError` when the template does not parse or fails to evaluate.
    pub fn interpolate_one(
        &self,
        template: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<String, TemplateError> {
        // Fast path, nothing to render
        if !template.contains("{{") {
            return Ok(template.to_string());
        }

        let normalized = normalize_config_refs(template);
        let ctx = minijinja::context! { Config => Value::from_serialize(values) };
        self.env
            .render_str(&normalized, ctx)
            .map_err(|source| TemplateError {
                template: template.to_string(),
                source,
            })
    }

    /// Render each template in order
    ///
    /// # Errors
    ///
    /// Returns the first `TemplateError` encountered.
    pub fn interpolate_list(
        &self,
        templates: &[String],
        values: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, TemplateError> {
        templates
            .iter()
            .map(|t| self.interpolate_one(t, values))
            .collect()
    }
}

/// Rewrite `.Config.key` references inside actions to `Config["key"]`
fn normalize_config_refs(template: &str) -> String {
    ACTION
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let body = CONFIG_REF.replace_all(&caps[2], r#"${1}Config["${2}"]"#);
            format!("{{{{{}{}{}}}}}", &caps[1], body, &caps[3])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_no_templates_unchanged() {
        let i = Interpolator::new();
        let args = strings(&["-name", "MyServer", "-port", "27015"]);
        assert_eq!(i.interpolate_list(&args, &values(&[])).unwrap(), args);
    }

    #[test]
    fn test_substitutions() {
        let i = Interpolator::new();
        let v = values(&[("serverName", "Vikings"), ("worldName", "Midgard"), ("suffix", "001")]);
        let out = i
            .interpolate_list(
                &strings(&[
                    "-name",
                    "{{.Config.serverName}}",
                    "-world",
                    "{{ .Config.worldName }}",
                    "Server-{{.Config.suffix}}",
                ]),
                &v,
            )
            .unwrap();
        assert_eq!(out, strings(&["-name", "Vikings", "-world", "Midgard", "Server-001"]));
    }

    #[test]
    fn test_missing_key_renders_placeholder() {
        let i = Interpolator::new();
        let out = i
            .interpolate_list(&strings(&["-name", "{{.Config.missing}}"]), &values(&[]))
            .unwrap();
        assert_eq!(out, strings(&["-name", "<no value>"]));
    }

    #[test]
    fn test_hyphenated_keys() {
        let i = Interpolator::new();
        let out = i
            .interpolate_one("{{.Config.server-name}}", &values(&[("server-name", "x")]))
            .unwrap();
        assert_eq!(out, "x");
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let i = Interpolator::new();
        let out = i
            .interpolate_one("{{.Config.motd}}", &values(&[("motd", "<b>Tom & Jerry</b>")]))
            .unwrap();
        assert_eq!(out, "<b>Tom & Jerry</b>");
    }

    #[test]
    fn test_multiline_file_keeps_trailing_newline() {
        let i = Interpolator::new();
        let out = i
            .interpolate_one(
                "ServerName={{.Config.name}}\nMaxPlayers={{.Config.players}}\n",
                &values(&[("name", "Test"), ("players", "16")]),
            )
            .unwrap();
        assert_eq!(out, "ServerName=Test\nMaxPlayers=16\n");
    }

    #[test]
    fn test_syntax_error_is_hard_failure() {
        let i = Interpolator::new();
        let err = i
            .interpolate_list(&strings(&["ok", "{{.Config.name"]), &values(&[("name", "x")]))
            .unwrap_err();
        assert_eq!(err.template, "{{.Config.name");
        assert!(err.to_string().contains("failed to render template"));
    }

    #[test]
    fn test_block_and_comment_markers_are_plain_text() {
        let i = Interpolator::new();
        let v = values(&[("players", "16")]);
        assert_eq!(
            i.interpolate_one("count=${#ARR[@]}", &v).unwrap(),
            "count=${#ARR[@]}"
        );
        assert_eq!(
            i.interpolate_one("max={{.Config.players}} count=${#ARR[@]}", &v)
                .unwrap(),
            "max=16 count=${#ARR[@]}"
        );
        assert_eq!(
            i.interpolate_one("{% raw %} {{.Config.players}} {# note #}", &v)
                .unwrap(),
            "{% raw %} 16 {# note #}"
        );
    }

    #[test]
    fn test_secret_placeholder_passes_through() {
        let i = Interpolator::new();
        let out = i
            .interpolate_one(
                "-password {{.Config.password}}",
                &values(&[("password", "$(CONFIG_PASSWORD)")]),
            )
            .unwrap();
        assert_eq!(out, "-password $(CONFIG_PASSWORD)");
    }

    #[test]
    fn test_normalize_leaves_text_outside_actions_alone() {
        assert_eq!(
            normalize_config_refs("path/.Config.x {{- .Config.a -}}"),
            r#"path/.Config.x {{- Config["a"] -}}"#
        );
    }
}
