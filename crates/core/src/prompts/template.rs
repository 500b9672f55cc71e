//! # Prompt Templates
//!
//! `{{variable}}` substitution for prompt configs. Whitespace inside the
//! braces is ignored and `{{variable|fallback}}` supplies a default used when
//! the variable is absent or blank.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing template variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),
}

/// Result of rendering a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders that had neither a value nor a fallback, in order of first use
    pub missing: Vec<String>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*(?:\|([^}]*))?\}\}")
            .expect("placeholder regex is valid")
    })
}

/// Distinct variable names in order of first use
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_re().captures_iter(template) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Substitute variables, leaving unresolved placeholders empty.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Rendered {
    let mut missing: Vec<String> = Vec::new();

    let text = placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match vars.get(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => value.clone(),
                None => match caps.get(2) {
                    Some(fallback) => fallback.as_str().trim().to_string(),
                    None => {
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.to_string());
                        }
                        String::new()
                    }
                },
            }
        })
        .into_owned();

    Rendered { text, missing }
}

/// Substitute variables, failing if any placeholder cannot be resolved.
pub fn render_strict(
    template: &str,
    vars: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let rendered = render(template, vars);
    if rendered.missing.is_empty() {
        Ok(rendered.text)
    } else {
        Err(TemplateError::MissingVariables(rendered.missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_placeholders_in_order() {
        let names = placeholders("{{company}} announces {{ product }} at {{company}}; {{tone|neutral}}");
        assert_eq!(names, vec!["company", "product", "tone"]);
    }

    #[test]
    fn test_render_substitutes() {
        let out = render(
            "{{company_name}} launches {{ product }}.",
            &vars(&[("company_name", "Acme"), ("product", "Rocket Skates")]),
        );
        assert_eq!(out.text, "Acme launches Rocket Skates.");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn test_render_reports_missing_once() {
        let out = render("{{a}} and {{b}} and {{a}}", &vars(&[("b", "x")]));
        assert_eq!(out.text, " and x and ");
        assert_eq!(out.missing, vec!["a"]);
    }

    #[test]
    fn test_fallback_used_for_blank_values() {
        let out = render(
            "Tone: {{tone|confident and factual}}",
            &vars(&[("tone", "   ")]),
        );
        assert_eq!(out.text, "Tone: confident and factual");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn test_single_braces_untouched() {
        let out = render("{\"json\": {{value}}}", &vars(&[("value", "1")]));
        assert_eq!(out.text, "{\"json\": 1}");
    }

    #[test]
    fn test_render_strict() {
        assert_eq!(
            render_strict("{{x}}", &vars(&[("x", "ok")])).unwrap(),
            "ok"
        );
        let err = render_strict("{{x}} {{y}}", &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingVariables(vec!["x".to_string(), "y".to_string()])
        );
        assert_eq!(err.to_string(), "missing template variables: x, y");
    }
}
