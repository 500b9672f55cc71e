//! # Prompt Configs
//!
//! Editable system/user prompt pairs with `{{variable}}` placeholders.
//! The bundled defaults below seed the database on first run; at runtime
//! prompts are always loaded from the database so editors can change them.

pub mod template;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::LlmProvider;
pub use template::{placeholders, render, render_strict, Rendered, TemplateError};

/// Slug of the first-draft prompt
pub const DRAFT_RELEASE: &str = "draft_release";
/// Slug of the simulated journalist panel prompt
pub const JOURNALIST_PANEL: &str = "journalist_panel";
/// Slug of the contrarian recommendations prompt
pub const CONTRARIAN_REVIEW: &str = "contrarian_review";
/// Slug of the feedback-driven revision prompt
pub const REVISE_DRAFT: &str = "revise_draft";

/// A prompt config row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    pub user_template: String,
    /// Provider override; the server-wide provider is used when absent
    #[serde(default)]
    pub provider: Option<LlmProvider>,
    /// Model override; the server-wide model is used when absent
    #[serde(default)]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Both halves of a prompt after substitution
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    pub missing: Vec<String>,
}

impl PromptConfig {
    /// Render system and user templates against the same variables
    pub fn render(&self, vars: &HashMap<String, String>) -> RenderedPrompt {
        let system = render(&self.system_prompt, vars);
        let user = render(&self.user_template, vars);

        let mut missing = system.missing;
        for name in user.missing {
            if !missing.contains(&name) {
                missing.push(name);
            }
        }

        RenderedPrompt {
            system: system.text,
            user: user.text,
            missing,
        }
    }

    /// Every variable referenced by either template
    pub fn variables(&self) -> Vec<String> {
        let mut names = placeholders(&self.system_prompt);
        for name in placeholders(&self.user_template) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// A bundled default prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptDefault {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub user_template: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// All default prompts for seeding
pub fn all_defaults() -> Vec<PromptDefault> {
    vec![
        PromptDefault {
            slug: DRAFT_RELEASE,
            name: "Draft Release",
            description: "Writes the first draft from the customer's brief.",
            system_prompt: include_str!("defaults/draft_release.system.md"),
            user_template: include_str!("defaults/draft_release.user.md"),
            temperature: 0.7,
            max_tokens: 2048,
        },
        PromptDefault {
            slug: JOURNALIST_PANEL,
            name: "Journalist Panel",
            description: "Simulated reporters and a marketer critique the draft.",
            system_prompt: include_str!("defaults/journalist_panel.system.md"),
            user_template: include_str!("defaults/journalist_panel.user.md"),
            temperature: 0.8,
            max_tokens: 2048,
        },
        PromptDefault {
            slug: CONTRARIAN_REVIEW,
            name: "Contrarian Review",
            description: "Lists the ways the release could fail, with fixes.",
            system_prompt: include_str!("defaults/contrarian_review.system.md"),
            user_template: include_str!("defaults/contrarian_review.user.md"),
            temperature: 0.6,
            max_tokens: 1024,
        },
        PromptDefault {
            slug: REVISE_DRAFT,
            name: "Revise Draft",
            description: "Rewrites the current draft from editor instructions and panel feedback.",
            system_prompt: include_str!("defaults/revise_draft.system.md"),
            user_template: include_str!("defaults/revise_draft.user.md"),
            temperature: 0.5,
            max_tokens: 2048,
        },
    ]
}

/// Look up the bundled default for a slug
pub fn default_for(slug: &str) -> Option<PromptDefault> {
    all_defaults().into_iter().find(|d| d.slug == slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for prompt in all_defaults() {
            assert!(
                prompt.system_prompt.len() > 50,
                "Prompt '{}' seems too short",
                prompt.slug
            );
            assert!(!prompt.user_template.is_empty());
        }
    }

    #[test]
    fn test_prompt_count() {
        assert_eq!(all_defaults().len(), 4, "Should have 4 default prompts");
    }

    #[test]
    fn test_draft_prompt_variables() {
        let draft = default_for(DRAFT_RELEASE).unwrap();
        let names = placeholders(draft.user_template);
        for expected in ["company_name", "announcement", "key_facts", "target_beats"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_config_render_merges_missing() {
        let config = PromptConfig {
            slug: "t".to_string(),
            name: "T".to_string(),
            description: String::new(),
            system_prompt: "You write for {{company_name}}.".to_string(),
            user_template: "{{company_name}}: {{announcement}}".to_string(),
            provider: None,
            model: None,
            temperature: 0.5,
            max_tokens: 100,
            version: 1,
            updated_at: Utc::now(),
        };

        let rendered = config.render(&HashMap::new());
        assert_eq!(rendered.missing, vec!["company_name", "announcement"]);
        assert_eq!(config.variables(), vec!["company_name", "announcement"]);
    }
}
