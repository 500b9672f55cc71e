//! Contrarian review: a numbered list of recommendations with optional priorities.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::{list_item, strip_markdown, Sections};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "high" | "critical" | "p1" => Some(Priority::High),
            "medium" | "med" | "p2" => Some(Priority::Medium),
            "low" | "minor" | "p3" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrarianRecommendation {
    #[serde(default)]
    pub title: Option<String>,
    pub rationale: String,
    #[serde(default)]
    pub priority: Priority,
}

fn priority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[\[(]\s*(?:priority\s*[:\-]?\s*)?(high|critical|medium|med|low|minor|p[123])\s*(?:priority)?\s*[\])]|\bpriority\s*[:\-]\s*(high|critical|medium|med|low|minor|p[123])\b")
            .expect("priority regex is valid")
    })
}

fn bold_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\*\*(.+?)\*\*\s*[:\-—–]?\s*(.*)$").expect("bold title regex is valid")
    })
}

/// Parse a contrarian response into recommendations, in the order given.
///
/// Items come from the `RECOMMENDATIONS:` section when present, otherwise
/// from every list item in the response. Lines that are not list items
/// continue the current recommendation.
pub fn parse_contrarian(text: &str) -> Vec<ContrarianRecommendation> {
    let sections = Sections::parse(text);
    let lines: Vec<String> = match sections.lines("recommendations") {
        Some(lines) => lines.to_vec(),
        None => text.lines().map(str::to_string).collect(),
    };

    let mut raw_items: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    for line in &lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(item) = list_item(line) {
            if let Some(done) = current.take() {
                raw_items.push(done);
            }
            current = Some(item);
        } else if let Some(open) = current.as_mut() {
            open.push(' ');
            open.push_str(trimmed);
        }
    }
    if let Some(done) = current {
        raw_items.push(done);
    }

    let recommendations: Vec<ContrarianRecommendation> = raw_items
        .iter()
        .map(|item| parse_item(item))
        .filter(|r| !r.rationale.is_empty() || r.title.is_some())
        .collect();

    if recommendations.is_empty() && !text.trim().is_empty() {
        tracing::warn!("Contrarian response had no recognisable recommendations");
    }
    recommendations
}

fn parse_item(item: &str) -> ContrarianRecommendation {
    let mut priority = Priority::default();
    let mut text = item.to_string();
    if let Some(caps) = priority_re().captures(item) {
        let tag = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        if let Some(p) = tag.and_then(Priority::from_tag) {
            priority = p;
        }
        if let Some(whole) = caps.get(0) {
            text = format!("{}{}", &item[..whole.start()], &item[whole.end()..]);
        }
    }
    let text = text.trim().to_string();

    let (title, rationale) = split_title(&text);
    ContrarianRecommendation {
        title,
        rationale: tidy(&rationale),
        priority,
    }
}

fn split_title(text: &str) -> (Option<String>, String) {
    if let Some(caps) = bold_title_re().captures(text) {
        let title = tidy(&caps[1]);
        let rest = caps[2].trim().to_string();
        return ((!title.is_empty()).then_some(title), rest);
    }

    // "Title: detail" only when the title is short enough to be one
    if let Some((head, rest)) = text.split_once(": ") {
        if head.split_whitespace().count() <= 8 && !rest.trim().is_empty() {
            return (Some(tidy(head)), rest.trim().to_string());
        }
    }
    if let Some((head, rest)) = text.split_once(" - ") {
        if head.split_whitespace().count() <= 8 && !rest.trim().is_empty() {
            return (Some(tidy(head)), rest.trim().to_string());
        }
    }

    (None, text.to_string())
}

fn tidy(text: &str) -> String {
    strip_markdown(text)
        .trim_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "Here is my contrarian take.\n\nRECOMMENDATIONS:\n1. **Lead with the number** [High]: Nobody reads past a vague opening.\nPut the 40 percent figure first.\n2. **Drop the CEO quote** [Low]: It says nothing a reader can check.\n3. Kill the jargon - words like synergy make editors stop reading\n4. Consider whether this is news at all\n";

    #[test]
    fn test_parse_recommendations_section() {
        let recs = parse_contrarian(RESPONSE);
        assert_eq!(recs.len(), 4);

        assert_eq!(recs[0].title.as_deref(), Some("Lead with the number"));
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(
            recs[0].rationale,
            "Nobody reads past a vague opening. Put the 40 percent figure first."
        );

        assert_eq!(recs[1].title.as_deref(), Some("Drop the CEO quote"));
        assert_eq!(recs[1].priority, Priority::Low);

        assert_eq!(recs[2].title.as_deref(), Some("Kill the jargon"));
        assert_eq!(
            recs[2].rationale,
            "words like synergy make editors stop reading"
        );
        assert_eq!(recs[2].priority, Priority::Medium);

        assert_eq!(recs[3].title, None);
        assert_eq!(recs[3].rationale, "Consider whether this is news at all");
    }

    #[test]
    fn test_preamble_is_not_a_recommendation() {
        let recs = parse_contrarian(RESPONSE);
        assert!(recs.iter().all(|r| !r.rationale.contains("contrarian take")));
    }

    #[test]
    fn test_bullets_without_section_header() {
        let text = "- Priority: high - Cut the release in half\n- (low) Add a photo caption";
        let recs = parse_contrarian(text);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].rationale, "Cut the release in half");
        assert_eq!(recs[1].priority, Priority::Low);
        assert_eq!(recs[1].rationale, "Add a photo caption");
    }

    #[test]
    fn test_no_list_yields_nothing() {
        assert!(parse_contrarian("I have no objections.").is_empty());
        assert!(parse_contrarian("").is_empty());
    }

    #[test]
    fn test_priority_ordering() {
        let mut ps = vec![Priority::Low, Priority::High, Priority::Medium];
        ps.sort();
        assert_eq!(ps, vec![Priority::High, Priority::Medium, Priority::Low]);
    }
}
