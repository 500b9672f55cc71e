//! # Response Parsing
//!
//! Best-effort extraction of structured fields from freeform LLM text.
//! None of these parsers fail: anything they cannot find comes back empty,
//! and callers always keep the raw response next to the parsed value.

pub mod contrarian;
pub mod draft;
pub mod panel;

pub use contrarian::{parse_contrarian, ContrarianRecommendation, Priority};
pub use draft::{parse_draft, ParsedDraft, Quote};
pub use panel::{parse_panel, PanelCritique, PanelFormat, PanelistFeedback};

use regex::Regex;
use std::sync::OnceLock;

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(alternative headlines|alternate headlines|headline options|sub-?headline|headline|body|quotes|recommendations|consensus|overall|summary)\s*(?::\s*(.*))?$",
        )
        .expect("header regex is valid")
    })
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+)$").expect("list item regex is valid")
    })
}

/// Strip heading hashes, bold/italic markers and surrounding whitespace
pub(crate) fn strip_markdown(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .replace("**", "")
        .replace("__", "")
        .trim()
        .to_string()
}

/// Strip markdown plus any wrapping quotation marks
pub(crate) fn clean_phrase(text: &str) -> String {
    strip_markdown(text)
        .trim_matches(|c| matches!(c, '"' | '“' | '”' | '\''))
        .trim()
        .to_string()
}

/// The text of a list item (`1. x`, `2) x`, `- x`, `* x`, `• x`), if the line is one
pub(crate) fn list_item(line: &str) -> Option<String> {
    // "**Bold**" at line start is emphasis, not a bullet
    if line.trim_start().starts_with("**") {
        return None;
    }
    list_item_re()
        .captures(line)
        .map(|caps| caps[1].trim().to_string())
}

fn canonical_header(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "alternative headlines" | "alternate headlines" | "headline options" => {
            "alternative headlines"
        }
        "subheadline" | "sub-headline" => "subheadline",
        "headline" => "headline",
        "body" => "body",
        "quotes" => "quotes",
        "recommendations" => "recommendations",
        _ => "consensus",
    }
}

/// Text split at the known `HEADER:` lines
#[derive(Debug, Default)]
pub(crate) struct Sections {
    /// Lines before the first recognised header
    pub preamble: Vec<String>,
    entries: Vec<(&'static str, Vec<String>)>,
}

impl Sections {
    pub fn parse(text: &str) -> Self {
        let mut sections = Sections::default();

        for line in text.lines() {
            let stripped = strip_markdown(line);
            if let Some(caps) = header_re().captures(&stripped) {
                let name = canonical_header(&caps[1]);
                let mut lines = Vec::new();
                if let Some(rest) = caps.get(2) {
                    if !rest.as_str().trim().is_empty() {
                        lines.push(rest.as_str().trim().to_string());
                    }
                }
                sections.entries.push((name, lines));
                continue;
            }

            match sections.entries.last_mut() {
                Some((_, lines)) => lines.push(line.to_string()),
                None => sections.preamble.push(line.to_string()),
            }
        }

        sections
    }

    /// Lines of the first section with this canonical name
    pub fn lines(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, lines)| lines.as_slice())
    }

    /// Section body joined and trimmed; `None` when absent or blank
    pub fn text(&self, name: &str) -> Option<String> {
        self.lines(name)
            .map(|lines| lines.join("\n").trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// First non-blank line of a section
    pub fn first_line(&self, name: &str) -> Option<String> {
        self.lines(name)?
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }

    /// Lines of a one-line section (`HEADLINE:`) after its first non-blank line
    pub fn overflow(&self, name: &str) -> &[String] {
        let Some(lines) = self.lines(name) else {
            return &[];
        };
        match lines.iter().position(|l| !l.trim().is_empty()) {
            Some(first) => &lines[first + 1..],
            None => &[],
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.lines(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_split_on_headers() {
        let text = "Intro line\n**HEADLINE:** Big News\nBODY:\nPara one.\n\nPara two.\n## Quotes\n\"Hi there everyone\" — Ann, CEO";
        let sections = Sections::parse(text);

        assert_eq!(sections.preamble, vec!["Intro line"]);
        assert_eq!(sections.first_line("headline").as_deref(), Some("Big News"));
        assert_eq!(
            sections.text("body").as_deref(),
            Some("Para one.\n\nPara two.")
        );
        assert!(sections.has("quotes"));
        assert!(!sections.has("subheadline"));
        assert!(sections.overflow("headline").is_empty());
        assert!(sections.overflow("subheadline").is_empty());
    }

    #[test]
    fn test_overflow_after_one_line_header() {
        let sections = Sections::parse("HEADLINE:\n\nBig News\nFirst paragraph.\n\nSecond.");
        assert_eq!(sections.first_line("headline").as_deref(), Some("Big News"));
        assert_eq!(sections.overflow("headline"), ["First paragraph.", "", "Second."]);
    }

    #[test]
    fn test_sentence_starting_with_header_word_is_not_a_header() {
        let sections = Sections::parse("Headlines are hard to write.\nSummary of results follows");
        assert_eq!(sections.preamble.len(), 2);
        assert!(!sections.has("headline"));
    }

    #[test]
    fn test_list_items() {
        assert_eq!(list_item("1. First").as_deref(), Some("First"));
        assert_eq!(list_item("  2) Second").as_deref(), Some("Second"));
        assert_eq!(list_item("- dash").as_deref(), Some("dash"));
        assert_eq!(list_item("• bullet").as_deref(), Some("bullet"));
        assert_eq!(list_item("**Bold** lead"), None);
        assert_eq!(list_item("plain"), None);
    }

    #[test]
    fn test_clean_phrase() {
        assert_eq!(clean_phrase("## **\"Acme Ships Skates\"**"), "Acme Ships Skates");
    }
}
