//! Draft responses: headline, alternatives, subheadline, body, quotes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{clean_phrase, list_item, strip_markdown, Sections};

const MIN_QUOTE_LEN: usize = 12;

/// An attributed quote found in a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub speaker: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Structured view of a draft response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDraft {
    pub headline: String,
    #[serde(default)]
    pub alternative_headlines: Vec<String>,
    #[serde(default)]
    pub subheadline: Option<String>,
    pub body: String,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

fn dash_quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)["“]([^"”\n]+)["”]\s*(?:—|–|--|-)\s*([^,\n]+?)\s*(?:,\s*([^\n]+?))?\s*$"#)
            .expect("dash quote regex is valid")
    })
}

fn said_quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["“]([^"”\n]+)["”]\s*,?\s*said\s+(\p{Lu}[\p{L}'\-]*(?:\s+(?:\p{Lu}\.|\p{Lu}[\p{L}'\-]*))*)(?:,\s*([^.\n"“]+))?"#)
            .expect("said quote regex is valid")
    })
}

/// Parse a draft response. Never fails; missing parts come back empty.
pub fn parse_draft(text: &str) -> ParsedDraft {
    let sections = Sections::parse(text);

    let headline = sections
        .first_line("headline")
        .map(|h| clean_phrase(&h))
        .filter(|h| !h.is_empty())
        .or_else(|| first_heading(&sections.preamble))
        .or_else(|| {
            sections
                .preamble
                .iter()
                .map(|l| clean_phrase(l))
                .find(|l| !l.is_empty())
        })
        .unwrap_or_default();

    let alternative_headlines = sections
        .lines("alternative headlines")
        .map(|lines| {
            let mut alts: Vec<String> = Vec::new();
            for item in lines.iter().filter_map(|l| list_item(l)) {
                let alt = clean_phrase(&item);
                if !alt.is_empty() && alt != headline && !alts.contains(&alt) {
                    alts.push(alt);
                }
            }
            alts
        })
        .unwrap_or_default();

    let subheadline = sections
        .first_line("subheadline")
        .map(|s| clean_phrase(&s))
        .filter(|s| !s.is_empty());

    let body = sections
        .text("body")
        .unwrap_or_else(|| fallback_body(&sections, &headline, text));

    let quotes = extract_quotes(text);

    if headline.is_empty() || body.is_empty() {
        tracing::warn!(
            has_headline = !headline.is_empty(),
            has_body = !body.is_empty(),
            "Draft response only partially parsed"
        );
    }

    ParsedDraft {
        headline,
        alternative_headlines,
        subheadline,
        body,
        quotes,
    }
}

fn first_heading(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .find(|l| l.trim_start().starts_with('#'))
        .map(|l| clean_phrase(l))
        .filter(|h| !h.is_empty())
}

/// Body when there is no `BODY:` header: the preamble minus the headline line
/// plus anything written under the one-line headers, or the whole response if
/// nothing is left.
fn fallback_body(sections: &Sections, headline: &str, text: &str) -> String {
    let mut skipped_headline = false;
    let mut remaining: Vec<&str> = sections
        .preamble
        .iter()
        .filter(|line| {
            if !skipped_headline && !headline.is_empty() && clean_phrase(line) == headline {
                skipped_headline = true;
                return false;
            }
            true
        })
        .map(|l| l.as_str())
        .collect();

    for name in ["headline", "subheadline"] {
        remaining.extend(sections.overflow(name).iter().map(|l| l.as_str()));
    }
    if let Some(lines) = sections.lines("alternative headlines") {
        remaining.extend(
            lines
                .iter()
                .filter(|l| !l.trim().is_empty() && list_item(l).is_none())
                .map(|l| l.as_str()),
        );
    }

    let body = remaining.join("\n").trim().to_string();
    if body.is_empty() && !sections.has("headline") {
        text.trim().to_string()
    } else {
        body
    }
}

/// Attributed quotes in either `"..." — Name, Title` or `"...," said Name, Title` form
pub fn extract_quotes(text: &str) -> Vec<Quote> {
    let mut quotes: Vec<Quote> = Vec::new();

    let found = dash_quote_re()
        .captures_iter(text)
        .chain(said_quote_re().captures_iter(text));

    for caps in found {
        let quote_text = caps[1]
            .trim()
            .trim_end_matches(',')
            .trim()
            .to_string();
        if quote_text.chars().count() < MIN_QUOTE_LEN {
            continue;
        }

        let speaker = strip_markdown(&caps[2]);
        if speaker.is_empty() {
            continue;
        }

        let title = caps
            .get(3)
            .map(|t| strip_markdown(t.as_str()).trim_end_matches('.').trim().to_string())
            .filter(|t| !t.is_empty());

        if quotes.iter().any(|q| q.text == quote_text) {
            continue;
        }
        quotes.push(Quote {
            text: quote_text,
            speaker,
            title,
        });
    }

    quotes
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"HEADLINE: Acme Launches Rocket Skates for Urban Commuters
ALTERNATIVE HEADLINES:
1. Rocket Skates Hit City Streets
2. "Acme Bets on Personal Jet Mobility"
3. Acme Launches Rocket Skates for Urban Commuters
SUBHEADLINE: The skates cut average commute times by 40 percent in pilot tests.
BODY:
DESERT CITY, Ariz. — Acme Corp. today announced Rocket Skates.

"We built these for people who hate traffic," said Wile E. Coyote, Chief Engineer at Acme. The pilot ran for six weeks.
QUOTES:
"Rocket Skates are the most fun I have had commuting in years" — Road Runner, Pilot Participant
"#;

    #[test]
    fn test_parse_well_formed_draft() {
        let draft = parse_draft(WELL_FORMED);

        assert_eq!(
            draft.headline,
            "Acme Launches Rocket Skates for Urban Commuters"
        );
        assert_eq!(
            draft.alternative_headlines,
            vec![
                "Rocket Skates Hit City Streets",
                "Acme Bets on Personal Jet Mobility"
            ]
        );
        assert_eq!(
            draft.subheadline.as_deref(),
            Some("The skates cut average commute times by 40 percent in pilot tests.")
        );
        assert!(draft.body.starts_with("DESERT CITY"));
        assert!(draft.body.ends_with("The pilot ran for six weeks."));
        assert!(!draft.body.contains("QUOTES"));
    }

    #[test]
    fn test_quotes_from_body_and_quote_section() {
        let draft = parse_draft(WELL_FORMED);
        assert_eq!(draft.quotes.len(), 2);

        let road_runner = draft
            .quotes
            .iter()
            .find(|q| q.speaker == "Road Runner")
            .unwrap();
        assert_eq!(road_runner.title.as_deref(), Some("Pilot Participant"));

        let coyote = draft
            .quotes
            .iter()
            .find(|q| q.speaker == "Wile E. Coyote")
            .unwrap();
        assert_eq!(coyote.text, "We built these for people who hate traffic");
        assert_eq!(coyote.title.as_deref(), Some("Chief Engineer at Acme"));
    }

    #[test]
    fn test_markdown_heading_fallback() {
        let text = "# Acme Opens Second Factory\n\nAcme today opened a factory in Ohio.\nIt employs 200 people.";
        let draft = parse_draft(text);
        assert_eq!(draft.headline, "Acme Opens Second Factory");
        assert_eq!(
            draft.body,
            "Acme today opened a factory in Ohio.\nIt employs 200 people."
        );
        assert!(draft.alternative_headlines.is_empty());
        assert!(draft.subheadline.is_none());
    }

    #[test]
    fn test_headline_without_body_header() {
        let text = "HEADLINE: Acme Ships Rocket Skates\n\nAcme today shipped Rocket Skates to commuters in three cities.\n\nThe skates cut commute times by 40 percent.";
        let draft = parse_draft(text);
        assert_eq!(draft.headline, "Acme Ships Rocket Skates");
        assert_eq!(
            draft.body,
            "Acme today shipped Rocket Skates to commuters in three cities.\n\nThe skates cut commute times by 40 percent."
        );
    }

    #[test]
    fn test_subheadline_without_body_header() {
        let text = "HEADLINE: Acme Ships Rocket Skates\nSUBHEADLINE: Pilot riders saved 40 percent\nShipping starts Monday.";
        let draft = parse_draft(text);
        assert_eq!(draft.subheadline.as_deref(), Some("Pilot riders saved 40 percent"));
        assert_eq!(draft.body, "Shipping starts Monday.");
    }

    #[test]
    fn test_unstructured_text_keeps_everything() {
        let draft = parse_draft("Just one line of prose.");
        assert_eq!(draft.headline, "Just one line of prose.");
        assert_eq!(draft.body, "Just one line of prose.");
    }

    #[test]
    fn test_empty_input() {
        let draft = parse_draft("");
        assert_eq!(draft, ParsedDraft::default());
    }

    #[test]
    fn test_short_quotes_ignored() {
        let quotes = extract_quotes("\"Wow\" — Someone, Fan\n\"Curly quotes are handled too\" – Jane Roe");
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].speaker, "Jane Roe");
        assert_eq!(quotes[0].title, None);
    }

    #[test]
    fn test_hyphen_attributed_quote() {
        let quotes = extract_quotes("\"Our riders arrive before the traffic does\" - Jane Roe, Head of Pilots");
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].text, "Our riders arrive before the traffic does");
        assert_eq!(quotes[0].speaker, "Jane Roe");
        assert_eq!(quotes[0].title.as_deref(), Some("Head of Pilots"));
    }

    #[test]
    fn test_curly_quotes() {
        let quotes = extract_quotes("“This changes how teams ship software,” said Maria Chen, CTO of Beta Labs.");
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].text, "This changes how teams ship software");
        assert_eq!(quotes[0].speaker, "Maria Chen");
        assert_eq!(quotes[0].title.as_deref(), Some("CTO of Beta Labs"));
    }
}
