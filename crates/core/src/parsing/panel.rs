//! Journalist panel critiques.
//!
//! The panel prompt asks for one block per persona, but models also answer in
//! JSON or drift from the layout, so both shapes are accepted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use super::{clean_phrase, list_item, strip_markdown};

/// How the critique was recovered from the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PanelFormat {
    Json,
    Text,
    #[default]
    Unparsed,
}

/// Feedback from one simulated panelist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PanelistFeedback {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Normalised to 0–10
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// The whole panel's critique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PanelCritique {
    pub panelists: Vec<PanelistFeedback>,
    #[serde(default)]
    pub consensus: Option<String>,
    #[serde(default)]
    pub average_score: Option<f32>,
    #[serde(default)]
    pub format: PanelFormat,
}

impl PanelCritique {
    /// Plain-text digest fed to follow-up prompts
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for p in &self.panelists {
            let score = p
                .score
                .map(|s| format!(" ({:.1}/10)", s))
                .unwrap_or_default();
            let verdict = p
                .verdict
                .as_deref()
                .map(|v| format!(" {}:", v))
                .unwrap_or_else(|| ":".to_string());
            lines.push(format!("- {}{}{} {}", p.name, score, verdict, p.feedback));
        }
        if let Some(consensus) = &self.consensus {
            lines.push(format!("Consensus: {}", consensus));
        }
        lines.join("\n")
    }
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced json regex is valid")
    })
}

fn persona_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[#*\s]*(?:persona|panelist|reviewer|journalist)\s*\d*\s*[:\-—]\s*(.+?)[*\s]*$")
            .expect("persona regex is valid")
    })
}

fn consensus_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[#*\s]*(consensus|overall|summary)[*\s]*[:\-][*\s]*(.*)$")
            .expect("consensus regex is valid")
    })
}

fn score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:score|rating)[*\s]*[:\-]?[*\s]*(\d+(?:\.\d+)?)\s*(?:/\s*(\d+(?:\.\d+)?)|out of\s+(\d+))?")
            .expect("score regex is valid")
    })
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[*\s-]*(score|rating|verdict|feedback|suggestions?|notes?)[*\s]*[:\-][*\s]*(.*)$")
            .expect("label regex is valid")
    })
}

/// Parse a panel response. Never fails; unparseable text yields an empty critique.
pub fn parse_panel(text: &str) -> PanelCritique {
    if let Some(critique) = parse_json(text) {
        return critique;
    }

    let critique = parse_text(text);
    if critique.panelists.is_empty() && !text.trim().is_empty() {
        tracing::warn!("Panel response had no recognisable panelists");
    }
    critique
}

fn parse_json(text: &str) -> Option<PanelCritique> {
    let candidate = fenced_json_re()
        .captures(text)
        .map(|caps| caps[1].to_string())
        .or_else(|| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            (end > start).then(|| text[start..=end].to_string())
        })?;

    let value: Value = serde_json::from_str(&candidate).ok()?;
    let entries = value
        .get("panelists")
        .or_else(|| value.get("reviews"))
        .or_else(|| value.get("panel"))
        .and_then(|v| v.as_array())?;

    let panelists: Vec<PanelistFeedback> = entries
        .iter()
        .filter_map(|entry| {
            let name = json_str(entry, &["name", "persona", "reviewer"])?;
            Some(PanelistFeedback {
                name,
                role: json_str(entry, &["role", "outlet", "title"]),
                score: json_score(entry),
                verdict: json_str(entry, &["verdict", "decision"]),
                feedback: json_str(entry, &["feedback", "comments", "critique"]).unwrap_or_default(),
                suggestions: entry
                    .get("suggestions")
                    .and_then(|s| s.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|i| i.as_str().map(|s| s.trim().to_string()))
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            })
        })
        .collect();

    let consensus = json_str(&value, &["consensus", "summary", "overall"]);
    Some(PanelCritique {
        average_score: average(&panelists),
        panelists,
        consensus,
        format: PanelFormat::Json,
    })
}

fn json_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .filter_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn json_score(entry: &Value) -> Option<f32> {
    let raw = entry.get("score").or_else(|| entry.get("rating"))?;
    match raw {
        Value::Number(n) => n.as_f64().map(|v| normalise_score(v, None)),
        Value::String(s) => parse_score(&format!("score: {}", s)),
        _ => None,
    }
}

/// Persona headers as (start, end, header text)
fn persona_headers(text: &str) -> Vec<(usize, usize, String)> {
    persona_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps[1].to_string()))
        })
        .collect()
}

/// Start of the closing consensus and its text.
///
/// Only lines after the last persona header count, so an `Overall:` note
/// inside a panelist's block stays with that panelist. An explicit
/// `Consensus` header wins over `Overall`/`Summary`.
fn closing_consensus(text: &str, from: usize) -> Option<(usize, String)> {
    let tail = &text[from..];
    let candidates: Vec<_> = consensus_re().captures_iter(tail).collect();
    let caps = candidates
        .iter()
        .find(|caps| caps[1].eq_ignore_ascii_case("consensus"))
        .or_else(|| candidates.last())?;
    let whole = caps.get(0)?;

    let first_line = caps[2].trim();
    let after = tail[whole.end()..].trim();
    let consensus = [first_line, after]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    Some((from + whole.start(), strip_markdown(&consensus)))
}

fn parse_text(text: &str) -> PanelCritique {
    let headers = persona_headers(text);
    let last_header_end = headers.last().map(|(_, end, _)| *end).unwrap_or(0);

    let (panel_end, consensus) = match closing_consensus(text, last_header_end) {
        Some((start, consensus)) => (start, (!consensus.is_empty()).then_some(consensus)),
        None => (text.len(), None),
    };

    let mut panelists = Vec::new();
    for (i, (_, header_end, header)) in headers.iter().enumerate() {
        let block_end = headers
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(panel_end);
        let block = &text[*header_end..block_end];
        panelists.push(parse_block(header, block));
    }

    let format = if panelists.is_empty() {
        PanelFormat::Unparsed
    } else {
        PanelFormat::Text
    };

    PanelCritique {
        average_score: average(&panelists),
        panelists,
        consensus,
        format,
    }
}

fn parse_block(header: &str, block: &str) -> PanelistFeedback {
    let (name, role) = split_name_role(header);

    let mut verdict = None;
    let mut feedback_lines: Vec<String> = Vec::new();
    let mut suggestions = Vec::new();
    let mut in_suggestions = false;

    for line in block.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = label_re().captures(line) {
            let label = caps[1].to_lowercase();
            let rest = strip_markdown(&caps[2]);
            in_suggestions = label.starts_with("suggestion");
            match label.as_str() {
                "verdict" if !rest.is_empty() => verdict = Some(clean_phrase(&rest)),
                "feedback" | "note" | "notes" if !rest.is_empty() => feedback_lines.push(rest),
                l if l.starts_with("suggestion") && !rest.is_empty() => suggestions.push(rest),
                _ => {}
            }
            continue;
        }

        match list_item(line) {
            Some(item) if in_suggestions => suggestions.push(strip_markdown(&item)),
            Some(item) => feedback_lines.push(strip_markdown(&item)),
            None => feedback_lines.push(strip_markdown(line)),
        }
    }

    let feedback = feedback_lines.join(" ").trim().to_string();
    let verdict = verdict.or_else(|| infer_verdict(block));

    PanelistFeedback {
        name,
        role,
        score: parse_score(block),
        verdict,
        feedback,
        suggestions,
    }
}

/// `Dana Whitfield (Senior Tech Reporter)` or `Dana Whitfield, Senior Tech Reporter`
fn split_name_role(header: &str) -> (String, Option<String>) {
    let header = strip_markdown(header);
    if let (Some(open), true) = (header.find('('), header.ends_with(')')) {
        let name = header[..open].trim().to_string();
        let role = header[open + 1..header.len() - 1].trim().to_string();
        return (name, (!role.is_empty()).then_some(role));
    }
    for sep in [" — ", " – ", " - ", ", "] {
        if let Some((name, role)) = header.split_once(sep) {
            return (name.trim().to_string(), Some(role.trim().to_string()));
        }
    }
    (header, None)
}

fn parse_score(text: &str) -> Option<f32> {
    let caps = score_re().captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    let scale = caps
        .get(2)
        .or_else(|| caps.get(3))
        .and_then(|m| m.as_str().parse::<f64>().ok());
    Some(normalise_score(value, scale))
}

fn normalise_score(value: f64, scale: Option<f64>) -> f32 {
    let on_ten = match scale {
        Some(scale) if scale > 0.0 => value / scale * 10.0,
        _ if value > 10.0 && value <= 100.0 => value / 10.0,
        _ => value,
    };
    ((on_ten.clamp(0.0, 10.0) * 10.0).round() / 10.0) as f32
}

fn infer_verdict(block: &str) -> Option<String> {
    let lower = block.to_lowercase();
    if lower.contains("would cover") {
        Some("Would cover".to_string())
    } else if lower.contains("might cover") || lower.contains("maybe") {
        Some("Might cover".to_string())
    } else if lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "pass")
    {
        Some("Would pass".to_string())
    } else {
        None
    }
}

fn average(panelists: &[PanelistFeedback]) -> Option<f32> {
    let scores: Vec<f32> = panelists.iter().filter_map(|p| p.score).collect();
    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    Some((mean * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT_PANEL: &str = r#"### Persona: Dana Whitfield (Senior Tech Reporter, Daily Ledger)
Score: 7/10
Verdict: Might cover
Feedback: The news is real but buried under adjectives.
Needs a customer number in the first paragraph.
Suggestions:
- Move the pilot data into the lede
- Cut the second quote

### Persona: Marcus Obi (Trade Editor)
**Score:** 4 / 5
Feedback: Strong fit for our readers. I would cover this if the embargo holds.

**Panelist: Leo Castellanos — Head of Marketing**
Rating: 55
The positioning copies a competitor; nobody will notice.

CONSENSUS: Good story, weak lede.
Lead with the pilot numbers.
"#;

    #[test]
    fn test_parse_text_panel() {
        let critique = parse_panel(TEXT_PANEL);
        assert_eq!(critique.format, PanelFormat::Text);
        assert_eq!(critique.panelists.len(), 3);

        let dana = &critique.panelists[0];
        assert_eq!(dana.name, "Dana Whitfield");
        assert_eq!(dana.role.as_deref(), Some("Senior Tech Reporter, Daily Ledger"));
        assert_eq!(dana.score, Some(7.0));
        assert_eq!(dana.verdict.as_deref(), Some("Might cover"));
        assert_eq!(
            dana.feedback,
            "The news is real but buried under adjectives. Needs a customer number in the first paragraph."
        );
        assert_eq!(
            dana.suggestions,
            vec!["Move the pilot data into the lede", "Cut the second quote"]
        );

        let marcus = &critique.panelists[1];
        assert_eq!(marcus.score, Some(8.0));
        assert_eq!(marcus.verdict.as_deref(), Some("Would cover"));
        assert!(marcus.suggestions.is_empty());

        let leo = &critique.panelists[2];
        assert_eq!(leo.name, "Leo Castellanos");
        assert_eq!(leo.role.as_deref(), Some("Head of Marketing"));
        assert_eq!(leo.score, Some(5.5));
        assert!(leo.feedback.contains("copies a competitor"));
    }

    #[test]
    fn test_consensus_and_average() {
        let critique = parse_panel(TEXT_PANEL);
        assert_eq!(
            critique.consensus.as_deref(),
            Some("Good story, weak lede.\nLead with the pilot numbers.")
        );
        assert_eq!(critique.average_score, Some(6.8));
        assert!(!critique.panelists[2].feedback.contains("CONSENSUS"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = r#"Here is the panel:
```json
{
  "panelists": [
    {"name": "Priya Raman", "role": "Features Writer", "score": 9, "verdict": "Would cover",
     "feedback": "Great human angle.", "suggestions": ["Add a photo"]},
    {"persona": "Marcus Obi", "rating": "3/5", "feedback": "Too long."}
  ],
  "consensus": "Publishable with trims."
}
```"#;
        let critique = parse_panel(text);
        assert_eq!(critique.format, PanelFormat::Json);
        assert_eq!(critique.panelists.len(), 2);
        assert_eq!(critique.panelists[0].suggestions, vec!["Add a photo"]);
        assert_eq!(critique.panelists[1].name, "Marcus Obi");
        assert_eq!(critique.panelists[1].score, Some(6.0));
        assert_eq!(critique.average_score, Some(7.5));
        assert_eq!(critique.consensus.as_deref(), Some("Publishable with trims."));
    }

    #[test]
    fn test_unrelated_json_falls_back_to_text() {
        let critique = parse_panel("{\"note\": 1}\nPersona: Ann Lee\nScore: 6");
        assert_eq!(critique.format, PanelFormat::Text);
        assert_eq!(critique.panelists[0].name, "Ann Lee");
        assert_eq!(critique.panelists[0].score, Some(6.0));
    }

    #[test]
    fn test_garbage_yields_empty_critique() {
        let critique = parse_panel("The model refused to answer.");
        assert!(critique.panelists.is_empty());
        assert_eq!(critique.format, PanelFormat::Unparsed);
        assert_eq!(critique.average_score, None);
    }

    #[test]
    fn test_summary_lists_everyone() {
        let critique = parse_panel(TEXT_PANEL);
        let summary = critique.summary();
        assert!(summary.contains("- Dana Whitfield (7.0/10) Might cover:"));
        assert!(summary.contains("Consensus: Good story"));
    }

    #[test]
    fn test_overall_note_inside_a_block_is_not_the_consensus() {
        let text = "Persona: Dana Whitfield (Tech Reporter)\nScore: 6/10\nOverall: decent hook.\nVerdict: Might cover\n\nPersona: Marcus Lee (Trade Editor)\nScore: 3.5/5\nFeedback: Thin on numbers. I'd pass.\n\nCONSENSUS: Needs data.";
        let critique = parse_panel(text);

        assert_eq!(critique.panelists.len(), 2);
        assert_eq!(critique.panelists[0].name, "Dana Whitfield");
        assert!(critique.panelists[0].feedback.contains("decent hook"));
        assert_eq!(critique.panelists[1].name, "Marcus Lee");
        assert_eq!(critique.panelists[1].score, Some(7.0));
        assert_eq!(critique.panelists[1].verdict.as_deref(), Some("Would pass"));
        assert_eq!(critique.consensus.as_deref(), Some("Needs data."));
        assert_eq!(critique.average_score, Some(6.5));
    }

    #[test]
    fn test_summary_header_after_last_panelist() {
        let text = "Reviewer: Ann Lee\nScore: 8\n\nSummary: Ship it.";
        let critique = parse_panel(text);
        assert_eq!(critique.panelists.len(), 1);
        assert_eq!(critique.panelists[0].feedback, "");
        assert_eq!(critique.consensus.as_deref(), Some("Ship it."));
    }

    #[test]
    fn test_json_reviews_key() {
        let text = r#"{"reviews": [{"reviewer": "Priya Raman", "outlet": "Daily Ledger", "score": 80, "comments": "Clear news value."}], "overall": "Strong."}"#;
        let critique = parse_panel(text);
        assert_eq!(critique.format, PanelFormat::Json);
        assert_eq!(critique.panelists[0].name, "Priya Raman");
        assert_eq!(critique.panelists[0].role.as_deref(), Some("Daily Ledger"));
        assert_eq!(critique.panelists[0].score, Some(8.0));
        assert_eq!(critique.panelists[0].feedback, "Clear news value.");
        assert_eq!(critique.consensus.as_deref(), Some("Strong."));
    }

    #[test]
    fn test_verdict_inference() {
        assert_eq!(infer_verdict("Honestly, I'd pass.").as_deref(), Some("Would pass"));
        assert_eq!(infer_verdict("I would cover it").as_deref(), Some("Would cover"));
        assert_eq!(infer_verdict("The pilot passed every test"), None);
    }

    #[test]
    fn test_score_normalisation() {
        assert_eq!(normalise_score(3.5, Some(5.0)), 7.0);
        assert_eq!(normalise_score(85.0, None), 8.5);
        assert_eq!(normalise_score(12.0, Some(10.0)), 10.0);
    }
}
