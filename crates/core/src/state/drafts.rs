//! # Drafts and Panel Reviews
//!
//! Drafts are append-only revisions per release: the pipeline and editors
//! never overwrite a revision, they add the next one. Panel reviews point at
//! the revision they critiqued.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::db::{lock, parse_ts, PressroomDb};
use crate::error::{ReleaseError, ReleaseResult};
use crate::parsing::{ContrarianRecommendation, PanelCritique, ParsedDraft, Quote};

/// Who produced a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftAuthor {
    /// Generated by the LLM pipeline
    Pipeline,
    /// Hand-edited by an admin
    Admin,
}

impl DraftAuthor {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Admin => "admin",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            _ => Self::Pipeline,
        }
    }
}

/// One revision of a release's copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub release_id: String,
    /// Starts at 1 and increases by one per save
    pub revision: i64,
    pub headline: String,
    #[serde(default)]
    pub alternative_headlines: Vec<String>,
    #[serde(default)]
    pub subheadline: Option<String>,
    pub body: String,
    #[serde(default)]
    pub quotes: Vec<Quote>,
    /// Unparsed LLM output, kept for every generated revision
    #[serde(default)]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub edited_by: DraftAuthor,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    /// Main headline followed by the alternatives
    pub fn headline_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        if !self.headline.is_empty() {
            options.push(self.headline.clone());
        }
        for alt in &self.alternative_headlines {
            if !options.contains(alt) {
                options.push(alt.clone());
            }
        }
        options
    }
}

/// Admin edit; absent fields keep the previous revision's value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftEdit {
    pub headline: Option<String>,
    pub alternative_headlines: Option<Vec<String>>,
    pub subheadline: Option<String>,
    pub body: Option<String>,
    pub quotes: Option<Vec<Quote>>,
}

/// The journalist panel's critique of one revision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelReview {
    pub id: String,
    pub release_id: String,
    pub draft_revision: i64,
    pub critique: PanelCritique,
    #[serde(default)]
    pub recommendations: Vec<ContrarianRecommendation>,
    #[serde(default)]
    pub average_score: Option<f32>,
    pub panel_raw: String,
    #[serde(default)]
    pub contrarian_raw: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Manager for draft revisions and panel reviews
pub struct DraftManager {
    conn: Arc<Mutex<Connection>>,
}

impl DraftManager {
    pub fn new(db: &PressroomDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Store a pipeline-generated revision with its raw response
    pub fn save_generated(
        &self,
        release_id: &str,
        parsed: &ParsedDraft,
        raw_response: &str,
        model: Option<&str>,
    ) -> ReleaseResult<Draft> {
        let conn = lock(&self.conn)?;
        let draft = Draft {
            id: uuid::Uuid::new_v4().to_string(),
            release_id: release_id.to_string(),
            revision: next_revision(&conn, release_id)?,
            headline: parsed.headline.clone(),
            alternative_headlines: parsed.alternative_headlines.clone(),
            subheadline: parsed.subheadline.clone(),
            body: parsed.body.clone(),
            quotes: parsed.quotes.clone(),
            raw_response: Some(raw_response.to_string()),
            model: model.map(str::to_string),
            edited_by: DraftAuthor::Pipeline,
            created_at: Utc::now(),
        };
        insert_draft(&conn, &draft)?;
        tracing::debug!(release_id, revision = draft.revision, "Stored generated draft");
        Ok(draft)
    }

    /// Admin edit of the latest revision, saved as a new revision
    pub fn save_edit(&self, release_id: &str, edit: DraftEdit) -> ReleaseResult<Draft> {
        let conn = lock(&self.conn)?;
        let previous = latest_draft(&conn, release_id)?
            .ok_or_else(|| ReleaseError::not_found("draft", release_id))?;

        let headline = edit
            .headline
            .map(|h| h.trim().to_string())
            .unwrap_or(previous.headline);
        let body = edit.body.unwrap_or(previous.body);
        if headline.is_empty() || body.trim().is_empty() {
            return Err(ReleaseError::Validation(
                "a draft needs a headline and a body".into(),
            ));
        }

        let draft = Draft {
            id: uuid::Uuid::new_v4().to_string(),
            release_id: release_id.to_string(),
            revision: previous.revision + 1,
            headline,
            alternative_headlines: edit
                .alternative_headlines
                .unwrap_or(previous.alternative_headlines),
            subheadline: match edit.subheadline {
                Some(s) if s.trim().is_empty() => None,
                Some(s) => Some(s),
                None => previous.subheadline,
            },
            body,
            quotes: edit.quotes.unwrap_or(previous.quotes),
            raw_response: None,
            model: None,
            edited_by: DraftAuthor::Admin,
            created_at: Utc::now(),
        };
        insert_draft(&conn, &draft)?;
        tracing::info!(release_id, revision = draft.revision, "Admin saved draft revision");
        Ok(draft)
    }

    pub fn latest(&self, release_id: &str) -> ReleaseResult<Option<Draft>> {
        let conn = lock(&self.conn)?;
        latest_draft(&conn, release_id)
    }

    /// All revisions, oldest first
    pub fn list(&self, release_id: &str) -> ReleaseResult<Vec<Draft>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE release_id = ?1 ORDER BY revision ASC",
            DRAFT_SELECT
        ))?;
        let drafts = stmt
            .query_map(params![release_id], row_to_draft)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list drafts")?;
        Ok(drafts)
    }

    pub fn save_panel(
        &self,
        release_id: &str,
        draft_revision: i64,
        critique: &PanelCritique,
        recommendations: &[ContrarianRecommendation],
        panel_raw: &str,
        contrarian_raw: Option<&str>,
    ) -> ReleaseResult<PanelReview> {
        let review = PanelReview {
            id: uuid::Uuid::new_v4().to_string(),
            release_id: release_id.to_string(),
            draft_revision,
            critique: critique.clone(),
            recommendations: recommendations.to_vec(),
            average_score: critique.average_score,
            panel_raw: panel_raw.to_string(),
            contrarian_raw: contrarian_raw.map(str::to_string),
            created_at: Utc::now(),
        };

        let conn = lock(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO panel_reviews
            (id, release_id, draft_revision, critique_json, recommendations_json, average_score, panel_raw, contrarian_raw, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                review.id,
                review.release_id,
                review.draft_revision,
                serde_json::to_string(&review.critique).context("Failed to encode critique")?,
                serde_json::to_string(&review.recommendations)
                    .context("Failed to encode recommendations")?,
                review.average_score.map(|s| s as f64),
                review.panel_raw,
                review.contrarian_raw,
                review.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to store panel review")?;

        Ok(review)
    }

    pub fn latest_panel(&self, release_id: &str) -> ReleaseResult<Option<PanelReview>> {
        Ok(self.list_panels(release_id)?.into_iter().next())
    }

    /// Panel reviews, newest first
    pub fn list_panels(&self, release_id: &str) -> ReleaseResult<Vec<PanelReview>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, release_id, draft_revision, critique_json, recommendations_json,
                   average_score, panel_raw, contrarian_raw, created_at
            FROM panel_reviews
            WHERE release_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;
        let reviews = stmt
            .query_map(params![release_id], |row| {
                let critique: String = row.get(3)?;
                let recommendations: String = row.get(4)?;
                let average_score: Option<f64> = row.get(5)?;
                let created_at: String = row.get(8)?;
                Ok(PanelReview {
                    id: row.get(0)?,
                    release_id: row.get(1)?,
                    draft_revision: row.get(2)?,
                    critique: serde_json::from_str(&critique).unwrap_or_default(),
                    recommendations: serde_json::from_str(&recommendations).unwrap_or_default(),
                    average_score: average_score.map(|s| s as f32),
                    panel_raw: row.get(6)?,
                    contrarian_raw: row.get(7)?,
                    created_at: parse_ts(&created_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list panel reviews")?;
        Ok(reviews)
    }
}

/// Latest revision inside an existing lock or transaction
pub(crate) fn latest_draft(conn: &Connection, release_id: &str) -> ReleaseResult<Option<Draft>> {
    Ok(conn
        .query_row(
            &format!(
                "{} WHERE release_id = ?1 ORDER BY revision DESC LIMIT 1",
                DRAFT_SELECT
            ),
            params![release_id],
            row_to_draft,
        )
        .optional()?)
}

fn next_revision(conn: &Connection, release_id: &str) -> ReleaseResult<i64> {
    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(revision), 0) FROM drafts WHERE release_id = ?1",
        params![release_id],
        |row| row.get(0),
    )?;
    Ok(current + 1)
}

fn insert_draft(conn: &Connection, draft: &Draft) -> ReleaseResult<()> {
    conn.execute(
        r#"
        INSERT INTO drafts
        (id, release_id, revision, headline, alternatives_json, subheadline, body, quotes_json, raw_response, model, edited_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            draft.id,
            draft.release_id,
            draft.revision,
            draft.headline,
            serde_json::to_string(&draft.alternative_headlines)
                .context("Failed to encode headlines")?,
            draft.subheadline,
            draft.body,
            serde_json::to_string(&draft.quotes).context("Failed to encode quotes")?,
            draft.raw_response,
            draft.model,
            draft.edited_by.as_str(),
            draft.created_at.to_rfc3339(),
        ],
    )
    .context("Failed to store draft")?;
    Ok(())
}

const DRAFT_SELECT: &str = r#"
    SELECT id, release_id, revision, headline, alternatives_json, subheadline, body,
           quotes_json, raw_response, model, edited_by, created_at
    FROM drafts
"#;

fn row_to_draft(row: &rusqlite::Row) -> rusqlite::Result<Draft> {
    let alternatives: String = row.get(4)?;
    let quotes: String = row.get(7)?;
    let edited_by: String = row.get(10)?;
    let created_at: String = row.get(11)?;

    Ok(Draft {
        id: row.get(0)?,
        release_id: row.get(1)?,
        revision: row.get(2)?,
        headline: row.get(3)?,
        alternative_headlines: serde_json::from_str(&alternatives).unwrap_or_default(),
        subheadline: row.get(5)?,
        body: row.get(6)?,
        quotes: serde_json::from_str(&quotes).unwrap_or_default(),
        raw_response: row.get(8)?,
        model: row.get(9)?,
        edited_by: DraftAuthor::from_str(&edited_by),
        created_at: parse_ts(&created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{parse_contrarian, parse_draft, parse_panel};
    use crate::state::test_support::release_fixture;

    #[test]
    fn test_revisions_increment() {
        let (db, release_id) = release_fixture();
        let drafts = DraftManager::new(&db);

        let parsed = parse_draft("HEADLINE: First\nBODY:\nOne.");
        let first = drafts.save_generated(&release_id, &parsed, "raw one", Some("m")).unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(first.raw_response.as_deref(), Some("raw one"));

        let parsed = parse_draft("HEADLINE: Second\nBODY:\nTwo.");
        let second = drafts.save_generated(&release_id, &parsed, "raw two", None).unwrap();
        assert_eq!(second.revision, 2);

        let latest = drafts.latest(&release_id).unwrap().unwrap();
        assert_eq!(latest.headline, "Second");
        assert_eq!(drafts.list(&release_id).unwrap().len(), 2);
    }

    #[test]
    fn test_headline_options_lead_with_main_headline() {
        let (db, release_id) = release_fixture();
        let drafts = DraftManager::new(&db);

        let parsed = parse_draft(
            "HEADLINE: Acme Ships Skates\nALTERNATIVE HEADLINES:\n1. Skates Hit Streets\n2. Acme Goes Fast\nBODY:\nText.",
        );
        let draft = drafts.save_generated(&release_id, &parsed, "raw", None).unwrap();
        assert_eq!(
            draft.headline_options(),
            vec!["Acme Ships Skates", "Skates Hit Streets", "Acme Goes Fast"]
        );
    }

    #[test]
    fn test_admin_edit_creates_new_revision() {
        let (db, release_id) = release_fixture();
        let drafts = DraftManager::new(&db);
        let parsed = parse_draft(
            "HEADLINE: Acme Ships Skates\nALTERNATIVE HEADLINES:\n1. Skates Ship\nBODY:\nBody text.",
        );
        drafts.save_generated(&release_id, &parsed, "raw", None).unwrap();

        let edited = drafts
            .save_edit(
                &release_id,
                DraftEdit {
                    body: Some("Tighter body.".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.revision, 2);
        assert_eq!(edited.edited_by, DraftAuthor::Admin);
        assert_eq!(edited.headline, "Acme Ships Skates");
        assert_eq!(edited.body, "Tighter body.");
        assert_eq!(edited.alternative_headlines, vec!["Skates Ship"]);
        assert!(edited.raw_response.is_none());

        let first = &drafts.list(&release_id).unwrap()[0];
        assert_eq!(first.body, "Body text.");
    }

    #[test]
    fn test_edit_without_draft_is_not_found() {
        let (db, release_id) = release_fixture();
        let drafts = DraftManager::new(&db);
        let err = drafts.save_edit(&release_id, DraftEdit::default()).unwrap_err();
        assert!(matches!(err, ReleaseError::NotFound { .. }));
    }

    #[test]
    fn test_panel_review_round_trip() {
        let (db, release_id) = release_fixture();
        let drafts = DraftManager::new(&db);
        let critique = parse_panel("Persona: Ann Lee (Reporter)\nScore: 8/10\nFeedback: Solid.");
        let recs = parse_contrarian("1. **Cut it** [High]: Too long.");

        drafts
            .save_panel(&release_id, 1, &critique, &recs, "panel raw", Some("contrarian raw"))
            .unwrap();
        let review = drafts.latest_panel(&release_id).unwrap().unwrap();
        assert_eq!(review.critique.panelists[0].name, "Ann Lee");
        assert_eq!(review.average_score, Some(8.0));
        assert_eq!(review.recommendations[0].title.as_deref(), Some("Cut it"));
        assert_eq!(review.contrarian_raw.as_deref(), Some("contrarian raw"));
    }
}
