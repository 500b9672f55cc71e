//! # Release Requests
//!
//! Every status change goes through [`ReleaseManager::apply_action`], which
//! validates the move against the lifecycle table, checks the optimistic
//! `version`, and writes the history row in the same transaction.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::customers::{adjust_credits, CreditReason};
use super::db::{lock, parse_ts, parse_ts_opt, PressroomDb};
use super::distribution::queue_for_release;
use super::drafts::latest_draft;
use super::journalists::normalize_beats;
use crate::error::{ReleaseError, ReleaseResult};
use crate::pipeline::status::{transition, Actor, ReleaseAction, ReleaseStatus, StatusInfo};

/// A customer's order for one press release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub id: String,
    pub customer_id: String,
    pub title: String,
    pub company_name: String,
    pub announcement: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub key_facts: String,
    #[serde(default)]
    pub quote_sources: String,
    #[serde(default)]
    pub target_beats: Vec<String>,
    pub status: ReleaseStatus,
    /// Status to return to on `resume`
    #[serde(default)]
    pub held_from: Option<ReleaseStatus>,
    /// Bumped on every write; clients echo it back to detect conflicts
    pub version: i64,
    #[serde(default)]
    pub selected_headline: Option<String>,
    /// Message from the most recent failed pipeline step
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReleaseRequest {
    pub fn info(&self) -> StatusInfo {
        self.status.info()
    }

    /// Prompt variables describing the order. Blank fields are left out so
    /// template fallbacks apply.
    pub fn template_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                vars.insert(key.to_string(), value);
            }
        };

        put("title", Some(self.title.clone()));
        put("company_name", Some(self.company_name.clone()));
        put("announcement", Some(self.announcement.clone()));
        put("audience", self.audience.clone());
        put("tone", self.tone.clone());
        put("word_count", self.word_count.map(|w| w.to_string()));
        put("key_facts", Some(self.key_facts.clone()));
        put("quote_sources", Some(self.quote_sources.clone()));
        put("target_beats", Some(self.target_beats.join(", ")));
        vars
    }
}

/// Order form submitted by a customer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRelease {
    pub title: String,
    pub company_name: String,
    pub announcement: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub key_facts: String,
    #[serde(default)]
    pub quote_sources: String,
    #[serde(default)]
    pub target_beats: Vec<String>,
}

/// One status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub release_id: String,
    #[serde(default)]
    pub from_status: Option<ReleaseStatus>,
    pub to_status: ReleaseStatus,
    #[serde(default)]
    pub action: Option<ReleaseAction>,
    pub actor: Actor,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Extra inputs for [`ReleaseManager::apply_action`]
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// Reject the change unless the stored version still matches
    pub expected_version: Option<i64>,
    /// Stored in history; for failure actions also stored as `last_error`
    pub note: Option<String>,
    /// Publication time for `schedule`
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl ActionOptions {
    pub fn expecting(version: i64) -> Self {
        Self {
            expected_version: Some(version),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of a successful action
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub release: ReleaseRequest,
    pub from: ReleaseStatus,
    /// Distribution entries queued by a `publish`
    pub distribution_queued: usize,
}

/// Manager for release requests and their history
pub struct ReleaseManager {
    conn: Arc<Mutex<Connection>>,
}

impl ReleaseManager {
    pub fn new(db: &PressroomDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Place an order. Consumes one credit in the same transaction.
    pub fn create(&self, customer_id: &str, form: NewRelease) -> ReleaseResult<ReleaseRequest> {
        let form = validate(form)?;
        let now = Utc::now();
        let release = ReleaseRequest {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            title: form.title,
            company_name: form.company_name,
            announcement: form.announcement,
            audience: form.audience,
            tone: form.tone,
            word_count: form.word_count,
            key_facts: form.key_facts,
            quote_sources: form.quote_sources,
            target_beats: normalize_beats(&form.target_beats),
            status: ReleaseStatus::Submitted,
            held_from: None,
            version: 1,
            selected_headline: None,
            last_error: None,
            scheduled_for: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        adjust_credits(
            &tx,
            customer_id,
            -1,
            CreditReason::ReleaseOrder,
            None,
            Some(&release.id),
        )?;

        tx.execute(
            r#"
            INSERT INTO releases
            (id, customer_id, title, company_name, announcement, audience, tone, word_count,
             key_facts, quote_sources, target_beats_json, status, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13, ?13)
            "#,
            params![
                release.id,
                release.customer_id,
                release.title,
                release.company_name,
                release.announcement,
                release.audience,
                release.tone,
                release.word_count,
                release.key_facts,
                release.quote_sources,
                serde_json::to_string(&release.target_beats).context("Failed to encode beats")?,
                release.status.as_str(),
                now.to_rfc3339(),
            ],
        )
        .context("Failed to create release")?;

        insert_history(
            &tx,
            &release.id,
            None,
            release.status,
            None,
            Actor::Customer,
            Some("order placed"),
        )?;
        tx.commit()?;

        tracing::info!(release_id = %release.id, customer_id, "Release submitted");
        Ok(release)
    }

    pub fn get(&self, id: &str) -> ReleaseResult<ReleaseRequest> {
        let conn = lock(&self.conn)?;
        load(&conn, id)
    }

    /// A customer's releases, newest first
    pub fn list_for_customer(&self, customer_id: &str) -> ReleaseResult<Vec<ReleaseRequest>> {
        self.query(
            &format!("{} WHERE customer_id = ?1 ORDER BY created_at DESC", RELEASE_SELECT),
            params![customer_id],
        )
    }

    /// All releases, optionally filtered by status, newest first
    pub fn list(&self, status: Option<ReleaseStatus>) -> ReleaseResult<Vec<ReleaseRequest>> {
        match status {
            Some(status) => self.query(
                &format!("{} WHERE status = ?1 ORDER BY created_at DESC", RELEASE_SELECT),
                params![status.as_str()],
            ),
            None => self.query(
                &format!("{} ORDER BY created_at DESC", RELEASE_SELECT),
                params![],
            ),
        }
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> ReleaseResult<Vec<ReleaseRequest>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(sql)?;
        let releases = stmt
            .query_map(args, row_to_release)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list releases")?;
        Ok(releases)
    }

    /// Move a release through the lifecycle
    pub fn apply_action(
        &self,
        id: &str,
        action: ReleaseAction,
        actor: Actor,
        options: ActionOptions,
    ) -> ReleaseResult<Transition> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        let current = load(&tx, id)?;
        if let Some(expected) = options.expected_version {
            if expected != current.version {
                return Err(ReleaseError::VersionConflict {
                    id: id.to_string(),
                    expected,
                });
            }
        }

        let from = current.status;
        let to = transition(from, action, actor, current.held_from)?;

        let held_from = match (to, action) {
            (ReleaseStatus::OnHold, _) => Some(from),
            (_, ReleaseAction::Resume) => None,
            _ => current.held_from,
        };
        let scheduled_for = match action {
            ReleaseAction::Schedule => options.scheduled_for,
            ReleaseAction::Unschedule => None,
            _ => current.scheduled_for,
        };
        let last_error = match action {
            ReleaseAction::DraftFailed | ReleaseAction::PanelFailed => options.note.clone(),
            ReleaseAction::DraftReady | ReleaseAction::PanelReady => None,
            _ => current.last_error.clone(),
        };
        let now = Utc::now();
        let published_at = if to == ReleaseStatus::Published {
            Some(now)
        } else {
            current.published_at
        };

        let updated = tx.execute(
            r#"
            UPDATE releases
            SET status = ?1, held_from = ?2, scheduled_for = ?3, last_error = ?4,
                published_at = ?5, version = version + 1, updated_at = ?6
            WHERE id = ?7 AND version = ?8
            "#,
            params![
                to.as_str(),
                held_from.map(|s| s.as_str()),
                scheduled_for.map(|t| t.to_rfc3339()),
                last_error,
                published_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
                id,
                current.version,
            ],
        )?;
        if updated == 0 {
            return Err(ReleaseError::VersionConflict {
                id: id.to_string(),
                expected: current.version,
            });
        }

        insert_history(
            &tx,
            id,
            Some(from),
            to,
            Some(action),
            actor,
            options.note.as_deref(),
        )?;

        if action == ReleaseAction::Cancel && from == ReleaseStatus::Submitted {
            adjust_credits(
                &tx,
                &current.customer_id,
                1,
                CreditReason::Refund,
                None,
                Some(id),
            )?;
        }

        let distribution_queued = if to == ReleaseStatus::Published {
            queue_for_release(&tx, id, &current.target_beats)?
        } else {
            0
        };

        let release = load(&tx, id)?;
        tx.commit()?;

        tracing::info!(
            release_id = id,
            from = %from,
            to = %to,
            actor = %actor,
            "Release status changed"
        );

        Ok(Transition {
            release,
            from,
            distribution_queued,
        })
    }

    /// Pick the headline to publish with; must be one of the latest draft's options
    pub fn select_headline(
        &self,
        id: &str,
        headline: &str,
        expected_version: Option<i64>,
    ) -> ReleaseResult<ReleaseRequest> {
        let conn = lock(&self.conn)?;
        let current = load(&conn, id)?;
        if current.status.is_terminal() {
            return Err(ReleaseError::Validation(format!(
                "release is {}; the headline can no longer change",
                current.status
            )));
        }
        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(ReleaseError::VersionConflict {
                    id: id.to_string(),
                    expected,
                });
            }
        }

        let draft = latest_draft(&conn, id)?
            .ok_or_else(|| ReleaseError::Validation("release has no draft yet".into()))?;
        let headline = headline.trim();
        if !draft.headline_options().iter().any(|h| h == headline) {
            return Err(ReleaseError::Validation(format!(
                "'{}' is not one of the draft's headlines",
                headline
            )));
        }

        let updated = conn.execute(
            r#"
            UPDATE releases SET selected_headline = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND version = ?4
            "#,
            params![headline, Utc::now().to_rfc3339(), id, current.version],
        )?;
        if updated == 0 {
            return Err(ReleaseError::VersionConflict {
                id: id.to_string(),
                expected: current.version,
            });
        }

        load(&conn, id)
    }

    /// Status history, oldest first
    pub fn history(&self, id: &str) -> ReleaseResult<Vec<HistoryEntry>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, release_id, from_status, to_status, action, actor, note, created_at
            FROM release_history
            WHERE release_id = ?1
            ORDER BY id ASC
            "#,
        )?;
        let entries = stmt
            .query_map(params![id], |row| {
                let from_status: Option<String> = row.get(2)?;
                let to_status: String = row.get(3)?;
                let action: Option<String> = row.get(4)?;
                let actor: String = row.get(5)?;
                let created_at: String = row.get(7)?;
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    release_id: row.get(1)?,
                    from_status: from_status.and_then(|s| s.parse().ok()),
                    to_status: to_status.parse().map_err(|e| convert_error(3, e))?,
                    action: action.and_then(|a| a.parse().ok()),
                    actor: actor.parse().map_err(|e| convert_error(5, e))?,
                    note: row.get(6)?,
                    created_at: parse_ts(&created_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read release history")?;
        Ok(entries)
    }
}

fn validate(mut form: NewRelease) -> ReleaseResult<NewRelease> {
    form.title = form.title.trim().to_string();
    form.company_name = form.company_name.trim().to_string();
    form.announcement = form.announcement.trim().to_string();

    for (field, value) in [
        ("title", &form.title),
        ("company_name", &form.company_name),
        ("announcement", &form.announcement),
    ] {
        if value.is_empty() {
            return Err(ReleaseError::Validation(format!("{} is required", field)));
        }
    }
    if let Some(words) = form.word_count {
        if !(100..=2000).contains(&words) {
            return Err(ReleaseError::Validation(
                "word_count must be between 100 and 2000".into(),
            ));
        }
    }
    Ok(form)
}

fn insert_history(
    conn: &Connection,
    release_id: &str,
    from: Option<ReleaseStatus>,
    to: ReleaseStatus,
    action: Option<ReleaseAction>,
    actor: Actor,
    note: Option<&str>,
) -> ReleaseResult<()> {
    conn.execute(
        r#"
        INSERT INTO release_history (release_id, from_status, to_status, action, actor, note, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            release_id,
            from.map(|s| s.as_str()),
            to.as_str(),
            action.map(|a| a.as_str()),
            actor.as_str(),
            note,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("Failed to write release history")?;
    Ok(())
}

const RELEASE_SELECT: &str = r#"
    SELECT id, customer_id, title, company_name, announcement, audience, tone, word_count,
           key_facts, quote_sources, target_beats_json, status, held_from, version,
           selected_headline, last_error, scheduled_for, published_at, created_at, updated_at
    FROM releases
"#;

fn load(conn: &Connection, id: &str) -> ReleaseResult<ReleaseRequest> {
    conn.query_row(
        &format!("{} WHERE id = ?1", RELEASE_SELECT),
        params![id],
        row_to_release,
    )
    .optional()?
    .ok_or_else(|| ReleaseError::not_found("release", id))
}

fn convert_error(column: usize, err: ReleaseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn row_to_release(row: &rusqlite::Row) -> rusqlite::Result<ReleaseRequest> {
    let beats: String = row.get(10)?;
    let status: String = row.get(11)?;
    let held_from: Option<String> = row.get(12)?;
    let created_at: String = row.get(18)?;
    let updated_at: String = row.get(19)?;

    Ok(ReleaseRequest {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        title: row.get(2)?,
        company_name: row.get(3)?,
        announcement: row.get(4)?,
        audience: row.get(5)?,
        tone: row.get(6)?,
        word_count: row.get(7)?,
        key_facts: row.get(8)?,
        quote_sources: row.get(9)?,
        target_beats: serde_json::from_str(&beats).unwrap_or_default(),
        status: status.parse().map_err(|e| convert_error(11, e))?,
        held_from: held_from.and_then(|s| s.parse().ok()),
        version: row.get(13)?,
        selected_headline: row.get(14)?,
        last_error: row.get(15)?,
        scheduled_for: parse_ts_opt(row.get(16)?),
        published_at: parse_ts_opt(row.get(17)?),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_draft;
    use crate::state::customers::{CustomerManager, NewCustomer};
    use crate::state::drafts::DraftManager;
    use crate::state::journalists::{JournalistManager, Subscription};
    use crate::state::test_support::{customer, order};

    fn setup(credits: i64) -> (PressroomDb, String) {
        let db = PressroomDb::open_in_memory().unwrap();
        let id = customer(&db, credits);
        (db, id)
    }

    fn act(
        releases: &ReleaseManager,
        id: &str,
        action: ReleaseAction,
        actor: Actor,
    ) -> ReleaseResult<Transition> {
        releases.apply_action(id, action, actor, ActionOptions::default())
    }

    #[test]
    fn test_create_consumes_credit_and_records_history() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let customers = CustomerManager::new(&db);

        let release = releases.create(&customer_id, order()).unwrap();
        assert_eq!(release.status, ReleaseStatus::Submitted);
        assert_eq!(release.version, 1);
        assert_eq!(release.target_beats, vec!["hardware", "transport"]);
        assert_eq!(customers.get(&customer_id).unwrap().credits, 0);

        let history = releases.history(&release.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[0].to_status, ReleaseStatus::Submitted);
    }

    #[test]
    fn test_create_without_credits_fails_and_leaves_nothing() {
        let (db, customer_id) = setup(0);
        let releases = ReleaseManager::new(&db);
        let err = releases.create(&customer_id, order()).unwrap_err();
        assert!(matches!(err, ReleaseError::InsufficientCredits { .. }));
        assert!(releases.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_create_validates_required_fields() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let mut form = order();
        form.announcement = "   ".to_string();
        let err = releases.create(&customer_id, form).unwrap_err();
        assert!(matches!(err, ReleaseError::Validation(_)));
        assert_eq!(CustomerManager::new(&db).get(&customer_id).unwrap().credits, 1);
    }

    #[test]
    fn test_apply_action_bumps_version_and_checks_it() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let release = releases.create(&customer_id, order()).unwrap();

        let moved = releases
            .apply_action(
                &release.id,
                ReleaseAction::GenerateDraft,
                Actor::Admin,
                ActionOptions::expecting(1),
            )
            .unwrap();
        assert_eq!(moved.from, ReleaseStatus::Submitted);
        assert_eq!(moved.release.status, ReleaseStatus::Drafting);
        assert_eq!(moved.release.version, 2);

        let stale = releases.apply_action(
            &release.id,
            ReleaseAction::DraftReady,
            Actor::System,
            ActionOptions::expecting(1),
        );
        assert!(matches!(stale, Err(ReleaseError::VersionConflict { expected: 1, .. })));
        assert_eq!(releases.get(&release.id).unwrap().status, ReleaseStatus::Drafting);
    }

    #[test]
    fn test_invalid_and_forbidden_actions_change_nothing() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let release = releases.create(&customer_id, order()).unwrap();

        let err = act(&releases, &release.id, ReleaseAction::Publish, Actor::Admin).unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidTransition { .. }));

        let err = act(&releases, &release.id, ReleaseAction::GenerateDraft, Actor::Customer)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Forbidden { .. }));

        let reloaded = releases.get(&release.id).unwrap();
        assert_eq!(reloaded.version, 1);
        assert_eq!(releases.history(&release.id).unwrap().len(), 1);
    }

    #[test]
    fn test_customer_cancel_refunds_credit() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let release = releases.create(&customer_id, order()).unwrap();

        let cancelled = act(&releases, &release.id, ReleaseAction::Cancel, Actor::Customer).unwrap();
        assert_eq!(cancelled.release.status, ReleaseStatus::Cancelled);
        assert_eq!(CustomerManager::new(&db).get(&customer_id).unwrap().credits, 1);
    }

    #[test]
    fn test_hold_and_resume_restore_previous_status() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let release = releases.create(&customer_id, order()).unwrap();

        let held = act(&releases, &release.id, ReleaseAction::Hold, Actor::Admin).unwrap();
        assert_eq!(held.release.held_from, Some(ReleaseStatus::Submitted));

        let resumed = act(&releases, &release.id, ReleaseAction::Resume, Actor::Admin).unwrap();
        assert_eq!(resumed.release.status, ReleaseStatus::Submitted);
        assert_eq!(resumed.release.held_from, None);
    }

    #[test]
    fn test_failure_note_becomes_last_error() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let release = releases.create(&customer_id, order()).unwrap();
        act(&releases, &release.id, ReleaseAction::GenerateDraft, Actor::Admin).unwrap();

        let failed = releases
            .apply_action(
                &release.id,
                ReleaseAction::DraftFailed,
                Actor::System,
                ActionOptions::default().with_note("provider timed out"),
            )
            .unwrap();
        assert_eq!(failed.release.status, ReleaseStatus::Submitted);
        assert_eq!(failed.release.last_error.as_deref(), Some("provider timed out"));

        act(&releases, &release.id, ReleaseAction::GenerateDraft, Actor::Admin).unwrap();
        let ready = act(&releases, &release.id, ReleaseAction::DraftReady, Actor::System).unwrap();
        assert_eq!(ready.release.last_error, None);
    }

    #[test]
    fn test_publish_sets_timestamp_and_queues_distribution() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let journalists = JournalistManager::new(&db);
        for (email, beats) in [
            ("tech@paper.com", vec!["Hardware"]),
            ("food@paper.com", vec!["food"]),
        ] {
            journalists
                .subscribe(Subscription {
                    email: email.to_string(),
                    name: None,
                    outlet: None,
                    beats: beats.into_iter().map(String::from).collect(),
                })
                .unwrap();
        }

        let release = releases.create(&customer_id, order()).unwrap();
        let id = release.id.as_str();
        for (action, actor) in [
            (ReleaseAction::GenerateDraft, Actor::Admin),
            (ReleaseAction::DraftReady, Actor::System),
            (ReleaseAction::RunPanel, Actor::Admin),
            (ReleaseAction::PanelReady, Actor::System),
            (ReleaseAction::SendToClient, Actor::Admin),
            (ReleaseAction::ClientApprove, Actor::Customer),
        ] {
            act(&releases, id, action, actor).unwrap();
        }

        let published = act(&releases, id, ReleaseAction::Publish, Actor::Admin).unwrap();
        assert_eq!(published.release.status, ReleaseStatus::Published);
        assert!(published.release.published_at.is_some());
        assert_eq!(published.distribution_queued, 1);
        assert_eq!(releases.history(id).unwrap().len(), 8);
    }

    #[test]
    fn test_select_headline_only_from_draft_options() {
        let (db, customer_id) = setup(1);
        let releases = ReleaseManager::new(&db);
        let release = releases.create(&customer_id, order()).unwrap();

        let err = releases.select_headline(&release.id, "Anything", None).unwrap_err();
        assert!(matches!(err, ReleaseError::Validation(_)));

        let parsed = parse_draft(
            "HEADLINE: Acme Ships Skates\nALTERNATIVE HEADLINES:\n1. Skates Arrive\nBODY:\nText.",
        );
        DraftManager::new(&db)
            .save_generated(&release.id, &parsed, "raw", None)
            .unwrap();

        let updated = releases.select_headline(&release.id, "Skates Arrive", Some(1)).unwrap();
        assert_eq!(updated.selected_headline.as_deref(), Some("Skates Arrive"));
        assert_eq!(updated.version, 2);
        assert!(releases.select_headline(&release.id, "Made Up", None).is_err());
    }

    #[test]
    fn test_lists_filter_by_customer_and_status() {
        let (db, first) = setup(2);
        let customers = CustomerManager::new(&db);
        let second = customers
            .signup(
                NewCustomer {
                    email: "other@beta.com".to_string(),
                    company_name: "Beta".to_string(),
                    contact_name: None,
                },
                1,
            )
            .unwrap()
            .id;
        let releases = ReleaseManager::new(&db);
        let a = releases.create(&first, order()).unwrap();
        releases.create(&first, order()).unwrap();
        releases.create(&second, order()).unwrap();
        act(&releases, &a.id, ReleaseAction::Hold, Actor::Admin).unwrap();

        assert_eq!(releases.list_for_customer(&first).unwrap().len(), 2);
        assert_eq!(releases.list(None).unwrap().len(), 3);
        assert_eq!(releases.list(Some(ReleaseStatus::OnHold)).unwrap().len(), 1);
        assert_eq!(releases.list(Some(ReleaseStatus::Submitted)).unwrap().len(), 2);
    }

    #[test]
    fn test_template_vars_skip_blank_fields() {
        let (db, customer_id) = setup(1);
        let release = ReleaseManager::new(&db).create(&customer_id, order()).unwrap();
        let vars = release.template_vars();
        assert_eq!(vars["company_name"], "Acme Corp");
        assert_eq!(vars["target_beats"], "hardware, transport");
        assert!(!vars.contains_key("tone"));
    }
}
