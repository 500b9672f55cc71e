//! # Distribution Queue
//!
//! Publishing a release queues one entry per matching opted-in journalist.
//! Delivery happens outside this service; admins mark entries sent.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::db::{lock, parse_ts, parse_ts_opt, PressroomDb};
use super::journalists::{row_to_journalist, JOURNALIST_SELECT};
use crate::error::{ReleaseError, ReleaseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Queued,
    Sent,
}

impl DistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "sent" => Self::Sent,
            _ => Self::Queued,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub id: String,
    pub release_id: String,
    pub journalist_id: String,
    pub journalist_email: String,
    pub status: DistributionStatus,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

pub struct DistributionManager {
    conn: Arc<Mutex<Connection>>,
}

impl DistributionManager {
    pub fn new(db: &PressroomDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Entries, oldest first, optionally narrowed to one release and/or status
    pub fn list(
        &self,
        release_id: Option<&str>,
        status: Option<DistributionStatus>,
    ) -> ReleaseResult<Vec<DistributionEntry>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR d.release_id = ?1) AND (?2 IS NULL OR d.status = ?2) ORDER BY d.queued_at, j.email",
            ENTRY_SELECT
        ))?;
        let entries = stmt
            .query_map(params![release_id, status.map(|s| s.as_str())], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list distribution entries")?;
        Ok(entries)
    }

    /// Mark an entry delivered; already-sent entries are returned unchanged
    pub fn mark_sent(&self, id: &str) -> ReleaseResult<DistributionEntry> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "UPDATE distribution_entries SET status = 'sent', sent_at = ?1 WHERE id = ?2 AND status = 'queued'",
            params![Utc::now().to_rfc3339(), id],
        )?;
        conn.query_row(
            &format!("{} WHERE d.id = ?1", ENTRY_SELECT),
            params![id],
            row_to_entry,
        )
        .optional()?
        .ok_or_else(|| ReleaseError::not_found("distribution entry", id))
    }
}

/// Queue a release for every opted-in journalist on one of its beats.
///
/// A release without target beats goes to everyone opted in. Journalists
/// already queued for the release are skipped.
pub(crate) fn queue_for_release(
    conn: &Connection,
    release_id: &str,
    target_beats: &[String],
) -> ReleaseResult<usize> {
    let mut stmt = conn.prepare(&format!("{} WHERE opted_in = 1", JOURNALIST_SELECT))?;
    let journalists = stmt
        .query_map([], row_to_journalist)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load journalists")?;

    let now = Utc::now().to_rfc3339();
    let mut queued = 0;
    for journalist in journalists {
        let matches = target_beats.is_empty()
            || journalist
                .beats
                .iter()
                .any(|beat| target_beats.iter().any(|t| t.eq_ignore_ascii_case(beat)));
        if !matches {
            continue;
        }
        queued += conn.execute(
            r#"
            INSERT OR IGNORE INTO distribution_entries (id, release_id, journalist_id, status, queued_at)
            VALUES (?1, ?2, ?3, 'queued', ?4)
            "#,
            params![uuid::Uuid::new_v4().to_string(), release_id, journalist.id, now],
        )?;
    }

    tracing::info!(release_id, queued, "Distribution queued");
    Ok(queued)
}

const ENTRY_SELECT: &str = r#"
    SELECT d.id, d.release_id, d.journalist_id, j.email, d.status, d.queued_at, d.sent_at
    FROM distribution_entries d
    JOIN journalists j ON j.id = d.journalist_id
"#;

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<DistributionEntry> {
    let status: String = row.get(4)?;
    let queued_at: String = row.get(5)?;
    Ok(DistributionEntry {
        id: row.get(0)?,
        release_id: row.get(1)?,
        journalist_id: row.get(2)?,
        journalist_email: row.get(3)?,
        status: DistributionStatus::from_str(&status),
        queued_at: parse_ts(&queued_at),
        sent_at: parse_ts_opt(row.get(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::journalists::{JournalistManager, Subscription};
    use crate::state::test_support::release_fixture;

    fn subscribe(db: &PressroomDb, email: &str, beats: &[&str]) -> String {
        JournalistManager::new(db)
            .subscribe(Subscription {
                email: email.to_string(),
                beats: beats.iter().map(|b| b.to_string()).collect(),
                ..Default::default()
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_queue_matches_beats_and_skips_duplicates() {
        let (db, release_id) = release_fixture();
        subscribe(&db, "hw@paper.com", &["hardware"]);
        subscribe(&db, "food@paper.com", &["food"]);
        let quitter = subscribe(&db, "gone@paper.com", &["hardware"]);
        let journalists = JournalistManager::new(&db);
        let token = journalists
            .list(false)
            .unwrap()
            .into_iter()
            .find(|j| j.id == quitter)
            .unwrap()
            .unsubscribe_token;
        journalists.unsubscribe(&token).unwrap();

        let conn = db.connection();
        let conn = conn.lock().unwrap();
        let beats = vec!["Hardware".to_string()];
        assert_eq!(queue_for_release(&conn, &release_id, &beats).unwrap(), 1);
        assert_eq!(queue_for_release(&conn, &release_id, &beats).unwrap(), 0);
        assert_eq!(queue_for_release(&conn, &release_id, &[]).unwrap(), 1);
    }

    #[test]
    fn test_mark_sent() {
        let (db, release_id) = release_fixture();
        subscribe(&db, "hw@paper.com", &["hardware"]);
        {
            let conn = db.connection();
            let conn = conn.lock().unwrap();
            queue_for_release(&conn, &release_id, &[]).unwrap();
        }

        let distribution = DistributionManager::new(&db);
        let queued = distribution.list(Some(&release_id), Some(DistributionStatus::Queued)).unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].journalist_email, "hw@paper.com");

        let sent = distribution.mark_sent(&queued[0].id).unwrap();
        assert_eq!(sent.status, DistributionStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert!(distribution.list(None, Some(DistributionStatus::Queued)).unwrap().is_empty());
        assert!(distribution.mark_sent("missing").is_err());
    }
}
