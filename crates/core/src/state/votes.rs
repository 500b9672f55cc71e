//! Headline voting. Each voter holds one vote per release; voting again moves it.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::db::{lock, parse_ts, PressroomDb};
use super::drafts::latest_draft;
use crate::error::{ReleaseError, ReleaseResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub release_id: String,
    /// `customer:<id>` or `admin`
    pub voter: String,
    pub headline: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlineTally {
    pub headline: String,
    pub votes: i64,
}

pub struct VoteManager {
    conn: Arc<Mutex<Connection>>,
}

impl VoteManager {
    pub fn new(db: &PressroomDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Cast or replace a vote for one of the latest draft's headlines
    pub fn cast(&self, release_id: &str, voter: &str, headline: &str) -> ReleaseResult<Vote> {
        let voter = voter.trim();
        if voter.is_empty() {
            return Err(ReleaseError::Validation("voter is required".into()));
        }
        let headline = headline.trim();

        let conn = lock(&self.conn)?;
        let draft = latest_draft(&conn, release_id)?
            .ok_or_else(|| ReleaseError::Validation("release has no headlines to vote on".into()))?;
        if !draft.headline_options().iter().any(|h| h == headline) {
            return Err(ReleaseError::Validation(format!(
                "'{}' is not one of the draft's headlines",
                headline
            )));
        }

        let vote = Vote {
            release_id: release_id.to_string(),
            voter: voter.to_string(),
            headline: headline.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            r#"
            INSERT INTO headline_votes (release_id, voter, headline, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(release_id, voter) DO UPDATE SET headline = ?3, created_at = ?4
            "#,
            params![vote.release_id, vote.voter, vote.headline, vote.created_at.to_rfc3339()],
        )
        .context("Failed to record vote")?;

        tracing::debug!(release_id, voter, "Headline vote recorded");
        Ok(vote)
    }

    pub fn vote_of(&self, release_id: &str, voter: &str) -> ReleaseResult<Option<Vote>> {
        let conn = lock(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT release_id, voter, headline, created_at FROM headline_votes WHERE release_id = ?1 AND voter = ?2",
                params![release_id, voter],
                |row| {
                    let created_at: String = row.get(3)?;
                    Ok(Vote {
                        release_id: row.get(0)?,
                        voter: row.get(1)?,
                        headline: row.get(2)?,
                        created_at: parse_ts(&created_at),
                    })
                },
            )
            .optional()?)
    }

    /// Votes per headline, most votes first, ties by headline.
    ///
    /// Current draft options with no votes are included with zero.
    pub fn tally(&self, release_id: &str) -> ReleaseResult<Vec<HeadlineTally>> {
        let conn = lock(&self.conn)?;
        let mut counts: HashMap<String, i64> = HashMap::new();

        let mut stmt = conn.prepare(
            "SELECT headline, COUNT(*) FROM headline_votes WHERE release_id = ?1 GROUP BY headline",
        )?;
        let rows = stmt
            .query_map(params![release_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, i64)>, _>>()
            .context("Failed to tally votes")?;
        counts.extend(rows);

        if let Some(draft) = latest_draft(&conn, release_id)? {
            for option in draft.headline_options() {
                counts.entry(option).or_insert(0);
            }
        }

        let mut tally: Vec<HeadlineTally> = counts
            .into_iter()
            .map(|(headline, votes)| HeadlineTally { headline, votes })
            .collect();
        tally.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.headline.cmp(&b.headline)));
        Ok(tally)
    }
}
