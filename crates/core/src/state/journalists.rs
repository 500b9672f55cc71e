//! # Journalist Mailing List
//!
//! Opt-in list of journalists who receive published releases on their beats.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::customers::normalize_email;
use super::db::{lock, parse_ts, parse_ts_opt, PressroomDb};
use crate::error::{ReleaseError, ReleaseResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journalist {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub outlet: Option<String>,
    /// Lowercased topics, e.g. `fintech`, `hardware`
    #[serde(default)]
    pub beats: Vec<String>,
    pub opted_in: bool,
    pub unsubscribe_token: String,
    pub subscribed_at: DateTime<Utc>,
    #[serde(default)]
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// Public signup form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subscription {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub outlet: Option<String>,
    #[serde(default)]
    pub beats: Vec<String>,
}

pub struct JournalistManager {
    conn: Arc<Mutex<Connection>>,
}

impl JournalistManager {
    pub fn new(db: &PressroomDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Subscribe or re-subscribe. Existing entries keep their id and token;
    /// name, outlet and beats are replaced only when the form provides them.
    pub fn subscribe(&self, form: Subscription) -> ReleaseResult<Journalist> {
        let email = normalize_email(&form.email)?;
        let beats = normalize_beats(&form.beats);
        let name = form.name.filter(|n| !n.trim().is_empty());
        let outlet = form.outlet.filter(|o| !o.trim().is_empty());
        let now = Utc::now().to_rfc3339();

        let conn = lock(&self.conn)?;
        match load_by(&conn, "email", &email)? {
            Some(existing) => {
                conn.execute(
                    r#"
                    UPDATE journalists
                    SET name = COALESCE(?1, name),
                        outlet = COALESCE(?2, outlet),
                        beats_json = CASE WHEN ?3 = '[]' THEN beats_json ELSE ?3 END,
                        opted_in = 1,
                        subscribed_at = CASE WHEN opted_in = 1 THEN subscribed_at ELSE ?4 END,
                        unsubscribed_at = NULL
                    WHERE id = ?5
                    "#,
                    params![
                        name,
                        outlet,
                        serde_json::to_string(&beats).context("Failed to encode beats")?,
                        now,
                        existing.id,
                    ],
                )
                .context("Failed to update subscription")?;
                if !existing.opted_in {
                    tracing::info!(journalist_id = %existing.id, "Journalist opted back in");
                }
                load_by(&conn, "id", &existing.id)?
                    .ok_or_else(|| ReleaseError::not_found("journalist", existing.id))
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                conn.execute(
                    r#"
                    INSERT INTO journalists (id, email, name, outlet, beats_json, opted_in, unsubscribe_token, subscribed_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
                    "#,
                    params![
                        id,
                        email,
                        name,
                        outlet,
                        serde_json::to_string(&beats).context("Failed to encode beats")?,
                        uuid::Uuid::new_v4().simple().to_string(),
                        now,
                    ],
                )
                .context("Failed to create subscription")?;
                tracing::info!(journalist_id = %id, "Journalist subscribed");
                load_by(&conn, "id", &id)?.ok_or_else(|| ReleaseError::not_found("journalist", id))
            }
        }
    }

    /// Opt out with the token from a mailing footer
    pub fn unsubscribe(&self, token: &str) -> ReleaseResult<Journalist> {
        let conn = lock(&self.conn)?;
        let journalist = load_by(&conn, "unsubscribe_token", token.trim())?
            .ok_or_else(|| ReleaseError::not_found("subscription", token))?;

        if journalist.opted_in {
            conn.execute(
                "UPDATE journalists SET opted_in = 0, unsubscribed_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), journalist.id],
            )?;
            tracing::info!(journalist_id = %journalist.id, "Journalist unsubscribed");
        }

        load_by(&conn, "id", &journalist.id)?
            .ok_or_else(|| ReleaseError::not_found("journalist", journalist.id))
    }

    /// Journalists by email; opted-out entries only when `include_inactive`
    pub fn list(&self, include_inactive: bool) -> ReleaseResult<Vec<Journalist>> {
        let conn = lock(&self.conn)?;
        let sql = if include_inactive {
            format!("{} ORDER BY email", JOURNALIST_SELECT)
        } else {
            format!("{} WHERE opted_in = 1 ORDER BY email", JOURNALIST_SELECT)
        };
        let mut stmt = conn.prepare(&sql)?;
        let journalists = stmt
            .query_map([], row_to_journalist)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list journalists")?;
        Ok(journalists)
    }
}

/// Trimmed, lowercased, de-duplicated beats in their original order
pub(crate) fn normalize_beats(beats: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for beat in beats {
        let beat = beat.trim().to_lowercase();
        if !beat.is_empty() && !normalized.contains(&beat) {
            normalized.push(beat);
        }
    }
    normalized
}

pub(crate) const JOURNALIST_SELECT: &str = r#"
    SELECT id, email, name, outlet, beats_json, opted_in, unsubscribe_token, subscribed_at, unsubscribed_at
    FROM journalists
"#;

fn load_by(conn: &Connection, column: &str, value: &str) -> ReleaseResult<Option<Journalist>> {
    let sql = format!("{} WHERE {} = ?1", JOURNALIST_SELECT, column);
    Ok(conn
        .query_row(&sql, params![value], row_to_journalist)
        .optional()?)
}

pub(crate) fn row_to_journalist(row: &rusqlite::Row) -> rusqlite::Result<Journalist> {
    let beats: String = row.get(4)?;
    let opted_in: i64 = row.get(5)?;
    let subscribed_at: String = row.get(7)?;

    Ok(Journalist {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        outlet: row.get(3)?,
        beats: serde_json::from_str(&beats).unwrap_or_default(),
        opted_in: opted_in != 0,
        unsubscribe_token: row.get(6)?,
        subscribed_at: parse_ts(&subscribed_at),
        unsubscribed_at: parse_ts_opt(row.get(8)?),
    })
}
