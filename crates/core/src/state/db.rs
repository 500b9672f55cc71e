//! # Pressroom Database
//!
//! Single SQLite database for all Pressroom state, at `.pressroom/pressroom.db`.
//! Table managers share the connection handed out by [`PressroomDb::connection`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::LlmProvider;
use crate::prompts::{self, PromptConfig, PromptDefault};

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Default database location relative to the working directory
pub const DEFAULT_DB_PATH: &str = ".pressroom/pressroom.db";

/// Database handle shared by every manager
pub struct PressroomDb {
    conn: Arc<Mutex<Connection>>,
}

/// Lock a shared connection
pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))
}

/// Parse a stored RFC 3339 timestamp
pub(crate) fn parse_ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_ts_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().map(parse_ts)
}

/// Partial update of a prompt config; absent fields are left alone
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PromptUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub user_template: Option<String>,
    /// `Some(None)` clears the override
    #[serde(default, with = "double_option")]
    pub provider: Option<Option<LlmProvider>>,
    #[serde(default, with = "double_option")]
    pub model: Option<Option<String>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

impl PressroomDb {
    /// Open database at a specific path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path.as_ref()).context("Failed to open pressroom database")?;
        Self::from_connection(conn)
    }

    /// Fresh private database, for tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a shared connection for use by other modules
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = lock(&self.conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
            tracing::info!("PressroomDb initialized with schema version {}", SCHEMA_VERSION);
        }

        Ok(())
    }

    // =========================================================================
    // Prompt Configs
    // =========================================================================

    /// Insert any bundled default prompt that is not in the table yet
    pub fn seed_prompts(&self) -> Result<usize> {
        let conn = lock(&self.conn)?;
        let mut inserted = 0;

        for default in prompts::all_defaults() {
            let now = Utc::now().to_rfc3339();
            inserted += conn.execute(
                r#"
                INSERT OR IGNORE INTO prompt_configs
                (slug, name, description, system_prompt, user_template, temperature, max_tokens, version, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
                "#,
                params![
                    default.slug,
                    default.name,
                    default.description,
                    default.system_prompt,
                    default.user_template,
                    default.temperature as f64,
                    default.max_tokens,
                    now,
                ],
            )?;
        }

        if inserted > 0 {
            tracing::info!("Seeded {} default prompts", inserted);
        } else {
            tracing::debug!("Prompts already seeded");
        }
        Ok(inserted)
    }

    pub fn list_prompts(&self) -> Result<Vec<PromptConfig>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY slug", PROMPT_SELECT))?;
        let prompts = stmt
            .query_map([], row_to_prompt)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list prompts")?;
        Ok(prompts)
    }

    /// Get a prompt config by slug
    pub fn get_prompt(&self, slug: &str) -> Result<Option<PromptConfig>> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("{} WHERE slug = ?1", PROMPT_SELECT),
            params![slug],
            row_to_prompt,
        )
        .optional()
        .with_context(|| format!("Failed to load prompt '{}'", slug))
    }

    /// Load a prompt, seeding the bundled default if the row is missing
    pub fn prompt_or_default(&self, slug: &str) -> Result<PromptConfig> {
        if let Some(config) = self.get_prompt(slug)? {
            return Ok(config);
        }
        let default = prompts::default_for(slug)
            .with_context(|| format!("Prompt '{}' not found", slug))?;
        self.write_default(default)
    }

    /// Apply a partial update; the version increments on every save
    pub fn update_prompt(&self, slug: &str, update: PromptUpdate) -> Result<PromptConfig> {
        self.save_prompt_with(slug, |current| {
            let mut config = current.with_context(|| format!("Prompt '{}' not found", slug))?;
            update.apply_to(&mut config)?;
            Ok(config)
        })
    }

    /// Update a prompt, or create it when the slug is new.
    ///
    /// A new slug starts from its bundled default if there is one; otherwise
    /// the update must carry a user template.
    pub fn upsert_prompt(&self, slug: &str, update: PromptUpdate) -> Result<PromptConfig> {
        self.save_prompt_with(slug, |current| {
            let mut config = match current {
                Some(config) => config,
                None => new_prompt(slug, &update)?,
            };
            update.apply_to(&mut config)?;
            Ok(config)
        })
    }

    /// Put the bundled default back, keeping the version counter moving forward
    pub fn reset_prompt(&self, slug: &str) -> Result<PromptConfig> {
        let default = prompts::default_for(slug)
            .with_context(|| format!("No bundled default for prompt '{}'", slug))?;
        self.write_default(default)
    }

    fn write_default(&self, default: PromptDefault) -> Result<PromptConfig> {
        let config = prompt_from_default(default);
        self.save_prompt_with(&config.slug.clone(), |_| Ok(config))
    }

    /// Read, change and write one prompt row in a single transaction
    fn save_prompt_with(
        &self,
        slug: &str,
        change: impl FnOnce(Option<PromptConfig>) -> Result<PromptConfig>,
    ) -> Result<PromptConfig> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                &format!("{} WHERE slug = ?1", PROMPT_SELECT),
                params![slug],
                row_to_prompt,
            )
            .optional()
            .with_context(|| format!("Failed to load prompt '{}'", slug))?;
        let current_version = current.as_ref().map(|c| c.version).unwrap_or(0);

        let mut saved = change(current)?;
        saved.slug = slug.to_string();
        saved.version = current_version + 1;
        saved.updated_at = Utc::now();

        tx.execute(
            r#"
            INSERT INTO prompt_configs
            (slug, name, description, system_prompt, user_template, provider, model, temperature, max_tokens, version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(slug) DO UPDATE SET
                name = ?2,
                description = ?3,
                system_prompt = ?4,
                user_template = ?5,
                provider = ?6,
                model = ?7,
                temperature = ?8,
                max_tokens = ?9,
                version = ?10,
                updated_at = ?11
            "#,
            params![
                saved.slug,
                saved.name,
                saved.description,
                saved.system_prompt,
                saved.user_template,
                saved.provider.map(|p| p.as_str()),
                saved.model,
                saved.temperature as f64,
                saved.max_tokens,
                saved.version,
                saved.updated_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to save prompt '{}'", saved.slug))?;
        tx.commit()?;

        tracing::debug!("Saved prompt '{}' as version {}", saved.slug, saved.version);
        Ok(saved)
    }
}

impl PromptUpdate {
    fn apply_to(self, config: &mut PromptConfig) -> Result<()> {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(description) = self.description {
            config.description = description;
        }
        if let Some(system_prompt) = self.system_prompt {
            config.system_prompt = system_prompt;
        }
        if let Some(user_template) = self.user_template {
            anyhow::ensure!(!user_template.trim().is_empty(), "user_template must not be empty");
            config.user_template = user_template;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(model) = self.model {
            config.model = model.filter(|m| !m.trim().is_empty());
        }
        if let Some(temperature) = self.temperature {
            anyhow::ensure!(
                (0.0..=2.0).contains(&temperature),
                "temperature must be between 0 and 2"
            );
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            anyhow::ensure!(max_tokens > 0, "max_tokens must be positive");
            config.max_tokens = max_tokens;
        }
        Ok(())
    }
}

fn prompt_from_default(default: PromptDefault) -> PromptConfig {
    PromptConfig {
        slug: default.slug.to_string(),
        name: default.name.to_string(),
        description: default.description.to_string(),
        system_prompt: default.system_prompt.to_string(),
        user_template: default.user_template.to_string(),
        provider: None,
        model: None,
        temperature: default.temperature,
        max_tokens: default.max_tokens,
        version: 0,
        updated_at: Utc::now(),
    }
}

/// Starting point for a slug that has no row yet
fn new_prompt(slug: &str, update: &PromptUpdate) -> Result<PromptConfig> {
    if let Some(default) = prompts::default_for(slug) {
        return Ok(prompt_from_default(default));
    }
    anyhow::ensure!(
        !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
        "prompt slug must be lowercase letters, digits and underscores"
    );
    anyhow::ensure!(
        update.user_template.is_some(),
        "a new prompt needs a user_template"
    );
    Ok(PromptConfig {
        slug: slug.to_string(),
        name: slug.to_string(),
        description: String::new(),
        system_prompt: String::new(),
        user_template: String::new(),
        provider: None,
        model: None,
        temperature: 0.7,
        max_tokens: 2048,
        version: 0,
        updated_at: Utc::now(),
    })
}

const PROMPT_SELECT: &str = r#"
    SELECT slug, name, description, system_prompt, user_template, provider, model,
           temperature, max_tokens, version, updated_at
    FROM prompt_configs
"#;

fn row_to_prompt(row: &rusqlite::Row) -> rusqlite::Result<PromptConfig> {
    let provider: Option<String> = row.get(5)?;
    let temperature: f64 = row.get(7)?;
    let updated_at: String = row.get(10)?;

    Ok(PromptConfig {
        slug: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        system_prompt: row.get(3)?,
        user_template: row.get(4)?,
        provider: provider.and_then(|p| p.parse().ok()),
        model: row.get(6)?,
        temperature: temperature as f32,
        max_tokens: row.get(8)?,
        version: row.get(9)?,
        updated_at: parse_ts(&updated_at),
    })
}

/// Migration to version 1 - complete schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS prompt_configs (
            slug TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            system_prompt TEXT NOT NULL,
            user_template TEXT NOT NULL,
            provider TEXT,
            model TEXT,
            temperature REAL NOT NULL DEFAULT 0.7,
            max_tokens INTEGER NOT NULL DEFAULT 2048,
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            company_name TEXT NOT NULL,
            contact_name TEXT,
            api_key TEXT NOT NULL UNIQUE,
            credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
            free_credit_granted_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS credit_ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT NOT NULL REFERENCES customers(id),
            delta INTEGER NOT NULL,
            reason TEXT NOT NULL,
            plan TEXT,
            release_id TEXT,
            balance_after INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS releases (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL REFERENCES customers(id),
            title TEXT NOT NULL,
            company_name TEXT NOT NULL,
            announcement TEXT NOT NULL,
            audience TEXT,
            tone TEXT,
            word_count INTEGER,
            key_facts TEXT NOT NULL DEFAULT '',
            quote_sources TEXT NOT NULL DEFAULT '',
            target_beats_json TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL,
            held_from TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            selected_headline TEXT,
            last_error TEXT,
            scheduled_for TEXT,
            published_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS release_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id TEXT NOT NULL REFERENCES releases(id),
            from_status TEXT,
            to_status TEXT NOT NULL,
            action TEXT,
            actor TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS drafts (
            id TEXT PRIMARY KEY,
            release_id TEXT NOT NULL REFERENCES releases(id),
            revision INTEGER NOT NULL,
            headline TEXT NOT NULL,
            alternatives_json TEXT NOT NULL DEFAULT '[]',
            subheadline TEXT,
            body TEXT NOT NULL,
            quotes_json TEXT NOT NULL DEFAULT '[]',
            raw_response TEXT,
            model TEXT,
            edited_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (release_id, revision)
        );

        CREATE TABLE IF NOT EXISTS panel_reviews (
            id TEXT PRIMARY KEY,
            release_id TEXT NOT NULL REFERENCES releases(id),
            draft_revision INTEGER NOT NULL,
            critique_json TEXT NOT NULL,
            recommendations_json TEXT NOT NULL DEFAULT '[]',
            average_score REAL,
            panel_raw TEXT NOT NULL,
            contrarian_raw TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS headline_votes (
            release_id TEXT NOT NULL REFERENCES releases(id),
            voter TEXT NOT NULL,
            headline TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (release_id, voter)
        );

        CREATE TABLE IF NOT EXISTS journalists (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            outlet TEXT,
            beats_json TEXT NOT NULL DEFAULT '[]',
            opted_in INTEGER NOT NULL DEFAULT 1,
            unsubscribe_token TEXT NOT NULL UNIQUE,
            subscribed_at TEXT NOT NULL,
            unsubscribed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS distribution_entries (
            id TEXT PRIMARY KEY,
            release_id TEXT NOT NULL REFERENCES releases(id),
            journalist_id TEXT NOT NULL REFERENCES journalists(id),
            status TEXT NOT NULL DEFAULT 'queued',
            queued_at TEXT NOT NULL,
            sent_at TEXT,
            UNIQUE (release_id, journalist_id)
        );

        CREATE INDEX IF NOT EXISTS idx_releases_customer ON releases(customer_id);
        CREATE INDEX IF NOT EXISTS idx_releases_status ON releases(status);
        CREATE INDEX IF NOT EXISTS idx_history_release ON release_history(release_id);
        CREATE INDEX IF NOT EXISTS idx_drafts_release ON drafts(release_id);
        CREATE INDEX IF NOT EXISTS idx_panel_release ON panel_reviews(release_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_customer ON credit_ledger(customer_id);
        CREATE INDEX IF NOT EXISTS idx_distribution_status ON distribution_entries(status);
        "#,
    )
    .context("Failed to apply schema v1")?;

    Ok(())
}
