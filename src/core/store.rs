//! SQLite-backed persistence shared by the version store, the artifact cache
//! and the job queue.
//!
//! One database file may be opened by several worker processes at once. WAL
//! mode plus a busy timeout lets them serialize writes; within a process the
//! connection sits behind a mutex and is never held across an `.await`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::JobStatus;

/// How long a connection waits on another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content_versions (
    content_key      TEXT    NOT NULL,
    version          INTEGER NOT NULL CHECK (version >= 1),
    canonical_locale TEXT    NOT NULL,
    payload_json     TEXT    NOT NULL,
    payload_hash     TEXT    NOT NULL,
    created_at_ms    INTEGER NOT NULL,
    PRIMARY KEY (content_key, version)
);

CREATE TABLE IF NOT EXISTS content_translations (
    content_key             TEXT    NOT NULL,
    version                 INTEGER NOT NULL,
    locale                  TEXT    NOT NULL,
    translated_payload_json TEXT    NOT NULL,
    translated_hash         TEXT    NOT NULL,
    model                   TEXT    NOT NULL,
    created_at_ms           INTEGER NOT NULL,
    PRIMARY KEY (content_key, version, locale)
);

CREATE TABLE IF NOT EXISTS story_plans (
    content_key   TEXT    NOT NULL,
    version       INTEGER NOT NULL,
    locale        TEXT    NOT NULL,
    title         TEXT,
    plan_json     TEXT    NOT NULL,
    plan_hash     TEXT    NOT NULL,
    model         TEXT    NOT NULL,
    created_at_ms INTEGER NOT NULL,
    PRIMARY KEY (content_key, version, locale)
);

CREATE TABLE IF NOT EXISTS story_slides (
    content_key   TEXT    NOT NULL,
    version       INTEGER NOT NULL,
    locale        TEXT    NOT NULL,
    slide_index   INTEGER NOT NULL,
    caption       TEXT    NOT NULL,
    caption_hash  TEXT    NOT NULL,
    prompt        TEXT    NOT NULL,
    prompt_hash   TEXT    NOT NULL,
    image_url     TEXT,
    image_mime    TEXT,
    image_hash    TEXT,
    created_at_ms INTEGER NOT NULL,
    updated_at_ms INTEGER NOT NULL,
    PRIMARY KEY (content_key, version, locale, slide_index)
);

CREATE TABLE IF NOT EXISTS story_audio (
    content_key   TEXT    NOT NULL,
    version       INTEGER NOT NULL,
    locale        TEXT    NOT NULL,
    slide_index   INTEGER NOT NULL,
    caption_hash  TEXT    NOT NULL,
    audio_url     TEXT    NOT NULL,
    audio_mime    TEXT    NOT NULL,
    audio_hash    TEXT    NOT NULL,
    voice         TEXT    NOT NULL,
    created_at_ms INTEGER NOT NULL,
    PRIMARY KEY (content_key, version, locale, slide_index)
);

CREATE TABLE IF NOT EXISTS braille_exports (
    content_key   TEXT    NOT NULL,
    version       INTEGER NOT NULL,
    locale        TEXT    NOT NULL,
    scope         TEXT    NOT NULL,
    format        TEXT    NOT NULL,
    braille_text  TEXT    NOT NULL,
    braille_hash  TEXT    NOT NULL,
    created_at_ms INTEGER NOT NULL,
    PRIMARY KEY (content_key, version, locale, scope, format)
);

CREATE TABLE IF NOT EXISTS jobs (
    id              TEXT    PRIMARY KEY,
    job_type        TEXT    NOT NULL,
    content_key     TEXT    NOT NULL,
    version         INTEGER NOT NULL,
    locale          TEXT,
    slide_index     INTEGER,
    scope           TEXT,
    format          TEXT,
    status          TEXT    NOT NULL
                    CHECK (status IN ('queued', 'running', 'succeeded', 'failed')),
    idempotency_key TEXT    NOT NULL UNIQUE,
    error           TEXT,
    attempts        INTEGER NOT NULL DEFAULT 0,
    lease_until_ms  INTEGER,
    created_at_ms   INTEGER NOT NULL,
    updated_at_ms   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS jobs_claim_order ON jobs (status, created_at_ms);
"#;

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid job transition for {id}: {from} → {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Lease lost on job {id}: attempt {attempt} was reclaimed by another worker")]
    LeaseLost { id: Uuid, attempt: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Handle to the shared database
pub struct Store {
    conn: Mutex<Connection>,

    /// `None` for in-memory databases
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns the resulting mode as a row
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the database file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the connection. A poisoned lock still guards a usable connection.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Current time as stored in the database
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

pub(crate) fn parse_json(raw: &str) -> Result<serde_json::Value, StoreError> {
    Ok(serde_json::from_str(raw)?)
}
