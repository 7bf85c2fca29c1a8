//! Version store: immutable canonical payloads per content key.

use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tracing::info;

use crate::domain::ContentVersion;

use super::hashing::payload_hash;
use super::store::{from_ms, now_ms, parse_json, Store, StoreError};

/// Version number meaning "whatever is newest"
pub const LATEST_VERSION: i64 = 0;

const VERSION_COLUMNS: &str =
    "content_key, version, canonical_locale, payload_json, payload_hash, created_at_ms";

impl Store {
    /// Fetch a canonical payload.
    ///
    /// `version == 0` selects the highest version for the key; a positive
    /// version must exist exactly.
    pub fn get_canonical(
        &self,
        content_key: &str,
        version: i64,
    ) -> Result<ContentVersion, StoreError> {
        let conn = self.conn();
        let row = if version == LATEST_VERSION {
            conn.query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM content_versions
                     WHERE content_key = ?1 ORDER BY version DESC LIMIT 1"
                ),
                params![content_key],
                raw_version,
            )
            .optional()?
        } else {
            conn.query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM content_versions
                     WHERE content_key = ?1 AND version = ?2"
                ),
                params![content_key, version],
                raw_version,
            )
            .optional()?
        };

        match row {
            Some(raw) => raw.into_version(),
            None if version == LATEST_VERSION => {
                Err(StoreError::NotFound(format!("content {}", content_key)))
            }
            None => Err(StoreError::NotFound(format!(
                "content {} version {}",
                content_key, version
            ))),
        }
    }

    /// Highest stored version for a key
    pub fn latest_version(&self, content_key: &str) -> Result<Option<i64>, StoreError> {
        let latest: Option<i64> = self.conn().query_row(
            "SELECT MAX(version) FROM content_versions WHERE content_key = ?1",
            params![content_key],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// Record a new version of a payload.
    ///
    /// The version number is assigned under a write lock so two concurrent
    /// ingests of the same key get distinct numbers. Earlier versions are
    /// never touched.
    pub fn insert_version(
        &self,
        content_key: &str,
        canonical_locale: &str,
        payload: &serde_json::Value,
    ) -> Result<ContentVersion, StoreError> {
        let hash = payload_hash(payload);
        let payload_json = serde_json::to_string(payload)?;
        let created_at_ms = now_ms();

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version: i64 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM content_versions WHERE content_key = ?1",
            params![content_key],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO content_versions
                 (content_key, version, canonical_locale, payload_json, payload_hash, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                content_key,
                version,
                canonical_locale,
                payload_json,
                hash,
                created_at_ms
            ],
        )?;
        tx.commit()?;

        info!(content_key, version, payload_hash = %hash, "Stored content version");

        Ok(ContentVersion {
            content_key: content_key.to_string(),
            version,
            canonical_locale: canonical_locale.to_string(),
            payload: payload.clone(),
            payload_hash: hash,
            created_at: from_ms(created_at_ms),
        })
    }
}

/// Row as read, before the payload is parsed
struct RawVersion {
    content_key: String,
    version: i64,
    canonical_locale: String,
    payload_json: String,
    payload_hash: String,
    created_at_ms: i64,
}

impl RawVersion {
    fn into_version(self) -> Result<ContentVersion, StoreError> {
        Ok(ContentVersion {
            payload: parse_json(&self.payload_json)?,
            content_key: self.content_key,
            version: self.version,
            canonical_locale: self.canonical_locale,
            payload_hash: self.payload_hash,
            created_at: from_ms(self.created_at_ms),
        })
    }
}

fn raw_version(row: &Row<'_>) -> rusqlite::Result<RawVersion> {
    Ok(RawVersion {
        content_key: row.get(0)?,
        version: row.get(1)?,
        canonical_locale: row.get(2)?,
        payload_json: row.get(3)?,
        payload_hash: row.get(4)?,
        created_at_ms: row.get(5)?,
    })
}
