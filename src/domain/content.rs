//! Canonical content and locales.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable version of a unit of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentVersion {
    /// Stable identifier, independent of locale and version (e.g. "ch:1")
    pub content_key: String,

    /// Monotonic per key, starting at 1
    pub version: i64,

    /// Locale the payload was authored in
    pub canonical_locale: String,

    pub payload: serde_json::Value,

    /// SHA-256 over the key-sorted payload
    pub payload_hash: String,

    pub created_at: DateTime<Utc>,
}

/// The fixed set of locales artifacts are generated for.
///
/// Every read path goes through [`Locale::normalize`] so cache keys agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    En,
    Es,
    Hi,
}

impl Locale {
    /// Map an arbitrary locale string onto the supported set.
    ///
    /// `es-MX` and `ES` become Spanish, `hi-IN` Hindi, anything else English.
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.starts_with("es") {
            Locale::Es
        } else if lowered.starts_with("hi") {
            Locale::Hi
        } else {
            Locale::En
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
            Locale::Hi => "hi",
        }
    }

    /// Human-readable language name, used in generation prompts
    pub fn language_name(&self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::Es => "Spanish",
            Locale::Hi => "Hindi",
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::En
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
