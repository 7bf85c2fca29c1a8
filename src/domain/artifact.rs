//! Derived artifacts produced from canonical content.
//!
//! Every artifact is addressed by a key tuple rooted at `(content_key, version,
//! locale)`. Rows are written once; a second write of the same tuple is a no-op.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most slides a story plan may contain
pub const MAX_STORY_SLIDES: usize = 8;

/// A translated payload for one locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTranslation {
    pub content_key: String,
    pub version: i64,
    pub locale: String,
    pub translated_payload: serde_json::Value,
    pub translated_hash: String,

    /// Model that produced the translation
    pub model: String,

    pub created_at: DateTime<Utc>,
}

/// One slide as proposed by the story planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSlide {
    /// Narration shown under the image and read aloud
    pub caption: String,

    /// Prompt handed to the image generator
    pub image_prompt: String,
}

/// A story deck plan for one locale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPlan {
    pub content_key: String,
    pub version: i64,
    pub locale: String,
    pub title: Option<String>,
    pub slides: Vec<PlannedSlide>,
    pub plan_hash: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// A generated image or audio asset attached to a slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    /// Public locator returned by asset storage
    pub url: String,
    pub mime: String,

    /// SHA-256 of the asset bytes
    pub hash: String,
}

/// One slide of a story deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySlide {
    pub content_key: String,
    pub version: i64,
    pub locale: String,
    pub slide_index: i64,
    pub caption: String,
    pub caption_hash: String,
    pub prompt: String,
    pub prompt_hash: String,

    /// Filled in by the image job
    pub image: Option<StoredAsset>,

    /// Filled in from the audio table when listing a deck
    #[serde(default)]
    pub audio: Option<StoredAsset>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Narration for one slide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryAudio {
    pub content_key: String,
    pub version: i64,
    pub locale: String,
    pub slide_index: i64,
    pub caption_hash: String,
    pub audio: StoredAsset,
    pub voice: String,
    pub created_at: DateTime<Utc>,
}

/// What part of a payload a braille export covers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BrailleScope {
    /// Every string in the payload
    Full,

    /// Strings under one top-level field, e.g. `body`
    Field(String),
}

impl fmt::Display for BrailleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrailleScope::Full => f.write_str("full"),
            BrailleScope::Field(name) => f.write_str(name),
        }
    }
}

impl FromStr for BrailleScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => anyhow::bail!("Braille scope must not be empty"),
            "full" => Ok(BrailleScope::Full),
            other if other.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                Ok(BrailleScope::Field(other.to_string()))
            }
            other => anyhow::bail!("Invalid braille scope: {}", other),
        }
    }
}

impl From<BrailleScope> for String {
    fn from(scope: BrailleScope) -> Self {
        scope.to_string()
    }
}

impl TryFrom<String> for BrailleScope {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Output shape of a braille export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrailleFormat {
    /// Unwrapped braille, one word space between segments
    Text,

    /// Paginated braille-ready file layout
    Brf,
}

impl BrailleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrailleFormat::Text => "text",
            BrailleFormat::Brf => "brf",
        }
    }
}

impl fmt::Display for BrailleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrailleFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "full" => Ok(BrailleFormat::Text),
            "brf" => Ok(BrailleFormat::Brf),
            other => anyhow::bail!("Unknown braille format: {}", other),
        }
    }
}

/// A stored braille transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrailleExport {
    pub content_key: String,
    pub version: i64,
    pub locale: String,
    pub scope: BrailleScope,
    pub format: BrailleFormat,
    pub braille_text: String,
    pub braille_hash: String,
    pub created_at: DateTime<Utc>,
}
