//! Jobs in the generation queue.
//!
//! A job is identified by its idempotency key alone; every other field is
//! descriptive. Status only moves forward: queued → running → succeeded|failed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of generation work the dispatcher knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Translate a canonical payload into another locale
    TranslateContent,

    /// Plan an illustrated story deck for a payload
    BuildStoryPlan,

    /// Render the illustration for one story slide
    GenerateStoryImage,

    /// Synthesize narration for one story slide
    GenerateStoryAudio,

    /// Transcribe a payload into braille
    BuildBrailleExport,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::TranslateContent,
        JobKind::BuildStoryPlan,
        JobKind::GenerateStoryImage,
        JobKind::GenerateStoryAudio,
        JobKind::BuildBrailleExport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::TranslateContent => "translate_content",
            JobKind::BuildStoryPlan => "build_story_plan",
            JobKind::GenerateStoryImage => "generate_story_image",
            JobKind::GenerateStoryAudio => "generate_story_audio",
            JobKind::BuildBrailleExport => "build_braille_export",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown job type: {}", s))
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker
    Queued,

    /// Claimed by a worker
    Running,

    /// Handler finished and its artifact is written
    Succeeded,

    /// Handler failed; not retried automatically
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            _ => anyhow::bail!("Unknown job status: {}", s),
        }
    }
}

/// A job row as stored in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub content_key: String,
    pub version: i64,
    pub locale: Option<String>,
    pub slide_index: Option<i64>,
    pub scope: Option<String>,
    pub format: Option<String>,
    pub status: JobStatus,
    pub idempotency_key: String,
    pub error: Option<String>,

    /// Number of times the job has been claimed
    pub attempts: i64,

    /// A running job whose lease has passed may be reclaimed
    pub lease_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Target locale; every handler needs one
    pub fn require_locale(&self) -> anyhow::Result<&str> {
        self.locale
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Job {} ({}) has no locale", self.id, self.kind))
    }

    pub fn require_slide_index(&self) -> anyhow::Result<i64> {
        self.slide_index
            .ok_or_else(|| anyhow::anyhow!("Job {} ({}) has no slide index", self.id, self.kind))
    }
}

/// Fields supplied by a caller when enqueueing
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub content_key: String,
    pub version: i64,
    pub idempotency_key: String,
    pub locale: Option<String>,
    pub slide_index: Option<i64>,
    pub scope: Option<String>,
    pub format: Option<String>,
}

impl NewJob {
    pub fn new(
        kind: JobKind,
        content_key: impl Into<String>,
        version: i64,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            content_key: content_key.into(),
            version,
            idempotency_key: idempotency_key.into(),
            locale: None,
            slide_index: None,
            scope: None,
            format: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_slide_index(mut self, slide_index: i64) -> Self {
        self.slide_index = Some(slide_index);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}
