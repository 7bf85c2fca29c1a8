//! Domain types for eduforge.
//!
//! This module contains the core data structures:
//! - Content: Canonical versions and locales
//! - Artifact: Translations, story decks, braille exports
//! - Job: Queue rows and job kinds

pub mod artifact;
pub mod content;
pub mod job;

// Re-export commonly used types
pub use artifact::{
    BrailleExport, BrailleFormat, BrailleScope, ContentTranslation, PlannedSlide, StoredAsset,
    StoryAudio, StoryPlan, StorySlide, MAX_STORY_SLIDES,
};
pub use content::{ContentVersion, Locale};
pub use job::{Job, JobKind, JobStatus, NewJob};
