//! eduforge - Idempotent artifact pipeline for educational content
//!
//! One canonical lesson payload fans out into translations, illustrated
//! story decks with narration, and braille/Nemeth transcriptions. Reads are
//! cache-first: a miss enqueues a job and returns immediately, and workers
//! generate each artifact at most once per unique unit of work.
//!
//! # Modules
//!
//! - `adapters`: External generation services and asset storage
//! - `braille`: Text/math segmentation, Nemeth, BRF pagination
//! - `core`: Store, job queue, handlers, dispatcher, read path
//! - `domain`: Data structures (ContentVersion, Job, artifacts)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Store a lesson
//! eduforge ingest chapter:1 --input lesson.json
//!
//! # Read it in Spanish (queues a translation on first read)
//! eduforge content chapter:1 --locale es
//!
//! # Process queued jobs
//! eduforge worker
//! ```

pub mod adapters;
pub mod braille;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use braille::{BrailleEngine, ConversionResult, ConvertOptions};
pub use core::{ContentReader, Dispatcher, DispatcherConfig, JobHandlers, Store, StoreError};
pub use domain::{ContentVersion, Job, JobKind, JobStatus, Locale};
