//! Core services.
//!
//! This module contains:
//! - Store: SQLite persistence for versions, artifacts and jobs
//! - Queue: Idempotent enqueue and leased claims
//! - Handlers: One generation step per job kind
//! - Dispatcher: Worker loop over the queue
//! - Reader: Cache-first reads that schedule missing artifacts

pub mod artifacts;
pub mod dispatcher;
pub mod handlers;
pub mod hashing;
pub mod keys;
pub mod queue;
pub mod reader;
pub mod store;
pub mod versions;

// Re-export commonly used types
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats, JobOutcome, WorkerHandle};
pub use handlers::{HandlerOutcome, JobHandlers};
pub use hashing::{canonical_json, hash_bytes, hash_text, idempotency_key, payload_hash};
pub use keys::{braille_job, story_audio_job, story_image_job, story_plan_job, translate_job};
pub use queue::{EnqueueResult, QueueStatus};
pub use reader::{BrailleResponse, CacheState, ContentReader, ContentResponse, StoryResponse};
pub use store::{Store, StoreError};
pub use versions::LATEST_VERSION;
