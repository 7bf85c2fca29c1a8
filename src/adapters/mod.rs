//! Adapter interfaces for external generation services.
//!
//! Handlers only see these traits. `openai` implements the generation side
//! over an OpenAI-compatible HTTP API and `storage` keeps assets on disk.

pub mod openai;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Locale, PlannedSlide};

pub use openai::OpenAiClient;
pub use storage::LocalAssetStorage;

/// Planner output before it is stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDraft {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub slides: Vec<PlannedSlide>,
}

/// Bytes produced by an image or speech generator
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl GeneratedAsset {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// File extension for the MIME type
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" | "audio/opus" => "ogg",
            _ => "bin",
        }
    }
}

/// Translates every string in a payload, keeping its structure
#[async_trait]
pub trait ContentTranslator: Send + Sync {
    /// Model identifier recorded on the translation
    fn model(&self) -> &str;

    async fn translate(&self, payload: &Value, locale: Locale) -> Result<Value>;
}

/// Turns a lesson payload into an illustrated slide deck
#[async_trait]
pub trait StoryPlanner: Send + Sync {
    fn model(&self) -> &str;

    async fn plan(&self, payload: &Value, locale: Locale, max_slides: usize)
        -> Result<StoryDraft>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedAsset>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Voice identifier recorded on the audio
    fn voice(&self) -> &str;

    async fn synthesize(&self, text: &str, locale: Locale) -> Result<GeneratedAsset>;
}

/// Durable home for generated bytes
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Store bytes under `key` and return a public URL. Writing the same key
    /// twice is harmless.
    async fn put(&self, key: &str, bytes: &[u8], mime: &str) -> Result<String>;
}

/// Every external dependency the job handlers use
#[derive(Clone)]
pub struct Generators {
    pub translator: Arc<dyn ContentTranslator>,
    pub planner: Arc<dyn StoryPlanner>,
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub storage: Arc<dyn AssetStorage>,
}

impl Generators {
    /// One HTTP client for all generation, plus a storage backend
    pub fn from_openai(client: OpenAiClient, storage: Arc<dyn AssetStorage>) -> Self {
        let client = Arc::new(client);
        Self {
            translator: client.clone(),
            planner: client.clone(),
            images: client.clone(),
            speech: client,
            storage,
        }
    }
}
