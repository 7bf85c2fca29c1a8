//! Fake generation services shared by the integration tests.
//!
//! Each fake counts its calls so tests can assert that work was not
//! repeated.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use eduforge::adapters::{
    AssetStorage, ContentTranslator, GeneratedAsset, Generators, ImageGenerator,
    SpeechSynthesizer, StoryDraft, StoryPlanner,
};
use eduforge::braille::BrailleEngine;
use eduforge::core::{Dispatcher, DispatcherConfig, JobHandlers, Store};
use eduforge::domain::{Locale, PlannedSlide};

/// Prefixes every string with the locale, e.g. `[es] Force`
#[derive(Default)]
pub struct FakeTranslator {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

fn tag_strings(value: &Value, tag: &str) -> Value {
    match value {
        Value::String(s) => Value::String(format!("[{}] {}", tag, s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| tag_strings(v, tag)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), tag_strings(v, tag)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[async_trait]
impl ContentTranslator for FakeTranslator {
    fn model(&self) -> &str {
        "fake-translator"
    }

    async fn translate(&self, payload: &Value, locale: Locale) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("fake translator down");
        }
        Ok(tag_strings(payload, locale.as_str()))
    }
}

/// Plans `slides` numbered slides regardless of the payload
pub struct FakePlanner {
    pub calls: AtomicUsize,
    pub slides: AtomicUsize,
}

impl Default for FakePlanner {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            slides: AtomicUsize::new(3),
        }
    }
}

#[async_trait]
impl StoryPlanner for FakePlanner {
    fn model(&self) -> &str {
        "fake-planner"
    }

    async fn plan(&self, _payload: &Value, locale: Locale, _max: usize) -> Result<StoryDraft> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = self.slides.load(Ordering::SeqCst);
        Ok(StoryDraft {
            title: Some(format!("Story ({})", locale)),
            slides: (0..count)
                .map(|i| PlannedSlide {
                    caption: format!("Slide {} caption", i),
                    image_prompt: format!("Picture of step {}", i),
                })
                .collect(),
        })
    }
}

#[derive(Default)]
pub struct FakeImages {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, prompt: &str) -> Result<GeneratedAsset> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedAsset::new(prompt.as_bytes().to_vec(), "image/png"))
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    fn voice(&self) -> &str {
        "fake-voice"
    }

    async fn synthesize(&self, text: &str, _locale: Locale) -> Result<GeneratedAsset> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedAsset::new(text.as_bytes().to_vec(), "audio/mpeg"))
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl AssetStorage for MemoryStorage {
    async fn put(&self, key: &str, bytes: &[u8], _mime: &str) -> Result<String> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("mem://{}", key))
    }
}

/// All fakes, kept around for call counting
#[derive(Default, Clone)]
pub struct Fakes {
    pub translator: Arc<FakeTranslator>,
    pub planner: Arc<FakePlanner>,
    pub images: Arc<FakeImages>,
    pub speech: Arc<FakeSpeech>,
    pub storage: Arc<MemoryStorage>,
}

impl Fakes {
    pub fn generators(&self) -> Generators {
        Generators {
            translator: self.translator.clone(),
            planner: self.planner.clone(),
            images: self.images.clone(),
            speech: self.speech.clone(),
            storage: self.storage.clone(),
        }
    }

    pub fn handlers(&self, store: &Arc<Store>) -> JobHandlers {
        JobHandlers::new(store.clone(), self.generators(), BrailleEngine::default())
    }

    pub fn dispatcher(&self, store: &Arc<Store>) -> Dispatcher {
        Dispatcher::new(
            store.clone(),
            self.handlers(store),
            DispatcherConfig {
                poll_interval: Duration::from_millis(10),
                worker_id: "test-worker".to_string(),
                ..DispatcherConfig::default()
            },
        )
    }
}

pub fn memory_store() -> Arc<Store> {
    Arc::new(Store::open_in_memory().unwrap())
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
