//! Cache-first read path.
//!
//! A read never waits for generation. It answers from the artifact cache
//! when it can; otherwise it enqueues the job that will produce the artifact
//! and answers with what it has (the canonical payload, or nothing) plus a
//! cache state telling the caller to poll again.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::{BrailleFormat, BrailleScope, Locale, StorySlide};

use super::keys::{braille_job, story_audio_job, story_image_job, story_plan_job, translate_job};
use super::store::{Store, StoreError};

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// The requested locale is the canonical one
    Canonical,
    /// A stored translation
    Translation,
    /// No translation yet; canonical payload returned and translation queued
    CanonicalFallback,
    /// The artifact exists
    Ready,
    /// Generation has been scheduled
    Queued,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentResponse {
    pub payload: Value,
    pub version: i64,
    pub locale: Locale,
    pub cache: CacheState,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryResponse {
    pub title: Option<String>,
    pub slides: Vec<StorySlide>,
    pub version: i64,
    pub locale: Locale,
    pub cache: CacheState,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrailleResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub braille_text: Option<String>,
    pub version: i64,
    pub locale: Locale,
    pub scope: BrailleScope,
    pub format: BrailleFormat,
    pub cache: CacheState,
}

/// Read access to content and its artifacts
#[derive(Clone)]
pub struct ContentReader {
    store: Arc<Store>,
}

impl ContentReader {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Content in a locale. `version` 0 means latest.
    #[instrument(skip(self))]
    pub fn read_content(
        &self,
        content_key: &str,
        locale: &str,
        version: i64,
    ) -> Result<ContentResponse, StoreError> {
        let content = self.store.get_canonical(content_key, version)?;
        let locale = Locale::normalize(locale);

        let respond = |payload: Value, cache: CacheState| ContentResponse {
            payload,
            version: content.version,
            locale,
            cache,
        };

        if locale == Locale::normalize(&content.canonical_locale) {
            return Ok(respond(content.payload.clone(), CacheState::Canonical));
        }

        if let Some(translation) =
            self.store
                .get_translation(&content.content_key, content.version, locale.as_str())?
        {
            return Ok(respond(translation.translated_payload, CacheState::Translation));
        }

        let queued = self.store.enqueue(translate_job(&content, locale))?;
        debug!(job_id = %queued.job().id, new = queued.is_new(), "Translation pending");
        Ok(respond(content.payload.clone(), CacheState::CanonicalFallback))
    }

    /// Story deck in a locale. A ready deck may still have slides whose image
    /// or narration is being generated.
    #[instrument(skip(self))]
    pub fn read_story(
        &self,
        content_key: &str,
        locale: &str,
        version: i64,
    ) -> Result<StoryResponse, StoreError> {
        let content = self.store.get_canonical(content_key, version)?;
        let locale = Locale::normalize(locale);

        let Some(plan) =
            self.store
                .get_story_plan(&content.content_key, content.version, locale.as_str())?
        else {
            let queued = self.store.enqueue(story_plan_job(&content, locale))?;
            debug!(job_id = %queued.job().id, new = queued.is_new(), "Story plan pending");
            return Ok(StoryResponse {
                title: None,
                slides: Vec::new(),
                version: content.version,
                locale,
                cache: CacheState::Queued,
            });
        };

        let slides =
            self.store
                .list_story_slides(&content.content_key, content.version, locale.as_str())?;
        for slide in &slides {
            if slide.image.is_none() {
                self.store.enqueue(story_image_job(slide))?;
            }
            if slide.audio.is_none() {
                self.store.enqueue(story_audio_job(slide))?;
            }
        }

        Ok(StoryResponse {
            title: plan.title,
            slides,
            version: content.version,
            locale,
            cache: CacheState::Ready,
        })
    }

    /// Braille transcription of a payload scope
    #[instrument(skip(self))]
    pub fn read_braille(
        &self,
        content_key: &str,
        locale: &str,
        version: i64,
        scope: &BrailleScope,
        format: BrailleFormat,
    ) -> Result<BrailleResponse, StoreError> {
        let content = self.store.get_canonical(content_key, version)?;
        let locale = Locale::normalize(locale);

        let export = self.store.get_braille_export(
            &content.content_key,
            content.version,
            locale.as_str(),
            scope,
            format,
        )?;

        let (braille_text, cache) = match export {
            Some(export) => (Some(export.braille_text), CacheState::Ready),
            None => {
                let queued = self
                    .store
                    .enqueue(braille_job(&content, locale, scope, format))?;
                debug!(job_id = %queued.job().id, new = queued.is_new(), "Braille export pending");
                (None, CacheState::Queued)
            }
        };

        Ok(BrailleResponse {
            braille_text,
            version: content.version,
            locale,
            scope: scope.clone(),
            format,
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reader() -> (Arc<Store>, ContentReader) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        (store.clone(), ContentReader::new(store))
    }

    #[test]
    fn test_canonical_locale_needs_no_job() {
        let (store, reader) = reader();
        store.insert_version("ch:1", "en", &json!({"body": "hi"})).unwrap();

        let response = reader.read_content("ch:1", "en-US", 0).unwrap();
        assert_eq!(response.cache, CacheState::Canonical);
        assert_eq!(response.version, 1);
        assert_eq!(store.queue_status().unwrap().total(), 0);
    }

    #[test]
    fn test_missing_translation_falls_back_and_queues() {
        let (store, reader) = reader();
        store.insert_version("ch:1", "en", &json!({"body": "hi"})).unwrap();

        let response = reader.read_content("ch:1", "es-MX", 0).unwrap();
        assert_eq!(response.cache, CacheState::CanonicalFallback);
        assert_eq!(response.payload, json!({"body": "hi"}));
        assert_eq!(response.locale, Locale::Es);
        assert_eq!(store.queue_status().unwrap().queued, 1);
    }

    #[test]
    fn test_unknown_content_is_not_found() {
        let (_store, reader) = reader();
        assert!(reader.read_content("nope", "en", 0).unwrap_err().is_not_found());
        assert!(reader.read_story("nope", "en", 0).unwrap_err().is_not_found());
        assert!(reader
            .read_braille("nope", "en", 0, &BrailleScope::Full, BrailleFormat::Text)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_cache_state_serializes_snake_case() {
        let json = serde_json::to_string(&CacheState::CanonicalFallback).unwrap();
        assert_eq!(json, "\"canonical_fallback\"");
    }
}
