//! Job handlers: one async function per job kind.
//!
//! Every handler is safe to run more than once for the same job. Each checks
//! for its artifact first and writes with insert-if-absent, so a duplicate
//! execution costs at most one redundant generator call.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::adapters::Generators;
use crate::braille::{extract_text, BrailleEngine, BrfLayout, ConvertOptions};
use crate::domain::{
    BrailleExport, BrailleFormat, BrailleScope, ContentTranslation, ContentVersion, Job, JobKind,
    Locale, StoredAsset, StoryAudio, StoryPlan, StorySlide, MAX_STORY_SLIDES,
};

use super::hashing::{hash_bytes, hash_text, payload_hash};
use super::store::Store;

/// What a handler did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The artifact was generated and stored
    Written,

    /// The artifact was already there; nothing was generated
    AlreadyPresent,
}

impl HandlerOutcome {
    fn from_inserted(inserted: bool) -> Self {
        if inserted {
            Self::Written
        } else {
            Self::AlreadyPresent
        }
    }
}

/// Dispatch table from job kind to handler
#[derive(Clone)]
pub struct JobHandlers {
    store: Arc<Store>,
    generators: Generators,
    braille: BrailleEngine,
    layout: BrfLayout,
}

impl JobHandlers {
    pub fn new(store: Arc<Store>, generators: Generators, braille: BrailleEngine) -> Self {
        Self {
            store,
            generators,
            braille,
            layout: BrfLayout::default(),
        }
    }

    /// Page geometry for BRF exports
    pub fn with_layout(mut self, layout: BrfLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Run the handler for a job's kind
    #[instrument(
        skip(self, job),
        fields(job_id = %job.id, kind = %job.kind, content_key = %job.content_key)
    )]
    pub async fn handle(&self, job: &Job) -> Result<HandlerOutcome> {
        match job.kind {
            JobKind::TranslateContent => self.translate_content(job).await,
            JobKind::BuildStoryPlan => self.build_story_plan(job).await,
            JobKind::GenerateStoryImage => self.generate_story_image(job).await,
            JobKind::GenerateStoryAudio => self.generate_story_audio(job).await,
            JobKind::BuildBrailleExport => self.build_braille_export(job).await,
        }
    }

    // ========================================================================
    // Translation
    // ========================================================================

    async fn translate_content(&self, job: &Job) -> Result<HandlerOutcome> {
        let locale = Locale::normalize(job.require_locale()?);
        let content = self.store.get_canonical(&job.content_key, job.version)?;

        if self
            .store
            .get_translation(&content.content_key, content.version, locale.as_str())?
            .is_some()
        {
            debug!("Translation already stored");
            return Ok(HandlerOutcome::AlreadyPresent);
        }

        let translator = &self.generators.translator;
        let translated = translator
            .translate(&content.payload, locale)
            .await
            .with_context(|| format!("Translating {} v{}", content.content_key, content.version))?;

        let inserted = self.store.insert_translation(&ContentTranslation {
            content_key: content.content_key.clone(),
            version: content.version,
            locale: locale.as_str().to_string(),
            translated_hash: payload_hash(&translated),
            translated_payload: translated,
            model: translator.model().to_string(),
            created_at: Utc::now(),
        })?;

        info!(locale = %locale, inserted, "Stored translation");
        Ok(HandlerOutcome::from_inserted(inserted))
    }

    // ========================================================================
    // Story decks
    // ========================================================================

    async fn build_story_plan(&self, job: &Job) -> Result<HandlerOutcome> {
        let locale = Locale::normalize(job.require_locale()?);
        let content = self.store.get_canonical(&job.content_key, job.version)?;

        if let Some(plan) =
            self.store
                .get_story_plan(&content.content_key, content.version, locale.as_str())?
        {
            // A previous run may have died between the plan and its slides
            self.insert_slides(&plan)?;
            return Ok(HandlerOutcome::AlreadyPresent);
        }

        let payload = self.locale_payload(&content, locale)?;
        let planner = &self.generators.planner;
        let mut draft = planner
            .plan(&payload, locale, MAX_STORY_SLIDES)
            .await
            .with_context(|| {
                format!("Planning story for {} v{}", content.content_key, content.version)
            })?;

        draft.slides.retain(|s| !s.caption.trim().is_empty());
        draft.slides.truncate(MAX_STORY_SLIDES);
        if draft.slides.is_empty() {
            anyhow::bail!("Story planner returned no slides");
        }

        let plan_hash = payload_hash(&serde_json::json!({
            "title": draft.title,
            "slides": draft.slides,
        }));
        let inserted = self.store.insert_story_plan(&StoryPlan {
            content_key: content.content_key.clone(),
            version: content.version,
            locale: locale.as_str().to_string(),
            title: draft.title,
            slides: draft.slides,
            plan_hash,
            model: planner.model().to_string(),
            created_at: Utc::now(),
        })?;

        // Slides always follow whichever plan won the insert
        let plan = self
            .store
            .get_story_plan(&content.content_key, content.version, locale.as_str())?
            .context("Story plan vanished after insert")?;
        let slides = self.insert_slides(&plan)?;

        info!(locale = %locale, slides, inserted, "Stored story plan");
        Ok(HandlerOutcome::from_inserted(inserted))
    }

    /// Insert-if-absent a slide row for every planned slide
    fn insert_slides(&self, plan: &StoryPlan) -> Result<usize> {
        let now = Utc::now();
        for (index, planned) in plan.slides.iter().enumerate() {
            self.store.insert_story_slide(&StorySlide {
                content_key: plan.content_key.clone(),
                version: plan.version,
                locale: plan.locale.clone(),
                slide_index: index as i64,
                caption: planned.caption.clone(),
                caption_hash: hash_text(&planned.caption),
                prompt: planned.image_prompt.clone(),
                prompt_hash: hash_text(&planned.image_prompt),
                image: None,
                audio: None,
                created_at: now,
                updated_at: now,
            })?;
        }
        Ok(plan.slides.len())
    }

    fn load_slide(&self, job: &Job) -> Result<StorySlide> {
        let locale = job.require_locale()?;
        let index = job.require_slide_index()?;
        self.store
            .get_story_slide(&job.content_key, job.version, locale, index)?
            .with_context(|| {
                format!(
                    "Slide {} of {} v{} ({}) not found",
                    index, job.content_key, job.version, locale
                )
            })
    }

    async fn generate_story_image(&self, job: &Job) -> Result<HandlerOutcome> {
        let slide = self.load_slide(job)?;
        if slide.image.is_some() {
            debug!(slide = slide.slide_index, "Slide already has an image");
            return Ok(HandlerOutcome::AlreadyPresent);
        }

        let asset = self
            .generators
            .images
            .generate(&slide.prompt)
            .await
            .with_context(|| format!("Generating image for slide {}", slide.slide_index))?;

        let hash = hash_bytes(&asset.bytes);
        let key = format!("images/{}.{}", hash, asset.extension());
        let url = self
            .generators
            .storage
            .put(&key, &asset.bytes, &asset.mime)
            .await
            .context("Storing slide image")?;

        let attached = self.store.attach_slide_image(
            &slide.content_key,
            slide.version,
            &slide.locale,
            slide.slide_index,
            &StoredAsset {
                url,
                mime: asset.mime,
                hash,
            },
        )?;

        info!(slide = slide.slide_index, attached, "Stored slide image");
        Ok(HandlerOutcome::from_inserted(attached))
    }

    async fn generate_story_audio(&self, job: &Job) -> Result<HandlerOutcome> {
        let slide = self.load_slide(job)?;
        let locale = Locale::normalize(&slide.locale);

        if self
            .store
            .get_story_audio(&slide.content_key, slide.version, &slide.locale, slide.slide_index)?
            .is_some()
        {
            debug!(slide = slide.slide_index, "Slide already has narration");
            return Ok(HandlerOutcome::AlreadyPresent);
        }

        let speech = &self.generators.speech;
        let asset = speech
            .synthesize(&slide.caption, locale)
            .await
            .with_context(|| format!("Synthesizing narration for slide {}", slide.slide_index))?;

        let hash = hash_bytes(&asset.bytes);
        let key = format!("audio/{}.{}", hash, asset.extension());
        let url = self
            .generators
            .storage
            .put(&key, &asset.bytes, &asset.mime)
            .await
            .context("Storing slide narration")?;

        let inserted = self.store.insert_story_audio(&StoryAudio {
            content_key: slide.content_key.clone(),
            version: slide.version,
            locale: slide.locale.clone(),
            slide_index: slide.slide_index,
            caption_hash: slide.caption_hash.clone(),
            audio: StoredAsset {
                url,
                mime: asset.mime,
                hash,
            },
            voice: speech.voice().to_string(),
            created_at: Utc::now(),
        })?;

        info!(slide = slide.slide_index, inserted, "Stored slide narration");
        Ok(HandlerOutcome::from_inserted(inserted))
    }

    // ========================================================================
    // Braille
    // ========================================================================

    async fn build_braille_export(&self, job: &Job) -> Result<HandlerOutcome> {
        let locale = Locale::normalize(job.require_locale()?);
        let scope: BrailleScope = job.scope.as_deref().unwrap_or("full").parse()?;
        let format: BrailleFormat = job.format.as_deref().unwrap_or("text").parse()?;
        let content = self.store.get_canonical(&job.content_key, job.version)?;

        if self
            .store
            .get_braille_export(
                &content.content_key,
                content.version,
                locale.as_str(),
                &scope,
                format,
            )?
            .is_some()
        {
            debug!("Braille export already stored");
            return Ok(HandlerOutcome::AlreadyPresent);
        }

        let payload = self.locale_payload(&content, locale)?;
        let text = extract_text(&payload, &scope)
            .with_context(|| format!("No text in scope '{}' of {}", scope, content.content_key))?;

        let engine = self.braille.clone();
        // Generated and translated text carries typographic punctuation
        let options = ConvertOptions {
            normalize: true,
            layout: self.layout,
        };
        let result = tokio::task::spawn_blocking(move || engine.convert(&text, &options))
            .await
            .context("Braille conversion task panicked")?;

        if !result.success {
            anyhow::bail!(
                "Braille transcription failed: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        let braille_text = match format {
            BrailleFormat::Text => result.full_braille,
            BrailleFormat::Brf => result.brf,
        };
        let inserted = self.store.insert_braille_export(&BrailleExport {
            content_key: content.content_key.clone(),
            version: content.version,
            locale: locale.as_str().to_string(),
            scope,
            format,
            braille_hash: hash_text(&braille_text),
            braille_text,
            created_at: Utc::now(),
        })?;

        info!(
            locale = %locale,
            format = %format,
            cells = result.stats.braille_cells,
            inserted,
            "Stored braille export"
        );
        Ok(HandlerOutcome::from_inserted(inserted))
    }

    /// The payload in the requested locale: the canonical one when the locale
    /// matches, else a stored translation, else the canonical as a fallback
    fn locale_payload(&self, content: &ContentVersion, locale: Locale) -> Result<Value> {
        if Locale::normalize(&content.canonical_locale) == locale {
            return Ok(content.payload.clone());
        }
        let translation =
            self.store
                .get_translation(&content.content_key, content.version, locale.as_str())?;
        Ok(match translation {
            Some(t) => t.translated_payload,
            None => content.payload.clone(),
        })
    }
}
