//! Job constructors with their idempotency keys.
//!
//! A key is the job's semantic identity: kind, address, and the hash of the
//! input it reads. Two requests for the same unit of work always build the
//! same key, so the queue collapses them into one row.

use crate::domain::{
    BrailleFormat, BrailleScope, ContentVersion, JobKind, Locale, NewJob, StorySlide,
};

use super::hashing::idempotency_key;

pub fn translate_job(content: &ContentVersion, locale: Locale) -> NewJob {
    let version = content.version.to_string();
    let key = idempotency_key(&[
        JobKind::TranslateContent.as_str(),
        &content.content_key,
        &version,
        locale.as_str(),
        &content.payload_hash,
    ]);
    NewJob::new(JobKind::TranslateContent, &content.content_key, content.version, key)
        .with_locale(locale.as_str())
}

pub fn story_plan_job(content: &ContentVersion, locale: Locale) -> NewJob {
    let version = content.version.to_string();
    let key = idempotency_key(&[
        JobKind::BuildStoryPlan.as_str(),
        &content.content_key,
        &version,
        locale.as_str(),
        &content.payload_hash,
    ]);
    NewJob::new(JobKind::BuildStoryPlan, &content.content_key, content.version, key)
        .with_locale(locale.as_str())
}

pub fn story_image_job(slide: &StorySlide) -> NewJob {
    let version = slide.version.to_string();
    let index = slide.slide_index.to_string();
    let key = idempotency_key(&[
        JobKind::GenerateStoryImage.as_str(),
        &slide.content_key,
        &version,
        &slide.locale,
        &index,
        &slide.prompt_hash,
    ]);
    NewJob::new(JobKind::GenerateStoryImage, &slide.content_key, slide.version, key)
        .with_locale(&slide.locale)
        .with_slide_index(slide.slide_index)
}

pub fn story_audio_job(slide: &StorySlide) -> NewJob {
    let version = slide.version.to_string();
    let index = slide.slide_index.to_string();
    let key = idempotency_key(&[
        JobKind::GenerateStoryAudio.as_str(),
        &slide.content_key,
        &version,
        &slide.locale,
        &index,
        &slide.caption_hash,
    ]);
    NewJob::new(JobKind::GenerateStoryAudio, &slide.content_key, slide.version, key)
        .with_locale(&slide.locale)
        .with_slide_index(slide.slide_index)
}

pub fn braille_job(
    content: &ContentVersion,
    locale: Locale,
    scope: &BrailleScope,
    format: BrailleFormat,
) -> NewJob {
    let version = content.version.to_string();
    let scope = scope.to_string();
    let key = idempotency_key(&[
        JobKind::BuildBrailleExport.as_str(),
        &content.content_key,
        &version,
        locale.as_str(),
        &scope,
        format.as_str(),
        &content.payload_hash,
    ]);
    NewJob::new(JobKind::BuildBrailleExport, &content.content_key, content.version, key)
        .with_locale(locale.as_str())
        .with_scope(scope)
        .with_format(format.as_str())
}
