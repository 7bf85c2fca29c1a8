//! Dispatcher Integration Tests
//!
//! Reads enqueue work, a dispatcher with fake generators runs it, and the
//! next read sees the artifact.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{calls, memory_store, Fakes};
use eduforge::braille::{BrailleEngine, ConvertOptions};
use eduforge::core::{
    story_image_job, story_plan_job, translate_job, CacheState, ContentReader, HandlerOutcome,
};
use eduforge::domain::{BrailleFormat, BrailleScope, JobStatus, Locale};

const LESSON: &str = "Force is $F = ma$ where F is force.";

#[tokio::test]
async fn test_translation_round_trip() {
    let store = memory_store();
    let fakes = Fakes::default();
    let reader = ContentReader::new(store.clone());
    store
        .insert_version("ch:1", "en", &json!({"title": "Motion"}))
        .unwrap();

    let first = reader.read_content("ch:1", "es", 0).unwrap();
    assert_eq!(first.cache, CacheState::CanonicalFallback);

    let stats = fakes.dispatcher(&store).run_bounded(10).await.unwrap();
    assert_eq!(stats.claimed, 1);
    assert_eq!(stats.succeeded, 1);

    let second = reader.read_content("ch:1", "es", 0).unwrap();
    assert_eq!(second.cache, CacheState::Translation);
    assert_eq!(second.payload, json!({"title": "[es] Motion"}));
    assert_eq!(calls(&fakes.translator.calls), 1);
}

#[tokio::test]
async fn test_handler_failure_is_recorded_and_loop_continues() {
    let store = memory_store();
    let fakes = Fakes::default();
    fakes.translator.fail.store(true, Ordering::SeqCst);
    let reader = ContentReader::new(store.clone());
    let content = store
        .insert_version("ch:1", "en", &json!({"body": LESSON}))
        .unwrap();

    reader.read_content("ch:1", "es", 0).unwrap();
    reader
        .read_braille("ch:1", "en", 0, &BrailleScope::Full, BrailleFormat::Text)
        .unwrap();

    let dispatcher = fakes.dispatcher(&store);
    let stats = dispatcher.run_bounded(10).await.unwrap();
    assert_eq!(stats.claimed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 1);

    let key = translate_job(&content, Locale::Es).idempotency_key;
    let failed = store.get_job_by_key(&key).unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("fake translator down"));

    // Failed jobs are not retried, and reads do not enqueue them again
    let again = dispatcher.run_bounded(10).await.unwrap();
    assert_eq!(again.claimed, 0);
    let before = store.queue_status().unwrap().total();
    let read = reader.read_content("ch:1", "es", 0).unwrap();
    assert_eq!(read.cache, CacheState::CanonicalFallback);
    assert_eq!(store.queue_status().unwrap().total(), before);
}

#[tokio::test]
async fn test_story_deck_is_truncated_and_completed() {
    let store = memory_store();
    let fakes = Fakes::default();
    fakes.planner.slides.store(10, Ordering::SeqCst);
    let reader = ContentReader::new(store.clone());
    let content = store
        .insert_version("ch:1", "en", &json!({"body": LESSON}))
        .unwrap();

    let queued = reader.read_story("ch:1", "en", 0).unwrap();
    assert_eq!(queued.cache, CacheState::Queued);
    assert!(queued.slides.is_empty());

    let dispatcher = fakes.dispatcher(&store);
    dispatcher.run_bounded(1).await.unwrap();

    let ready = reader.read_story("ch:1", "en", 0).unwrap();
    assert_eq!(ready.cache, CacheState::Ready);
    assert_eq!(ready.slides.len(), 8);
    assert!(ready.slides.iter().all(|s| s.image.is_none()));

    // One plan job plus an image and an audio job per slide
    assert_eq!(store.queue_status().unwrap().queued, 16);
    let stats = dispatcher.run_bounded(100).await.unwrap();
    assert_eq!(stats.succeeded, 16);
    assert_eq!(calls(&fakes.images.calls), 8);
    assert_eq!(calls(&fakes.speech.calls), 8);

    let done = reader.read_story("ch:1", "en", 0).unwrap();
    assert!(done.slides.iter().all(|s| s.image.is_some() && s.audio.is_some()));
    assert_eq!(store.queue_status().unwrap().total(), 17);

    // Re-running the plan job does not call the planner again
    let handlers = fakes.handlers(&store);
    let plan_key = story_plan_job(&content, Locale::En).idempotency_key;
    let plan_job = store.get_job_by_key(&plan_key).unwrap().unwrap();
    let outcome = handlers.handle(&plan_job).await.unwrap();
    assert_eq!(outcome, HandlerOutcome::AlreadyPresent);
    assert_eq!(calls(&fakes.planner.calls), 1);
}

#[tokio::test]
async fn test_image_job_is_noop_when_slide_has_image() {
    let store = memory_store();
    let fakes = Fakes::default();
    let reader = ContentReader::new(store.clone());
    store
        .insert_version("ch:1", "en", &json!({"body": LESSON}))
        .unwrap();

    let dispatcher = fakes.dispatcher(&store);
    reader.read_story("ch:1", "en", 0).unwrap();
    dispatcher.run_bounded(1).await.unwrap();
    let deck = reader.read_story("ch:1", "en", 0).unwrap();
    dispatcher.run_bounded(100).await.unwrap();
    assert_eq!(calls(&fakes.images.calls), 3);

    let key = story_image_job(&deck.slides[0]).idempotency_key;
    let job = store.get_job_by_key(&key).unwrap().unwrap();
    let outcome = fakes.handlers(&store).handle(&job).await.unwrap();

    assert_eq!(outcome, HandlerOutcome::AlreadyPresent);
    assert_eq!(calls(&fakes.images.calls), 3);
}

#[tokio::test]
async fn test_braille_exports_match_direct_conversion() {
    let store = memory_store();
    let fakes = Fakes::default();
    let reader = ContentReader::new(store.clone());
    store
        .insert_version("ch:1", "en", &json!({"title": "Motion", "body": LESSON}))
        .unwrap();
    let body = BrailleScope::Field("body".to_string());

    for format in [BrailleFormat::Text, BrailleFormat::Brf] {
        let queued = reader.read_braille("ch:1", "en", 0, &body, format).unwrap();
        assert_eq!(queued.cache, CacheState::Queued);
        assert!(queued.braille_text.is_none());
    }

    let stats = fakes.dispatcher(&store).run_bounded(10).await.unwrap();
    assert_eq!(stats.succeeded, 2);

    let options = ConvertOptions {
        normalize: true,
        ..ConvertOptions::default()
    };
    let direct = BrailleEngine::default().convert(LESSON, &options);
    let text = reader
        .read_braille("ch:1", "en", 0, &body, BrailleFormat::Text)
        .unwrap();
    assert_eq!(text.cache, CacheState::Ready);
    assert_eq!(text.braille_text.as_deref(), Some(direct.full_braille.as_str()));

    let brf = reader
        .read_braille("ch:1", "en", 0, &body, BrailleFormat::Brf)
        .unwrap();
    assert_eq!(brf.braille_text.as_deref(), Some(direct.brf.as_str()));
}

#[tokio::test]
async fn test_braille_export_accepts_typographic_punctuation() {
    let store = memory_store();
    let fakes = Fakes::default();
    let reader = ContentReader::new(store.clone());
    store
        .insert_version(
            "ch:1",
            "en",
            &json!({
                "body": "Newton’s second law — force equals mass times acceleration.",
                "note": "Wait… it’s «simple», and “so” is the answer – mostly."
            }),
        )
        .unwrap();

    reader
        .read_braille("ch:1", "en", 0, &BrailleScope::Full, BrailleFormat::Text)
        .unwrap();
    let stats = fakes.dispatcher(&store).run_bounded(10).await.unwrap();
    assert_eq!(stats.failed, 0, "{:?}", store.queue_status().unwrap().recent[0].error);
    assert_eq!(stats.succeeded, 1);

    let export = reader
        .read_braille("ch:1", "en", 0, &BrailleScope::Full, BrailleFormat::Text)
        .unwrap();
    assert_eq!(export.cache, CacheState::Ready);
    assert!(export.braille_text.is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_braille_export_of_missing_field_fails() {
    let store = memory_store();
    let fakes = Fakes::default();
    let reader = ContentReader::new(store.clone());
    store
        .insert_version("ch:1", "en", &json!({"title": "Motion"}))
        .unwrap();

    let scope = BrailleScope::Field("quiz".to_string());
    reader
        .read_braille("ch:1", "en", 0, &scope, BrailleFormat::Text)
        .unwrap();
    let stats = fakes.dispatcher(&store).run_bounded(10).await.unwrap();

    assert_eq!(stats.failed, 1);
    let status = store.queue_status().unwrap();
    assert!(status.recent[0]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("quiz"));
}

#[tokio::test]
async fn test_spawned_worker_processes_and_stops() {
    let store = memory_store();
    let fakes = Fakes::default();
    let reader = ContentReader::new(store.clone());
    let content = store
        .insert_version("ch:1", "en", &json!({"title": "Motion"}))
        .unwrap();

    let handle = Arc::new(fakes.dispatcher(&store)).spawn();
    reader.read_content("ch:1", "hi", 0).unwrap();

    let key = translate_job(&content, Locale::Hi).idempotency_key;
    let mut finished = false;
    for _ in 0..200 {
        let job = store.get_job_by_key(&key).unwrap().unwrap();
        if job.status == JobStatus::Succeeded {
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = handle.stop().await.unwrap();
    assert!(finished);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(
        reader.read_content("ch:1", "hi", 0).unwrap().cache,
        CacheState::Translation
    );
}
