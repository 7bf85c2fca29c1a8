//! Queue commands.
//!
//! - `eduforge worker` - Run a dispatcher until Ctrl-C
//! - `eduforge worker --once` - Run at most one job and exit
//! - `eduforge jobs` - Show queue status

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::adapters::{Generators, LocalAssetStorage, OpenAiClient};
use crate::config;
use crate::core::{Dispatcher, DispatcherConfig, JobHandlers};
use crate::domain::{Job, JobKind, JobStatus};

use super::open_store;

/// Run a worker against the configured database
pub async fn run_worker(once: bool, kind: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let kind_filter = kind
        .as_deref()
        .map(str::parse::<JobKind>)
        .transpose()
        .context("Invalid --kind")?;

    cfg.braille
        .check_backend()
        .context("Braille backend is not usable")?;

    let store = open_store()?;
    let storage = Arc::new(LocalAssetStorage::new(
        &cfg.assets_dir,
        &cfg.public_base_url,
    ));
    let client = OpenAiClient::from_settings(&cfg.generation)?;
    let handlers = JobHandlers::new(
        store.clone(),
        Generators::from_openai(client, storage),
        cfg.braille.engine(),
    )
    .with_layout(cfg.braille.layout);

    let dispatcher = Dispatcher::new(
        store,
        handlers,
        DispatcherConfig {
            poll_interval: cfg.worker.poll_interval,
            lease: cfg.worker.lease,
            kind_filter,
            ..DispatcherConfig::default()
        },
    );

    if once {
        match dispatcher.run_once().await? {
            Some(outcome) => {
                println!("{} {} -> {}", outcome.job_id, outcome.kind, outcome.status);
                if let Some(error) = outcome.error {
                    println!("  Error: {}", error);
                }
            }
            None => println!("No claimable jobs"),
        }
        return Ok(());
    }

    println!("👷 Worker {} running (Ctrl-C to stop)", dispatcher.config().worker_id);
    let handle = Arc::new(dispatcher).spawn();
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!("Stopping after the current job...");
    let stats = handle.stop().await?;
    println!();
    println!("Worker Summary:");
    println!("  Claimed:   {}", stats.claimed);
    println!("  Succeeded: {}", stats.succeeded);
    println!("  Failed:    {}", stats.failed);
    Ok(())
}

fn status_tag(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "QUEUE",
        JobStatus::Running => "RUN",
        JobStatus::Succeeded => "DONE",
        JobStatus::Failed => "FAIL",
    }
}

fn print_job(job: &Job) {
    println!("Job ID:    {}", job.id);
    println!("Type:      {}", job.kind);
    println!("Status:    {}", job.status);
    println!("Content:   {} v{}", job.content_key, job.version);
    if let Some(locale) = &job.locale {
        println!("Locale:    {}", locale);
    }
    if let Some(index) = job.slide_index {
        println!("Slide:     {}", index);
    }
    if let (Some(scope), Some(format)) = (&job.scope, &job.format) {
        println!("Export:    {} ({})", scope, format);
    }
    println!("Attempts:  {}", job.attempts);
    println!("Created:   {}", job.created_at);
    if job.status.is_terminal() {
        println!("Finished:  {}", job.updated_at);
    } else {
        println!("Updated:   {}", job.updated_at);
    }
    if let Some(error) = &job.error {
        println!("Error:     {}", error);
    }
}

/// Show one job or the queue summary
pub fn show_jobs(id: Option<String>) -> Result<()> {
    let store = open_store()?;

    if let Some(id) = id {
        let job_id =
            Uuid::parse_str(&id).with_context(|| format!("Invalid job ID: {}", id))?;
        let job = store
            .get_job(job_id)?
            .with_context(|| format!("Job not found: {}", job_id))?;
        print_job(&job);
        return Ok(());
    }

    let status = store.queue_status()?;
    println!();
    println!("Job Queue Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("  Queued:    {}", status.queued);
    println!("  Running:   {}", status.running);
    println!("  Succeeded: {}", status.succeeded);
    println!("  Failed:    {}", status.failed);
    println!("  Total:     {}", status.total());
    println!();

    if !status.recent.is_empty() {
        println!("Recent:");
        for job in &status.recent {
            let id = job.id.simple().to_string();
            println!(
                "  [{}] {} {} v{} ({})",
                status_tag(job.status),
                job.kind,
                job.content_key,
                job.version,
                &id[..8]
            );
        }
        println!();
    }

    Ok(())
}
