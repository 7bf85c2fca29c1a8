//! Queue Concurrency Tests
//!
//! Several connections (as separate worker processes would have) share one
//! database file. Claims must never hand the same job out twice.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use eduforge::core::Store;
use eduforge::domain::{JobKind, JobStatus, NewJob};

const LEASE: Duration = Duration::from_secs(600);

fn open_many(dir: &TempDir, count: usize) -> Vec<Store> {
    let path = dir.path().join("queue.db");
    (0..count).map(|_| Store::open(&path).unwrap()).collect()
}

fn job(n: usize) -> NewJob {
    NewJob::new(
        JobKind::TranslateContent,
        "ch:1",
        1,
        format!("translate_content|ch:1|1|es|{}", n),
    )
    .with_locale("es")
}

#[test]
fn test_concurrent_claims_are_exclusive() {
    let temp = TempDir::new().unwrap();
    let stores = open_many(&temp, 8);
    let jobs = 5;
    for n in 0..jobs {
        stores[0].enqueue(job(n)).unwrap();
    }

    // More claimers than jobs: each claims once
    let barrier = Arc::new(Barrier::new(stores.len()));
    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.claim(None, LEASE).unwrap().map(|j| j.id)
            })
        })
        .collect();

    let claimed: Vec<Uuid> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(claimed.len(), jobs);
    let unique: HashSet<_> = claimed.iter().collect();
    assert_eq!(unique.len(), jobs);
}

#[test]
fn test_draining_workers_claim_every_job_once() {
    let temp = TempDir::new().unwrap();
    let stores = open_many(&temp, 4);
    let jobs = 40;
    for n in 0..jobs {
        stores[0].enqueue(job(n)).unwrap();
    }

    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            thread::spawn(move || {
                let mut ids = Vec::new();
                while let Some(job) = store.claim(None, LEASE).unwrap() {
                    store.ack(&job).unwrap();
                    ids.push(job.id);
                }
                ids
            })
        })
        .collect();

    let claimed: Vec<Uuid> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(claimed.len(), jobs);
    assert_eq!(claimed.iter().collect::<HashSet<_>>().len(), jobs);

    let path = temp.path().join("queue.db");
    let status = Store::open(&path).unwrap().queue_status().unwrap();
    assert_eq!(status.succeeded, jobs);
    assert_eq!(status.queued + status.running, 0);
}

#[test]
fn test_concurrent_enqueue_creates_one_row() {
    let temp = TempDir::new().unwrap();
    let stores = open_many(&temp, 6);

    let barrier = Arc::new(Barrier::new(stores.len()));
    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.enqueue(job(7)).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_new()).count(), 1);
    let first = results[0].job();
    assert!(results.iter().all(|r| r.job().id == first.id));
    assert!(results.iter().all(|r| r.job().status == JobStatus::Queued));
}
