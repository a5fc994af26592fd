//! Pipeline behaviour across writers: failure isolation, repeatability, sub-batch flushes

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lensdex_core::{Delimiter, DocumentSchema, FieldKind, IndexerConfig};
use lensdex_exec::{ExecError, OutputTarget, PipelineOrchestrator};
use lensdex_io::store::MemoryIndexStore;
use lensdex_operators::GroupLayout;
use serde_json::json;

fn ratings_schema() -> DocumentSchema {
    DocumentSchema::positional([
        ("UserID", FieldKind::String),
        ("MovieID", FieldKind::String),
        ("Rating", FieldKind::String),
        ("Timestamp", FieldKind::timestamp(1000)),
    ])
}

/// `users` users with `per_user` ratings each, sorted by user.
fn setup_ratings(dir: &Path, users: usize, per_user: usize) -> PathBuf {
    let mut body = String::new();
    for u in 1..=users {
        for m in 0..per_user {
            writeln!(body, "{}::{}::{}::{}", u, 100 + m, 1 + (u + m) % 5, 978_300_000 + m)
                .expect("Failed to format row");
        }
    }
    let path = dir.join("ratings.dat");
    fs::write(&path, body).expect("Failed to write ratings");
    path
}

fn config(lines_per_bulk: usize) -> IndexerConfig {
    IndexerConfig {
        lines_per_bulk,
        groups_per_bulk: 2,
        queue_capacity: 3,
        report_progress: false,
        ..IndexerConfig::default()
    }
}

fn ratings_pipeline(path: &Path, cfg: IndexerConfig) -> PipelineOrchestrator {
    PipelineOrchestrator::new(path, ratings_schema(), Delimiter::DoubleColon, cfg)
        .expect("Failed to build pipeline")
        .main_output(OutputTarget::new("ratings", "rating"))
}

#[tokio::test]
async fn test_failed_batch_is_dropped_and_run_continues() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = setup_ratings(dir.path(), 5, 4); // 20 lines, 4 batches of 5

    let store = MemoryIndexStore::new();
    store.fail_bulk_call(2);
    let summary = ratings_pipeline(&path, config(5))
        .run(Arc::new(store.clone()))
        .await
        .expect("Run failed");

    let out = summary.output("ratings").expect("ratings stats");
    assert_eq!(out.documents_built, 20);
    assert_eq!(out.batches_written, 3);
    assert_eq!(out.batches_failed, 1);
    assert_eq!(out.documents_written, 15);
    assert_eq!(out.documents_dropped, 5);

    // lines 6-10 went missing: three of user 2's ratings and two of user 3's
    let users: Vec<_> = store
        .documents("ratings")
        .into_iter()
        .map(|(_, b)| b["UserID"].clone())
        .collect();
    assert_eq!(users.len(), 15);
    let count = |u: &str| users.iter().filter(|v| **v == json!(u)).count();
    assert_eq!(count("1"), 4);
    assert_eq!(count("2"), 1);
    assert_eq!(count("3"), 2);
    assert_eq!(count("4"), 4);
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_payloads() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = setup_ratings(dir.path(), 6, 3);

    let mut digests = Vec::new();
    let mut run_ids = Vec::new();
    for _ in 0..2 {
        let store = MemoryIndexStore::new();
        let summary = ratings_pipeline(&path, config(4))
            .group_output(
                OutputTarget::new("user_ratings", "user_ratings"),
                0,
                GroupLayout::new("UserID", "ratings"),
                None,
            )
            .expect("Failed to add group output")
            .run(Arc::new(store))
            .await
            .expect("Run failed");
        let pair: Vec<_> = summary
            .outputs
            .iter()
            .map(|o| (o.index.clone(), o.payload_digest))
            .collect();
        digests.push(pair);
        run_ids.push(summary.id);
    }
    assert_eq!(digests[0], digests[1]);
    assert!(digests[0].iter().all(|(_, d)| d.is_some()));
    assert_ne!(run_ids[0], run_ids[1]);
}

#[tokio::test]
async fn test_flush_threshold_splits_large_groups() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = setup_ratings(dir.path(), 2, 5);

    let store = MemoryIndexStore::new();
    let cfg = IndexerConfig {
        group_flush_threshold: Some(2),
        ..config(100)
    };
    let summary = PipelineOrchestrator::new(&path, ratings_schema(), Delimiter::DoubleColon, cfg)
        .expect("Failed to build pipeline")
        .group_output(
            OutputTarget::new("user_ratings", "user_ratings"),
            0,
            GroupLayout::new("UserID", "ratings"),
            None,
        )
        .expect("Failed to add group output")
        .run(Arc::new(store.clone()))
        .await
        .expect("Run failed");

    let docs = store.documents("user_ratings");
    let shape: Vec<_> = docs
        .iter()
        .map(|(h, b)| {
            (
                h["index"]["_id"].as_str().unwrap_or_default().to_string(),
                b["ratings"].as_array().map(Vec::len).unwrap_or(0),
            )
        })
        .collect();
    let expected: Vec<(String, usize)> = vec![
        ("1".into(), 2),
        ("1.1".into(), 2),
        ("1.2".into(), 1),
        ("2".into(), 2),
        ("2.1".into(), 2),
        ("2.2".into(), 1),
    ];
    assert_eq!(shape, expected);

    // every rating is carried exactly once
    let carried: usize = shape.iter().map(|(_, n)| n).sum();
    assert_eq!(carried, 10);
    assert_eq!(summary.output("user_ratings").map(|o| o.documents_built), Some(6));
}

#[tokio::test]
async fn test_missing_primary_file_is_fatal() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = MemoryIndexStore::new();
    let err = ratings_pipeline(&dir.path().join("absent.dat"), config(10))
        .run(Arc::new(store.clone()))
        .await
        .expect_err("missing file must fail");
    assert!(matches!(err, ExecError::Io(_)));
    assert_eq!(store.bulk_calls(), 0);
}
