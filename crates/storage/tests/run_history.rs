// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs through the orchestrator into a real history file.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stonebench_core::{
    BenchError, BenchmarkOrchestrator, OrchestratorBuilder, OrchestratorConfig, RunConfig, RunState,
    RunStatus, StaticSystemInfo, WorkloadKind,
};
use stonebench_storage::{HistoryFilter, ResultStore, StoreError};
use tempfile::TempDir;

const ENDLESS: u64 = 1 << 40;

fn orchestrator(store: &Arc<ResultStore>) -> BenchmarkOrchestrator {
    let config =
        OrchestratorConfig::new(Duration::from_millis(20), 500, Duration::from_millis(10)).unwrap();
    OrchestratorBuilder::new()
        .config(config)
        .sink(store.clone())
        .build()
        .unwrap()
}

fn temp_store() -> (TempDir, Arc<ResultStore>) {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::open(dir.path().join("history.jsonl")).unwrap();
    (dir, Arc::new(store))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pystone_run_lands_in_history() {
    let (_dir, store) = temp_store();
    let orchestrator = orchestrator(&store);

    let result = orchestrator.run(RunConfig::new(50_000)).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.raw_timing.iterations, 50_000);
    assert!(result.raw_timing.ops_per_second > 0.0);
    assert!(result.raw_timing.elapsed_nanos > 0);
    assert!(!result.sample_series.is_empty());
    assert!(result.system_info.contains_key("stonebench_version"));

    let entries: Vec<_> = store.all().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result.id, result.id);
    assert_eq!(store.get(result.id).unwrap().result, result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_run_is_stored_as_cancelled() {
    let (_dir, store) = temp_store();
    let orchestrator = orchestrator(&store);

    let handle = orchestrator.start(RunConfig::new(ENDLESS)).unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    orchestrator.cancel();
    let result = handle.wait().await.unwrap();

    let stored = store.get(result.id).unwrap().result;
    assert_eq!(stored.status, RunStatus::Cancelled);
    assert!(stored.raw_timing.iterations < stored.requested_iterations);
    assert_eq!(stored.requested_iterations, ENDLESS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_is_a_cancellation() {
    let (_dir, store) = temp_store();
    let orchestrator = orchestrator(&store);

    let config = RunConfig::new(ENDLESS)
        .with_workload(WorkloadKind::MemoryChurn)
        .with_timeout(Duration::from_millis(50));
    let result = orchestrator.run(config).await.unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(orchestrator.state(), RunState::Cancelled);
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_start_conflicts() {
    let (_dir, store) = temp_store();
    let orchestrator = orchestrator(&store);

    let handle = orchestrator.start(RunConfig::new(ENDLESS)).unwrap();
    let err = orchestrator.start(RunConfig::new(1_000)).unwrap_err();
    assert!(matches!(err, BenchError::Conflict { .. }));

    orchestrator.cancel();
    handle.wait().await.unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unwritable_history_returns_unsaved_result() {
    let dir = TempDir::new().unwrap();
    let history_dir = dir.path().join("vanishing");
    let store = Arc::new(ResultStore::open(history_dir.join("history.jsonl")).unwrap());
    fs::remove_dir_all(&history_dir).unwrap();

    let orchestrator = orchestrator(&store);
    let err = orchestrator.run(RunConfig::new(2_000)).await.unwrap_err();

    let unsaved = err.unsaved_result().unwrap();
    assert_eq!(unsaved.status, RunStatus::Failed);
    assert_eq!(unsaved.raw_timing.iterations, 2_000);
    assert_eq!(orchestrator.state(), RunState::Failed);
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_history_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    let store = Arc::new(ResultStore::open(&path).unwrap());
    let orchestrator = OrchestratorBuilder::new()
        .sink(store.clone())
        .system_info(Arc::new(StaticSystemInfo::default()))
        .build()
        .unwrap();

    let original = orchestrator
        .run(RunConfig::new(3_000).with_workload(WorkloadKind::IntegerSort))
        .await
        .unwrap();
    drop(orchestrator);
    drop(store);

    let reloaded = ResultStore::open(&path).unwrap();
    let entry = reloaded.get(original.id).unwrap();
    let loaded = entry.result;

    assert_eq!(loaded.id, original.id);
    assert_eq!(loaded.workload, WorkloadKind::IntegerSort);
    assert_eq!(loaded.status, original.status);
    assert_eq!(loaded.started_at, original.started_at);
    assert_eq!(loaded.finished_at, original.finished_at);
    assert_eq!(loaded.raw_timing.iterations, original.raw_timing.iterations);
    assert!((loaded.raw_timing.ops_per_second - original.raw_timing.ops_per_second).abs() < 1e-6);
    assert_eq!(loaded.sample_series.len(), original.sample_series.len());
    assert_eq!(
        loaded.summary_stats.metrics.keys().collect::<Vec<_>>(),
        original.summary_stats.metrics.keys().collect::<Vec<_>>()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_window_and_self_compare() {
    let (_dir, store) = temp_store();
    let orchestrator = orchestrator(&store);

    let first = orchestrator.run(RunConfig::new(500)).await.unwrap();
    let t0 = Utc::now();
    let second = orchestrator.run(RunConfig::new(500)).await.unwrap();
    let third = orchestrator.run(RunConfig::new(500)).await.unwrap();
    let t1 = Utc::now();

    let window: Vec<_> = store
        .query(HistoryFilter::new().since(t0).until(t1))
        .map(|entry| entry.result.id)
        .collect();
    assert_eq!(window, vec![third.id, second.id]);
    assert!(!window.contains(&first.id));

    let comparison = store.compare(second.id, second.id).unwrap();
    for delta in comparison.deltas.values() {
        assert!(delta.absolute.is_none() || delta.absolute == Some(0.0));
    }

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(store.compare(first.id, missing), Err(StoreError::NotFound(_))));
}

#[test]
fn test_incompatible_history_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    fs::write(
        &path,
        "{\"kind\":\"entry\",\"schema_version\":2,\"seq\":0,\"appended_at\":\"2025-01-01T00:00:00Z\"}\n",
    )
    .unwrap();

    assert!(matches!(
        ResultStore::open(&path),
        Err(StoreError::Schema { found: 2, supported: 1, .. })
    ));
}
