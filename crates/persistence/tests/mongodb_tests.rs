//! MongoDB document store tests.
//!
//! - Opt-in via `DIAGNOVET_TEST_MONGODB_URI`, pointing at a replica set
//!   (transactions are unavailable on standalone servers).
//! - Each test works in its own database and wipes it afterwards.
//!
//! Run with:
//! `DIAGNOVET_TEST_MONGODB_URI=mongodb://localhost:27017/?replicaSet=rs0 cargo test -p diagnovet-persistence --features mongodb --test mongodb_tests`

#![cfg(feature = "mongodb")]

mod common;

use diagnovet_persistence::backends::document::DocumentBackend;
use diagnovet_persistence::core::DiagnosisRepository;
use diagnovet_persistence::error::{BackendError, StorageError, TransactionError};

use common::*;

fn mongodb_uri() -> Option<String> {
    std::env::var("DIAGNOVET_TEST_MONGODB_URI")
        .ok()
        .filter(|uri| !uri.trim().is_empty())
}

async fn connect() -> Option<DocumentBackend> {
    let Some(uri) = mongodb_uri() else {
        eprintln!("skipping MongoDB test (set DIAGNOVET_TEST_MONGODB_URI)");
        return None;
    };
    let database = format!("diagnovet_test_{}", uuid::Uuid::new_v4().simple());
    Some(
        DocumentBackend::connect_mongodb(&uri, &database)
            .await
            .expect("connect to MongoDB"),
    )
}

async fn cleanup(backend: &DocumentBackend) {
    let report = backend.wipe_all().await.unwrap();
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_mongodb_round_trips() {
    let Some(backend) = connect().await else {
        return;
    };
    backend.health_check().await.unwrap();
    check_rex_round_trip(&backend).await;
    check_nested_round_trip(&backend).await;
    check_missing_lookups_are_empty(&backend).await;
    cleanup(&backend).await;
}

#[tokio::test]
async fn test_mongodb_reference_reuse() {
    let Some(backend) = connect().await else {
        return;
    };
    check_reference_entities_are_reused(&backend).await;
    cleanup(&backend).await;
}

#[tokio::test]
async fn test_mongodb_delete_and_wipe() {
    let Some(backend) = connect().await else {
        return;
    };
    check_delete_removes_report_subtree(&backend).await;
    cleanup(&backend).await;
    check_wipe_clears_everything(&backend).await;
    cleanup(&backend).await;
}

#[tokio::test]
async fn test_mongodb_summaries() {
    let Some(backend) = connect().await else {
        return;
    };
    check_summaries_are_ordered(&backend).await;
    cleanup(&backend).await;
}

#[tokio::test]
async fn test_mongodb_oversized_aggregate_writes_nothing() {
    let Some(backend) = connect().await else {
        return;
    };
    let err = backend
        .create_diagnosis(&wide_diagnosis(10, 60))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StorageError::Transaction(TransactionError::BatchTooLarge { .. })
    ));
    assert!(backend.list_patients().await.unwrap().is_empty());
    cleanup(&backend).await;
}

#[tokio::test]
async fn test_mongodb_unreachable_server() {
    if mongodb_uri().is_none() {
        eprintln!("skipping MongoDB test (set DIAGNOVET_TEST_MONGODB_URI)");
        return;
    }
    let err = DocumentBackend::connect_mongodb(
        "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200",
        "diagnovet_unreachable",
    )
    .await
    .err()
    .unwrap();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::ConnectionFailed { .. })
    ));
}
