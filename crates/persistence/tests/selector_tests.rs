//! Repository selection tests.
//!
//! Run with: `cargo test -p diagnovet-persistence --test selector_tests`

mod common;

use std::sync::Arc;

use diagnovet_persistence::config::{DocumentStoreKind, RepositoryConfig};
use diagnovet_persistence::core::BackendKind;
use diagnovet_persistence::error::{BackendError, StorageError};
use diagnovet_persistence::{DiagnosisRepository, RepositorySelector};

use common::*;

#[tokio::test]
async fn test_document_selection_satisfies_contract() {
    let selector = RepositorySelector::new(RepositoryConfig::document_in_memory());
    let repository = selector.repository().await.unwrap();
    assert_eq!(repository.backend_kind(), BackendKind::Document);

    check_rex_round_trip(repository.as_ref()).await;
    check_missing_lookups_are_empty(repository.as_ref()).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_relational_selection_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("selected.db");
    let selector = RepositorySelector::new(RepositoryConfig::relational(
        path.to_string_lossy().into_owned(),
    ));

    let repository = selector.repository().await.unwrap();
    assert_eq!(repository.backend_kind(), BackendKind::Relational);
    check_nested_round_trip(repository.as_ref()).await;
    check_reference_entities_are_reused(repository.as_ref()).await;
}

#[tokio::test]
async fn test_selector_hands_out_one_instance() {
    let selector = Arc::new(RepositorySelector::new(
        RepositoryConfig::document_in_memory(),
    ));
    assert!(!selector.is_initialized());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let selector = selector.clone();
        handles.push(tokio::spawn(async move { selector.repository().await.unwrap() }));
    }
    let mut repositories = Vec::new();
    for handle in handles {
        repositories.push(handle.await.unwrap());
    }

    assert!(selector.is_initialized());
    for repository in &repositories[1..] {
        assert!(Arc::ptr_eq(&repositories[0], repository));
    }

    // State written through one handle is visible through another.
    let id = repositories[0].create_diagnosis(&rex()).await.unwrap();
    assert!(repositories[7].get_diagnosis(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_mongodb_without_uri_is_not_configured() {
    for uri in [None, Some("   ".to_string())] {
        let mut config = RepositoryConfig::document_in_memory();
        config.document.store = DocumentStoreKind::MongoDb;
        config.document.mongodb_uri = uri;

        let selector = RepositorySelector::new(config);
        let err = selector.repository().await.err().unwrap();
        assert!(err.is_not_configured());
        assert!(!selector.is_initialized());
    }
}

#[cfg(not(feature = "mongodb"))]
#[tokio::test]
async fn test_mongodb_needs_feature() {
    let mut config = RepositoryConfig::document_in_memory();
    config.document.store = DocumentStoreKind::MongoDb;
    config.document.mongodb_uri = Some("mongodb://localhost:27017".to_string());

    let err = RepositorySelector::new(config)
        .repository()
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::FeatureDisabled { .. })
    ));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_failed_construction_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("not-yet");
    let mut config = RepositoryConfig::relational(
        nested.join("retry.db").to_string_lossy().into_owned(),
    );
    config.sqlite.connection_timeout_ms = 200;
    let selector = RepositorySelector::new(config);

    let err = selector.repository().await.err().unwrap();
    assert!(matches!(
        err,
        StorageError::Backend(BackendError::ConnectionFailed { .. })
    ));
    assert!(!selector.is_initialized());

    std::fs::create_dir_all(&nested).unwrap();
    let repository = selector.repository().await.unwrap();
    repository.health_check().await.unwrap();
    assert!(selector.is_initialized());
}
