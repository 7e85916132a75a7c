use super::edition;
use crate::db::*;
use tempfile::NamedTempFile;

/// Queries after the pool is closed must error rather than hang or panic;
/// the pipeline relies on this to treat a dead store as a store failure.
#[tokio::test]
async fn test_is_edition_processed_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let ed = edition("MF 10/2026", "Issue 10/2026", (2026, 10, 1));
    let identity = EditionIdentity {
        edition_key: "v2:mf:2026-10",
        publication_id: "mf",
        edition: &ed,
    };
    db.record_edition_stage(identity, EditionStage::Processed, None, None)
        .await
        .unwrap();
    assert!(db.is_edition_processed("v2:mf:2026-10").await.unwrap());

    db.pool().close().await;

    let result = db.is_edition_processed("v2:mf:2026-10").await;
    assert!(
        result.is_err(),
        "lookup after pool close should return an error, got: {:?}",
        result
    );
}

#[tokio::test]
async fn test_upsert_recipient_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.pool().close().await;

    let result = db
        .upsert_recipient(&crate::types::Recipient::new("alice@example.com"))
        .await;
    assert!(result.is_err());
    assert!(result.unwrap_err().is_store_failure());
}
