use super::edition;
use crate::db::*;
use crate::types::ArtifactRef;
use tempfile::NamedTempFile;

fn artifact() -> ArtifactRef {
    ArtifactRef {
        name: "mf-2026-10.pdf".to_string(),
        sha256: "ab".repeat(32),
    }
}

#[tokio::test]
async fn test_stage_stamps_alone_do_not_mark_processed() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let ed = edition("MF 10/2026", "Issue 10/2026", (2026, 10, 1));
    let identity = EditionIdentity {
        edition_key: "v2:mf:2026-10",
        publication_id: "mf",
        edition: &ed,
    };

    db.record_edition_stage(identity, EditionStage::Downloaded, Some(&artifact()), None)
        .await
        .unwrap();
    db.record_edition_stage(identity, EditionStage::Notified, None, None)
        .await
        .unwrap();

    assert!(!db.is_edition_processed("v2:mf:2026-10").await.unwrap());

    let record = db
        .get_processed_edition("v2:mf:2026-10")
        .await
        .unwrap()
        .unwrap();
    assert!(record.downloaded_at.is_some());
    assert!(record.notified_at.is_some());
    assert!(record.dropoff_completed_at.is_none());
    assert!(record.archived_at.is_none());
    assert!(!record.is_processed());
    assert_eq!(record.artifact_name.as_deref(), Some("mf-2026-10.pdf"));
    assert_eq!(record.edition().unwrap(), ed);

    db.close().await;
}

#[tokio::test]
async fn test_marking_processed_keeps_earlier_stamps_and_details() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let ed = edition("MF 10/2026", "Issue 10/2026", (2026, 10, 1));
    let identity = EditionIdentity {
        edition_key: "v2:mf:2026-10",
        publication_id: "mf",
        edition: &ed,
    };

    db.record_edition_stage(
        identity,
        EditionStage::Archived,
        None,
        Some("/archive/mf/2026/2026-10-01 - MF 10-2026.pdf"),
    )
    .await
    .unwrap();
    let archived_at = db
        .get_processed_edition("v2:mf:2026-10")
        .await
        .unwrap()
        .unwrap()
        .archived_at;

    // Marking twice is harmless
    db.record_edition_stage(identity, EditionStage::Processed, Some(&artifact()), None)
        .await
        .unwrap();
    db.record_edition_stage(identity, EditionStage::Processed, None, None)
        .await
        .unwrap();

    let record = db
        .get_processed_edition("v2:mf:2026-10")
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_processed());
    assert_eq!(record.archived_at, archived_at);
    assert_eq!(
        record.archive_location.as_deref(),
        Some("/archive/mf/2026/2026-10-01 - MF 10-2026.pdf")
    );
    assert_eq!(record.artifact_sha256, Some("ab".repeat(32)));
    assert!(db.is_edition_processed("v2:mf:2026-10").await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn test_unknown_key_is_not_processed() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert!(!db.is_edition_processed("v2:mf:1999-01").await.unwrap());
    assert!(db.get_processed_edition("v2:mf:1999-01").await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_delete_processed_edition_reports_existence_and_clears_ledger() {
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
    db.record_delivery(
        "v2:mf:2026-10",
        "alice@example.com",
        crate::types::Channel::Notify,
        None,
    )
    .await
    .unwrap();

    assert!(db.delete_processed_edition("v2:mf:2026-10").await.unwrap());
    assert!(!db.is_edition_processed("v2:mf:2026-10").await.unwrap());
    assert!(db.list_deliveries("v2:mf:2026-10").await.unwrap().is_empty());

    assert!(!db.delete_processed_edition("v2:mf:2026-10").await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn test_list_processed_editions_filters_by_publication() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let sept = edition("MF 09/2026", "Issue 9/2026", (2026, 9, 1));
    let oct = edition("MF 10/2026", "Issue 10/2026", (2026, 10, 1));
    let other = edition("Weekly 41", "41", (2026, 10, 9));

    for (key, publication_id, ed) in [
        ("v2:mf:2026-09", "mf", &sept),
        ("v2:mf:2026-10", "mf", &oct),
        ("v2:weekly:41", "weekly", &other),
    ] {
        let identity = EditionIdentity {
            edition_key: key,
            publication_id,
            edition: ed,
        };
        db.record_edition_stage(identity, EditionStage::Processed, None, None)
            .await
            .unwrap();
    }

    let mf = db.list_processed_editions(Some("mf")).await.unwrap();
    let keys: Vec<&str> = mf.iter().map(|r| r.edition_key.as_str()).collect();
    assert_eq!(keys, vec!["v2:mf:2026-10", "v2:mf:2026-09"]);

    assert_eq!(db.list_processed_editions(None).await.unwrap().len(), 3);

    db.close().await;
}

#[tokio::test]
async fn test_tracking_meta_upsert() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert!(db.get_tracking_meta("edition_key_scheme").await.unwrap().is_none());
    db.set_tracking_meta("edition_key_scheme", "v1").await.unwrap();
    db.set_tracking_meta("edition_key_scheme", "v2").await.unwrap();
    assert_eq!(
        db.get_tracking_meta("edition_key_scheme")
            .await
            .unwrap()
            .as_deref(),
        Some("v2")
    );

    db.close().await;
}
