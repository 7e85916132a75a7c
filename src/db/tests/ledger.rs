use crate::db::*;
use crate::types::Channel;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_record_delivery_is_idempotent_per_pair() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.record_delivery("v2:mf:2026-10", "alice@example.com", Channel::Dropoff, Some("file:///MF/a.pdf"))
        .await
        .unwrap();
    db.record_delivery("v2:mf:2026-10", "alice@example.com", Channel::Dropoff, Some("file:///MF/b.pdf"))
        .await
        .unwrap();
    db.record_delivery("v2:mf:2026-10", "alice@example.com", Channel::Notify, None)
        .await
        .unwrap();

    let entries = db.list_deliveries("v2:mf:2026-10").await.unwrap();
    assert_eq!(entries.len(), 2);
    let dropoff = entries.iter().find(|e| e.channel == "dropoff").unwrap();
    assert_eq!(dropoff.reference.as_deref(), Some("file:///MF/a.pdf"));

    db.close().await;
}

#[tokio::test]
async fn test_delivered_channels_are_scoped_to_edition_and_recipient() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.record_delivery("v2:mf:2026-10", "alice@example.com", Channel::Notify, None)
        .await
        .unwrap();
    db.record_delivery("v2:mf:2026-09", "bob@example.com", Channel::Dropoff, None)
        .await
        .unwrap();

    assert_eq!(
        db.delivered_channels("v2:mf:2026-10", "alice@example.com")
            .await
            .unwrap(),
        vec![Channel::Notify]
    );
    assert!(
        db.delivered_channels("v2:mf:2026-10", "bob@example.com")
            .await
            .unwrap()
            .is_empty()
    );

    db.close().await;
}
