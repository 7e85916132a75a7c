use super::*;
use crate::courier::EditionCourier;
use crate::tracking::EditionKeyScheme;
use std::sync::Arc;

#[tokio::test]
async fn force_reprocess_delivers_again() {
    let (courier, mocks, _temp_dir) = create_test_courier().await;
    mocks.source.set("mf", Discovery::Edition(mf_edition()));

    courier.run(vec![publication("mf")], vec![alice()]).await.unwrap();
    assert!(courier.force_reprocess("mf", &mf_edition()).await.unwrap());
    assert!(!courier.force_reprocess("mf", &mf_edition()).await.unwrap());

    let report = courier.run(vec![publication("mf")], vec![alice()]).await.unwrap();

    assert!(report.results[0].is_processed());
    assert_eq!(report.results[0].counts.already_delivered, 0);
    assert_eq!(
        mocks.notifier.sent(),
        vec!["alice@example.com".to_string(), "alice@example.com".to_string()]
    );
}

#[tokio::test]
async fn rekey_lets_a_new_scheme_recognise_old_deliveries() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.tracking.key_scheme = EditionKeyScheme::PublicationDate;
    let (courier, mocks, temp_dir) = create_test_courier_with(config, temp_dir).await;
    mocks.source.set("mf", Discovery::Edition(mf_edition()));
    courier.run(vec![publication("mf")], vec![alice()]).await.unwrap();

    let mut config = test_config(&temp_dir);
    config.tracking.key_scheme = EditionKeyScheme::IssueNumber;
    let switched =
        EditionCourier::with_database(config, Arc::clone(&courier.db), mocks.collaborators())
            .unwrap();

    let refused = switched.run(vec![publication("mf")], vec![alice()]).await;
    assert!(refused.unwrap_err().is_fatal());

    let summary = switched
        .rekey_editions(EditionKeyScheme::PublicationDate, EditionKeyScheme::IssueNumber)
        .await
        .unwrap();
    assert_eq!(summary.examined, 1);
    assert_eq!(summary.rekeyed, 1);

    // Same edition republished with a corrected date is still recognised
    let mut corrected = mf_edition();
    corrected.publication_date = chrono::NaiveDate::from_ymd_opt(2026, 10, 2).unwrap();
    mocks.source.set("mf", Discovery::Edition(corrected));

    let report = switched.run(vec![publication("mf")], vec![alice()]).await.unwrap();
    assert_eq!(
        report.results[0].status,
        PublicationStatus::Skipped {
            reason: SkipReason::AlreadyProcessed
        }
    );
    assert_eq!(mocks.notifier.sent().len(), 1);
}
