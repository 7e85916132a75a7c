//! Per-publication pipeline: DISCOVER → DOWNLOAD → DELIVER → ARCHIVE → DONE.

use super::EditionCourier;
use super::fan_out::FanOut;
use crate::error::Error;
use crate::retry::bounded_call;
use crate::types::{
    ArchiveOutcome, Edition, EditionKey, Event, FailureKind, Publication, PublicationResult,
    PublicationStatus, Recipient, SkipReason,
};
use std::sync::Arc;

impl EditionCourier {
    /// Run the pipeline for one publication
    ///
    /// Expected failures come back as result values; only a panic escapes.
    pub(crate) async fn process_publication(
        &self,
        publication: Publication,
        recipients: Arc<Vec<Recipient>>,
        dry_run: bool,
    ) -> PublicationResult {
        let publication_id = publication.id.clone();

        if let Err(e) = publication.validate() {
            tracing::error!(publication_id = %publication_id, error = %e, "Invalid publication document");
            return PublicationResult::failed(
                &publication_id,
                FailureKind::InvalidDocument,
                e.to_string(),
            );
        }

        // DISCOVER
        let source = &self.collaborators.source;
        let discovered = bounded_call(
            "discovery",
            self.config.timeouts.discovery,
            &self.config.retry,
            || source.discover_latest_edition(&publication),
        )
        .await;

        let edition = match discovered {
            Ok(Some(edition)) => edition,
            Ok(None) => {
                tracing::info!(publication_id = %publication_id, "No edition available");
                return self.skip(&publication_id, SkipReason::NoNewEdition, None, None);
            }
            Err(e) => {
                let kind = match FailureKind::classify(&e) {
                    FailureKind::Authentication => FailureKind::Authentication,
                    _ => FailureKind::Discovery,
                };
                tracing::warn!(publication_id = %publication_id, error = %e, "Discovery failed");
                return PublicationResult::failed(&publication_id, kind, e.to_string());
            }
        };

        let key = self.tracker.key(&publication_id, &edition);
        tracing::info!(
            publication_id = %publication_id,
            edition_key = %key,
            title = %edition.title,
            "Edition discovered"
        );
        self.emit_event(Event::EditionDiscovered {
            publication_id: publication_id.clone(),
            edition_key: key.clone(),
            title: edition.title.clone(),
        });

        match self.tracker.is_already_processed(&publication_id, &edition).await {
            Ok(true) => {
                tracing::info!(
                    publication_id = %publication_id,
                    edition_key = %key,
                    "Edition already processed"
                );
                return self.skip(
                    &publication_id,
                    SkipReason::AlreadyProcessed,
                    Some(edition),
                    Some(key),
                );
            }
            Ok(false) => {}
            Err(e) => return store_failure(&publication_id, edition, key, e),
        }

        if dry_run {
            return self.simulate(&publication, edition, key, &recipients);
        }

        let checkpoint = match self.tracker.checkpoint(&key).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => return store_failure(&publication_id, edition, key, e),
        };
        if checkpoint.is_some() {
            tracing::info!(
                publication_id = %publication_id,
                edition_key = %key,
                "Resuming interrupted edition"
            );
        }

        // DOWNLOAD
        let downloaded = bounded_call(
            "download",
            self.config.timeouts.download,
            &self.config.retry,
            || source.download(&edition),
        )
        .await;

        let artifact = match downloaded {
            Ok(artifact) => Arc::new(artifact),
            Err(e) => {
                tracing::warn!(
                    publication_id = %publication_id,
                    edition_key = %key,
                    error = %e,
                    "Download failed; edition stays unprocessed"
                );
                // An expired source login is as fatal here as during discovery
                let kind = match FailureKind::classify(&e) {
                    FailureKind::Authentication => FailureKind::Authentication,
                    _ => FailureKind::Download,
                };
                let mut result = PublicationResult::failed(&publication_id, kind, e.to_string());
                result.edition = Some(edition);
                result.edition_key = Some(key);
                return result;
            }
        };

        let artifact_ref = artifact.reference();
        if let Err(e) = self
            .tracker
            .record_downloaded(&publication_id, &edition, &artifact_ref)
            .await
        {
            return store_failure(&publication_id, edition, key, e);
        }
        self.emit_event(Event::EditionDownloaded {
            publication_id: publication_id.clone(),
            edition_key: key.clone(),
            file_name: artifact.file_name.clone(),
            size_bytes: artifact.data.len() as u64,
        });

        // DELIVER
        let FanOut { counts, deliveries } = match self
            .fan_out(&publication, &edition, &key, Arc::clone(&artifact), &recipients)
            .await
        {
            Ok(fan_out) => fan_out,
            Err(e) => return store_failure(&publication_id, edition, key, e),
        };

        if counts.notify_failed == 0
            && let Err(e) = self.tracker.record_notified(&publication_id, &edition).await
        {
            return store_failure(&publication_id, edition, key, e);
        }
        if counts.dropoff_failed == 0
            && let Err(e) = self
                .tracker
                .record_dropoff_completed(&publication_id, &edition)
                .await
        {
            return store_failure(&publication_id, edition, key, e);
        }

        // ARCHIVE
        let archive = match self
            .archive_edition(&publication_id, &edition, &key, artifact, checkpoint.as_ref())
            .await
        {
            Ok(archive) => archive,
            Err(e) => return store_failure(&publication_id, edition, key, e),
        };

        // DONE
        if let Err(e) = self
            .tracker
            .mark_as_processed(&publication_id, &edition, Some(&artifact_ref))
            .await
        {
            return store_failure(&publication_id, edition, key, e);
        }

        tracing::info!(
            publication_id = %publication_id,
            edition_key = %key,
            notified = counts.notified,
            dropped_off = counts.dropped_off,
            failures = counts.notify_failed + counts.dropoff_failed,
            "Edition processed"
        );

        PublicationResult {
            publication_id,
            success: true,
            status: PublicationStatus::Processed,
            edition: Some(edition),
            edition_key: Some(key),
            counts,
            archive,
            deliveries,
            dry_run: false,
        }
    }

    /// Dry-run tail of the pipeline: resolve and report, touch nothing
    fn simulate(
        &self,
        publication: &Publication,
        edition: Edition,
        key: EditionKey,
        recipients: &[Recipient],
    ) -> PublicationResult {
        let FanOut { counts, deliveries } = self.simulate_fan_out(publication, &edition, recipients);
        let archive = if self.collaborators.archive.is_some() {
            ArchiveOutcome::Simulated
        } else {
            ArchiveOutcome::NotConfigured
        };

        tracing::info!(
            publication_id = %publication.id,
            edition_key = %key,
            would_notify = counts.notified,
            would_drop_off = counts.dropped_off,
            "Dry run: edition would be delivered"
        );

        PublicationResult {
            publication_id: publication.id.clone(),
            success: true,
            status: PublicationStatus::Processed,
            edition: Some(edition),
            edition_key: Some(key),
            counts,
            archive,
            deliveries,
            dry_run: true,
        }
    }

    fn skip(
        &self,
        publication_id: &str,
        reason: SkipReason,
        edition: Option<Edition>,
        key: Option<EditionKey>,
    ) -> PublicationResult {
        self.emit_event(Event::PublicationSkipped {
            publication_id: publication_id.to_string(),
            reason,
        });
        PublicationResult::skipped(publication_id, reason, edition, key)
    }
}

fn store_failure(
    publication_id: &str,
    edition: Edition,
    key: EditionKey,
    error: Error,
) -> PublicationResult {
    tracing::error!(
        publication_id = %publication_id,
        edition_key = %key,
        error = %error,
        "Tracking store failed; stopping publication"
    );
    let mut result =
        PublicationResult::failed(publication_id, FailureKind::TrackingStore, error.to_string());
    result.edition = Some(edition);
    result.edition_key = Some(key);
    result
}
