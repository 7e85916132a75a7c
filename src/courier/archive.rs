//! Once-per-edition archival.

use super::EditionCourier;
use crate::channels::ArchiveRequest;
use crate::db::ProcessedEdition;
use crate::error::Result;
use crate::retry::bounded_call;
use crate::types::{ArchiveOutcome, Artifact, Edition, EditionKey, Event};
use crate::utils::dropoff_file_name;
use std::sync::Arc;

impl EditionCourier {
    /// Archive the edition unless an earlier run already did
    ///
    /// Runs once per edition regardless of recipient count. An archive backend
    /// failure is reported as [`ArchiveOutcome::Failed`] and never affects the
    /// delivery results; only a failure to record the archive location in the
    /// tracking store is returned as `Err`.
    pub(crate) async fn archive_edition(
        &self,
        publication_id: &str,
        edition: &Edition,
        key: &EditionKey,
        artifact: Arc<Artifact>,
        checkpoint: Option<&ProcessedEdition>,
    ) -> Result<ArchiveOutcome> {
        let Some(archive) = &self.collaborators.archive else {
            tracing::debug!(publication_id = %publication_id, "No archive backend configured");
            return Ok(ArchiveOutcome::NotConfigured);
        };

        if let Some(record) = checkpoint.filter(|record| record.archived_at.is_some()) {
            tracing::info!(
                publication_id = %publication_id,
                edition_key = %key,
                location = record.archive_location.as_deref().unwrap_or("unknown"),
                "Edition already archived by an earlier run"
            );
            return Ok(ArchiveOutcome::AlreadyArchived {
                location: record.archive_location.clone(),
            });
        }

        let request = ArchiveRequest {
            publication_id: publication_id.to_string(),
            edition_key: key.clone(),
            edition: edition.clone(),
            file_name: dropoff_file_name(edition, &artifact),
            artifact,
        };

        let archived = bounded_call(
            "archive",
            self.config.timeouts.archive,
            &self.config.retry,
            || archive.archive(request.clone()),
        )
        .await;

        match archived {
            Ok(location) => {
                self.tracker
                    .record_archived(publication_id, edition, &location.location)
                    .await?;
                tracing::info!(
                    publication_id = %publication_id,
                    edition_key = %key,
                    backend = archive.name(),
                    location = %location.location,
                    "Edition archived"
                );
                self.emit_event(Event::Archived {
                    publication_id: publication_id.to_string(),
                    edition_key: key.clone(),
                    location: location.location.clone(),
                });
                Ok(ArchiveOutcome::Archived {
                    location: location.location,
                    container: location.container,
                })
            }
            Err(e) => {
                tracing::warn!(
                    publication_id = %publication_id,
                    edition_key = %key,
                    backend = archive.name(),
                    error = %e,
                    "Archival failed; deliveries are unaffected"
                );
                self.emit_event(Event::ArchiveFailed {
                    publication_id: publication_id.to_string(),
                    error: e.to_string(),
                });
                Ok(ArchiveOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }
}
