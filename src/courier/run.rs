//! Run entry points and per-publication task isolation.

use super::EditionCourier;
use crate::error::Result;
use crate::report::RunReport;
use crate::types::{
    Event, FailureKind, Publication, PublicationResult, PublicationStatus, Recipient,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

impl EditionCourier {
    /// Deliver the latest edition of every publication to `recipients`
    ///
    /// Publications are processed with at most
    /// `delivery.max_concurrent_publications` in flight; results keep the
    /// input order. Honors `delivery.dry_run`.
    ///
    /// Only run-level problems are returned as `Err`: the tracking store being
    /// keyed under another scheme, or the store being unreachable before the
    /// first publication starts. Everything else lands in the report.
    pub async fn run(
        &self,
        publications: Vec<Publication>,
        recipients: Vec<Recipient>,
    ) -> Result<RunReport> {
        self.run_with(publications, recipients, self.config.delivery.dry_run)
            .await
    }

    /// Report what a run would deliver without any side effect
    ///
    /// Discovery, tracking lookups and preference resolution happen as usual.
    /// Download, notification, drop-off, archival and every tracking write are
    /// suppressed; deliveries are reported as simulated.
    pub async fn dry_run(
        &self,
        publications: Vec<Publication>,
        recipients: Vec<Recipient>,
    ) -> Result<RunReport> {
        self.run_with(publications, recipients, true).await
    }

    /// Run for the enabled publications and active recipients in the store
    pub async fn run_from_store(&self) -> Result<RunReport> {
        let publications = self.db.list_publications(true).await?;
        let recipients = self.db.list_recipients(true).await?;
        self.run(publications, recipients).await
    }

    async fn run_with(
        &self,
        publications: Vec<Publication>,
        recipients: Vec<Recipient>,
        dry_run: bool,
    ) -> Result<RunReport> {
        let started_at = Utc::now();

        if dry_run {
            self.tracker.check_scheme().await?;
        } else {
            self.tracker.ensure_scheme().await?;
        }

        let recipients: Vec<Recipient> = recipients
            .into_iter()
            .filter(|recipient| match recipient.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        recipient = %recipient.identity,
                        error = %e,
                        "Skipping invalid recipient document"
                    );
                    false
                }
            })
            .collect();
        let recipients = Arc::new(recipients);

        tracing::info!(
            publications = publications.len(),
            recipients = recipients.len(),
            dry_run,
            "Starting delivery run"
        );

        // Aborting one run must not poison the courier for the next one
        let run_token = self.shutdown.child_token();

        let results: Vec<PublicationResult> = stream::iter(publications)
            .map(|publication| {
                let recipients = Arc::clone(&recipients);
                let token = run_token.clone();
                async move {
                    self.run_publication(publication, recipients, token, dry_run)
                        .await
                }
            })
            .buffered(self.config.delivery.max_concurrent_publications)
            .collect()
            .await;

        let report = RunReport::new(results, dry_run, started_at);

        tracing::info!(
            processed = report.summary.processed,
            skipped = report.summary.skipped,
            failed = report.summary.failed,
            needs_action = report.summary.needs_action,
            dry_run,
            "Delivery run complete"
        );
        self.emit_event(Event::RunComplete {
            processed: report.summary.processed,
            skipped: report.summary.skipped,
            failed: report.summary.failed,
            dry_run,
        });

        Ok(report)
    }

    /// Run one publication in its own task
    ///
    /// A panic inside the pipeline surfaces as a `JoinError` and becomes a
    /// failed result instead of taking the run down.
    async fn run_publication(
        &self,
        publication: Publication,
        recipients: Arc<Vec<Recipient>>,
        token: CancellationToken,
        dry_run: bool,
    ) -> PublicationResult {
        let publication_id = publication.id.clone();

        let mut result = if token.is_cancelled() {
            tracing::warn!(
                publication_id = %publication_id,
                "Run aborted before publication started"
            );
            PublicationResult::failed(&publication_id, FailureKind::Aborted, "run aborted")
        } else {
            let courier = self.clone();
            let task = tokio::spawn(async move {
                courier
                    .process_publication(publication, recipients, dry_run)
                    .await
            });

            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        publication_id = %publication_id,
                        error = %e,
                        "Publication task panicked"
                    );
                    PublicationResult::failed(
                        &publication_id,
                        FailureKind::Panicked,
                        format!("publication task failed: {}", e),
                    )
                }
            }
        };
        result.dry_run = dry_run;

        if let PublicationStatus::Failed { error, kind } = &result.status {
            if *kind == FailureKind::Authentication {
                tracing::error!(
                    publication_id = %publication_id,
                    error = %error,
                    "Source authentication failed; aborting remaining publications"
                );
                token.cancel();
            }
            self.emit_event(Event::PublicationFailed {
                publication_id: publication_id.clone(),
                kind: *kind,
                error: error.clone(),
            });
        }

        result
    }
}
