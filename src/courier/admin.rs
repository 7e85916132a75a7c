//! Administrative operations on the tracking store.

use super::EditionCourier;
use crate::db::RekeySummary;
use crate::error::Result;
use crate::tracking::EditionKeyScheme;
use crate::types::Edition;

impl EditionCourier {
    /// Forget that `edition` of `publication_id` was delivered
    ///
    /// The next run delivers it again to every eligible recipient. Returns
    /// whether a tracking record existed.
    pub async fn force_reprocess(&self, publication_id: &str, edition: &Edition) -> Result<bool> {
        tracing::info!(
            publication_id = %publication_id,
            title = %edition.title,
            "Forcing re-delivery of edition"
        );
        self.tracker.force_reprocess(publication_id, edition).await
    }

    /// Move every tracking record from key scheme `from` to `to`
    ///
    /// Must run before a courier configured with `to` can process editions
    /// against a store keyed with `from`.
    pub async fn rekey_editions(
        &self,
        from: EditionKeyScheme,
        to: EditionKeyScheme,
    ) -> Result<RekeySummary> {
        let configured = self.config.tracking.key_scheme;
        if configured != to {
            tracing::warn!(
                configured = %configured,
                target = %to,
                "Rekeying to a scheme this courier is not configured for; runs will be refused until the configuration matches"
            );
        }

        let summary = self.db.rekey_processed_editions(from, to).await?;
        tracing::info!(
            from = %from,
            to = %to,
            examined = summary.examined,
            rekeyed = summary.rekeyed,
            merged = summary.merged,
            "Tracking records rekeyed"
        );
        Ok(summary)
    }
}
