//! One-time migration of tracking records to another edition key scheme.

use crate::error::DatabaseError;
use crate::tracking::{EditionKeyScheme, KEY_SCHEME_META};
use crate::{Error, Result};
use serde::Serialize;

use super::{Database, ProcessedEdition};

/// What a rekey migration changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RekeySummary {
    /// Records read
    pub examined: usize,
    /// Records moved to a new key
    pub rekeyed: usize,
    /// Records folded into a record that already had the new key
    pub merged: usize,
}

impl Database {
    /// Re-derive every edition key under `to`, in one transaction
    ///
    /// Keys are recomputed from the stored identity columns. When two records
    /// map to the same new key they are merged: the earliest stamp of each
    /// stage wins and details already present are kept. Ledger rows follow
    /// their record. The new scheme is recorded as active on commit.
    pub async fn rekey_processed_editions(
        &self,
        from: EditionKeyScheme,
        to: EditionKeyScheme,
    ) -> Result<RekeySummary> {
        let map_err = |what: &str, e: sqlx::Error| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to {} during rekey: {}",
                what, e
            )))
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err("begin transaction", e))?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM tracking_meta WHERE key = ?")
                .bind(KEY_SCHEME_META)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_err("read key scheme", e))?;

        if let Some(version) = stored.as_deref()
            && version != from.version()
        {
            return Err(Error::config(
                format!(
                    "tracking store is keyed with scheme {}, not {}",
                    version,
                    from.version()
                ),
                "tracking.key_scheme",
            ));
        }

        let rows = sqlx::query_as::<_, ProcessedEdition>(
            r#"
            SELECT
                edition_key, publication_id, title, issue, publication_date, source_ref,
                artifact_name, artifact_sha256, archive_location,
                downloaded_at, notified_at, dropoff_completed_at, archived_at, processed_at,
                created_at
            FROM processed_editions
            ORDER BY created_at, edition_key
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_err("read tracking records", e))?;

        let mut summary = RekeySummary {
            examined: rows.len(),
            ..RekeySummary::default()
        };

        for row in rows {
            let edition = row.edition()?;
            let new_key = to.key_for(&row.publication_id, &edition);
            if new_key.as_str() == row.edition_key {
                continue;
            }

            let collides: Option<String> =
                sqlx::query_scalar("SELECT edition_key FROM processed_editions WHERE edition_key = ?")
                    .bind(new_key.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_err("check key collision", e))?;

            sqlx::query("DELETE FROM processed_editions WHERE edition_key = ?")
                .bind(&row.edition_key)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_err("remove old key", e))?;

            // MIN() yields NULL when either side is NULL; COALESCE then picks
            // whichever side has a stamp
            sqlx::query(
                r#"
                INSERT INTO processed_editions (
                    edition_key, publication_id, title, issue, publication_date, source_ref,
                    artifact_name, artifact_sha256, archive_location,
                    downloaded_at, notified_at, dropoff_completed_at, archived_at, processed_at,
                    created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(edition_key) DO UPDATE SET
                    source_ref = COALESCE(processed_editions.source_ref, excluded.source_ref),
                    artifact_name = COALESCE(processed_editions.artifact_name, excluded.artifact_name),
                    artifact_sha256 = COALESCE(processed_editions.artifact_sha256, excluded.artifact_sha256),
                    archive_location = COALESCE(processed_editions.archive_location, excluded.archive_location),
                    downloaded_at = COALESCE(MIN(processed_editions.downloaded_at, excluded.downloaded_at), processed_editions.downloaded_at, excluded.downloaded_at),
                    notified_at = COALESCE(MIN(processed_editions.notified_at, excluded.notified_at), processed_editions.notified_at, excluded.notified_at),
                    dropoff_completed_at = COALESCE(MIN(processed_editions.dropoff_completed_at, excluded.dropoff_completed_at), processed_editions.dropoff_completed_at, excluded.dropoff_completed_at),
                    archived_at = COALESCE(MIN(processed_editions.archived_at, excluded.archived_at), processed_editions.archived_at, excluded.archived_at),
                    processed_at = COALESCE(MIN(processed_editions.processed_at, excluded.processed_at), processed_editions.processed_at, excluded.processed_at),
                    created_at = MIN(processed_editions.created_at, excluded.created_at)
                "#,
            )
            .bind(new_key.as_str())
            .bind(&row.publication_id)
            .bind(&row.title)
            .bind(&row.issue)
            .bind(&row.publication_date)
            .bind(&row.source_ref)
            .bind(&row.artifact_name)
            .bind(&row.artifact_sha256)
            .bind(&row.archive_location)
            .bind(row.downloaded_at)
            .bind(row.notified_at)
            .bind(row.dropoff_completed_at)
            .bind(row.archived_at)
            .bind(row.processed_at)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err("write new key", e))?;

            sqlx::query(
                r#"
                INSERT OR IGNORE INTO delivery_ledger (edition_key, recipient, channel, delivered_at, reference)
                SELECT ?, recipient, channel, delivered_at, reference
                FROM delivery_ledger
                WHERE edition_key = ?
                "#,
            )
            .bind(new_key.as_str())
            .bind(&row.edition_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_err("move ledger rows", e))?;

            sqlx::query("DELETE FROM delivery_ledger WHERE edition_key = ?")
                .bind(&row.edition_key)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_err("remove old ledger rows", e))?;

            if collides.is_some() {
                summary.merged += 1;
            } else {
                summary.rekeyed += 1;
            }
            tracing::debug!(old_key = %row.edition_key, new_key = %new_key, merged = collides.is_some(), "Rekeyed tracking record");
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO tracking_meta (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(KEY_SCHEME_META)
        .bind(to.version())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_err("record key scheme", e))?;

        tx.commit().await.map_err(|e| map_err("commit", e))?;

        tracing::info!(
            from = %from,
            to = %to,
            examined = summary.examined,
            rekeyed = summary.rekeyed,
            merged = summary.merged,
            "Edition key migration complete"
        );

        Ok(summary)
    }
}
