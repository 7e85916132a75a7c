//! Processed-edition tracking records.
//!
//! A row exists as soon as any stage completes. Only `processed_at` makes it
//! count as delivered; the other stamps are checkpoints for a resumed run.

use crate::error::DatabaseError;
use crate::types::ArtifactRef;
use crate::{Error, Result};

use super::{Database, EditionIdentity, ProcessedEdition};

/// Pipeline stage stamped on a tracking record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditionStage {
    /// Artifact fetched
    Downloaded,
    /// Notification fan-out finished
    Notified,
    /// Drop-off fan-out finished
    DropoffCompleted,
    /// Artifact archived
    Archived,
    /// Edition fully processed
    Processed,
}

impl EditionStage {
    fn column(&self) -> &'static str {
        match self {
            EditionStage::Downloaded => "downloaded_at",
            EditionStage::Notified => "notified_at",
            EditionStage::DropoffCompleted => "dropoff_completed_at",
            EditionStage::Archived => "archived_at",
            EditionStage::Processed => "processed_at",
        }
    }
}

const SELECT_PROCESSED_EDITION: &str = r#"
    SELECT
        edition_key, publication_id, title, issue, publication_date, source_ref,
        artifact_name, artifact_sha256, archive_location,
        downloaded_at, notified_at, dropoff_completed_at, archived_at, processed_at,
        created_at
    FROM processed_editions
"#;

impl Database {
    /// Stamp `stage` on the tracking record, creating the row if needed
    ///
    /// Only the stage's own column is stamped, and an existing stamp is kept.
    /// Artifact and archive details are filled in when given and never cleared.
    pub async fn record_edition_stage(
        &self,
        identity: EditionIdentity<'_>,
        stage: EditionStage,
        artifact: Option<&ArtifactRef>,
        archive_location: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let column = stage.column();

        let sql = format!(
            r#"
            INSERT INTO processed_editions (
                edition_key, publication_id, title, issue, publication_date, source_ref,
                artifact_name, artifact_sha256, archive_location, {column}, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(edition_key) DO UPDATE SET
                publication_id = excluded.publication_id,
                title = excluded.title,
                issue = excluded.issue,
                publication_date = excluded.publication_date,
                source_ref = excluded.source_ref,
                artifact_name = COALESCE(excluded.artifact_name, processed_editions.artifact_name),
                artifact_sha256 = COALESCE(excluded.artifact_sha256, processed_editions.artifact_sha256),
                archive_location = COALESCE(excluded.archive_location, processed_editions.archive_location),
                {column} = COALESCE(processed_editions.{column}, excluded.{column})
            "#
        );

        sqlx::query(&sql)
            .bind(identity.edition_key)
            .bind(identity.publication_id)
            .bind(&identity.edition.title)
            .bind(&identity.edition.issue)
            .bind(identity.edition.publication_date.format("%Y-%m-%d").to_string())
            .bind(&identity.edition.source_ref)
            .bind(artifact.map(|a| a.name.as_str()))
            .bind(artifact.map(|a| a.sha256.as_str()))
            .bind(archive_location)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record {} for edition {}: {}",
                    column, identity.edition_key, e
                )))
            })?;

        Ok(())
    }

    /// Get a tracking record by key
    pub async fn get_processed_edition(&self, edition_key: &str) -> Result<Option<ProcessedEdition>> {
        let sql = format!("{SELECT_PROCESSED_EDITION} WHERE edition_key = ?");
        let row = sqlx::query_as::<_, ProcessedEdition>(&sql)
            .bind(edition_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get processed edition: {}",
                    e
                )))
            })?;

        Ok(row)
    }

    /// Check whether an edition has been fully processed
    pub async fn is_edition_processed(&self, edition_key: &str) -> Result<bool> {
        let processed: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT processed_at IS NOT NULL
            FROM processed_editions
            WHERE edition_key = ?
            "#,
        )
        .bind(edition_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check processed edition: {}",
                e
            )))
        })?;

        Ok(processed.is_some_and(|v| v != 0))
    }

    /// List tracking records, optionally for one publication, newest first
    pub async fn list_processed_editions(
        &self,
        publication_id: Option<&str>,
    ) -> Result<Vec<ProcessedEdition>> {
        let rows = match publication_id {
            Some(id) => {
                let sql = format!(
                    "{SELECT_PROCESSED_EDITION} WHERE publication_id = ? ORDER BY publication_date DESC, edition_key"
                );
                sqlx::query_as::<_, ProcessedEdition>(&sql)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql =
                    format!("{SELECT_PROCESSED_EDITION} ORDER BY publication_date DESC, edition_key");
                sqlx::query_as::<_, ProcessedEdition>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list processed editions: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Delete a tracking record and its ledger rows
    ///
    /// Returns true if a tracking record existed.
    pub async fn delete_processed_edition(&self, edition_key: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        sqlx::query("DELETE FROM delivery_ledger WHERE edition_key = ?")
            .bind(edition_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete delivery ledger rows: {}",
                    e
                )))
            })?;

        let result = sqlx::query("DELETE FROM processed_editions WHERE edition_key = ?")
            .bind(edition_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete processed edition: {}",
                    e
                )))
            })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit edition deletion: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Read a tracking_meta value
    pub async fn get_tracking_meta(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM tracking_meta WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read tracking meta '{}': {}",
                        key, e
                    )))
                })?;

        Ok(value)
    }

    /// Write a tracking_meta value
    pub async fn set_tracking_meta(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO tracking_meta (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write tracking meta '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }
}
