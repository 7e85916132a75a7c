//! Publication document CRUD.

use crate::error::DatabaseError;
use crate::types::Publication;
use crate::{Error, Result};

use super::{Database, PublicationRow};

impl Database {
    /// Insert or replace a publication document
    pub async fn upsert_publication(&self, publication: &Publication) -> Result<()> {
        publication.validate()?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO publications (
                publication_id, name, notify_enabled, dropoff_enabled,
                dropoff_destination, organize_by_year, enabled, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(publication_id) DO UPDATE SET
                name = excluded.name,
                notify_enabled = excluded.notify_enabled,
                dropoff_enabled = excluded.dropoff_enabled,
                dropoff_destination = excluded.dropoff_destination,
                organize_by_year = excluded.organize_by_year,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&publication.id)
        .bind(&publication.name)
        .bind(publication.notify_enabled as i64)
        .bind(publication.dropoff_enabled as i64)
        .bind(&publication.dropoff_destination)
        .bind(publication.organize_by_year.map(|v| v as i64))
        .bind(publication.enabled as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert publication {}: {}",
                publication.id, e
            )))
        })?;

        Ok(())
    }

    /// Get a publication by id
    pub async fn get_publication(&self, publication_id: &str) -> Result<Option<Publication>> {
        let row = sqlx::query_as::<_, PublicationRow>(
            r#"
            SELECT publication_id, name, notify_enabled, dropoff_enabled,
                   dropoff_destination, organize_by_year, enabled
            FROM publications
            WHERE publication_id = ?
            "#,
        )
        .bind(publication_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get publication: {}",
                e
            )))
        })?;

        Ok(row.map(Publication::from))
    }

    /// List publications ordered by id, optionally only the enabled ones
    pub async fn list_publications(&self, enabled_only: bool) -> Result<Vec<Publication>> {
        let rows = sqlx::query_as::<_, PublicationRow>(
            r#"
            SELECT publication_id, name, notify_enabled, dropoff_enabled,
                   dropoff_destination, organize_by_year, enabled
            FROM publications
            WHERE enabled = 1 OR ? = 0
            ORDER BY publication_id
            "#,
        )
        .bind(enabled_only as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list publications: {}",
                e
            )))
        })?;

        let publications: Vec<Publication> = rows.into_iter().map(Publication::from).collect();
        for publication in &publications {
            publication.validate()?;
        }
        Ok(publications)
    }

    /// Delete a publication document
    ///
    /// Returns true if it existed.
    pub async fn delete_publication(&self, publication_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM publications WHERE publication_id = ?")
            .bind(publication_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete publication: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
