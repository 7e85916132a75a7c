//! Per-pair delivery ledger so a resumed run never delivers twice.

use crate::error::DatabaseError;
use crate::types::Channel;
use crate::{Error, Result};

use super::{Database, DeliveryLedgerEntry};

impl Database {
    /// Record a verified (edition, recipient, channel) delivery
    ///
    /// Recording the same pair again keeps the first entry.
    pub async fn record_delivery(
        &self,
        edition_key: &str,
        recipient: &str,
        channel: Channel,
        reference: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO delivery_ledger (edition_key, recipient, channel, delivered_at, reference)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(edition_key, recipient, channel) DO NOTHING
            "#,
        )
        .bind(edition_key)
        .bind(recipient)
        .bind(channel.as_str())
        .bind(now)
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record delivery: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Channels already delivered to a recipient for an edition
    pub async fn delivered_channels(&self, edition_key: &str, recipient: &str) -> Result<Vec<Channel>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT channel FROM delivery_ledger
            WHERE edition_key = ? AND recipient = ?
            "#,
        )
        .bind(edition_key)
        .bind(recipient)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query delivery ledger: {}",
                e
            )))
        })?;

        names.iter().map(|name| name.parse()).collect()
    }

    /// All ledger entries for an edition
    pub async fn list_deliveries(&self, edition_key: &str) -> Result<Vec<DeliveryLedgerEntry>> {
        let rows = sqlx::query_as::<_, DeliveryLedgerEntry>(
            r#"
            SELECT edition_key, recipient, channel, delivered_at, reference
            FROM delivery_ledger
            WHERE edition_key = ?
            ORDER BY recipient, channel
            "#,
        )
        .bind(edition_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list deliveries: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
