//! Recipient documents with their embedded preference lists.
//!
//! A recipient and its preferences are always written in one transaction.

use std::collections::HashMap;

use crate::error::DatabaseError;
use crate::types::{PublicationPreference, Recipient};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

use super::{Database, PreferenceRow, RecipientRow};

const SELECT_PREFERENCES: &str = r#"
    SELECT recipient, publication_id, enabled, notify_enabled, dropoff_enabled,
           custom_dropoff_destination, organize_by_year, send_count, last_sent_at
    FROM recipient_preferences
"#;

impl Database {
    /// Insert or replace a recipient and its whole preference list
    pub async fn upsert_recipient(&self, recipient: &Recipient) -> Result<()> {
        recipient.validate()?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            INSERT INTO recipients (identity, name, active, has_preference_list, last_delivery_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                name = excluded.name,
                active = excluded.active,
                has_preference_list = excluded.has_preference_list,
                last_delivery_at = excluded.last_delivery_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&recipient.identity)
        .bind(&recipient.name)
        .bind(recipient.active as i64)
        .bind(recipient.preferences.is_some() as i64)
        .bind(recipient.last_delivery_at.map(|t| t.timestamp()))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert recipient {}: {}",
                recipient.identity, e
            )))
        })?;

        sqlx::query("DELETE FROM recipient_preferences WHERE recipient = ?")
            .bind(&recipient.identity)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear preferences for {}: {}",
                    recipient.identity, e
                )))
            })?;

        for (position, pref) in recipient.preferences.iter().flatten().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO recipient_preferences (
                    recipient, position, publication_id, enabled, notify_enabled,
                    dropoff_enabled, custom_dropoff_destination, organize_by_year,
                    send_count, last_sent_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&recipient.identity)
            .bind(position as i64)
            .bind(&pref.publication_id)
            .bind(pref.enabled as i64)
            .bind(pref.notify_enabled.map(|v| v as i64))
            .bind(pref.dropoff_enabled.map(|v| v as i64))
            .bind(&pref.custom_dropoff_destination)
            .bind(pref.organize_by_year.map(|v| v as i64))
            .bind(i64::from(pref.send_count))
            .bind(pref.last_sent_at.map(|t| t.timestamp()))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert preference {} for {}: {}",
                    pref.publication_id, recipient.identity, e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit recipient {}: {}",
                recipient.identity, e
            )))
        })?;

        Ok(())
    }

    /// Get a recipient by identity
    pub async fn get_recipient(&self, identity: &str) -> Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT identity, name, active, has_preference_list, last_delivery_at
            FROM recipients
            WHERE identity = ?
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get recipient: {}",
                e
            )))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sql = format!("{SELECT_PREFERENCES} WHERE recipient = ? ORDER BY position");
        let prefs = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(identity)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get preferences: {}",
                    e
                )))
            })?;

        let recipient =
            row.into_recipient(prefs.into_iter().map(PublicationPreference::from).collect());
        recipient.validate()?;
        Ok(Some(recipient))
    }

    /// List recipients ordered by identity, optionally only the active ones
    pub async fn list_recipients(&self, active_only: bool) -> Result<Vec<Recipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT identity, name, active, has_preference_list, last_delivery_at
            FROM recipients
            WHERE active = 1 OR ? = 0
            ORDER BY identity
            "#,
        )
        .bind(active_only as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list recipients: {}",
                e
            )))
        })?;

        let sql = format!("{SELECT_PREFERENCES} ORDER BY recipient, position");
        let pref_rows = sqlx::query_as::<_, PreferenceRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list preferences: {}",
                    e
                )))
            })?;

        let mut prefs_by_recipient: HashMap<String, Vec<PublicationPreference>> = HashMap::new();
        for row in pref_rows {
            prefs_by_recipient
                .entry(row.recipient.clone())
                .or_default()
                .push(PublicationPreference::from(row));
        }

        let mut recipients = Vec::with_capacity(rows.len());
        for row in rows {
            let prefs = prefs_by_recipient.remove(&row.identity).unwrap_or_default();
            let recipient = row.into_recipient(prefs);
            recipient.validate()?;
            recipients.push(recipient);
        }

        Ok(recipients)
    }

    /// Delete a recipient and its preferences
    ///
    /// Returns true if it existed.
    pub async fn delete_recipient(&self, identity: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipients WHERE identity = ?")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete recipient: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record that a recipient received an edition of `publication_id`
    ///
    /// Bumps `send_count` and `last_sent_at` on the recipient's matching
    /// preference entry, if there is one, and always sets `last_delivery_at`.
    /// No entry is ever created here, so a recipient without a preference list
    /// stays without one.
    pub async fn record_recipient_delivery(
        &self,
        identity: &str,
        publication_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let ts = at.timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let updated = sqlx::query("UPDATE recipients SET last_delivery_at = ? WHERE identity = ?")
            .bind(ts)
            .bind(identity)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update last delivery for {}: {}",
                    identity, e
                )))
            })?;

        if updated.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "recipient {}",
                identity
            ))));
        }

        sqlx::query(
            r#"
            UPDATE recipient_preferences
            SET send_count = send_count + 1, last_sent_at = ?
            WHERE recipient = ? AND publication_id = ?
            "#,
        )
        .bind(ts)
        .bind(identity)
        .bind(publication_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update send count for {}: {}",
                identity, e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit delivery for {}: {}",
                identity, e
            )))
        })?;

        Ok(())
    }
}
