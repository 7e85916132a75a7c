//! Database layer for edition-courier
//!
//! Handles SQLite persistence for tracking records, recipients, publications
//! and the per-pair delivery ledger.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`editions`]: Processed-edition tracking records and stage stamps
//! - [`rekey`]: One-time edition key scheme migration
//! - [`ledger`]: (edition, recipient, channel) delivery ledger
//! - [`recipients`]: Recipient documents with embedded preferences
//! - [`publications`]: Publication documents

use crate::error::{Error, Result};
use crate::types::{Edition, Publication, PublicationPreference, Recipient};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod editions;
mod ledger;
mod migrations;
mod publications;
mod recipients;
mod rekey;

pub use editions::EditionStage;
pub use rekey::RekeySummary;

/// Identity columns written with every tracking-record upsert
///
/// Stage stamps can arrive before the final `mark_as_processed`, so each upsert
/// carries enough to create the row on its own.
#[derive(Debug, Clone, Copy)]
pub struct EditionIdentity<'a> {
    /// Tracking key
    pub edition_key: &'a str,
    /// Publication the edition belongs to
    pub publication_id: &'a str,
    /// The edition itself
    pub edition: &'a Edition,
}

/// Processed-edition record from database
#[derive(Debug, Clone, FromRow)]
pub struct ProcessedEdition {
    /// Tracking key (unique)
    pub edition_key: String,
    /// Publication the edition belongs to
    pub publication_id: String,
    /// Edition title
    pub title: String,
    /// Issue identifier as printed by the source
    pub issue: String,
    /// Publication date (YYYY-MM-DD)
    pub publication_date: String,
    /// Source download reference
    pub source_ref: Option<String>,
    /// Artifact file name
    pub artifact_name: Option<String>,
    /// Hex-encoded SHA-256 of the artifact
    pub artifact_sha256: Option<String>,
    /// Where the archive step wrote the artifact
    pub archive_location: Option<String>,
    /// Unix timestamp when the artifact was downloaded
    pub downloaded_at: Option<i64>,
    /// Unix timestamp when notifications completed
    pub notified_at: Option<i64>,
    /// Unix timestamp when drop-offs completed
    pub dropoff_completed_at: Option<i64>,
    /// Unix timestamp when the artifact was archived
    pub archived_at: Option<i64>,
    /// Unix timestamp when the edition was marked processed
    pub processed_at: Option<i64>,
    /// Unix timestamp when the record was created
    pub created_at: i64,
}

impl ProcessedEdition {
    /// Whether the record short-circuits future runs
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Rebuild the edition from the stored identity columns
    pub fn edition(&self) -> Result<Edition> {
        Ok(Edition {
            title: self.title.clone(),
            issue: self.issue.clone(),
            publication_date: parse_date(&self.publication_date)?,
            source_ref: self.source_ref.clone().unwrap_or_default(),
        })
    }
}

/// Delivery ledger record from database
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryLedgerEntry {
    /// Tracking key of the delivered edition
    pub edition_key: String,
    /// Recipient identity
    pub recipient: String,
    /// Channel name ("notify" or "dropoff")
    pub channel: String,
    /// Unix timestamp of the verified delivery
    pub delivered_at: i64,
    /// Transport reference, if any
    pub reference: Option<String>,
}

/// Publication record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
struct PublicationRow {
    publication_id: String,
    name: String,
    notify_enabled: i64,
    dropoff_enabled: i64,
    dropoff_destination: Option<String>,
    organize_by_year: Option<i64>,
    enabled: i64,
}

impl From<PublicationRow> for Publication {
    fn from(row: PublicationRow) -> Self {
        Publication {
            id: row.publication_id,
            name: row.name,
            notify_enabled: row.notify_enabled != 0,
            dropoff_enabled: row.dropoff_enabled != 0,
            dropoff_destination: row.dropoff_destination,
            organize_by_year: row.organize_by_year.map(|v| v != 0),
            enabled: row.enabled != 0,
        }
    }
}

/// Recipient record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
struct RecipientRow {
    identity: String,
    name: Option<String>,
    active: i64,
    has_preference_list: i64,
    last_delivery_at: Option<i64>,
}

/// Preference entry from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
struct PreferenceRow {
    recipient: String,
    publication_id: String,
    enabled: i64,
    notify_enabled: Option<i64>,
    dropoff_enabled: Option<i64>,
    custom_dropoff_destination: Option<String>,
    organize_by_year: Option<i64>,
    send_count: i64,
    last_sent_at: Option<i64>,
}

impl From<PreferenceRow> for PublicationPreference {
    fn from(row: PreferenceRow) -> Self {
        PublicationPreference {
            publication_id: row.publication_id,
            enabled: row.enabled != 0,
            notify_enabled: row.notify_enabled.map(|v| v != 0),
            dropoff_enabled: row.dropoff_enabled.map(|v| v != 0),
            custom_dropoff_destination: row.custom_dropoff_destination,
            organize_by_year: row.organize_by_year.map(|v| v != 0),
            send_count: u32::try_from(row.send_count).unwrap_or(0),
            last_sent_at: row.last_sent_at.map(from_unix),
        }
    }
}

impl RecipientRow {
    fn into_recipient(self, preferences: Vec<PublicationPreference>) -> Recipient {
        Recipient {
            identity: self.identity,
            name: self.name,
            active: self.active != 0,
            preferences: (self.has_preference_list != 0).then_some(preferences),
            last_delivery_at: self.last_delivery_at.map(from_unix),
        }
    }
}

/// Database handle for edition-courier
pub struct Database {
    pool: SqlitePool,
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        Error::InvalidDocument(format!("invalid stored publication date '{}': {}", value, e))
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
