//! Edition idempotency tracking
//!
//! Every edition gets a deterministic key. The tracking store holds one record
//! per key; a record with `processed_at` set means "already delivered" and is
//! consulted before anything is downloaded. Stage stamps written along the
//! way let an interrupted run resume without repeating completed stages.
//!
//! Key derivation is versioned. The active scheme is persisted in the store,
//! and switching schemes goes through
//! [`Database::rekey_processed_editions`], never through a silent config edit.

use crate::db::{Database, EditionIdentity, EditionStage, ProcessedEdition};
use crate::error::{Error, Result};
use crate::retry::call_with_timeout;
use crate::types::{ArtifactRef, Channel, Edition, EditionKey};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// tracking_meta key holding the active scheme version
pub(crate) const KEY_SCHEME_META: &str = "edition_key_scheme";

// "Issue 10/2026", "10 / 2026"
static MONTH_YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*/\s*(\d{4})\b").ok());

static ALNUM_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").ok());

/// How edition keys are derived
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditionKeyScheme {
    /// `v1`: keyed by publication date
    PublicationDate,
    /// `v2`: keyed by normalized issue identifier, falling back to the date
    #[default]
    IssueNumber,
}

impl EditionKeyScheme {
    /// Version prefix written into every key
    pub fn version(&self) -> &'static str {
        match self {
            EditionKeyScheme::PublicationDate => "v1",
            EditionKeyScheme::IssueNumber => "v2",
        }
    }

    /// Parse a persisted version prefix
    pub fn from_version(version: &str) -> Option<Self> {
        match version {
            "v1" => Some(EditionKeyScheme::PublicationDate),
            "v2" => Some(EditionKeyScheme::IssueNumber),
            _ => None,
        }
    }

    /// Key for `edition` of `publication_id`
    ///
    /// Deterministic: the same edition always maps to the same key.
    pub fn key_for(&self, publication_id: &str, edition: &Edition) -> EditionKey {
        let date = edition.publication_date.format("%Y-%m-%d").to_string();
        let component = match self {
            EditionKeyScheme::PublicationDate => date,
            EditionKeyScheme::IssueNumber => normalize_issue(&edition.issue).unwrap_or(date),
        };
        EditionKey(format!("{}:{}:{}", self.version(), publication_id, component))
    }
}

impl std::fmt::Display for EditionKeyScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.version())
    }
}

/// Normalize a printed issue identifier
///
/// `"Issue 10/2026"` becomes `"2026-10"`; anything else becomes its lowercase
/// alphanumeric runs joined by `-`. Returns `None` when nothing is left.
pub fn normalize_issue(issue: &str) -> Option<String> {
    if let Some(caps) = MONTH_YEAR.as_ref().and_then(|re| re.captures(issue)) {
        let month: u32 = caps[1].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some(format!("{}-{:02}", &caps[2], month));
        }
    }

    let lower = issue.to_lowercase();
    let runs: Vec<&str> = ALNUM_RUN
        .as_ref()?
        .find_iter(&lower)
        .map(|m| m.as_str())
        .collect();
    if runs.is_empty() {
        None
    } else {
        Some(runs.join("-"))
    }
}

/// Tracking-store facade used by the pipeline
///
/// Every store call carries the configured store timeout; a timeout surfaces
/// as a store failure and is fatal for that publication's run.
#[derive(Clone)]
pub struct EditionTracker {
    db: Arc<Database>,
    scheme: EditionKeyScheme,
    store_timeout: Duration,
}

impl EditionTracker {
    /// Create a tracker over `db` using `scheme`
    pub fn new(db: Arc<Database>, scheme: EditionKeyScheme, store_timeout: Duration) -> Self {
        Self {
            db,
            scheme,
            store_timeout,
        }
    }

    /// Active key scheme
    pub fn scheme(&self) -> EditionKeyScheme {
        self.scheme
    }

    /// Key for an edition under the active scheme
    pub fn key(&self, publication_id: &str, edition: &Edition) -> EditionKey {
        self.scheme.key_for(publication_id, edition)
    }

    /// Check the configured scheme against the one persisted in the store
    ///
    /// A fresh store adopts the configured scheme. A store keyed under another
    /// scheme is a configuration error until the rekey migration has run.
    pub async fn ensure_scheme(&self) -> Result<()> {
        match self.stored_scheme().await? {
            None => {
                tracing::info!(scheme = %self.scheme, "Recording edition key scheme");
                self.store(
                    "store: write key scheme",
                    self.db.set_tracking_meta(KEY_SCHEME_META, self.scheme.version()),
                )
                .await
            }
            Some(version) if version == self.scheme.version() => Ok(()),
            Some(version) => Err(self.scheme_mismatch(&version)),
        }
    }

    /// Like [`ensure_scheme`](Self::ensure_scheme) but never writes
    pub async fn check_scheme(&self) -> Result<()> {
        match self.stored_scheme().await? {
            Some(version) if version != self.scheme.version() => {
                Err(self.scheme_mismatch(&version))
            }
            _ => Ok(()),
        }
    }

    async fn stored_scheme(&self) -> Result<Option<String>> {
        self.store(
            "store: read key scheme",
            self.db.get_tracking_meta(KEY_SCHEME_META),
        )
        .await
    }

    fn scheme_mismatch(&self, stored: &str) -> Error {
        Error::config(
            format!(
                "tracking store is keyed with scheme {} but {} is configured; run the rekey migration from {} to {} first",
                stored,
                self.scheme.version(),
                stored,
                self.scheme.version()
            ),
            "tracking.key_scheme",
        )
    }

    /// Whether the edition was already delivered
    ///
    /// Read-only. A checkpoint without `processed_at` does not count.
    pub async fn is_already_processed(&self, publication_id: &str, edition: &Edition) -> Result<bool> {
        let key = self.key(publication_id, edition);
        self.store(
            "store: is_already_processed",
            self.db.is_edition_processed(key.as_str()),
        )
        .await
    }

    /// Tracking record for a key, including in-flight checkpoints
    pub async fn checkpoint(&self, key: &EditionKey) -> Result<Option<ProcessedEdition>> {
        self.store("store: read checkpoint", self.db.get_processed_edition(key.as_str()))
            .await
    }

    /// Mark the edition as processed
    ///
    /// Idempotent; stage stamps already on the record are kept.
    pub async fn mark_as_processed(
        &self,
        publication_id: &str,
        edition: &Edition,
        artifact: Option<&ArtifactRef>,
    ) -> Result<()> {
        self.stamp(publication_id, edition, EditionStage::Processed, artifact, None)
            .await
    }

    /// Delete the tracking record so the next run delivers the edition again
    ///
    /// Returns whether a record existed.
    pub async fn force_reprocess(&self, publication_id: &str, edition: &Edition) -> Result<bool> {
        let key = self.key(publication_id, edition);
        let existed = self
            .store(
                "store: force_reprocess",
                self.db.delete_processed_edition(key.as_str()),
            )
            .await?;
        tracing::info!(edition_key = %key, existed, "Tracking record cleared for reprocessing");
        Ok(existed)
    }

    /// Stamp `downloaded_at` and the artifact reference
    pub async fn record_downloaded(
        &self,
        publication_id: &str,
        edition: &Edition,
        artifact: &ArtifactRef,
    ) -> Result<()> {
        self.stamp(publication_id, edition, EditionStage::Downloaded, Some(artifact), None)
            .await
    }

    /// Stamp `notified_at`
    pub async fn record_notified(&self, publication_id: &str, edition: &Edition) -> Result<()> {
        self.stamp(publication_id, edition, EditionStage::Notified, None, None)
            .await
    }

    /// Stamp `dropoff_completed_at`
    pub async fn record_dropoff_completed(
        &self,
        publication_id: &str,
        edition: &Edition,
    ) -> Result<()> {
        self.stamp(publication_id, edition, EditionStage::DropoffCompleted, None, None)
            .await
    }

    /// Stamp `archived_at` and the archive location
    pub async fn record_archived(
        &self,
        publication_id: &str,
        edition: &Edition,
        location: &str,
    ) -> Result<()> {
        self.stamp(publication_id, edition, EditionStage::Archived, None, Some(location))
            .await
    }

    /// Channels already delivered to `recipient` for this edition
    pub async fn delivered_channels(&self, key: &EditionKey, recipient: &str) -> Result<Vec<Channel>> {
        self.store(
            "store: read delivery ledger",
            self.db.delivered_channels(key.as_str(), recipient),
        )
        .await
    }

    /// Record one verified (recipient, channel) delivery
    pub async fn record_delivery(
        &self,
        key: &EditionKey,
        recipient: &str,
        channel: Channel,
        reference: Option<&str>,
    ) -> Result<()> {
        self.store(
            "store: record delivery",
            self.db
                .record_delivery(key.as_str(), recipient, channel, reference),
        )
        .await
    }

    async fn stamp(
        &self,
        publication_id: &str,
        edition: &Edition,
        stage: EditionStage,
        artifact: Option<&ArtifactRef>,
        archive_location: Option<&str>,
    ) -> Result<()> {
        let key = self.key(publication_id, edition);
        let identity = EditionIdentity {
            edition_key: key.as_str(),
            publication_id,
            edition,
        };
        let result = self
            .store(
                "store: record stage",
                self.db
                    .record_edition_stage(identity, stage, artifact, archive_location),
            )
            .await;
        if result.is_ok() {
            tracing::debug!(edition_key = %key, stage = ?stage, "Tracking stage recorded");
        }
        result
    }

    async fn store<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        call_with_timeout(operation, self.store_timeout, fut).await
    }
}
