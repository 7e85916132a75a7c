//! Core types for edition-courier

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// One discovered issue of a publication
///
/// Produced fresh by discovery on every run and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edition {
    /// Human-readable title (e.g., "MF 10/2026")
    pub title: String,
    /// Issue identifier as printed by the source (e.g., "Issue 10/2026")
    pub issue: String,
    /// Publication date of this edition
    pub publication_date: NaiveDate,
    /// Opaque reference the source uses to download the artifact
    pub source_ref: String,
}

/// A periodical whose editions are delivered
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Stable identifier (e.g., "mf")
    pub id: String,
    /// Display name
    pub name: String,
    /// Notify recipients by default
    #[serde(default)]
    pub notify_enabled: bool,
    /// Drop the artifact off for recipients by default
    #[serde(default)]
    pub dropoff_enabled: bool,
    /// Default drop-off destination (e.g., "/MF")
    #[serde(default)]
    pub dropoff_destination: Option<String>,
    /// Organize drop-offs into year folders (None = global default)
    #[serde(default)]
    pub organize_by_year: Option<bool>,
    /// Disabled publications are not loaded from the store
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Publication {
    /// Reject publications the pipeline cannot key editions for
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidDocument(format!(
                "publication '{}' has an empty id",
                self.name
            )));
        }
        Ok(())
    }
}

/// A recipient's override for one publication
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationPreference {
    /// Publication this entry applies to
    pub publication_id: String,
    /// `false` disables every channel for this publication
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Notification override (None = inherit)
    #[serde(default)]
    pub notify_enabled: Option<bool>,
    /// Drop-off override (None = inherit)
    #[serde(default)]
    pub dropoff_enabled: Option<bool>,
    /// Destination overriding the publication default
    #[serde(default)]
    pub custom_dropoff_destination: Option<String>,
    /// Year-folder override (None = inherit)
    #[serde(default)]
    pub organize_by_year: Option<bool>,
    /// Editions successfully delivered through at least one channel
    #[serde(default)]
    pub send_count: u32,
    /// When the last successful delivery happened
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl PublicationPreference {
    /// An enabled entry that inherits every setting
    pub fn new(publication_id: impl Into<String>) -> Self {
        Self {
            publication_id: publication_id.into(),
            enabled: true,
            notify_enabled: None,
            dropoff_enabled: None,
            custom_dropoff_destination: None,
            organize_by_year: None,
            send_count: 0,
            last_sent_at: None,
        }
    }
}

/// Someone who receives editions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Delivery identity (e.g., an email address)
    pub identity: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Inactive recipients receive nothing
    #[serde(default = "default_true")]
    pub active: bool,
    /// Per-publication preferences
    ///
    /// `None` means the recipient predates preferences and receives every
    /// publication with its defaults. `Some(vec![])` means the recipient opted
    /// in to nothing.
    #[serde(default)]
    pub preferences: Option<Vec<PublicationPreference>>,
    /// Last successful delivery of any edition
    #[serde(default)]
    pub last_delivery_at: Option<DateTime<Utc>>,
}

impl Recipient {
    /// An active recipient without a preference list
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: None,
            active: true,
            preferences: None,
            last_delivery_at: None,
        }
    }

    /// Builder-style setter for the preference list
    pub fn with_preferences(mut self, preferences: Vec<PublicationPreference>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Entry for a publication, if the recipient has a list and it matches
    pub fn preference_for(&self, publication_id: &str) -> Option<&PublicationPreference> {
        self.preferences
            .as_ref()?
            .iter()
            .find(|p| p.publication_id == publication_id)
    }

    /// Reject malformed recipient documents
    pub fn validate(&self) -> Result<()> {
        if self.identity.trim().is_empty() {
            return Err(Error::InvalidDocument(
                "recipient has an empty identity".to_string(),
            ));
        }
        if let Some(prefs) = &self.preferences {
            let mut seen = HashSet::new();
            for pref in prefs {
                if !seen.insert(pref.publication_id.as_str()) {
                    return Err(Error::InvalidDocument(format!(
                        "recipient {} has more than one preference for publication {}",
                        self.identity, pref.publication_id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Stable identity of an edition within the tracking store
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditionKey(pub String);

impl EditionKey {
    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EditionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery or archival channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Notification with the artifact attached
    Notify,
    /// File drop into the recipient's destination
    Dropoff,
    /// Once-per-edition archival
    Archive,
}

impl Channel {
    /// Name used in the store and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Notify => "notify",
            Channel::Dropoff => "dropoff",
            Channel::Archive => "archive",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "notify" => Ok(Channel::Notify),
            "dropoff" => Ok(Channel::Dropoff),
            "archive" => Ok(Channel::Archive),
            other => Err(Error::InvalidDocument(format!("unknown channel '{}'", other))),
        }
    }
}

/// Downloaded edition content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// File name as provided by the source (e.g., "mf-2026-10.pdf")
    pub file_name: String,
    /// MIME type, when the source reports one
    pub content_type: Option<String>,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl Artifact {
    /// Hex-encoded SHA-256 of the content
    pub fn sha256(&self) -> String {
        format!("{:x}", Sha256::digest(&self.data))
    }

    /// Extension including the leading dot, or an empty string
    ///
    /// Anything containing a path separator is not an extension.
    pub fn extension(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < self.file_name.len() => {
                let extension = &self.file_name[idx..];
                if extension.contains(['/', '\\']) {
                    ""
                } else {
                    extension
                }
            }
            _ => "",
        }
    }

    /// Name and fingerprint stored with the tracking record
    pub fn reference(&self) -> ArtifactRef {
        ArtifactRef {
            name: self.file_name.clone(),
            sha256: self.sha256(),
        }
    }
}

/// Name and fingerprint of a downloaded artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Artifact file name
    pub name: String,
    /// Hex-encoded SHA-256
    pub sha256: String,
}

/// Result of one (recipient, channel) delivery attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Recipient identity
    pub recipient: String,
    /// Channel attempted
    pub channel: Channel,
    /// Whether the transport verified the delivery
    pub success: bool,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Dry run: nothing was actually sent
    #[serde(default)]
    pub simulated: bool,
    /// Transport reference (e.g., drop-off URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl DeliveryOutcome {
    /// Verified delivery
    pub fn delivered(recipient: &str, channel: Channel, reference: Option<String>) -> Self {
        Self {
            recipient: recipient.to_string(),
            channel,
            success: true,
            error: None,
            simulated: false,
            reference,
        }
    }

    /// Failed delivery
    pub fn failed(recipient: &str, channel: Channel, error: impl Into<String>) -> Self {
        Self {
            recipient: recipient.to_string(),
            channel,
            success: false,
            error: Some(error.into()),
            simulated: false,
            reference: None,
        }
    }

    /// Delivery that would happen outside a dry run
    pub fn simulated(recipient: &str, channel: Channel, reference: Option<String>) -> Self {
        Self {
            recipient: recipient.to_string(),
            channel,
            success: true,
            error: None,
            simulated: true,
            reference,
        }
    }
}

/// Per-channel recipient counts for one publication
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounts {
    /// Active recipients considered
    pub recipients: usize,
    /// Recipients with at least one channel enabled
    pub eligible: usize,
    /// Successful notifications
    pub notified: usize,
    /// Successful drop-offs
    pub dropped_off: usize,
    /// Failed notifications
    pub notify_failed: usize,
    /// Failed drop-offs
    pub dropoff_failed: usize,
    /// Pairs skipped because a previous run already delivered them
    pub already_delivered: usize,
}

/// What happened to the once-per-edition archival
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    /// Archived in this run
    Archived {
        /// Where the artifact was written
        location: String,
        /// Backend container (bucket, root directory)
        #[serde(skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },
    /// An earlier, interrupted run already archived this edition
    AlreadyArchived {
        /// Location recorded by that run
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    /// Archival failed; delivery results are unaffected
    Failed {
        /// Failure detail
        error: String,
    },
    /// No archive backend is configured
    NotConfigured,
    /// Dry run
    Simulated,
    /// The pipeline never reached the archive step
    NotAttempted,
}

/// Why a publication was skipped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Discovery found no edition
    NoNewEdition,
    /// The latest edition is already tracked as processed
    AlreadyProcessed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoNewEdition => f.write_str("no new edition"),
            SkipReason::AlreadyProcessed => f.write_str("already processed"),
        }
    }
}

/// Where a publication run failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source rejected our login
    Authentication,
    /// Discovery failed for another reason
    Discovery,
    /// The artifact could not be fetched
    Download,
    /// The tracking store failed or timed out
    TrackingStore,
    /// The run was aborted before this publication started
    Aborted,
    /// The publication task panicked
    Panicked,
    /// The publication document is malformed
    InvalidDocument,
}

impl FailureKind {
    /// Name used in reports and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Authentication => "authentication",
            FailureKind::Discovery => "discovery",
            FailureKind::Download => "download",
            FailureKind::TrackingStore => "tracking_store",
            FailureKind::Aborted => "aborted",
            FailureKind::Panicked => "panicked",
            FailureKind::InvalidDocument => "invalid_document",
        }
    }

    /// Hard failures need an operator; soft ones resolve on the next run
    pub fn needs_action(&self) -> bool {
        !matches!(self, FailureKind::Discovery | FailureKind::Download)
    }

    /// Classify a pipeline error
    pub fn classify(error: &Error) -> Self {
        match error {
            Error::Discovery(crate::error::DiscoveryError::Authentication { .. }) => {
                FailureKind::Authentication
            }
            Error::Discovery(_) => FailureKind::Discovery,
            Error::InvalidDocument(_) | Error::Config { .. } => FailureKind::InvalidDocument,
            e if e.is_store_failure() => FailureKind::TrackingStore,
            _ => FailureKind::Download,
        }
    }
}

/// Final state of one publication within a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublicationStatus {
    /// Edition downloaded and fanned out
    Processed,
    /// Nothing to do
    Skipped {
        /// Why
        reason: SkipReason,
    },
    /// The pipeline stopped before fan-out
    Failed {
        /// Failure detail
        error: String,
        /// Classification
        kind: FailureKind,
    },
}

/// Outcome of one publication within a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationResult {
    /// Publication id
    pub publication_id: String,
    /// True once the edition was discovered and downloaded
    pub success: bool,
    /// Final state
    pub status: PublicationStatus,
    /// Discovered edition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<Edition>,
    /// Tracking key of the edition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition_key: Option<EditionKey>,
    /// Per-channel recipient counts
    pub counts: ChannelCounts,
    /// Archival outcome
    pub archive: ArchiveOutcome,
    /// Every delivery attempted (or simulated) for this edition
    pub deliveries: Vec<DeliveryOutcome>,
    /// Produced by a dry run
    #[serde(default)]
    pub dry_run: bool,
}

impl PublicationResult {
    /// Result for a publication the pipeline skipped
    pub fn skipped(
        publication_id: &str,
        reason: SkipReason,
        edition: Option<Edition>,
        edition_key: Option<EditionKey>,
    ) -> Self {
        Self {
            publication_id: publication_id.to_string(),
            success: false,
            status: PublicationStatus::Skipped { reason },
            edition,
            edition_key,
            counts: ChannelCounts::default(),
            archive: ArchiveOutcome::NotAttempted,
            deliveries: Vec::new(),
            dry_run: false,
        }
    }

    /// Result for a publication whose pipeline stopped on `error`
    pub fn failed(publication_id: &str, kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            publication_id: publication_id.to_string(),
            success: false,
            status: PublicationStatus::Failed {
                error: error.into(),
                kind,
            },
            edition: None,
            edition_key: None,
            counts: ChannelCounts::default(),
            archive: ArchiveOutcome::NotAttempted,
            deliveries: Vec::new(),
            dry_run: false,
        }
    }

    /// Per-recipient failures, for manual resend
    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.deliveries.iter().filter(|d| !d.success)
    }

    /// Whether the edition was processed in this run
    pub fn is_processed(&self) -> bool {
        matches!(self.status, PublicationStatus::Processed)
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Discovery returned an edition
    EditionDiscovered {
        /// Publication id
        publication_id: String,
        /// Tracking key
        edition_key: EditionKey,
        /// Edition title
        title: String,
    },

    /// Nothing to do for this publication
    PublicationSkipped {
        /// Publication id
        publication_id: String,
        /// Why
        reason: SkipReason,
    },

    /// The artifact was fetched
    EditionDownloaded {
        /// Publication id
        publication_id: String,
        /// Tracking key
        edition_key: EditionKey,
        /// Artifact file name
        file_name: String,
        /// Artifact size in bytes
        size_bytes: u64,
    },

    /// One (recipient, channel) delivery succeeded
    Delivered {
        /// Publication id
        publication_id: String,
        /// Recipient identity
        recipient: String,
        /// Channel used
        channel: Channel,
        /// Dry run
        simulated: bool,
    },

    /// One (recipient, channel) delivery failed
    DeliveryFailed {
        /// Publication id
        publication_id: String,
        /// Recipient identity
        recipient: String,
        /// Channel used
        channel: Channel,
        /// Failure detail
        error: String,
    },

    /// The edition was archived
    Archived {
        /// Publication id
        publication_id: String,
        /// Tracking key
        edition_key: EditionKey,
        /// Archive location
        location: String,
    },

    /// Archival failed (non-blocking)
    ArchiveFailed {
        /// Publication id
        publication_id: String,
        /// Failure detail
        error: String,
    },

    /// The publication's pipeline stopped
    PublicationFailed {
        /// Publication id
        publication_id: String,
        /// Classification
        kind: FailureKind,
        /// Failure detail
        error: String,
    },

    /// A run finished
    RunComplete {
        /// Publications processed
        processed: usize,
        /// Publications skipped
        skipped: usize,
        /// Publications failed
        failed: usize,
        /// Dry run
        dry_run: bool,
    },

    /// Posting the run report to a webhook failed
    ReportWebhookFailed {
        /// Webhook URL
        url: String,
        /// Error message
        error: String,
    },
}

fn default_true() -> bool {
    true
}
