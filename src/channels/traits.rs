//! Collaborator traits and their request/response types

use crate::types::{Artifact, Edition, EditionKey, Publication, Recipient};
use async_trait::async_trait;
use std::sync::Arc;

/// Drop-off of one artifact for one recipient
#[derive(Debug, Clone)]
pub struct DropoffRequest {
    /// Recipient identity
    pub recipient: String,
    /// Destination as configured (e.g., "/MF")
    pub destination: String,
    /// Year folder to place the file in, when year organization is on
    pub year_folder: Option<i32>,
    /// Final file name (`"{YYYY-MM-DD} - {title}{ext}"`)
    pub file_name: String,
    /// Content to drop off
    pub artifact: Arc<Artifact>,
}

impl DropoffRequest {
    /// Destination-relative path segments: destination, optional year, file
    pub fn relative_path(&self) -> String {
        dropoff_path(&self.destination, self.year_folder, &self.file_name)
    }
}

/// `destination[/year]/file_name`
pub fn dropoff_path(destination: &str, year_folder: Option<i32>, file_name: &str) -> String {
    let destination = destination.trim_end_matches('/');
    match year_folder {
        Some(year) => format!("{}/{}/{}", destination, year, file_name),
        None => format!("{}/{}", destination, file_name),
    }
}

/// Receipt returned by a drop-off transport
///
/// Only `success == true` counts as a delivery.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropoffReceipt {
    /// Whether the transport verified the upload
    pub success: bool,
    /// Transport-side identifier (file id, path)
    pub reference_id: Option<String>,
    /// Link to the dropped-off file
    pub reference_url: Option<String>,
    /// Failure detail when `success` is false
    pub error: Option<String>,
}

/// Archival of one edition
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// Publication the edition belongs to
    pub publication_id: String,
    /// Tracking key of the edition
    pub edition_key: EditionKey,
    /// The edition
    pub edition: Edition,
    /// File name to archive under
    pub file_name: String,
    /// Content to archive
    pub artifact: Arc<Artifact>,
}

/// Where an archive backend stored an edition
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    /// Location within the backend (path, object key)
    pub location: String,
    /// Backend container (bucket, root directory)
    pub container: Option<String>,
}

/// Source of editions: login, discovery and download
///
/// Authentication failures must surface as
/// `Error::Discovery(DiscoveryError::Authentication)`; they abort the run.
/// Transient source problems should surface as
/// `DiscoveryError::Unavailable`, which is retried.
#[async_trait]
pub trait EditionSource: Send + Sync {
    /// Find the latest edition of `publication`, if any
    async fn discover_latest_edition(&self, publication: &Publication)
    -> crate::Result<Option<Edition>>;

    /// Fetch the artifact of `edition`
    async fn download(&self, edition: &Edition) -> crate::Result<Artifact>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Notification transport (e.g., email with the artifact attached)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Send `artifact` to `recipient`
    ///
    /// Returns `Ok(true)` only when the transport accepted the message.
    /// `Ok(false)` is a definitive rejection and is not retried.
    async fn send(
        &self,
        recipient: &Recipient,
        artifact: &Artifact,
        edition: &Edition,
    ) -> crate::Result<bool>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// File-drop transport (e.g., a cloud drive)
#[async_trait]
pub trait DropoffChannel: Send + Sync {
    /// Drop the artifact off at the requested destination
    async fn deliver(&self, request: DropoffRequest) -> crate::Result<DropoffReceipt>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Archive backend
///
/// Archiving the same edition twice must succeed (overwrite or no-op).
#[async_trait]
pub trait ArchiveChannel: Send + Sync {
    /// Persist the edition's artifact
    async fn archive(&self, request: ArchiveRequest) -> crate::Result<ArchiveLocation>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
