//! Delivery, archival and source collaborators
//!
//! The pipeline only talks to its collaborators through the traits in this
//! module:
//!
//! - [`EditionSource`]: discovers and downloads editions
//! - [`NotificationChannel`]: notifies a recipient with the artifact
//! - [`DropoffChannel`]: drops the artifact off at a destination
//! - [`ArchiveChannel`]: keeps one copy of every edition
//!
//! Reference implementations are included: [`WebhookNotifier`] posts to an
//! HTTP relay, [`FilesystemDropoff`] and [`FilesystemArchive`] write into a
//! local directory tree.

mod filesystem;
mod traits;
mod webhook;

pub use filesystem::{FilesystemArchive, FilesystemDropoff};
pub use traits::{
    ArchiveChannel, ArchiveLocation, ArchiveRequest, DropoffChannel, DropoffReceipt,
    DropoffRequest, EditionSource, NotificationChannel, dropoff_path,
};
pub use webhook::{NotificationPayload, WebhookNotifier};

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
