//! # edition-courier
//!
//! Idempotent, preference-driven, multi-channel delivery of periodical
//! editions.
//!
//! ## Design Philosophy
//!
//! edition-courier is designed to be:
//! - **Idempotent** - Every edition is delivered once; re-running a cycle never re-delivers
//! - **Failure-isolating** - One recipient's broken mailbox never blocks anyone else
//! - **Library-first** - No CLI or scheduler, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use edition_courier::{
//!     Collaborators, Config, EditionCourier, FilesystemArchive, FilesystemDropoff,
//!     WebhookNotifier,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(source: Arc<dyn edition_courier::EditionSource>) -> Result<(), Box<dyn std::error::Error>> {
//! let collaborators = Collaborators {
//!     source,
//!     notifier: Arc::new(WebhookNotifier::new("https://relay.example.com/notify")),
//!     dropoff: Arc::new(FilesystemDropoff::new("/srv/dropoff")),
//!     archive: Some(Arc::new(FilesystemArchive::new("/srv/archive"))),
//! };
//!
//! let courier = EditionCourier::new(Config::default(), collaborators).await?;
//!
//! // Subscribe to events
//! let mut events = courier.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let report = courier.run_from_store().await?;
//! println!("{}", report.render());
//! courier.publish_report(&report).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Source, delivery and archive collaborators
pub mod channels;
/// Configuration types
pub mod config;
/// Delivery orchestrator (decomposed into focused submodules)
pub mod courier;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Per-recipient preference resolution
pub mod preferences;
/// Consolidated run report
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// Edition idempotency tracking
pub mod tracking;
/// Core types
pub mod types;
/// File naming and path helpers
pub mod utils;

// Re-export commonly used types
pub use channels::{
    ArchiveChannel, ArchiveLocation, ArchiveRequest, DropoffChannel, DropoffReceipt,
    DropoffRequest, EditionSource, FilesystemArchive, FilesystemDropoff, NotificationChannel,
    WebhookNotifier,
};
pub use config::{
    Config, DeliveryConfig, NotificationConfig, PersistenceConfig, RetryConfig, TimeoutConfig,
    TrackingConfig, WebhookConfig,
};
pub use courier::{Collaborators, EditionCourier};
pub use db::{Database, RekeySummary};
pub use error::{DatabaseError, DiscoveryError, Error, Result};
pub use preferences::{EffectivePreference, GlobalDefaults, resolve};
pub use report::{RunReport, RunSummary};
pub use tracking::{EditionKeyScheme, EditionTracker};
pub use types::{
    ArchiveOutcome, Artifact, ArtifactRef, Channel, ChannelCounts, DeliveryOutcome, Edition,
    EditionKey, Event, FailureKind, Publication, PublicationPreference, PublicationResult,
    PublicationStatus, Recipient, SkipReason,
};
