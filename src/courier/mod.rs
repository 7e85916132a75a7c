//! Delivery orchestrator split into focused submodules.
//!
//! The `EditionCourier` struct and its methods are organized by stage:
//! - [`run`] - Run entry points, per-publication task isolation, abort handling
//! - [`pipeline`] - The per-publication state machine (discover, download, deliver, archive)
//! - [`fan_out`] - Per-recipient, per-channel delivery with failure isolation
//! - [`archive`] - Once-per-edition archival
//! - [`admin`] - Administrative operations (re-delivery, key scheme migration)
//! - [`webhooks`] - Run report webhooks

mod admin;
mod archive;
mod fan_out;
mod pipeline;
mod run;
mod webhooks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::channels::{ArchiveChannel, DropoffChannel, EditionSource, NotificationChannel};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::preferences::GlobalDefaults;
use crate::tracking::EditionTracker;
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// External collaborators the pipeline talks to
///
/// All of them are trait objects so transports can be swapped without
/// touching the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    /// Discovers and downloads editions
    pub source: Arc<dyn EditionSource>,
    /// Notifies recipients
    pub notifier: Arc<dyn NotificationChannel>,
    /// Drops artifacts off at recipient destinations
    pub dropoff: Arc<dyn DropoffChannel>,
    /// Archive backend (None = archival not configured)
    pub archive: Option<Arc<dyn ArchiveChannel>>,
}

/// Main courier instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct EditionCourier {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to inspect tracking records
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Source and transports
    pub(crate) collaborators: Collaborators,
    /// Tracking-store facade with the configured key scheme and store timeout
    pub(crate) tracker: EditionTracker,
    /// Defaults applied by the preference resolver
    pub(crate) defaults: GlobalDefaults,
    /// Parent of every run's abort token
    pub(crate) shutdown: CancellationToken,
}

impl EditionCourier {
    /// Create a new EditionCourier instance
    ///
    /// Validates the configuration, then opens (or creates) the SQLite store
    /// at `config.persistence.database_path` and runs its migrations.
    pub async fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_database(config, Arc::new(db), collaborators)
    }

    /// Create a courier over an already opened store
    pub fn with_database(
        config: Config,
        db: Arc<Database>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        // Buffer of 1000 events; slow subscribers see RecvError::Lagged
        let (event_tx, _rx) = broadcast::channel(1000);

        let tracker = EditionTracker::new(
            db.clone(),
            config.tracking.key_scheme,
            config.tracking.store_timeout,
        );
        let defaults = GlobalDefaults::from(&config.delivery);

        tracing::info!(
            source = collaborators.source.name(),
            notifier = collaborators.notifier.name(),
            dropoff = collaborators.dropoff.name(),
            archive = collaborators.archive.as_ref().map(|a| a.name()).unwrap_or("none"),
            key_scheme = %config.tracking.key_scheme,
            "Edition courier initialized"
        );

        Ok(Self {
            db,
            event_tx,
            config: Arc::new(config),
            collaborators,
            tracker,
            defaults,
            shutdown: CancellationToken::new(),
        })
    }

    /// Subscribe to run events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// emitted after it subscribed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(courier: edition_courier::EditionCourier) {
    /// let mut events = courier.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         println!("Event: {:?}", event);
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the active configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Tracking-store facade used by this courier
    pub fn tracker(&self) -> &EditionTracker {
        &self.tracker
    }

    /// Abort the current run and every later one
    ///
    /// Publications already in flight finish their current stage; publications
    /// not yet started are reported as failed with "run aborted".
    pub fn cancel(&self) {
        tracing::warn!("Courier cancelled; pending publications will be aborted");
        self.shutdown.cancel();
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is not an error.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
