//! Shared test helpers: scripted collaborators and courier construction.

use crate::channels::{
    ArchiveChannel, ArchiveLocation, ArchiveRequest, DropoffChannel, DropoffReceipt,
    DropoffRequest, EditionSource, NotificationChannel,
};
use crate::config::{Config, RetryConfig};
use crate::courier::{Collaborators, EditionCourier};
use crate::error::{DiscoveryError, Error};
use crate::types::{Artifact, Channel, Edition, Publication, Recipient};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// What the scripted source answers for one publication
#[derive(Clone, Debug)]
pub(crate) enum Discovery {
    Edition(Edition),
    Nothing,
    AuthFailure,
    Unavailable,
    Hang,
    Panic,
}

/// Edition source driven by a per-publication script
#[derive(Default)]
pub(crate) struct ScriptedSource {
    script: Mutex<HashMap<String, Discovery>>,
    failing_downloads: Mutex<HashSet<String>>,
    expired_logins: Mutex<HashSet<String>>,
    pub(crate) discover_calls: AtomicU32,
    pub(crate) download_calls: AtomicU32,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, publication_id: &str, discovery: Discovery) {
        self.script
            .lock()
            .unwrap()
            .insert(publication_id.to_string(), discovery);
    }

    /// Downloads of editions with this title fail permanently
    pub(crate) fn fail_download(&self, title: &str) {
        self.failing_downloads
            .lock()
            .unwrap()
            .insert(title.to_string());
    }

    /// The source session expires right before this edition downloads
    pub(crate) fn expire_login_on_download(&self, title: &str) {
        self.expired_logins
            .lock()
            .unwrap()
            .insert(title.to_string());
    }

    pub(crate) fn heal_download(&self, title: &str) {
        self.failing_downloads.lock().unwrap().remove(title);
    }
}

#[async_trait]
impl EditionSource for ScriptedSource {
    async fn discover_latest_edition(
        &self,
        publication: &Publication,
    ) -> crate::Result<Option<Edition>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get(&publication.id)
            .cloned()
            .unwrap_or(Discovery::Nothing);

        match scripted {
            Discovery::Edition(edition) => Ok(Some(edition)),
            Discovery::Nothing => Ok(None),
            Discovery::AuthFailure => Err(Error::Discovery(DiscoveryError::Authentication {
                publication_id: publication.id.clone(),
                reason: "invalid credentials".to_string(),
            })),
            Discovery::Unavailable => Err(Error::Discovery(DiscoveryError::Unavailable {
                publication_id: publication.id.clone(),
                reason: "503 service unavailable".to_string(),
            })),
            Discovery::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
            Discovery::Panic => panic!("source parser blew up for {}", publication.id),
        }
    }

    async fn download(&self, edition: &Edition) -> crate::Result<Artifact> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.expired_logins.lock().unwrap().contains(&edition.title) {
            return Err(Error::Discovery(DiscoveryError::Authentication {
                publication_id: edition.title.clone(),
                reason: "session expired".to_string(),
            }));
        }
        if self
            .failing_downloads
            .lock()
            .unwrap()
            .contains(&edition.title)
        {
            return Err(Error::Download(format!("404 not found: {}", edition.source_ref)));
        }
        Ok(Artifact {
            file_name: "edition.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            data: format!("%PDF {}", edition.title).into_bytes(),
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Notifier that records accepted recipients
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) sent: Mutex<Vec<String>>,
    rejecting: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    pub(crate) calls: AtomicU32,
}

impl RecordingNotifier {
    /// The transport answers `false` for this recipient
    pub(crate) fn reject(&self, identity: &str) {
        self.rejecting.lock().unwrap().insert(identity.to_string());
    }

    /// The transport errors for this recipient
    pub(crate) fn fail(&self, identity: &str) {
        self.failing.lock().unwrap().insert(identity.to_string());
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        _artifact: &Artifact,
        _edition: &Edition,
    ) -> crate::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&recipient.identity) {
            return Err(Error::Channel {
                channel: Channel::Notify,
                message: "mailbox unavailable".to_string(),
                transient: false,
            });
        }
        if self.rejecting.lock().unwrap().contains(&recipient.identity) {
            return Ok(false);
        }
        self.sent.lock().unwrap().push(recipient.identity.clone());
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Drop-off transport that records every verified request
#[derive(Default)]
pub(crate) struct RecordingDropoff {
    pub(crate) delivered: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    pub(crate) calls: AtomicU32,
}

impl RecordingDropoff {
    /// Receipts for this recipient come back unsuccessful
    pub(crate) fn fail(&self, identity: &str) {
        self.failing.lock().unwrap().insert(identity.to_string());
    }

    pub(crate) fn heal(&self, identity: &str) {
        self.failing.lock().unwrap().remove(identity);
    }

    /// (recipient, relative path) pairs
    pub(crate) fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DropoffChannel for RecordingDropoff {
    async fn deliver(&self, request: DropoffRequest) -> crate::Result<DropoffReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&request.recipient) {
            return Ok(DropoffReceipt {
                success: false,
                error: Some("quota exceeded".to_string()),
                ..DropoffReceipt::default()
            });
        }
        let path = request.relative_path();
        self.delivered
            .lock()
            .unwrap()
            .push((request.recipient.clone(), path.clone()));
        Ok(DropoffReceipt {
            success: true,
            reference_id: Some(path.clone()),
            reference_url: Some(format!("https://drive.example/{}", path)),
            error: None,
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Archive backend that records archived keys
#[derive(Default)]
pub(crate) struct RecordingArchive {
    pub(crate) archived: Mutex<Vec<String>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingArchive {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn archived(&self) -> Vec<String> {
        self.archived.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveChannel for RecordingArchive {
    async fn archive(&self, request: ArchiveRequest) -> crate::Result<ArchiveLocation> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Channel {
                channel: Channel::Archive,
                message: "bucket unavailable".to_string(),
                transient: false,
            });
        }
        self.archived
            .lock()
            .unwrap()
            .push(request.edition_key.to_string());
        Ok(ArchiveLocation {
            location: format!("{}/{}", request.publication_id, request.file_name),
            container: Some("archive-bucket".to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Handles on the concrete test doubles behind a courier
#[derive(Clone)]
pub(crate) struct TestCollaborators {
    pub(crate) source: Arc<ScriptedSource>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) dropoff: Arc<RecordingDropoff>,
    pub(crate) archive: Arc<RecordingArchive>,
}

impl TestCollaborators {
    pub(crate) fn new() -> Self {
        Self {
            source: Arc::new(ScriptedSource::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            dropoff: Arc::new(RecordingDropoff::default()),
            archive: Arc::new(RecordingArchive::default()),
        }
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: self.source.clone(),
            notifier: self.notifier.clone(),
            dropoff: self.dropoff.clone(),
            archive: Some(self.archive.clone()),
        }
    }
}

/// Config with short budgets and no retry backoff to speak of
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.timeouts.discovery = Duration::from_secs(2);
    config.timeouts.download = Duration::from_secs(2);
    config.timeouts.notify = Duration::from_secs(2);
    config.timeouts.dropoff = Duration::from_secs(2);
    config.timeouts.archive = Duration::from_secs(2);
    config
}

/// Helper to create a test EditionCourier with a persistent database.
/// Returns the courier, its collaborators and the tempdir (which must be kept alive).
pub(crate) async fn create_test_courier() -> (EditionCourier, TestCollaborators, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    create_test_courier_with(config, temp_dir).await
}

/// Same as [`create_test_courier`] with a caller-tuned config
pub(crate) async fn create_test_courier_with(
    config: Config,
    temp_dir: TempDir,
) -> (EditionCourier, TestCollaborators, TempDir) {
    let collaborators = TestCollaborators::new();
    let courier = EditionCourier::new(config, collaborators.collaborators())
        .await
        .unwrap();
    (courier, collaborators, temp_dir)
}

pub(crate) fn edition(title: &str, issue: &str, date: (i32, u32, u32)) -> Edition {
    Edition {
        title: title.to_string(),
        issue: issue.to_string(),
        publication_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        source_ref: format!("https://source.example/{}", issue.replace(['/', ' '], "-")),
    }
}

pub(crate) fn mf_edition() -> Edition {
    edition("MF 10/2026", "Issue 10/2026", (2026, 10, 1))
}

/// Publication with both channels on by default and "/MF" as destination
pub(crate) fn publication(id: &str) -> Publication {
    Publication {
        id: id.to_string(),
        name: id.to_uppercase(),
        notify_enabled: true,
        dropoff_enabled: true,
        dropoff_destination: Some(format!("/{}", id.to_uppercase())),
        organize_by_year: None,
        enabled: true,
    }
}
