//! Common test utilities for edition-courier integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use edition_courier::{
    Artifact, Collaborators, Config, Edition, EditionCourier, EditionSource, FilesystemArchive,
    FilesystemDropoff, NotificationChannel, Publication, Recipient,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Source serving a fixed edition per publication
#[derive(Default)]
pub struct StaticSource {
    editions: Mutex<HashMap<String, Edition>>,
}

impl StaticSource {
    pub fn publish(&self, publication_id: &str, edition: Edition) {
        self.editions
            .lock()
            .unwrap()
            .insert(publication_id.to_string(), edition);
    }
}

#[async_trait]
impl EditionSource for StaticSource {
    async fn discover_latest_edition(
        &self,
        publication: &Publication,
    ) -> edition_courier::Result<Option<Edition>> {
        Ok(self.editions.lock().unwrap().get(&publication.id).cloned())
    }

    async fn download(&self, edition: &Edition) -> edition_courier::Result<Artifact> {
        Ok(Artifact {
            file_name: format!("{}.pdf", edition.issue.replace(['/', ' '], "_")),
            content_type: Some("application/pdf".to_string()),
            data: format!("%PDF-1.7 {}", edition.title).into_bytes(),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Notifier that records who was notified
#[derive(Default)]
pub struct InboxNotifier {
    pub inbox: Mutex<Vec<(String, String)>>,
}

impl InboxNotifier {
    pub fn received(&self) -> Vec<(String, String)> {
        self.inbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for InboxNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        _artifact: &Artifact,
        edition: &Edition,
    ) -> edition_courier::Result<bool> {
        self.inbox
            .lock()
            .unwrap()
            .push((recipient.identity.clone(), edition.title.clone()));
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "inbox"
    }
}

/// A courier writing drop-offs and archives under a temporary directory
pub struct TestBed {
    pub courier: EditionCourier,
    pub source: Arc<StaticSource>,
    pub notifier: Arc<InboxNotifier>,
    pub dropoff_root: PathBuf,
    pub archive_root: PathBuf,
    pub temp_dir: TempDir,
}

pub async fn test_bed() -> TestBed {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("courier.db");
    config.retry.max_attempts = 0;
    test_bed_with(config, temp_dir).await
}

pub async fn test_bed_with(config: Config, temp_dir: TempDir) -> TestBed {
    let dropoff_root = temp_dir.path().join("drive");
    let archive_root = temp_dir.path().join("archive");
    let source = Arc::new(StaticSource::default());
    let notifier = Arc::new(InboxNotifier::default());

    let collaborators = Collaborators {
        source: source.clone(),
        notifier: notifier.clone(),
        dropoff: Arc::new(FilesystemDropoff::new(dropoff_root.clone())),
        archive: Some(Arc::new(FilesystemArchive::new(archive_root.clone()))),
    };
    let courier = EditionCourier::new(config, collaborators).await.unwrap();

    TestBed {
        courier,
        source,
        notifier,
        dropoff_root,
        archive_root,
        temp_dir,
    }
}

pub fn edition(title: &str, issue: &str, date: (i32, u32, u32)) -> Edition {
    Edition {
        title: title.to_string(),
        issue: issue.to_string(),
        publication_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        source_ref: format!("https://source.example/{}", issue.replace(['/', ' '], "-")),
    }
}

pub fn magazine() -> Publication {
    Publication {
        id: "mf".to_string(),
        name: "MF".to_string(),
        notify_enabled: true,
        dropoff_enabled: true,
        dropoff_destination: Some("/MF".to_string()),
        organize_by_year: Some(true),
        enabled: true,
    }
}
