//! Local directory tree implementations of drop-off and archival

use super::traits::{
    ArchiveChannel, ArchiveLocation, ArchiveRequest, DropoffChannel, DropoffReceipt,
    DropoffRequest,
};
use crate::error::Error;
use crate::types::Channel;
use crate::utils::resolve_under_root;
use async_trait::async_trait;
use chrono::Datelike;
use std::path::{Path, PathBuf};

/// Drop-off into a local (or mounted) directory tree
///
/// A destination of "/MF" with year organization lands in
/// `root/MF/2026/<file>`.
#[derive(Debug, Clone)]
pub struct FilesystemDropoff {
    root: PathBuf,
}

impl FilesystemDropoff {
    /// Drop files off under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DropoffChannel for FilesystemDropoff {
    async fn deliver(&self, request: DropoffRequest) -> crate::Result<DropoffReceipt> {
        let mut dir = match resolve_under_root(&self.root, &request.destination) {
            Ok(dir) => dir,
            Err(e) => {
                return Ok(DropoffReceipt {
                    success: false,
                    error: Some(e.to_string()),
                    ..DropoffReceipt::default()
                });
            }
        };
        if let Some(year) = request.year_folder {
            dir.push(year.to_string());
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_failure(Channel::Dropoff, &dir, e))?;

        let path = dir.join(&request.file_name);
        tokio::fs::write(&path, &request.artifact.data)
            .await
            .map_err(|e| io_failure(Channel::Dropoff, &path, e))?;

        tracing::debug!(
            recipient = %request.recipient,
            path = %path.display(),
            "Artifact dropped off"
        );

        Ok(DropoffReceipt {
            success: true,
            reference_id: Some(request.relative_path()),
            reference_url: url::Url::from_file_path(&path).ok().map(|u| u.to_string()),
            error: None,
        })
    }

    fn name(&self) -> &'static str {
        "filesystem-dropoff"
    }
}

/// Archive into a local directory tree: `root/<publication>/<year>/<file>`
///
/// Re-archiving overwrites the previous copy.
#[derive(Debug, Clone)]
pub struct FilesystemArchive {
    root: PathBuf,
}

impl FilesystemArchive {
    /// Archive under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArchiveChannel for FilesystemArchive {
    async fn archive(&self, request: ArchiveRequest) -> crate::Result<ArchiveLocation> {
        let dir = resolve_under_root(&self.root, &request.publication_id)?
            .join(request.edition.publication_date.year().to_string());

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_failure(Channel::Archive, &dir, e))?;

        let path = dir.join(&request.file_name);
        tokio::fs::write(&path, &request.artifact.data)
            .await
            .map_err(|e| io_failure(Channel::Archive, &path, e))?;

        Ok(ArchiveLocation {
            location: path.display().to_string(),
            container: Some(self.root.display().to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "filesystem-archive"
    }
}

fn io_failure(channel: Channel, path: &Path, e: std::io::Error) -> Error {
    let transient = matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
    );
    Error::Channel {
        channel,
        message: format!("failed to write {}: {}", path.display(), e),
        transient,
    }
}
