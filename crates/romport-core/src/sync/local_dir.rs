//! [`CloudStore`] over a plain directory, such as a mounted cloud drive.

use super::{CloudEntry, CloudStore};
use crate::archive::sanitize_extract_path;
use crate::error::{Result, RomportError};
use async_trait::async_trait;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A remote tree stored under a local directory.
///
/// Uploads and downloads are copies that carry the source's modification
/// time over to the destination.
#[derive(Debug, Clone)]
pub struct LocalDirCloudStore {
    root: PathBuf,
}

impl LocalDirCloudStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, remote: &str) -> Result<PathBuf> {
        if remote.is_empty() {
            return Ok(self.root.clone());
        }
        sanitize_extract_path(&self.root, Path::new(remote))
            .ok_or_else(|| RomportError::cloud(remote, "path escapes the store root"))
    }

    async fn blocking<T, F>(&self, remote: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> std::io::Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| RomportError::cloud(remote, format!("task failed: {}", e)))?
            .map_err(|e| RomportError::cloud(remote, e.to_string()))
    }
}

/// Copy `from` to `to`, then give `to` the modification time of `from`.
fn copy_preserving_mtime(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    let mtime = FileTime::from_last_modification_time(&fs::metadata(from)?);
    filetime::set_file_mtime(to, mtime)
}

#[async_trait]
impl CloudStore for LocalDirCloudStore {
    async fn list_directory(&self, path: &str) -> Result<Vec<CloudEntry>> {
        let dir = self.resolve(path)?;
        let prefix = path.trim_matches('/').to_string();

        self.blocking(path, move || {
            let mut entries = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let relative_path = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };
                let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
                entries.push(CloudEntry {
                    relative_path,
                    is_directory: entry.file_type().is_dir(),
                    modified,
                });
            }
            Ok(entries)
        })
        .await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let dest = self.resolve(remote)?;
        let source = local.to_path_buf();
        debug!("Uploading {} to {}", source.display(), remote);
        self.blocking(remote, move || copy_preserving_mtime(&source, &dest))
            .await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let source = self.resolve(remote)?;
        let dest = local.to_path_buf();
        debug!("Downloading {} to {}", remote, dest.display());
        self.blocking(remote, move || copy_preserving_mtime(&source, &dest))
            .await
    }

    async fn remove_file(&self, remote: &str) -> Result<()> {
        let path = self.resolve(remote)?;
        self.blocking(remote, move || fs::remove_file(path)).await
    }

    async fn remove_directory(&self, remote: &str) -> Result<()> {
        if remote.trim_matches('/').is_empty() {
            return Err(RomportError::cloud(remote, "refusing to remove the store root"));
        }
        let path = self.resolve(remote)?;
        self.blocking(remote, move || fs::remove_dir_all(path)).await
    }

    async fn create_directory(&self, remote: &str) -> Result<()> {
        let path = self.resolve(remote)?;
        self.blocking(remote, move || fs::create_dir_all(path)).await
    }

    async fn file_exists(&self, remote: &str) -> Result<bool> {
        let path = self.resolve(remote)?;
        self.blocking(remote, move || Ok(path.is_file())).await
    }

    async fn directory_exists(&self, remote: &str) -> Result<bool> {
        let path = self.resolve(remote)?;
        self.blocking(remote, move || Ok(path.is_dir())).await
    }
}
