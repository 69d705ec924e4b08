//! Remote store abstraction.

use super::CloudEntry;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// A remote file tree addressed by `/`-separated paths relative to its root.
///
/// `""` is the root itself. Every operation may fail independently.
///
/// Implementations must keep the modification time of an uploaded file equal
/// to the local file's, so that a file uploaded by one pass compares equal on
/// the next.
#[async_trait]
pub trait CloudStore: Send + Sync {
    /// Direct children of a directory. `relative_path` of each entry is
    /// rooted at the store root, not at `path`.
    async fn list_directory(&self, path: &str) -> Result<Vec<CloudEntry>>;

    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    async fn download(&self, remote: &str, local: &Path) -> Result<()>;

    async fn remove_file(&self, remote: &str) -> Result<()>;

    /// Remove a directory and everything under it.
    async fn remove_directory(&self, remote: &str) -> Result<()>;

    /// Create a directory and any missing parents.
    async fn create_directory(&self, remote: &str) -> Result<()>;

    async fn file_exists(&self, remote: &str) -> Result<bool>;

    async fn directory_exists(&self, remote: &str) -> Result<bool>;
}
