//! Cloud reconciliation of the local data tree.
//!
//! A pass compares every remote file with its local counterpart by
//! modification time and moves whichever side is newer. Files that exist
//! only locally are uploaded. Pairs whose local time cannot be read are
//! escalated to a [`ConflictResolver`].

mod cloud;
mod local_dir;
mod reconciler;

pub use cloud::CloudStore;
pub use local_dir::LocalDirCloudStore;
pub use reconciler::{CloudReconciler, ConflictChoice, ConflictResolver, FixedConflictPolicy};

use crate::config::SyncConfig;
use std::time::SystemTime;

/// One entry of the remote tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEntry {
    /// Path relative to the sync root, `/`-separated.
    pub relative_path: String,
    pub is_directory: bool,
    /// `None` when the store cannot tell.
    pub modified: Option<SystemTime>,
}

/// What the local side of a pair looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Missing,
    /// Present, but its modification time could not be read.
    Unreadable,
    Modified(SystemTime),
}

/// Action for one remote/local pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Local wins: replace the remote file.
    Upload,
    /// Remote wins, or there is no local file.
    Download,
    Noop,
    Conflict,
}

/// Decide what to do with a remote file given its local counterpart.
///
/// Times within [`SyncConfig::MTIME_TOLERANCE`] of each other are equal.
pub fn decide(local: LocalState, remote_modified: SystemTime) -> SyncDecision {
    let local_modified = match local {
        LocalState::Missing => return SyncDecision::Download,
        LocalState::Unreadable => return SyncDecision::Conflict,
        LocalState::Modified(t) => t,
    };

    match local_modified.duration_since(remote_modified) {
        Ok(ahead) if ahead > SyncConfig::MTIME_TOLERANCE => SyncDecision::Upload,
        Ok(_) => SyncDecision::Noop,
        Err(behind) if behind.duration() > SyncConfig::MTIME_TOLERANCE => SyncDecision::Download,
        Err(_) => SyncDecision::Noop,
    }
}

/// Whether a relative path is never synced.
///
/// Hidden entries, the excluded directory trees, anything under
/// `SYSTEM/CACHE/` and the library database stay local.
pub fn is_excluded(relative_path: &str) -> bool {
    if !relative_path.contains('/')
        && SyncConfig::LOCAL_ONLY_ROOT_FILES
            .iter()
            .any(|name| relative_path.starts_with(name))
    {
        return true;
    }
    let hidden_or_skipped = relative_path.split('/').any(|part| {
        part.starts_with('.') || SyncConfig::EXCLUDED_DIR_NAMES.contains(&part)
    });
    hidden_or_skipped
        || SyncConfig::EXCLUDED_PATH_FRAGMENTS
            .iter()
            .any(|fragment| relative_path.contains(fragment))
}

/// Parent of a relative path, `""` for top-level entries.
pub(crate) fn parent_of(relative_path: &str) -> &str {
    relative_path
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

/// Counters for one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub downloaded: usize,
    pub unchanged: usize,
    /// Conflicts escalated to the resolver.
    pub conflicts: usize,
    /// Individual transfers or deletes that failed; a later pass retries.
    pub failed: usize,
}

impl SyncReport {
    /// Number of transfers performed.
    pub fn actions(&self) -> usize {
        self.uploaded + self.downloaded
    }
}
