//! Reconciliation passes between the local data root and a [`CloudStore`].

use super::{decide, is_excluded, parent_of, CloudEntry, CloudStore, LocalState, SyncDecision, SyncReport};
use crate::config::SyncConfig;
use crate::error::{Result, RomportError};
use crate::events::{EventBus, LibraryEvent};
use async_trait::async_trait;
use filetime::FileTime;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Which side survives a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    KeepLocal,
    KeepRemote,
}

/// Decides conflicts the reconciler cannot settle by modification time.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve_conflict(&self, relative_path: &str) -> ConflictChoice;
}

/// Answers every conflict the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedConflictPolicy(pub ConflictChoice);

#[async_trait]
impl ConflictResolver for FixedConflictPolicy {
    async fn resolve_conflict(&self, _relative_path: &str) -> ConflictChoice {
        self.0
    }
}

/// Keeps a local directory and a remote tree converged.
#[derive(Clone)]
pub struct CloudReconciler {
    local_root: PathBuf,
    remote: Arc<dyn CloudStore>,
    resolver: Arc<dyn ConflictResolver>,
    enabled: Arc<AtomicBool>,
    downloading: Arc<Mutex<HashSet<String>>>,
    local_mtime: fn(&walkdir::DirEntry) -> Option<SystemTime>,
}

enum Transfer {
    Uploaded,
    Downloaded,
}

impl CloudReconciler {
    pub fn new(
        local_root: impl Into<PathBuf>,
        remote: Arc<dyn CloudStore>,
        resolver: Arc<dyn ConflictResolver>,
    ) -> Self {
        Self {
            local_root: local_root.into(),
            remote,
            resolver,
            enabled: Arc::new(AtomicBool::new(true)),
            downloading: Arc::new(Mutex::new(HashSet::new())),
            local_mtime: entry_modified,
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn event-driven syncing on or off. Explicit calls are not gated.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn local_path(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.local_root.clone(), |path, part| path.join(part))
    }

    fn relative_of(&self, local_path: &Path) -> Option<String> {
        let relative = local_path.strip_prefix(&self.local_root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    /// Run one reconciliation pass.
    ///
    /// Only a failure to enumerate the remote tree fails the pass. Individual
    /// transfers that fail are logged and counted in [`SyncReport::failed`].
    pub async fn sync_pass(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        info!("Starting sync pass for {}", self.local_root.display());

        let remote_files = self.list_remote_files().await?;
        let local_files = self.list_local_files().await?;

        let mut handled: HashSet<String> = HashSet::new();
        let mut conflicts: Vec<(String, SystemTime)> = Vec::new();

        for entry in remote_files {
            let relative = entry.relative_path.clone();
            handled.insert(relative.clone());

            let Some(remote_modified) = entry.modified else {
                debug!("Skipping {}: remote modification time unknown", relative);
                continue;
            };

            let local = match local_files.get(&relative) {
                None => LocalState::Missing,
                Some(None) => LocalState::Unreadable,
                Some(Some(t)) => LocalState::Modified(*t),
            };

            let path = relative.as_str();
            let outcome = match decide(local, remote_modified) {
                SyncDecision::Noop => {
                    report.unchanged += 1;
                    continue;
                }
                SyncDecision::Conflict => {
                    debug!("Local modification time of {} unreadable, escalating", relative);
                    conflicts.push((relative, remote_modified));
                    continue;
                }
                SyncDecision::Upload => {
                    debug!("Local copy of {} is newer", relative);
                    with_retries(path, move || async move {
                        self.replace_remote(path).await.map(|_| Transfer::Uploaded)
                    })
                    .await
                }
                SyncDecision::Download => {
                    debug!("Remote copy of {} is newer or missing locally", relative);
                    with_retries(path, move || async move {
                        self.replace_local(path, remote_modified)
                            .await
                            .map(|_| Transfer::Downloaded)
                    })
                    .await
                }
            };
            record(&mut report, &relative, outcome);
        }

        for relative in local_files.keys() {
            if handled.contains(relative) {
                continue;
            }
            debug!("{} only exists locally, uploading", relative);
            let local = self.local_path(relative);
            let local = local.as_path();
            let outcome = with_retries(relative, move || async move {
                self.upload_to(local, relative).await.map(|_| Transfer::Uploaded)
            })
            .await;
            record(&mut report, relative, outcome);
        }

        report.conflicts = conflicts.len();
        let tasks: Vec<JoinHandle<Result<Transfer>>> = conflicts
            .into_iter()
            .map(|(relative, remote_modified)| {
                let this = self.clone();
                tokio::spawn(async move { this.settle_conflict(&relative, remote_modified).await })
            })
            .collect();
        for task in tasks {
            match task.await {
                Ok(outcome) => record(&mut report, "conflict", outcome),
                Err(e) => {
                    warn!("Conflict task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Sync pass finished: {} uploaded, {} downloaded, {} unchanged, {} conflict(s), {} failed",
            report.uploaded, report.downloaded, report.unchanged, report.conflicts, report.failed
        );
        Ok(report)
    }

    /// Apply the resolver's choice. `remote_modified` is the time listed for
    /// the remote copy in this pass; a kept remote copy is stamped with it.
    async fn settle_conflict(&self, relative: &str, remote_modified: SystemTime) -> Result<Transfer> {
        match self.resolver.resolve_conflict(relative).await {
            ConflictChoice::KeepLocal => {
                debug!("Keeping local copy of {}", relative);
                with_retries(relative, move || async move {
                    self.replace_remote(relative).await.map(|_| Transfer::Uploaded)
                })
                .await
            }
            ConflictChoice::KeepRemote => {
                debug!("Keeping remote copy of {}", relative);
                with_retries(relative, move || async move {
                    self.replace_local(relative, remote_modified)
                        .await
                        .map(|_| Transfer::Downloaded)
                })
                .await
            }
        }
    }

    /// Delete the remote file and upload the local one in its place.
    async fn replace_remote(&self, relative: &str) -> Result<()> {
        if let Err(e) = self.remote.remove_file(relative).await {
            debug!("Removing remote {} before upload failed: {}", relative, e);
        }
        self.remote.upload(&self.local_path(relative), relative).await
    }

    /// Delete the local file and download the remote one in its place,
    /// stamping it with the remote modification time.
    async fn replace_local(&self, relative: &str, modified: SystemTime) -> Result<()> {
        let local = self.local_path(relative);
        if local.is_file() {
            tokio::fs::remove_file(&local)
                .await
                .map_err(|e| RomportError::io_with_path(e, &local))?;
        }
        self.download_to(relative, &local).await?;

        filetime::set_file_mtime(&local, FileTime::from_system_time(modified))
            .map_err(|e| RomportError::io_with_path(e, &local))
    }

    async fn upload_to(&self, local: &Path, relative: &str) -> Result<()> {
        let parent = parent_of(relative);
        if !parent.is_empty() && !self.remote.directory_exists(parent).await? {
            self.remote.create_directory(parent).await?;
        }
        self.remote.upload(local, relative).await
    }

    async fn download_to(&self, relative: &str, local: &Path) -> Result<()> {
        {
            let mut downloading = self
                .downloading
                .lock()
                .map_err(|_| RomportError::Other("download registry poisoned".into()))?;
            if !downloading.insert(relative.to_string()) {
                return Err(RomportError::DownloadInProgress(relative.to_string()));
            }
        }

        let result = async {
            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RomportError::io_with_path(e, parent))?;
            }
            self.remote.download(relative, local).await
        }
        .await;

        if let Ok(mut downloading) = self.downloading.lock() {
            downloading.remove(relative);
        }
        result
    }

    /// Every file of the remote tree, skipping excluded subtrees.
    async fn list_remote_files(&self) -> Result<Vec<CloudEntry>> {
        if !self.remote.directory_exists("").await? {
            self.remote.create_directory("").await?;
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut pending = vec![String::new()];
        while let Some(dir) = pending.pop() {
            for entry in self.remote.list_directory(&dir).await? {
                if is_excluded(&entry.relative_path) {
                    continue;
                }
                if entry.is_directory {
                    pending.push(entry.relative_path);
                } else {
                    files.push(entry);
                }
            }
        }
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    /// Every local file keyed by relative path, with its modification time
    /// when readable.
    async fn list_local_files(&self) -> Result<HashMap<String, Option<SystemTime>>> {
        let root = self.local_root.clone();
        let local_mtime = self.local_mtime;
        tokio::task::spawn_blocking(move || {
            let mut files = HashMap::new();
            if !root.is_dir() {
                return files;
            }
            let walker = WalkDir::new(&root).min_depth(1).into_iter().filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !name.starts_with('.')
            });
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Failed to walk local tree: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                if is_excluded(&relative) {
                    continue;
                }
                files.insert(relative, local_mtime(&entry));
            }
            files
        })
        .await
        .map_err(|e| RomportError::Other(format!("Local scan task failed: {}", e)))
    }

    /// Upload one local file under the data root to its mirrored remote
    /// path. Excluded paths are skipped.
    pub async fn upload_file(&self, local_path: &Path) -> Result<()> {
        let relative = self.relative_of(local_path).ok_or_else(|| {
            RomportError::cloud(
                local_path.display().to_string(),
                "not under the sync root",
            )
        })?;
        if is_excluded(&relative) {
            debug!("Not uploading excluded {}", relative);
            return Ok(());
        }
        self.upload_to(local_path, &relative).await
    }

    /// Download one remote file to its mirrored local path.
    ///
    /// A second download of the same path while the first is running fails
    /// with [`RomportError::DownloadInProgress`].
    pub async fn download_file(&self, relative_path: &str) -> Result<PathBuf> {
        let local = self.local_path(relative_path);
        self.download_to(relative_path, &local).await?;
        Ok(local)
    }

    pub async fn delete_remote(&self, relative_path: &str) -> Result<()> {
        self.remote.remove_file(relative_path).await
    }

    pub async fn delete_remote_dir(&self, relative_path: &str) -> Result<()> {
        self.remote.remove_directory(relative_path).await
    }

    pub async fn remote_exists(&self, relative_path: &str) -> Result<bool> {
        self.remote.file_exists(relative_path).await
    }

    /// React to library events until the bus closes.
    ///
    /// Lifecycle events trigger a pass and stored files are uploaded, both
    /// only while syncing is enabled.
    pub fn listen(&self, events: &EventBus) -> JoinHandle<()> {
        let mut receiver = events.subscribe();
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Sync listener lagged, {} event(s) skipped", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !this.is_enabled() {
                    continue;
                }
                match event {
                    LibraryEvent::SessionEnded
                    | LibraryEvent::Foreground
                    | LibraryEvent::SyncRequested => {
                        if let Err(e) = this.sync_pass().await {
                            warn!("Sync pass failed: {}", e);
                        }
                    }
                    LibraryEvent::FileStored(path) => {
                        if let Err(e) = this.upload_file(&path).await {
                            warn!("Upload of {} failed: {}", path.display(), e);
                        }
                    }
                    LibraryEvent::ImportFinished { .. } => {}
                }
            }
            debug!("Sync listener stopped");
        })
    }
}

fn entry_modified(entry: &walkdir::DirEntry) -> Option<SystemTime> {
    entry.metadata().ok()?.modified().ok()
}

/// Run `transfer`, retrying errors that may clear up on their own with a
/// doubling delay.
async fn with_retries<F, Fut>(relative: &str, mut transfer: F) -> Result<Transfer>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Transfer>>,
{
    let mut delay = SyncConfig::TRANSFER_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match transfer().await {
            Err(e) if e.is_retryable() && attempt < SyncConfig::TRANSFER_ATTEMPTS => {
                debug!(
                    "Transfer of {} failed on attempt {}: {}; retrying in {:?}",
                    relative, attempt, e, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

fn record(report: &mut SyncReport, relative: &str, outcome: Result<Transfer>) {
    match outcome {
        Ok(Transfer::Uploaded) => report.uploaded += 1,
        Ok(Transfer::Downloaded) => report.downloaded += 1,
        Err(e) => {
            warn!("Sync of {} failed: {}", relative, e);
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LocalDirCloudStore;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    fn stamp(path: &Path, secs: u64) {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        filetime::set_file_mtime(path, FileTime::from_system_time(t)).unwrap();
    }

    fn write(path: &Path, contents: &[u8], secs: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        stamp(path, secs);
    }

    fn setup(dir: &TempDir) -> (CloudReconciler, PathBuf, PathBuf) {
        let local = dir.path().join("local");
        let remote = dir.path().join("remote");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&remote).unwrap();
        let reconciler = CloudReconciler::new(
            &local,
            Arc::new(LocalDirCloudStore::new(&remote)),
            Arc::new(FixedConflictPolicy(ConflictChoice::KeepLocal)),
        );
        (reconciler, local, remote)
    }

    #[tokio::test]
    async fn test_newer_side_wins() {
        let dir = TempDir::new().unwrap();
        let (reconciler, local, remote) = setup(&dir);
        write(&local.join("saves/a.sav"), b"local new", 2_000);
        write(&remote.join("saves/a.sav"), b"remote old", 1_000);
        write(&local.join("saves/b.sav"), b"local old", 1_000);
        write(&remote.join("saves/b.sav"), b"remote new", 2_000);

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(fs::read(remote.join("saves/a.sav")).unwrap(), b"local new");
        assert_eq!(fs::read(local.join("saves/b.sav")).unwrap(), b"remote new");
    }

    #[tokio::test]
    async fn test_one_sided_files_are_copied() {
        let dir = TempDir::new().unwrap();
        let (reconciler, local, remote) = setup(&dir);
        write(&local.join("roms/h1/game.gba"), b"rom", 1_000);
        write(&remote.join("saves/h1/game.sav"), b"save", 1_000);

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.actions(), 2);
        assert!(remote.join("roms/h1/game.gba").exists());
        assert!(local.join("saves/h1/game.sav").exists());
    }

    #[tokio::test]
    async fn test_second_pass_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let (reconciler, local, remote) = setup(&dir);
        write(&local.join("a/local_only"), b"1", 1_000);
        write(&remote.join("b/remote_only"), b"2", 1_500);
        write(&local.join("c/shared"), b"3", 3_000);
        write(&remote.join("c/shared"), b"4", 2_000);

        let first = reconciler.sync_pass().await.unwrap();
        assert_eq!(first.actions(), 3);

        let second = reconciler.sync_pass().await.unwrap();
        assert_eq!(second.actions(), 0);
        assert_eq!(second.failed, 0);
        assert_eq!(second.unchanged, 3);
    }

    #[tokio::test]
    async fn test_excluded_paths_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let (reconciler, local, remote) = setup(&dir);
        write(&local.join("wpkdata/blob"), b"x", 1_000);
        write(&local.join("psp/SYSTEM/CACHE/c"), b"x", 1_000);
        write(&local.join(".hidden"), b"x", 1_000);
        write(&remote.join("Datas/blob"), b"x", 1_000);

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.actions(), 0);
        assert!(!remote.join("wpkdata").exists());
        assert!(!remote.join("psp").exists());
        assert!(!local.join("Datas").exists());
    }

    #[tokio::test]
    async fn test_unreadable_local_time_keeps_local() {
        let dir = TempDir::new().unwrap();
        let (mut reconciler, local, remote) = setup(&dir);
        reconciler.local_mtime = |_| None;
        write(&local.join("saves/c.sav"), b"local", 1_000);
        write(&remote.join("saves/c.sav"), b"remote", 5_000);

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read(remote.join("saves/c.sav")).unwrap(), b"local");
    }

    #[tokio::test]
    async fn test_unreadable_local_time_keeps_remote() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local");
        let remote = dir.path().join("remote");
        write(&local.join("saves/c.sav"), b"local", 9_000);
        write(&remote.join("saves/c.sav"), b"remote", 5_000);
        let mut reconciler = CloudReconciler::new(
            &local,
            Arc::new(LocalDirCloudStore::new(&remote)),
            Arc::new(FixedConflictPolicy(ConflictChoice::KeepRemote)),
        );
        reconciler.local_mtime = |_| None;

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.downloaded, 1);
        let kept = local.join("saves/c.sav");
        assert_eq!(fs::read(&kept).unwrap(), b"remote");
        assert_eq!(
            fs::metadata(&kept).unwrap().modified().unwrap(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(5_000)
        );

        reconciler.local_mtime = entry_modified;
        let second = reconciler.sync_pass().await.unwrap();
        assert_eq!(second.actions(), 0);
        assert_eq!(second.unchanged, 1);
    }

    /// Directory store whose first uploads fail with a chosen error.
    struct StutteringStore {
        inner: LocalDirCloudStore,
        failures_left: AtomicUsize,
        uploads: AtomicUsize,
        error: fn(&str) -> RomportError,
    }

    impl StutteringStore {
        fn new(remote: &Path, failures: usize, error: fn(&str) -> RomportError) -> Self {
            Self {
                inner: LocalDirCloudStore::new(remote),
                failures_left: AtomicUsize::new(failures),
                uploads: AtomicUsize::new(0),
                error,
            }
        }
    }

    #[async_trait]
    impl CloudStore for StutteringStore {
        async fn list_directory(&self, path: &str) -> Result<Vec<CloudEntry>> {
            self.inner.list_directory(path).await
        }
        async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err((self.error)(remote));
            }
            self.inner.upload(local, remote).await
        }
        async fn download(&self, remote: &str, local: &Path) -> Result<()> {
            self.inner.download(remote, local).await
        }
        async fn remove_file(&self, remote: &str) -> Result<()> {
            self.inner.remove_file(remote).await
        }
        async fn remove_directory(&self, remote: &str) -> Result<()> {
            self.inner.remove_directory(remote).await
        }
        async fn create_directory(&self, remote: &str) -> Result<()> {
            self.inner.create_directory(remote).await
        }
        async fn file_exists(&self, remote: &str) -> Result<bool> {
            self.inner.file_exists(remote).await
        }
        async fn directory_exists(&self, remote: &str) -> Result<bool> {
            self.inner.directory_exists(remote).await
        }
    }

    #[tokio::test]
    async fn test_retryable_upload_failure_is_retried() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local");
        let remote = dir.path().join("remote");
        write(&local.join("saves/a.sav"), b"a", 1_000);
        let store = Arc::new(StutteringStore::new(&remote, 1, |path| {
            RomportError::cloud(path, "connection reset")
        }));
        let reconciler = CloudReconciler::new(
            &local,
            store.clone(),
            Arc::new(FixedConflictPolicy(ConflictChoice::KeepLocal)),
        );

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 2);
        assert!(remote.join("saves/a.sav").exists());
    }

    #[tokio::test]
    async fn test_permanent_upload_failure_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local");
        let remote = dir.path().join("remote");
        write(&local.join("saves/a.sav"), b"a", 1_000);
        let store = Arc::new(StutteringStore::new(&remote, usize::MAX, |path| {
            RomportError::io_with_path(
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                path,
            )
        }));
        let reconciler = CloudReconciler::new(
            &local,
            store.clone(),
            Arc::new(FixedConflictPolicy(ConflictChoice::KeepLocal)),
        );

        let report = reconciler.sync_pass().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(store.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_download_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (reconciler, _local, remote) = setup(&dir);
        write(&remote.join("saves/a.sav"), b"x", 1_000);

        reconciler
            .downloading
            .lock()
            .unwrap()
            .insert("saves/a.sav".to_string());
        let err = reconciler.download_file("saves/a.sav").await.unwrap_err();
        assert!(matches!(err, RomportError::DownloadInProgress(_)));

        reconciler.downloading.lock().unwrap().clear();
        let path = reconciler.download_file("saves/a.sav").await.unwrap();
        assert_eq!(fs::read(path).unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_single_file_operations() {
        let dir = TempDir::new().unwrap();
        let (reconciler, local, remote) = setup(&dir);
        let file = local.join("saves/h1/game.sav");
        write(&file, b"s", 1_000);

        reconciler.upload_file(&file).await.unwrap();
        assert!(reconciler.remote_exists("saves/h1/game.sav").await.unwrap());

        reconciler.delete_remote("saves/h1/game.sav").await.unwrap();
        assert!(!reconciler.remote_exists("saves/h1/game.sav").await.unwrap());

        reconciler.delete_remote_dir("saves").await.unwrap();
        assert!(!remote.join("saves").exists());

        let outside = dir.path().join("elsewhere.sav");
        fs::write(&outside, b"x").unwrap();
        assert!(reconciler.upload_file(&outside).await.is_err());
    }

    #[tokio::test]
    async fn test_listener_uploads_stored_files_when_enabled() {
        let dir = TempDir::new().unwrap();
        let (reconciler, local, remote) = setup(&dir);
        let events = EventBus::default();
        let handle = reconciler.listen(&events);

        reconciler.set_enabled(false);
        let skipped = local.join("saves/skipped.sav");
        write(&skipped, b"x", 1_000);
        events.publish(LibraryEvent::FileStored(skipped));

        // Let the listener drain the disabled event before re-enabling.
        tokio::time::sleep(Duration::from_millis(100)).await;
        reconciler.set_enabled(true);
        let stored = local.join("saves/stored.sav");
        write(&stored, b"y", 1_000);
        events.publish(LibraryEvent::FileStored(stored));

        let expected = remote.join("saves/stored.sav");
        for _ in 0..50 {
            if expected.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(expected.exists());
        assert!(!remote.join("saves/skipped.sav").exists());

        drop(events);
        handle.await.unwrap();
    }
}
