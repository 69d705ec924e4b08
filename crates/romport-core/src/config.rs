//! Centralized configuration for romport.
//!
//! Constants for the import pipeline, network lookups, on-disk layout and
//! cloud reconciliation. Runtime-adjustable values live in
//! [`crate::persist::Settings`].

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "romport";
    pub const USER_AGENT: &'static str = "romport/0.3";
}

/// Configuration for the import pipeline.
pub struct ImportConfig;

impl ImportConfig {
    /// Bytes of file content that participate in the identity hash.
    pub const IDENTITY_PREFIX_BYTES: u64 = 16 * 1024 * 1024;
    /// Read buffer used while hashing.
    pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;
    /// Upper bound on concurrently running per-item imports.
    pub const DEFAULT_MAX_CONCURRENT_IMPORTS: usize = 4;
    /// Prefix for staging directories inside the library root.
    pub const STAGING_PREFIX: &'static str = ".tmp_import_";
    /// Prefix for per-batch directories under the scratch dir.
    pub const BATCH_SCRATCH_PREFIX: &'static str = "batch-";
    /// Manifest file expected inside a skin bundle.
    pub const SKIN_MANIFEST: &'static str = "info.json";
    /// Path marker for zipped Nintendo 3DS save bundles.
    pub const THREE_DS_SAVE_MARKER: &'static str = ".3ds.sav";
    /// Path marker for zipped PSP save bundles.
    pub const PSP_SAVE_MARKER: &'static str = ".psp.sav";
    /// Entry prefix a 3DS save bundle must contain.
    pub const THREE_DS_SAVE_ROOT: &'static str = "sdmc";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Cover lookups give up after this and fall back to no cover.
    pub const COVER_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
    pub const THUMBNAIL_BASE_URL: &'static str = "https://thumbnails.libretro.com";
}

/// Directory and file names inside the data root.
pub struct PathsConfig;

impl PathsConfig {
    pub const ROMS_DIR_NAME: &'static str = "roms";
    pub const SAVES_DIR_NAME: &'static str = "saves";
    pub const SKINS_DIR_NAME: &'static str = "skins";
    pub const SCRATCH_DIR_NAME: &'static str = "scratch";
    pub const THREE_DS_SAVES_DIR_NAME: &'static str = "3ds";
    pub const PSP_SAVES_DIR_NAME: &'static str = "psp";
    pub const DATABASE_FILENAME: &'static str = "library.db";
    pub const SETTINGS_FILENAME: &'static str = "settings.json";
}

/// Cloud reconciliation configuration.
pub struct SyncConfig;

impl SyncConfig {
    /// Modification times closer than this are treated as equal.
    pub const MTIME_TOLERANCE: Duration = Duration::from_secs(1);
    /// Attempts per transfer when the error is retryable.
    pub const TRANSFER_ATTEMPTS: u32 = 3;
    /// Delay before the first retry; doubles on each further one.
    pub const TRANSFER_RETRY_DELAY: Duration = Duration::from_millis(200);
    /// Directory names that are never descended into.
    pub const EXCLUDED_DIR_NAMES: &'static [&'static str] = &["wpkdata", "Datas", "scratch"];
    /// Relative path fragments whose files are never synced.
    pub const EXCLUDED_PATH_FRAGMENTS: &'static [&'static str] = &["SYSTEM/CACHE/"];
    /// Top-level files that stay local, matched by prefix so SQLite's
    /// `-wal`/`-shm` companions are covered too.
    pub const LOCAL_ONLY_ROOT_FILES: &'static [&'static str] = &["library.db", "settings.json"];
}
