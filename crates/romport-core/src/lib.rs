//! Romport Core - Headless import and cloud-sync pipeline for emulator game
//! libraries.
//!
//! Files dropped on a library (ROMs, multi-disc sets, archives, battery
//! saves, save bundles, controller skins) are classified, deduplicated by
//! content hash, copied under the data root and recorded in SQLite. The data
//! root can be mirrored to a cloud store by modification-time reconciliation.
//!
//! # Example
//!
//! ```rust,ignore
//! use romport::{ImportOptions, Romport};
//!
//! #[tokio::main]
//! async fn main() -> romport::Result<()> {
//!     let library = Romport::new("/path/to/library").await?;
//!
//!     let report = library
//!         .import_files(vec!["Advance Wars.gba".into()], ImportOptions::default())
//!         .await?;
//!     println!("Imported {} item(s)", report.imported_count());
//!
//!     for game in library.list_games().await? {
//!         println!("{} ({})", game.name, game.platform);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod classify;
pub mod config;
pub mod cover;
pub mod error;
pub mod events;
pub mod hashing;
pub mod importer;
pub mod library;
pub mod multifile;
pub mod persist;
pub mod platform;
pub mod store;
pub mod sync;

mod api;

// Re-export commonly used types
pub use classify::{ExtensionRegistry, FileKind, RegisteredKind};
pub use cover::{CoverArtProvider, LibretroThumbnails};
pub use error::{ImportError, Result, RomportError};
pub use events::{EventBus, LibraryEvent};
pub use hashing::{content_identity, content_identity_async};
pub use importer::{
    resolve_sequentially, FilesImporter, ImportOptions, ImportReport, ImportResolver,
    ImportSummary, SequenceOutcome,
};
pub use library::LibraryLayout;
pub use multifile::MultiFileRom;
pub use persist::Settings;
pub use platform::Platform;
pub use store::{GameRecord, RecordStore, SkinRecord, SqliteRecordStore};
pub use sync::{
    CloudEntry, CloudReconciler, CloudStore, ConflictChoice, ConflictResolver,
    FixedConflictPolicy, LocalDirCloudStore, SyncDecision, SyncReport,
};

// Re-export builder from api module
pub use api::RomportBuilder;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use api::RomportState;

/// Main entry point for a game library.
///
/// Owns the record store, the import orchestrator, the event bus and, when a
/// cloud store is configured, the reconciler and its event listener. Cloning
/// is cheap and clones share all state.
#[derive(Clone)]
pub struct Romport {
    /// Library data root
    root: PathBuf,
    inner: Arc<RomportState>,
}

impl Romport {
    /// Create a builder for Romport.
    ///
    /// Use the builder for more control over initialization options:
    /// - `auto_create_dirs`: Create the data root automatically
    /// - `with_cover_lookups`: Enable/disable background cover lookups
    /// - `with_cloud_store`: Mirror the data root to a cloud store
    pub fn builder(root: impl Into<PathBuf>) -> RomportBuilder {
        RomportBuilder::new(root)
    }

    /// Open (and create if needed) a library with default options.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        RomportBuilder::new(root).auto_create_dirs(true).build().await
    }

    /// Get the library data root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &LibraryLayout {
        &self.inner.layout
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    /// Event bus shared by the importer and the reconciler.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn importer(&self) -> &FilesImporter {
        &self.inner.importer
    }
}
