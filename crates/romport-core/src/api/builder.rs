//! Builder for configuring Romport initialization.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::RomportState;
use crate::cover::{CoverArtProvider, LibretroThumbnails};
use crate::error::{Result, RomportError};
use crate::events::EventBus;
use crate::importer::FilesImporter;
use crate::library::LibraryLayout;
use crate::persist::Settings;
use crate::store::{RecordStore, SqliteRecordStore};
use crate::sync::{CloudReconciler, CloudStore, ConflictChoice, ConflictResolver, FixedConflictPolicy};
use crate::Romport;

/// Builder for configuring Romport initialization.
///
/// # Example
///
/// ```rust,ignore
/// use romport::Romport;
///
/// let library = Romport::builder("./library")
///     .auto_create_dirs(true)
///     .with_cover_lookups(false)
///     .build()
///     .await?;
/// ```
pub struct RomportBuilder {
    root: PathBuf,
    auto_create_dirs: bool,
    enable_cover_lookups: bool,
    cover_provider: Option<Arc<dyn CoverArtProvider>>,
    record_store: Option<Arc<dyn RecordStore>>,
    cloud: Option<(Arc<dyn CloudStore>, Arc<dyn ConflictResolver>)>,
}

impl RomportBuilder {
    /// Create a new builder with the library data root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            auto_create_dirs: false,
            enable_cover_lookups: true,
            cover_provider: None,
            record_store: None,
            cloud: None,
        }
    }

    /// Auto-create the root and its `roms/`, `saves/`, `skins/` and
    /// `scratch/` directories.
    ///
    /// Default: `false` (the root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Enable or disable background cover lookups for newly imported games.
    ///
    /// Default: `true`, against the libretro thumbnail server.
    pub fn with_cover_lookups(mut self, enable: bool) -> Self {
        self.enable_cover_lookups = enable;
        self
    }

    /// Use a specific cover art provider instead of the default one.
    pub fn with_cover_provider(mut self, provider: Arc<dyn CoverArtProvider>) -> Self {
        self.cover_provider = Some(provider);
        self.enable_cover_lookups = true;
        self
    }

    /// Use a specific record store instead of `library.db` in the root.
    pub fn with_record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }

    /// Mirror the root to a cloud store, resolving conflicts with `resolver`.
    pub fn with_cloud_store(
        mut self,
        store: Arc<dyn CloudStore>,
        resolver: Arc<dyn ConflictResolver>,
    ) -> Self {
        self.cloud = Some((store, resolver));
        self
    }

    /// Mirror the root to a cloud store, keeping the local side of conflicts.
    pub fn with_cloud_store_keep_local(self, store: Arc<dyn CloudStore>) -> Self {
        self.with_cloud_store(store, Arc::new(FixedConflictPolicy(ConflictChoice::KeepLocal)))
    }

    /// Build the Romport instance.
    ///
    /// Must be called inside a Tokio runtime when a cloud store is
    /// configured, since the sync listener is spawned here.
    pub async fn build(self) -> Result<Romport> {
        if self.auto_create_dirs {
            std::fs::create_dir_all(&self.root)
                .map_err(|e| RomportError::io_with_path(e, &self.root))?;
        } else if !self.root.exists() {
            return Err(RomportError::Config {
                message: format!("Library root does not exist: {}", self.root.display()),
            });
        }

        let layout = LibraryLayout::new(&self.root);
        layout.ensure_dirs()?;

        let settings = Settings::load(&self.root)?;

        let store: Arc<dyn RecordStore> = match self.record_store {
            Some(store) => store,
            None => Arc::new(SqliteRecordStore::open(layout.database_path())?),
        };

        let covers: Option<Arc<dyn CoverArtProvider>> = match self.cover_provider {
            Some(provider) => Some(provider),
            None if self.enable_cover_lookups => match LibretroThumbnails::new() {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!("Failed to initialize cover lookups: {}", e);
                    None
                }
            },
            None => None,
        };

        let events = EventBus::default();

        let mut importer = FilesImporter::new(layout.clone(), store.clone(), events.clone())
            .with_registry(settings.extension_registry())
            .with_max_concurrent(settings.effective_concurrency());
        if let Some(provider) = &covers {
            importer = importer.with_cover_provider(provider.clone());
        }

        let reconciler = self
            .cloud
            .map(|(remote, resolver)| CloudReconciler::new(&self.root, remote, resolver));
        let sync_listener = reconciler.as_ref().map(|reconciler| {
            reconciler.set_enabled(settings.sync_enabled);
            reconciler.listen(&events)
        });

        tracing::info!(
            "Opened library at {} (sync {})",
            self.root.display(),
            if reconciler.is_some() && settings.sync_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(Romport {
            root: self.root,
            inner: Arc::new(RomportState {
                layout,
                store,
                settings: RwLock::new(settings),
                events,
                importer,
                covers,
                reconciler,
                sync_listener,
            }),
        })
    }
}
