//! Import orchestration.
//!
//! A batch of input paths goes through:
//!
//! 1. archive expansion
//! 2. cue/gdi grouping, then m3u grouping
//! 3. classification of what is left
//! 4. one blocking task per item, at most `max_concurrent` at a time
//! 5. a join, then aggregation into an [`ImportReport`]
//!
//! Per-item failures become [`ImportError`]s in the report. Nothing in a
//! batch aborts the other items.

mod game;
mod save;
mod sequencer;
mod skin;

pub use sequencer::{resolve_sequentially, SequenceOutcome};

use crate::archive::expand_archives_async;
use crate::classify::{ExtensionRegistry, FileKind};
use crate::config::{ImportConfig, NetworkConfig};
use crate::cover::{spawn_cover_lookup, CoverArtProvider};
use crate::error::{ImportError, Result, RomportError};
use crate::events::{EventBus, LibraryEvent};
use crate::library::LibraryLayout;
use crate::multifile::{resolve_descriptors, resolve_playlists};
use crate::store::{GameRecord, RecordStore, SkinRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Per-batch switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Background import: archive warnings are only logged and no
    /// resolution prompts run.
    pub silent: bool,
}

/// What a batch produced before any error resolution.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Games imported or restored; multi-file sets come first.
    pub games: Vec<GameRecord>,
    /// Display names of stored saves (game names or bundle file names).
    pub saves: Vec<String>,
    pub skins: Vec<SkinRecord>,
    pub errors: Vec<ImportError>,
    /// Archive scratch space of this batch. Extracted files named by
    /// `errors` stay readable until the report is dropped.
    _scratch: Option<TempDir>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.games.len() + self.saves.len() + self.skins.len()
    }
}

/// Final outcome of an import plus resolution.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub games: Vec<String>,
    pub saves: Vec<String>,
    pub skins: Vec<String>,
    /// Errors left after resolution.
    pub errors: Vec<ImportError>,
    /// All remaining errors rendered once, one per line.
    pub message: Option<String>,
}

/// Decisions the user makes while save errors are resolved.
#[async_trait]
pub trait ImportResolver: Send + Sync {
    /// Pick the game a save belongs to, `None` to skip the save.
    async fn choose_game_for_save(&self, save: &Path, candidates: &[GameRecord])
        -> Option<String>;

    /// Whether existing save data for `target` may be replaced by `save`.
    async fn confirm_save_overwrite(&self, save: &Path, target: &str) -> bool;
}

/// A unit of work for one blocking task.
#[derive(Debug)]
pub(crate) enum ImportItem {
    Game { rom: PathBuf, members: Vec<PathBuf> },
    Save(PathBuf),
    Skin(PathBuf),
}

#[derive(Debug)]
pub(crate) enum ItemOutcome {
    Game { record: GameRecord, created: bool },
    Save(String),
    Skin(SkinRecord),
}

/// Shared state handed to every import task.
#[derive(Clone)]
pub(crate) struct ImportContext {
    pub(crate) layout: LibraryLayout,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) events: EventBus,
    pub(crate) claims: ContentClaims,
}

/// Library directories with an install in flight.
///
/// Shared by every batch of one importer, so at most one task at a time
/// writes into a given `roms/<hash>` or `skins/<hash>` directory.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContentClaims(Arc<Mutex<HashSet<PathBuf>>>);

impl ContentClaims {
    /// Claim `dir` until the returned guard drops. `None` while another
    /// task holds it.
    pub(crate) fn claim(&self, dir: &Path) -> Option<ContentClaim> {
        let mut claimed = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !claimed.insert(dir.to_path_buf()) {
            return None;
        }
        Some(ContentClaim {
            claims: self.0.clone(),
            dir: dir.to_path_buf(),
        })
    }
}

pub(crate) struct ContentClaim {
    claims: Arc<Mutex<HashSet<PathBuf>>>,
    dir: PathBuf,
}

impl Drop for ContentClaim {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.dir);
    }
}

impl ImportContext {
    fn run(&self, item: ImportItem) -> std::result::Result<ItemOutcome, ImportError> {
        match item {
            ImportItem::Game { rom, members } => game::import_game(self, &rom, &members)
                .map(|(record, created)| ItemOutcome::Game { record, created }),
            ImportItem::Save(path) => save::import_save(self, &path).map(ItemOutcome::Save),
            ImportItem::Skin(path) => skin::import_skin(self, &path).map(ItemOutcome::Skin),
        }
    }

    pub(crate) fn stored(&self, path: &Path) {
        self.events
            .publish(LibraryEvent::FileStored(path.to_path_buf()));
    }
}

/// Entry point for importing files into a library.
pub struct FilesImporter {
    ctx: ImportContext,
    registry: ExtensionRegistry,
    covers: Option<Arc<dyn CoverArtProvider>>,
    max_concurrent: usize,
}

impl FilesImporter {
    pub fn new(layout: LibraryLayout, store: Arc<dyn RecordStore>, events: EventBus) -> Self {
        Self {
            ctx: ImportContext {
                layout,
                store,
                events,
                claims: ContentClaims::default(),
            },
            registry: ExtensionRegistry::default(),
            covers: None,
            max_concurrent: ImportConfig::DEFAULT_MAX_CONCURRENT_IMPORTS,
        }
    }

    pub fn with_registry(mut self, registry: ExtensionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cover_provider(mut self, provider: Arc<dyn CoverArtProvider>) -> Self {
        self.covers = Some(provider);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn layout(&self) -> &LibraryLayout {
        &self.ctx.layout
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.ctx.store
    }

    /// Import a batch of files.
    ///
    /// Only infrastructure failures (a panicked task, an unusable scratch
    /// directory) are returned as `Err`; everything per-file lands in
    /// [`ImportReport::errors`]. Archives are expanded into a scratch
    /// directory private to this batch, so batches may run concurrently.
    pub async fn import_files(
        &self,
        paths: Vec<PathBuf>,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        if paths.is_empty() {
            report.errors.push(ImportError::EmptyInput);
            return Ok(report);
        }

        info!("Importing {} path(s)", paths.len());

        let scratch = batch_scratch(&self.ctx.layout)?;
        let scratch_path = scratch.path().to_path_buf();
        report._scratch = Some(scratch);

        let expanded =
            expand_archives_async(paths, scratch_path, self.registry.clone(), options.silent)
                .await?;
        report.errors.extend(expanded.errors);

        let grouped = tokio::task::spawn_blocking(move || {
            resolve_playlists(resolve_descriptors(expanded.paths))
        })
        .await
        .map_err(|e| RomportError::Other(format!("Multi-file resolution task failed: {}", e)))?;
        report.errors.extend(grouped.errors);

        let mut items = Vec::new();
        for group in grouped.groups {
            items.push(ImportItem::Game {
                rom: group.descriptor,
                members: group.members,
            });
        }
        for path in grouped.plain {
            match self.registry.classify_path(&path) {
                FileKind::Game => items.push(ImportItem::Game {
                    rom: path,
                    members: Vec::new(),
                }),
                FileKind::GameSave => items.push(ImportItem::Save(path)),
                FileKind::Skin => items.push(ImportItem::Skin(path)),
                FileKind::Unrecognized => {
                    debug!("Unrecognized input {}", path.display());
                    report.errors.push(ImportError::PermissionDenied { path });
                }
            }
        }

        let mut outcomes = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let ctx = self.ctx.clone();
                async move { (index, tokio::task::spawn_blocking(move || ctx.run(item)).await) }
            })
            .buffer_unordered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut created = Vec::new();
        for (_, joined) in outcomes {
            let outcome = joined
                .map_err(|e| RomportError::Other(format!("Import task failed: {}", e)))?;
            match outcome {
                Ok(ItemOutcome::Game { record, created: is_new }) => {
                    if is_new {
                        created.push(record.clone());
                    }
                    report.games.push(record);
                }
                Ok(ItemOutcome::Save(name)) => report.saves.push(name),
                Ok(ItemOutcome::Skin(skin)) => report.skins.push(skin),
                Err(error) => report.errors.push(error),
            }
        }

        if let Some(provider) = &self.covers {
            for game in created {
                spawn_cover_lookup(self.ctx.store.clone(), provider.clone(), game);
            }
        }

        info!(
            "Import finished: {} game(s), {} save(s), {} skin(s), {} error(s)",
            report.games.len(),
            report.saves.len(),
            report.skins.len(),
            report.errors.len()
        );
        self.ctx.events.publish(LibraryEvent::ImportFinished {
            imported: report.imported_count(),
            errors: report.errors.len(),
        });

        Ok(report)
    }

    /// Walk the interactive save errors of a report through `resolver`, one
    /// at a time in report order.
    ///
    /// With no games in the library there is nothing to choose from, so
    /// unmatched and ambiguous saves stay unhandled and are reported as-is.
    pub async fn resolve_save_errors(
        &self,
        errors: Vec<ImportError>,
        resolver: &dyn ImportResolver,
    ) -> Result<SequenceOutcome<ImportError, Option<String>>> {
        let store = self.ctx.store.clone();
        let has_games = tokio::task::spawn_blocking(move || store.count_games())
            .await
            .map_err(|e| RomportError::Other(format!("Game count task failed: {}", e)))??
            > 0;

        let outcome = resolve_sequentially(
            errors,
            |error| match error {
                ImportError::SaveNoMatchingGame { .. } | ImportError::SaveAmbiguousMatch { .. } => {
                    has_games
                }
                ImportError::SaveAlreadyExists { .. }
                | ImportError::SaveBundleAlreadyExists { .. } => true,
                _ => false,
            },
            |error| self.resolve_one(error, resolver),
        )
        .await;

        Ok(outcome)
    }

    async fn resolve_one(&self, error: ImportError, resolver: &dyn ImportResolver) -> Option<String> {
        match error {
            ImportError::SaveNoMatchingGame { save } => {
                let store = self.ctx.store.clone();
                let candidates = match tokio::task::spawn_blocking(move || store.list_games()).await
                {
                    Ok(Ok(games)) => games,
                    Ok(Err(e)) => {
                        warn!("Failed to list games for {}: {}", save.display(), e);
                        return None;
                    }
                    Err(e) => {
                        warn!("Game listing task failed: {}", e);
                        return None;
                    }
                };
                self.assign_save(save, candidates, resolver).await
            }
            ImportError::SaveAmbiguousMatch { save, candidates } => {
                self.assign_save(save, candidates, resolver).await
            }
            ImportError::SaveAlreadyExists { save, game } => {
                if !resolver.confirm_save_overwrite(&save, &game.name).await {
                    return None;
                }
                self.store_save_blocking(save, game).await
            }
            ImportError::SaveBundleAlreadyExists { bundle } => {
                let target = crate::error::display_name(&bundle);
                if !resolver.confirm_save_overwrite(&bundle, &target).await {
                    return None;
                }
                let ctx = self.ctx.clone();
                match tokio::task::spawn_blocking(move || {
                    save::import_save_bundle(&ctx, &bundle, true)
                })
                .await
                {
                    Ok(Ok(name)) => Some(name),
                    Ok(Err(e)) => {
                        warn!("Failed to overwrite save bundle: {}", e);
                        None
                    }
                    Err(e) => {
                        warn!("Save bundle task failed: {}", e);
                        None
                    }
                }
            }
            other => {
                debug!("No resolution for {}", other);
                None
            }
        }
    }

    async fn assign_save(
        &self,
        save: PathBuf,
        candidates: Vec<GameRecord>,
        resolver: &dyn ImportResolver,
    ) -> Option<String> {
        let chosen = resolver.choose_game_for_save(&save, &candidates).await?;
        let game = candidates.into_iter().find(|g| g.id == chosen)?;

        let save_path = self.ctx.layout.save_path(&game);
        if save_path.exists() && !resolver.confirm_save_overwrite(&save, &game.name).await {
            return None;
        }
        self.store_save_blocking(save, game).await
    }

    async fn store_save_blocking(&self, save: PathBuf, game: GameRecord) -> Option<String> {
        let ctx = self.ctx.clone();
        match tokio::task::spawn_blocking(move || save::store_save(&ctx, &save, &game)).await {
            Ok(Ok(name)) => Some(name),
            Ok(Err(e)) => {
                warn!("Failed to store save: {}", e);
                None
            }
            Err(e) => {
                warn!("Save copy task failed: {}", e);
                None
            }
        }
    }

    /// Import a batch, then resolve its save errors unless it is silent.
    pub async fn import_and_resolve(
        &self,
        paths: Vec<PathBuf>,
        options: ImportOptions,
        resolver: &dyn ImportResolver,
    ) -> Result<ImportSummary> {
        // `report` keeps the batch scratch alive until resolution is done.
        let report = self.import_files(paths, options).await?;

        let mut summary = ImportSummary {
            games: report.games.iter().map(|g| g.name.clone()).collect(),
            saves: report.saves,
            skins: report.skins.iter().map(|s| s.name.clone()).collect(),
            errors: Vec::new(),
            message: None,
        };

        summary.errors = if options.silent {
            report.errors
        } else {
            let outcome = self.resolve_save_errors(report.errors, resolver).await?;
            summary
                .saves
                .extend(outcome.resolved.into_iter().flatten());
            outcome.unhandled
        };

        if !summary.errors.is_empty() {
            let lines: Vec<String> = summary.errors.iter().map(|e| e.to_string()).collect();
            summary.message = Some(lines.join("\n"));
        }

        Ok(summary)
    }
}

/// Copy `files` (source, file name) into `final_dir` through a staging
/// directory next to it.
///
/// On error the staging directory is removed and `final_dir` is untouched.
/// A stale `final_dir` without a record is replaced, so callers must hold the
/// directory's [`ContentClaim`].
pub(crate) fn install_files(final_dir: &Path, files: &[(&Path, String)]) -> std::io::Result<()> {
    let parent = final_dir.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "destination has no parent")
    })?;
    fs::create_dir_all(parent)?;

    let staging = LibraryLayout::staging_dir(parent);
    let staged = (|| -> std::io::Result<()> {
        fs::create_dir_all(&staging)?;
        for (source, name) in files {
            fs::copy(source, staging.join(name))?;
        }
        if final_dir.exists() {
            fs::remove_dir_all(final_dir)?;
        }
        fs::rename(&staging, final_dir)
    })();

    if staged.is_err() {
        let _ = fs::remove_dir_all(&staging);
    }
    staged
}

/// Copy files into an existing record's directory, replacing what is there.
pub(crate) fn restore_files(dir: &Path, files: &[(&Path, String)]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    for (source, name) in files {
        fs::copy(source, dir.join(name))?;
    }
    Ok(())
}

/// Fresh scratch directory for one batch, removed when dropped.
fn batch_scratch(layout: &LibraryLayout) -> Result<TempDir> {
    let scratch = layout.scratch_dir();
    fs::create_dir_all(&scratch).map_err(|e| RomportError::io_with_path(e, &scratch))?;
    tempfile::Builder::new()
        .prefix(ImportConfig::BATCH_SCRATCH_PREFIX)
        .tempdir_in(&scratch)
        .map_err(|e| RomportError::io_with_path(e, &scratch))
}

/// Cover lookups for the given games, awaited. Used when a caller needs the
/// covers settled before continuing.
pub async fn match_covers(
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn CoverArtProvider>,
    games: Vec<GameRecord>,
) -> Vec<GameRecord> {
    let mut matched = Vec::with_capacity(games.len());
    for game in games {
        match crate::cover::match_cover(
            store.clone(),
            provider.clone(),
            game,
            NetworkConfig::COVER_LOOKUP_TIMEOUT,
        )
        .await
        {
            Ok(game) => matched.push(game),
            Err(e) => warn!("Cover lookup failed: {}", e),
        }
    }
    matched
}
