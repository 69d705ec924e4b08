//! Import and library listing methods.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ImportError, Result, RomportError};
use crate::importer::{
    match_covers, ImportOptions, ImportReport, ImportResolver, ImportSummary, SequenceOutcome,
};
use crate::store::{GameRecord, RecordStore, SkinRecord};
use crate::Romport;

impl Romport {
    /// Import a batch of files without resolving save errors.
    pub async fn import_files(
        &self,
        paths: Vec<PathBuf>,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        self.inner.importer.import_files(paths, options).await
    }

    /// Import a batch and walk its save errors through `resolver`.
    pub async fn import_and_resolve(
        &self,
        paths: Vec<PathBuf>,
        options: ImportOptions,
        resolver: &dyn ImportResolver,
    ) -> Result<ImportSummary> {
        self.inner
            .importer
            .import_and_resolve(paths, options, resolver)
            .await
    }

    /// Resolve save errors from an earlier report.
    pub async fn resolve_save_errors(
        &self,
        errors: Vec<ImportError>,
        resolver: &dyn ImportResolver,
    ) -> Result<SequenceOutcome<ImportError, Option<String>>> {
        self.inner.importer.resolve_save_errors(errors, resolver).await
    }

    /// All games, in import order.
    pub async fn list_games(&self) -> Result<Vec<GameRecord>> {
        self.with_store(|store| store.list_games()).await
    }

    /// All skins, in import order.
    pub async fn list_skins(&self) -> Result<Vec<SkinRecord>> {
        self.with_store(|store| store.list_skins()).await
    }

    /// Look up covers for every game still waiting for one and wait for the
    /// lookups to settle. Returns the updated records.
    pub async fn match_pending_covers(&self) -> Result<Vec<GameRecord>> {
        let Some(provider) = self.inner.covers.clone() else {
            return Err(RomportError::Config {
                message: "Cover lookups are disabled".to_string(),
            });
        };
        let pending: Vec<GameRecord> = self
            .list_games()
            .await?
            .into_iter()
            .filter(|g| g.pending_cover_lookup)
            .collect();
        Ok(match_covers(self.inner.store.clone(), provider, pending).await)
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn RecordStore>) -> Result<T> + Send + 'static,
    {
        let store = self.inner.store.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| RomportError::Other(format!("Store task failed: {}", e)))?
    }
}
