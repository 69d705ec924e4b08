//! State owned by a [`crate::Romport`] instance.

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::cover::CoverArtProvider;
use crate::events::EventBus;
use crate::importer::FilesImporter;
use crate::library::LibraryLayout;
use crate::persist::Settings;
use crate::store::RecordStore;
use crate::sync::CloudReconciler;

/// Everything a library instance owns, shared behind one `Arc`.
pub(crate) struct RomportState {
    pub(crate) layout: LibraryLayout,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) settings: RwLock<Settings>,
    pub(crate) events: EventBus,
    pub(crate) importer: FilesImporter,
    pub(crate) covers: Option<Arc<dyn CoverArtProvider>>,
    pub(crate) reconciler: Option<CloudReconciler>,
    /// Event listener of the reconciler, stopped when the state is dropped.
    pub(crate) sync_listener: Option<JoinHandle<()>>,
}

impl Drop for RomportState {
    fn drop(&mut self) {
        if let Some(handle) = self.sync_listener.take() {
            handle.abort();
        }
    }
}
