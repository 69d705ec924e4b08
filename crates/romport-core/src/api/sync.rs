//! Settings and cloud sync methods.

use crate::error::{Result, RomportError};
use crate::events::LibraryEvent;
use crate::persist::Settings;
use crate::sync::{CloudReconciler, SyncReport};
use crate::Romport;

impl Romport {
    /// Snapshot of the persisted settings.
    pub async fn settings(&self) -> Settings {
        self.inner.settings.read().await.clone()
    }

    /// Turn cloud sync on or off and persist the choice.
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        let mut settings = self.inner.settings.write().await;
        let mut updated = settings.clone();
        updated.sync_enabled = enabled;
        updated.save(&self.root)?;
        *settings = updated;

        if let Some(reconciler) = &self.inner.reconciler {
            reconciler.set_enabled(enabled);
        }
        tracing::info!("Cloud sync {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub fn reconciler(&self) -> Option<&CloudReconciler> {
        self.inner.reconciler.as_ref()
    }

    /// Run a reconciliation pass now, regardless of the sync setting.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        let reconciler = self.reconciler().ok_or_else(|| RomportError::Config {
            message: "No cloud store configured".to_string(),
        })?;
        reconciler.sync_pass().await
    }

    /// A game session ended; its saves may need syncing.
    pub fn notify_session_ended(&self) {
        self.inner.events.publish(LibraryEvent::SessionEnded);
    }

    /// The host came back to the foreground.
    pub fn notify_foreground(&self) {
        self.inner.events.publish(LibraryEvent::Foreground);
    }

    /// Ask the listener for a pass without waiting for it.
    pub fn request_sync(&self) {
        self.inner.events.publish(LibraryEvent::SyncRequested);
    }
}
