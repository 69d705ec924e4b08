//! Typed library event bus.
//!
//! Import tasks publish [`LibraryEvent::FileStored`] for every file they put
//! under the data root, and the host publishes lifecycle events
//! (session end, foreground). The cloud reconciler subscribes and reacts.

use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, Receiver};

/// Events buffered per subscriber before it starts lagging.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Something that happened to the library or the host session.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEvent {
    /// A game session ended; its saves may have changed.
    SessionEnded,
    /// The host came back to the foreground.
    Foreground,
    /// A sync pass was explicitly requested.
    SyncRequested,
    /// A file was written under the data root.
    FileStored(PathBuf),
    /// An import batch finished.
    ImportFinished { imported: usize, errors: usize },
}

/// Broadcast channel for [`LibraryEvent`]s.
///
/// Cloning is cheap and every clone publishes to the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LibraryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: LibraryEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receiver for all events published from now on.
    pub fn subscribe(&self) -> Receiver<LibraryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(LibraryEvent::Foreground), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(LibraryEvent::SessionEnded);
        bus.publish(LibraryEvent::FileStored(PathBuf::from("/data/saves/a.sav")));

        assert_eq!(rx.recv().await.unwrap(), LibraryEvent::SessionEnded);
        assert_eq!(
            rx.recv().await.unwrap(),
            LibraryEvent::FileStored(PathBuf::from("/data/saves/a.sav"))
        );
    }

    #[test]
    fn test_clones_share_subscribers() {
        let bus = EventBus::default();
        let _rx = bus.subscribe();
        let clone = bus.clone();
        assert_eq!(clone.publish(LibraryEvent::SyncRequested), 1);
    }
}
