//! Fan-out of board events to connected peers.

use std::sync::Arc;

use kanri_core::protocol::BoardMessage;
use kanri_core::ProtocolError;
use tracing::{debug, error, warn};

use super::connection::{ConnectionId, ConnectionRegistry};

/// Broadcasts one board event to every open peer in an organization scope,
/// optionally excluding the originating connection.
///
/// Delivery is at-most-once and best-effort: peers that are not open are
/// skipped, never queued, and a frame over the size cap is dropped outright.
/// Events are refetch hints, not authoritative state, so nothing is retried.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
    max_frame_bytes: usize,
}

impl EventBroadcaster {
    /// Creates a broadcaster over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, max_frame_bytes: usize) -> Self {
        Self {
            registry,
            max_frame_bytes,
        }
    }

    /// Returns the registry this broadcaster fans out over.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Delivers `message` to every open connection registered under
    /// `org_id`, except `exclude`.
    ///
    /// The message is serialized once. Zero recipients is not an error, and
    /// no error is ever raised to the caller.
    pub fn broadcast(&self, org_id: &str, message: &BoardMessage, exclude: Option<ConnectionId>) {
        let frame = match message.encode_bounded(self.max_frame_bytes) {
            Ok(frame) => frame,
            Err(ProtocolError::FrameTooLarge { size, limit }) => {
                warn!(
                    org_id,
                    kind = message.kind(),
                    size,
                    limit,
                    "dropping oversized board event"
                );
                return;
            }
            Err(e) => {
                error!(org_id, error = %e, "failed to encode board event");
                return;
            }
        };

        let mut delivered = 0usize;
        for (id, channel) in self.registry.get(org_id) {
            if Some(id) == exclude {
                continue;
            }
            if !channel.readiness().is_open() {
                continue;
            }
            channel.send_frame(frame.clone());
            delivered += 1;
        }

        debug!(
            org_id,
            kind = message.kind(),
            delivered,
            "board event broadcast"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::{PeerChannel, Readiness};
    use kanri_core::protocol::{TaskCreatedData, TaskUpdatedData, MAX_FRAME_BYTES};
    use parking_lot::{Mutex, RwLock};

    #[derive(Debug)]
    struct RecordingChannel {
        readiness: RwLock<Readiness>,
        frames: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn with_readiness(readiness: Readiness) -> Arc<Self> {
            Arc::new(Self {
                readiness: RwLock::new(readiness),
                frames: Mutex::new(Vec::new()),
            })
        }

        fn open() -> Arc<Self> {
            Self::with_readiness(Readiness::Open)
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().clone()
        }
    }

    impl PeerChannel for RecordingChannel {
        fn readiness(&self) -> Readiness {
            *self.readiness.read()
        }

        fn send_frame(&self, frame: String) {
            self.frames.lock().push(frame);
        }

        fn close(&self) {
            *self.readiness.write() = Readiness::Closed;
        }
    }

    fn task_created(task_id: &str, title: &str) -> BoardMessage {
        BoardMessage::TaskCreated {
            data: TaskCreatedData {
                task_id: task_id.to_string(),
                column_id: "c1".to_string(),
                title: title.to_string(),
            },
        }
    }

    fn broadcaster() -> (Arc<ConnectionRegistry>, EventBroadcaster) {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = EventBroadcaster::new(registry.clone(), MAX_FRAME_BYTES);
        (registry, broadcaster)
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let (registry, broadcaster) = broadcaster();
        let sender_id = ConnectionId::generate();
        let peer_id = ConnectionId::generate();
        let sender = RecordingChannel::open();
        let peer = RecordingChannel::open();

        registry.register("org-1", sender_id, sender.clone());
        registry.register("org-1", peer_id, peer.clone());

        let message = task_created("t1", "Fix bug");
        broadcaster.broadcast("org-1", &message, Some(sender_id));

        assert!(sender.frames().is_empty());
        let frames = peer.frames();
        assert_eq!(frames.len(), 1);
        // The peer receives the exact serialized payload.
        assert_eq!(
            BoardMessage::decode(&frames[0]).unwrap(),
            task_created("t1", "Fix bug")
        );
    }

    #[test]
    fn test_broadcast_reaches_all_without_exclusion() {
        let (registry, broadcaster) = broadcaster();
        let a = RecordingChannel::open();
        let b = RecordingChannel::open();

        registry.register("org-1", ConnectionId::generate(), a.clone());
        registry.register("org-1", ConnectionId::generate(), b.clone());

        broadcaster.broadcast("org-1", &task_created("t1", "x"), None);

        assert_eq!(a.frames().len(), 1);
        assert_eq!(b.frames().len(), 1);
    }

    #[test]
    fn test_broadcast_skips_non_open_connections() {
        let (registry, broadcaster) = broadcaster();
        let open = RecordingChannel::open();
        let connecting = RecordingChannel::with_readiness(Readiness::Connecting);
        let closing = RecordingChannel::with_readiness(Readiness::Closing);
        let closed = RecordingChannel::with_readiness(Readiness::Closed);

        registry.register("org-1", ConnectionId::generate(), open.clone());
        registry.register("org-1", ConnectionId::generate(), connecting.clone());
        registry.register("org-1", ConnectionId::generate(), closing.clone());
        registry.register("org-1", ConnectionId::generate(), closed.clone());

        broadcaster.broadcast("org-1", &task_created("t1", "x"), None);

        assert_eq!(open.frames().len(), 1);
        assert!(connecting.frames().is_empty());
        assert!(closing.frames().is_empty());
        assert!(closed.frames().is_empty());
    }

    #[test]
    fn test_broadcast_does_not_cross_scopes() {
        let (registry, broadcaster) = broadcaster();
        let org1_peer = RecordingChannel::open();
        let org2_peer = RecordingChannel::open();

        registry.register("org-1", ConnectionId::generate(), org1_peer.clone());
        registry.register("org-2", ConnectionId::generate(), org2_peer.clone());

        broadcaster.broadcast("org-1", &task_created("t1", "x"), None);

        assert_eq!(org1_peer.frames().len(), 1);
        assert!(org2_peer.frames().is_empty());
    }

    #[test]
    fn test_oversized_broadcast_delivers_nothing() {
        let (registry, broadcaster) = broadcaster();
        let peer = RecordingChannel::open();
        registry.register("org-1", ConnectionId::generate(), peer.clone());

        let message = task_created("t1", &"x".repeat(MAX_FRAME_BYTES));
        broadcaster.broadcast("org-1", &message, None);

        assert!(peer.frames().is_empty());
    }

    #[test]
    fn test_broadcast_to_empty_scope_is_silent() {
        let (_registry, broadcaster) = broadcaster();
        broadcaster.broadcast("org-empty", &task_created("t1", "x"), None);
    }

    #[test]
    fn test_broadcast_after_disconnect_reaches_remaining_peer() {
        let (registry, broadcaster) = broadcaster();
        let c1_id = ConnectionId::generate();
        let c2_id = ConnectionId::generate();
        let c1 = RecordingChannel::open();
        let c2 = RecordingChannel::open();

        registry.register("org-1", c1_id, c1.clone());
        registry.register("org-1", c2_id, c2.clone());

        // C1's transport closes.
        c1.close();
        registry.unregister("org-1", c1_id);

        let message = BoardMessage::TaskUpdated {
            data: TaskUpdatedData {
                task_id: "t2".to_string(),
            },
        };
        broadcaster.broadcast("org-1", &message, None);

        assert!(c1.frames().is_empty());
        assert_eq!(c2.frames().len(), 1);
        assert!(registry.get("org-1").iter().all(|(id, _)| *id != c1_id));
    }
}
