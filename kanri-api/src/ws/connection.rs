//! WebSocket connection bookkeeping.
//!
//! This module provides:
//! - Connection identity and readiness tracking
//! - The narrow channel capability used to reach a peer
//! - The registry mapping organizations to their live connections

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

/// Unique connection identifier, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the inner ID value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Readiness of a peer's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Handshake accepted, not yet open for relay.
    Connecting,
    /// Open for sending and receiving.
    Open,
    /// Close initiated, no longer a broadcast target.
    Closing,
    /// Transport gone. Terminal.
    Closed,
}

impl Readiness {
    /// Returns true if the peer can receive broadcasts.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// A sendable, closable, state-queryable channel to one connected peer.
///
/// The broadcaster and lifecycle handler only ever see this capability, so
/// any transport - the production socket writer or an in-process test
/// double - can stand behind it.
pub trait PeerChannel: Send + Sync + fmt::Debug {
    /// Current readiness of the underlying transport.
    fn readiness(&self) -> Readiness;

    /// Queues a serialized frame for delivery. Fire-and-forget: delivery is
    /// not awaited and a full queue drops the frame for this peer only.
    fn send_frame(&self, frame: String);

    /// Requests the underlying transport be closed.
    fn close(&self);
}

/// Production peer channel: a bounded queue drained by the socket writer
/// task. The lifecycle handler is the only writer of the readiness state.
#[derive(Debug)]
pub struct SocketChannel {
    readiness: RwLock<Readiness>,
    tx: mpsc::Sender<Message>,
}

impl SocketChannel {
    /// Creates a channel in the `Connecting` state.
    #[must_use]
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self {
            readiness: RwLock::new(Readiness::Connecting),
            tx,
        }
    }

    /// Transitions the readiness state.
    pub fn set_readiness(&self, readiness: Readiness) {
        *self.readiness.write() = readiness;
    }
}

impl PeerChannel for SocketChannel {
    fn readiness(&self) -> Readiness {
        *self.readiness.read()
    }

    fn send_frame(&self, frame: String) {
        if self.tx.try_send(Message::Text(frame.into())).is_err() {
            debug!("peer queue full or gone; frame dropped");
        }
    }

    fn close(&self) {
        *self.readiness.write() = Readiness::Closing;
        let _ = self.tx.try_send(Message::Close(None));
    }
}

/// Registry of live connections per organization.
///
/// The registry is constructed by the composition root and injected wherever
/// it is needed; nothing in this crate holds it as a global. It is rebuilt
/// naturally after a restart as clients reconnect.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    scopes: DashMap<String, HashMap<ConnectionId, Arc<dyn PeerChannel>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: DashMap::new(),
        }
    }

    /// Registers a connection under an organization scope.
    ///
    /// Creates the scope entry if absent. Re-registering the same id
    /// replaces the channel handle.
    pub fn register(&self, org_id: &str, id: ConnectionId, channel: Arc<dyn PeerChannel>) {
        self.scopes
            .entry(org_id.to_string())
            .or_default()
            .insert(id, channel);
        debug!(org_id, %id, "connection registered");
    }

    /// Removes a connection from an organization scope.
    ///
    /// No-op when the scope or connection is already absent, so disconnect
    /// handling may run multiple times or out of order with registration.
    /// A scope left empty is pruned immediately.
    pub fn unregister(&self, org_id: &str, id: ConnectionId) {
        if let Some(mut members) = self.scopes.get_mut(org_id) {
            members.remove(&id);
        }
        self.scopes.remove_if(org_id, |_, members| members.is_empty());
        debug!(org_id, %id, "connection unregistered");
    }

    /// Returns a snapshot of the connections in an organization scope.
    ///
    /// Empty when the scope has no members. Callers iterate the snapshot;
    /// the registry is never mutated through it.
    #[must_use]
    pub fn get(&self, org_id: &str) -> Vec<(ConnectionId, Arc<dyn PeerChannel>)> {
        self.scopes
            .get(org_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(id, channel)| (*id, Arc::clone(channel)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of live connections across all scopes.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.scopes.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns the number of organization scopes with at least one
    /// connection.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}
