//! WebSocket connection lifecycle.
//!
//! A connection moves `Connecting -> Open -> Closed`, server-side. There is
//! no reconnecting state here: each physical socket is independent and
//! reconnection is the client's concern.
//!
//! Handshake order matters: the session is resolved before the connection is
//! registered, so a refused connection never appears in the registry.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use kanri_core::protocol::BoardMessage;

use crate::auth::SessionResolver;
use crate::state::AppState;

use super::broadcaster::EventBroadcaster;
use super::connection::{ConnectionId, PeerChannel, Readiness, SocketChannel};

/// Query parameters for the websocket endpoint.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Organization the client claims to act within.
    pub org: String,
}

/// Why a handshake was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No valid session resolved from the request credentials.
    Unauthorized,
    /// The session has no active-organization claim.
    OrganizationRequired,
    /// The claimed organization does not match the session's claim.
    Forbidden,
}

impl Denial {
    /// Human-readable close reason sent to the client.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::OrganizationRequired => "Organization required",
            Self::Forbidden => "Forbidden",
        }
    }
}

/// A principal whose organization claim matched the handshake.
#[derive(Debug, Clone)]
pub struct AuthorizedSession {
    /// Authenticated user id.
    pub user_id: String,
    /// Organization scope the connection is authorized for. Fixed for the
    /// life of the connection; a stale session must reconnect.
    pub org_id: String,
}

/// GET /ws?org=<id> - upgrade, authorize, run the connection.
///
/// Authorization failures upgrade and then immediately close with a
/// policy-violation code so the client sees a specific reason rather than an
/// opaque HTTP error.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match authorize(state.ws.resolver.as_ref(), &headers, &query.org).await {
        Ok(session) => {
            info!(
                user_id = %session.user_id,
                org_id = %session.org_id,
                "websocket handshake authorized"
            );
            ws.on_upgrade(move |socket| handle_socket(socket, session, state))
        }
        Err(denial) => {
            warn!(
                claimed_org = %query.org,
                reason = denial.reason(),
                "websocket handshake refused"
            );
            ws.on_upgrade(move |mut socket| async move {
                let frame = CloseFrame {
                    code: close_code::POLICY,
                    reason: denial.reason().into(),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
            })
        }
    }
}

/// Resolves the caller's session and checks it against the claimed scope.
pub(crate) async fn authorize(
    resolver: &dyn SessionResolver,
    headers: &HeaderMap,
    claimed_org: &str,
) -> Result<AuthorizedSession, Denial> {
    let principal = resolver
        .resolve(headers)
        .await
        .ok_or(Denial::Unauthorized)?;

    match principal.org_id {
        None => Err(Denial::OrganizationRequired),
        Some(org_id) if org_id != claimed_org => Err(Denial::Forbidden),
        Some(org_id) => Ok(AuthorizedSession {
            user_id: principal.user_id,
            org_id,
        }),
    }
}

/// Runs one authorized connection to completion.
async fn handle_socket(socket: WebSocket, session: AuthorizedSession, state: Arc<AppState>) {
    let conn_id = ConnectionId::generate();
    let opened = Instant::now();

    let (tx, mut rx) = mpsc::channel::<Message>(state.ws.config.max_queue_size);
    let channel = Arc::new(SocketChannel::new(tx));

    state
        .ws
        .registry
        .register(&session.org_id, conn_id, channel.clone());
    channel.set_readiness(Readiness::Open);

    info!(
        %conn_id,
        user_id = %session.user_id,
        org_id = %session.org_id,
        "websocket connection open"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer task: drains the peer queue into the socket sink. Everything
    // addressed to this connection goes through the queue.
    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let keep_open = dispatch(
                    &text,
                    conn_id,
                    &session.org_id,
                    channel.as_ref(),
                    &state.ws.broadcaster,
                );
                if !keep_open {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(%conn_id, "binary frame on a text protocol; closing");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Transport-level keepalive; axum answers pings itself.
            }
            Ok(Message::Close(frame)) => {
                debug!(%conn_id, ?frame, "client closed connection");
                break;
            }
            Err(e) => {
                warn!(%conn_id, error = %e, "websocket receive error");
                break;
            }
        }
    }

    channel.set_readiness(Readiness::Closed);
    state.ws.registry.unregister(&session.org_id, conn_id);
    write_task.abort();

    info!(
        %conn_id,
        org_id = %session.org_id,
        connected_ms = opened.elapsed().as_millis() as u64,
        "websocket connection closed"
    );
}

/// Handles one inbound frame while the connection is open.
///
/// Returns false when the connection should close (framing error). The match
/// is exhaustive over the message union, so a new event variant must be
/// handled here before it compiles.
fn dispatch(
    text: &str,
    conn_id: ConnectionId,
    org_id: &str,
    channel: &dyn PeerChannel,
    broadcaster: &EventBroadcaster,
) -> bool {
    let message = match BoardMessage::decode(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(%conn_id, error = %e, "unparseable frame; closing connection");
            return false;
        }
    };

    match &message {
        BoardMessage::Ping => {
            // Heartbeat reply goes to the sender only, never broadcast.
            if channel.readiness().is_open() {
                if let Ok(frame) = BoardMessage::Pong.encode() {
                    channel.send_frame(frame);
                }
            }
        }
        BoardMessage::Pong => {
            // Heartbeat acknowledged; nothing to relay.
        }
        BoardMessage::TaskCreated { .. }
        | BoardMessage::TaskUpdated { .. }
        | BoardMessage::TaskDeleted { .. }
        | BoardMessage::TaskMoved { .. }
        | BoardMessage::ColumnCreated { .. }
        | BoardMessage::ColumnUpdated { .. }
        | BoardMessage::ColumnDeleted { .. }
        | BoardMessage::ColumnsReordered { .. } => {
            // Relay verbatim to every other open peer in the organization.
            // The payload is already schema-shaped; no business validation
            // happens here.
            broadcaster.broadcast(org_id, &message, Some(conn_id));
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::ws::connection::ConnectionRegistry;
    use async_trait::async_trait;
    use kanri_core::protocol::{TaskCreatedData, MAX_FRAME_BYTES};
    use parking_lot::{Mutex, RwLock};

    #[derive(Debug)]
    struct StaticResolver(Option<Principal>);

    #[async_trait]
    impl SessionResolver for StaticResolver {
        async fn resolve(&self, _headers: &HeaderMap) -> Option<Principal> {
            self.0.clone()
        }
    }

    fn principal(org_id: Option<&str>) -> Principal {
        Principal {
            user_id: "u1".to_string(),
            org_id: org_id.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_authorize_no_session() {
        let resolver = StaticResolver(None);
        let result = authorize(&resolver, &HeaderMap::new(), "org-1").await;
        assert_eq!(result.unwrap_err(), Denial::Unauthorized);
    }

    #[tokio::test]
    async fn test_authorize_missing_org_claim() {
        let resolver = StaticResolver(Some(principal(None)));
        let result = authorize(&resolver, &HeaderMap::new(), "org-1").await;
        assert_eq!(result.unwrap_err(), Denial::OrganizationRequired);
    }

    #[tokio::test]
    async fn test_authorize_scope_mismatch() {
        let resolver = StaticResolver(Some(principal(Some("org-2"))));
        let result = authorize(&resolver, &HeaderMap::new(), "org-1").await;
        assert_eq!(result.unwrap_err(), Denial::Forbidden);
    }

    #[tokio::test]
    async fn test_authorize_match() {
        let resolver = StaticResolver(Some(principal(Some("org-1"))));
        let session = authorize(&resolver, &HeaderMap::new(), "org-1")
            .await
            .unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.org_id, "org-1");
    }

    #[test]
    fn test_denial_reasons() {
        assert_eq!(Denial::Unauthorized.reason(), "Unauthorized");
        assert_eq!(Denial::OrganizationRequired.reason(), "Organization required");
        assert_eq!(Denial::Forbidden.reason(), "Forbidden");
    }

    #[derive(Debug)]
    struct RecordingChannel {
        readiness: RwLock<Readiness>,
        frames: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        fn open() -> Arc<Self> {
            Arc::new(Self {
                readiness: RwLock::new(Readiness::Open),
                frames: Mutex::new(Vec::new()),
            })
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

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        broadcaster: EventBroadcaster,
        sender_id: ConnectionId,
        sender: Arc<RecordingChannel>,
        peer: Arc<RecordingChannel>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = EventBroadcaster::new(registry.clone(), MAX_FRAME_BYTES);
        let sender_id = ConnectionId::generate();
        let sender = RecordingChannel::open();
        let peer = RecordingChannel::open();
        registry.register("org-1", sender_id, sender.clone());
        registry.register("org-1", ConnectionId::generate(), peer.clone());
        Fixture {
            registry,
            broadcaster,
            sender_id,
            sender,
            peer,
        }
    }

    #[test]
    fn test_dispatch_ping_answers_sender_only() {
        let f = fixture();

        let keep_open = dispatch(
            r#"{"type":"ping"}"#,
            f.sender_id,
            "org-1",
            f.sender.as_ref(),
            &f.broadcaster,
        );

        assert!(keep_open);
        assert_eq!(f.sender.frames(), vec![r#"{"type":"pong"}"#.to_string()]);
        assert!(f.peer.frames().is_empty());
    }

    #[test]
    fn test_dispatch_pong_is_ignored() {
        let f = fixture();

        let keep_open = dispatch(
            r#"{"type":"pong"}"#,
            f.sender_id,
            "org-1",
            f.sender.as_ref(),
            &f.broadcaster,
        );

        assert!(keep_open);
        assert!(f.sender.frames().is_empty());
        assert!(f.peer.frames().is_empty());
    }

    #[test]
    fn test_dispatch_relays_board_event_to_peers() {
        let f = fixture();
        let frame = BoardMessage::TaskCreated {
            data: TaskCreatedData {
                task_id: "t1".to_string(),
                column_id: "c1".to_string(),
                title: "Fix bug".to_string(),
            },
        }
        .encode()
        .unwrap();

        let keep_open = dispatch(&frame, f.sender_id, "org-1", f.sender.as_ref(), &f.broadcaster);

        assert!(keep_open);
        // The sender gets nothing back; the peer gets exactly one copy.
        assert!(f.sender.frames().is_empty());
        assert_eq!(f.peer.frames().len(), 1);
        assert_eq!(
            BoardMessage::decode(&f.peer.frames()[0]).unwrap().kind(),
            "task:created"
        );
    }

    #[test]
    fn test_dispatch_malformed_frame_closes() {
        let f = fixture();

        let keep_open = dispatch(
            "not a frame",
            f.sender_id,
            "org-1",
            f.sender.as_ref(),
            &f.broadcaster,
        );

        assert!(!keep_open);
        assert!(f.peer.frames().is_empty());
    }

    #[test]
    fn test_dispatch_never_crosses_scopes() {
        let f = fixture();
        let outsider = RecordingChannel::open();
        f.registry
            .register("org-2", ConnectionId::generate(), outsider.clone());

        let frame = BoardMessage::TaskDeleted {
            data: kanri_core::protocol::TaskDeletedData {
                task_id: "t1".to_string(),
            },
        }
        .encode()
        .unwrap();
        dispatch(&frame, f.sender_id, "org-1", f.sender.as_ref(), &f.broadcaster);

        assert_eq!(f.peer.frames().len(), 1);
        assert!(outsider.frames().is_empty());
    }
}
