//! Realtime client with automatic reconnection and heartbeat.

use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use kanri_core::protocol::{
    BoardMessage, ColumnCreatedData, ColumnDeletedData, ColumnPosition, ColumnUpdatedData,
    ColumnsReorderedData, TaskCreatedData, TaskDeletedData, TaskMovedData, TaskUpdatedData,
};
use kanri_core::NetworkError;

use crate::callback::BoardCallback;
use crate::config::ClientConfig;
use crate::state::{ClientStatus, InternalState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// Why the connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    /// `disconnect()` or a superseding `connect()` asked us to stop.
    Shutdown,
    /// The transport closed or failed.
    Dropped,
}

/// Self-healing realtime client.
///
/// One `BoardClient` maintains one logical connection. A background
/// supervisor task owns the dial / run / backoff cycle, so both the
/// heartbeat timer and the reconnect delay have exactly one owner and are
/// cancelled through the shutdown channel on every exit path.
///
/// # Example
///
/// ```ignore
/// use kanri_client::{BoardClient, ClientConfig};
///
/// let config = ClientConfig::builder()
///     .url("wss://example.com/ws")
///     .org_id("org-1")
///     .build();
///
/// let client = BoardClient::new(config, callback);
/// client.connect();
/// client.notify_task_updated("t1").await;
/// ```
pub struct BoardClient {
    config: ClientConfig,
    state: Arc<RwLock<InternalState>>,
    callback: Arc<dyn BoardCallback>,
    send_slot: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    shutdown_tx: RwLock<Option<mpsc::Sender<()>>>,
}

impl BoardClient {
    /// Creates a new client. No connection is made until [`connect`] is
    /// called.
    ///
    /// [`connect`]: BoardClient::connect
    #[must_use]
    pub fn new(config: ClientConfig, callback: Arc<dyn BoardCallback>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(InternalState::new())),
            callback,
            send_slot: Arc::new(RwLock::new(None)),
            shutdown_tx: RwLock::new(None),
        }
    }

    /// Returns the client's observable status.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        self.state.read().status
    }

    /// Returns whether the client is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns the number of reconnection attempts since the last
    /// successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.state.read().reconnect_attempts
    }

    /// Starts the connection supervisor.
    ///
    /// No-op when already connecting or connected, or when no endpoint or
    /// organization is configured. Any reconnect pending from an earlier
    /// supervisor is cancelled first. Must be called from within a tokio
    /// runtime.
    pub fn connect(&self) {
        if self.config.url.is_empty() || self.config.org_id.is_empty() {
            warn!("realtime client has no endpoint or organization; not connecting");
            return;
        }
        {
            let state = self.state.read();
            if state.status.is_connected() || state.status.is_transitioning() {
                return;
            }
        }

        if let Some(previous) = self.shutdown_tx.write().take() {
            let _ = previous.try_send(());
        }
        self.state.write().enabled = true;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        *self.shutdown_tx.write() = Some(shutdown_tx);

        tokio::spawn(run_supervisor(
            self.config.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.callback),
            Arc::clone(&self.send_slot),
            shutdown_rx,
        ));
    }

    /// Stops the client: disables automatic reconnection, cancels the
    /// heartbeat and any pending reconnect, and closes the transport.
    /// Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.state.write().enabled = false;
        if let Some(shutdown_tx) = self.shutdown_tx.write().take() {
            let _ = shutdown_tx.try_send(());
        }
        *self.send_slot.write() = None;
        debug!("realtime client disconnect requested");
    }

    /// Explicitly reconnects after automatic retries have given up:
    /// resets the attempt counter and starts the supervisor again.
    pub fn reconnect(&self) {
        self.state.write().reset_reconnect_attempts();
        self.connect();
    }

    /// Notifies peers that a task was created.
    pub async fn notify_task_created(
        &self,
        task_id: impl Into<String>,
        column_id: impl Into<String>,
        title: impl Into<String>,
    ) {
        self.send(BoardMessage::TaskCreated {
            data: TaskCreatedData {
                task_id: task_id.into(),
                column_id: column_id.into(),
                title: title.into(),
            },
        })
        .await;
    }

    /// Notifies peers that a task was updated.
    pub async fn notify_task_updated(&self, task_id: impl Into<String>) {
        self.send(BoardMessage::TaskUpdated {
            data: TaskUpdatedData {
                task_id: task_id.into(),
            },
        })
        .await;
    }

    /// Notifies peers that a task was deleted.
    pub async fn notify_task_deleted(&self, task_id: impl Into<String>) {
        self.send(BoardMessage::TaskDeleted {
            data: TaskDeletedData {
                task_id: task_id.into(),
            },
        })
        .await;
    }

    /// Notifies peers that a task moved.
    pub async fn notify_task_moved(
        &self,
        task_id: impl Into<String>,
        column_id: impl Into<String>,
        order: i64,
    ) {
        self.send(BoardMessage::TaskMoved {
            data: TaskMovedData {
                task_id: task_id.into(),
                column_id: column_id.into(),
                order,
            },
        })
        .await;
    }

    /// Notifies peers that a column was created.
    pub async fn notify_column_created(
        &self,
        column_id: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.send(BoardMessage::ColumnCreated {
            data: ColumnCreatedData {
                column_id: column_id.into(),
                name: name.into(),
            },
        })
        .await;
    }

    /// Notifies peers that a column was updated.
    pub async fn notify_column_updated(&self, column_id: impl Into<String>) {
        self.send(BoardMessage::ColumnUpdated {
            data: ColumnUpdatedData {
                column_id: column_id.into(),
            },
        })
        .await;
    }

    /// Notifies peers that a column was deleted.
    pub async fn notify_column_deleted(&self, column_id: impl Into<String>) {
        self.send(BoardMessage::ColumnDeleted {
            data: ColumnDeletedData {
                column_id: column_id.into(),
            },
        })
        .await;
    }

    /// Notifies peers that the board's columns were reordered.
    pub async fn notify_columns_reordered(&self, columns: Vec<ColumnPosition>) {
        self.send(BoardMessage::ColumnsReordered {
            data: ColumnsReorderedData { columns },
        })
        .await;
    }

    /// Sends a message if the transport is currently open, enforcing the
    /// client-side size cap. Violations are reported through the error
    /// callback, never returned.
    async fn send(&self, message: BoardMessage) {
        if !self.state.read().status.is_connected() {
            debug!(kind = message.kind(), "channel not open; notification dropped");
            return;
        }

        let frame = match message.encode_bounded(self.config.max_message_size) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "outbound notification rejected");
                self.callback.on_error(e.into()).await;
                return;
            }
        };

        let sender = self.send_slot.read().clone();
        if let Some(sender) = sender {
            if sender.send(frame).await.is_err() {
                debug!("connection task gone; notification dropped");
            }
        }
    }
}

impl std::fmt::Debug for BoardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardClient")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Owns the dial / run / backoff cycle for one client.
async fn run_supervisor(
    config: ClientConfig,
    state: Arc<RwLock<InternalState>>,
    callback: Arc<dyn BoardCallback>,
    send_slot: Arc<RwLock<Option<mpsc::Sender<String>>>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        state.write().mark_connecting();
        callback.on_status(ClientStatus::Connecting).await;

        match timeout(config.connect_timeout(), connect_async(config.endpoint())).await {
            Ok(Ok((stream, _))) => {
                state.write().mark_connected();
                callback.on_status(ClientStatus::Connected).await;
                info!(org_id = %config.org_id, url = %config.url, "realtime channel connected");

                let (frame_tx, frame_rx) = mpsc::channel::<String>(32);
                *send_slot.write() = Some(frame_tx);

                let reason =
                    run_connection(stream, frame_rx, &mut shutdown_rx, &config, &state, &callback)
                        .await;

                *send_slot.write() = None;
                state.write().mark_disconnected();
                callback.on_status(ClientStatus::Disconnected).await;

                if reason == ExitReason::Shutdown {
                    break;
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "realtime connection failed");
                state.write().mark_error();
                callback
                    .on_error(
                        NetworkError::ConnectionFailed {
                            reason: e.to_string(),
                        }
                        .into(),
                    )
                    .await;
                callback.on_status(ClientStatus::Error).await;
            }
            Err(_) => {
                warn!(
                    timeout_ms = config.connect_timeout_ms,
                    "realtime connection timed out"
                );
                state.write().mark_error();
                callback
                    .on_error(
                        NetworkError::Timeout {
                            timeout_ms: config.connect_timeout_ms,
                        }
                        .into(),
                    )
                    .await;
                callback.on_status(ClientStatus::Error).await;
            }
        }

        let attempt = state.read().reconnect_attempts;
        if !state.read().enabled || !config.should_reconnect(attempt) {
            debug!(attempt, "automatic reconnection stopped");
            break;
        }

        let delay = config.reconnect_delay_with_jitter(attempt);
        state.write().bump_reconnect_attempts();
        callback
            .on_reconnecting(attempt + 1, config.max_reconnect_attempts)
            .await;
        info!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => break,
        }
    }

    if state.read().status != ClientStatus::Disconnected {
        state.write().mark_disconnected();
        callback.on_status(ClientStatus::Disconnected).await;
    }
}

/// Runs one open connection until it drops or a shutdown arrives.
async fn run_connection(
    stream: WsStream,
    mut frame_rx: mpsc::Receiver<String>,
    shutdown_rx: &mut mpsc::Receiver<()>,
    config: &ClientConfig,
    state: &Arc<RwLock<InternalState>>,
    callback: &Arc<dyn BoardCallback>,
) -> ExitReason {
    let (mut sink, mut source) = stream.split();

    let mut heartbeat = interval(config.heartbeat_interval());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; consume it so the heartbeat starts
    // one interval after open.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = sink.send(WsMessage::Close(None)).await;
                return ExitReason::Shutdown;
            }

            Some(frame) = frame_rx.recv() => {
                if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                    warn!(error = %e, "failed to send frame");
                    callback
                        .on_error(NetworkError::WebSocket { reason: e.to_string() }.into())
                        .await;
                }
            }

            _ = heartbeat.tick() => {
                if let Ok(frame) = BoardMessage::Ping.encode() {
                    state.write().record_ping();
                    if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                        warn!(error = %e, "failed to send heartbeat ping");
                    } else {
                        debug!("heartbeat ping sent");
                    }
                }
            }

            next = source.next() => match next {
                Some(Ok(WsMessage::Text(text))) => {
                    handle_frame(&text, config, state, callback, &mut sink).await;
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = sink.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Pong(_))) => {
                    state.write().record_pong();
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(?frame, "server closed realtime channel");
                    return ExitReason::Dropped;
                }
                Some(Ok(_)) => {
                    // Binary and raw frames are not part of this protocol.
                }
                Some(Err(e)) => {
                    warn!(error = %e, "realtime channel error");
                    state.write().mark_error();
                    callback
                        .on_error(NetworkError::WebSocket { reason: e.to_string() }.into())
                        .await;
                    callback.on_status(ClientStatus::Error).await;
                    return ExitReason::Dropped;
                }
                None => {
                    debug!("realtime channel stream ended");
                    return ExitReason::Dropped;
                }
            }
        }
    }
}

/// Dispatches one inbound text frame.
async fn handle_frame(
    text: &str,
    config: &ClientConfig,
    state: &Arc<RwLock<InternalState>>,
    callback: &Arc<dyn BoardCallback>,
    sink: &mut WsSink,
) {
    match BoardMessage::decode(text) {
        Ok(BoardMessage::Pong) => {
            state.write().record_pong();
            debug!("heartbeat pong received");
        }
        Ok(BoardMessage::Ping) => {
            if let Ok(frame) = BoardMessage::Pong.encode() {
                let _ = sink.send(WsMessage::Text(frame)).await;
            }
        }
        Ok(
            event @ (BoardMessage::TaskCreated { .. }
            | BoardMessage::TaskUpdated { .. }
            | BoardMessage::TaskDeleted { .. }
            | BoardMessage::TaskMoved { .. }
            | BoardMessage::ColumnCreated { .. }
            | BoardMessage::ColumnUpdated { .. }
            | BoardMessage::ColumnDeleted { .. }
            | BoardMessage::ColumnsReordered { .. }),
        ) => {
            // Every board-change event means the same thing here: cached
            // board data for this organization is stale. No per-message
            // diffing.
            debug!(kind = event.kind(), "board event received");
            callback.on_invalidate(&config.org_id).await;
        }
        Err(e) => {
            // The server is the trusted end; tolerate frames this client
            // version does not understand.
            debug!(error = %e, "ignoring unrecognized frame");
        }
    }
}
