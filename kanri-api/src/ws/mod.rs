//! WebSocket server module.
//!
//! This module provides the realtime side of the task board:
//! - Connection registry scoped by organization
//! - Fan-out broadcaster with a serialized-size cap
//! - Connection lifecycle handling with session-based authorization
//!
//! # Architecture
//!
//! ```text
//! client ──ws──► lifecycle handler ──► registry (org → connections)
//!                      │                    ▲
//!                      ▼                    │
//!                 broadcaster ──────────────┘
//!                      │
//!                      └──► every other open connection in the org
//! ```
//!
//! A connection is authorized for exactly one organization at handshake time
//! and stays in that scope for its whole life; a session whose active
//! organization changes must reconnect.

pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod handler;
pub mod state;

pub use broadcaster::EventBroadcaster;
pub use config::WsConfig;
pub use connection::{ConnectionId, ConnectionRegistry, PeerChannel, Readiness, SocketChannel};
pub use handler::ws_handler;
pub use state::WsState;
