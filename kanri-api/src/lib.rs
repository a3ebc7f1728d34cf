//! # Kanri API
//!
//! Realtime websocket server for the Kanri task board.
//!
//! This crate provides:
//! - The `/ws` endpoint relaying board-change events between clients of the
//!   same organization
//! - Connection registry and scoped fan-out broadcaster
//! - Session resolution against the platform's external auth service
//! - A health endpoint reporting active connection counts
//!
//! # Architecture
//!
//! Each accepted connection is authorized for exactly one organization and
//! registered in an in-process registry keyed by organization id. A client
//! that completes a CRUD mutation sends a typed notification over its socket;
//! the lifecycle handler relays it through the broadcaster to every other
//! open connection in the same organization. Messages are refetch hints, not
//! an event log - delivery is best-effort and nothing is replayed after a
//! disconnect.
//!
//! # Authentication
//!
//! The websocket handshake carries the claimed organization as the `org`
//! query parameter and the caller's session cookie in the request headers.
//! Session resolution is delegated to the external auth service through the
//! [`auth::SessionResolver`] seam; connections that fail it are closed with
//! a policy-violation close code before they are ever registered.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::ApiServer;
pub use state::AppState;
pub use ws::{ConnectionRegistry, EventBroadcaster, WsConfig, WsState};
