//! # Kanri Client
//!
//! Self-healing realtime client for the Kanri task board.
//!
//! This crate maintains one logical connection to the server's websocket
//! endpoint across transport drops:
//! - Automatic reconnection with capped, jittered exponential backoff
//! - Application-level heartbeat (`ping`/`pong`)
//! - Typed send helpers for board-change notifications
//! - Coarse cache invalidation on any relevant inbound event
//!
//! The client never surfaces errors by panicking or returning them to the
//! UI; everything flows through the [`BoardCallback`] trait. A dropped
//! channel degrades gracefully - the application keeps working on
//! last-fetched data while the client retries in the background.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
// Precision loss in delay arithmetic is acceptable for backoff timers.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod callback;
pub mod client;
pub mod config;
pub mod state;

pub use callback::BoardCallback;
pub use client::BoardClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use state::ClientStatus;
