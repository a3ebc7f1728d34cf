//! # Kanri Core
//!
//! Shared types for the Kanri realtime channel:
//! - The board event wire protocol (tagged message union, size cap)
//! - The error hierarchy used by the server and client crates
//!
//! This crate has no dependency on any transport or runtime; it defines what
//! travels over the wire and how failures are classified, nothing more.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod protocol;

pub use error::{NetworkError, ProtocolError, RealtimeError, Result};
pub use protocol::{BoardMessage, MAX_FRAME_BYTES};
