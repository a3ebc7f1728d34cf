//! Error types for the realtime channel.
//!
//! The hierarchy mirrors the two ways this subsystem can fail:
//! - `ProtocolError` - a message could not be encoded, decoded, or violates
//!   the wire-size cap
//! - `NetworkError` - the underlying transport failed
//!
//! `RealtimeError` is the top-level type carried through client callbacks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol-level error: a message that cannot legally travel the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// Message failed to serialize.
    #[error("[Protocol] Serialization failed: {reason}")]
    Serialize {
        /// Reason reported by the serializer.
        reason: String,
    },

    /// Serialized message exceeds the wire-size cap.
    #[error("[Protocol] Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Serialized size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Inbound frame did not parse as a known message.
    #[error("[Protocol] Malformed frame: {reason}")]
    Malformed {
        /// Reason reported by the parser.
        reason: String,
    },
}

/// Network error covering transport failures on either end of the channel.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Connection to the remote endpoint failed.
    #[error("[Network] Connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for the connection failure.
        reason: String,
    },

    /// Connection attempt timed out.
    #[error("[Network] Connection timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// WebSocket-level error.
    #[error("[Network] WebSocket error: {reason}")]
    WebSocket {
        /// Reason for the WebSocket error.
        reason: String,
    },

    /// Connection closed unexpectedly.
    #[error("[Network] Connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for the closure.
        reason: String,
    },
}

impl NetworkError {
    /// Returns true if this error is recoverable by reconnecting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::WebSocket { .. }
                | Self::ConnectionClosed { .. }
        )
    }
}

/// Top-level error type for the realtime channel.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealtimeError {
    /// Protocol-level error.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Network-level error.
    #[error("{0}")]
    Network(#[from] NetworkError),
}

impl RealtimeError {
    /// Returns the error category as a string.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Network(_) => "network",
        }
    }

    /// Returns true if this error is recoverable by reconnecting.
    ///
    /// Protocol errors are never recovered by a reconnect; the same message
    /// would fail the same way.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Protocol(_) => false,
            Self::Network(e) => e.is_recoverable(),
        }
    }

    /// Returns the inner protocol error, if any.
    #[must_use]
    pub const fn as_protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Network(_) => None,
        }
    }

    /// Returns the inner network error, if any.
    #[must_use]
    pub const fn as_network_error(&self) -> Option<&NetworkError> {
        match self {
            Self::Network(e) => Some(e),
            Self::Protocol(_) => None,
        }
    }
}

/// A specialized Result type for realtime-channel operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
