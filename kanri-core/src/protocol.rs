//! Board event wire protocol.
//!
//! Every frame on the realtime channel is a JSON object with a `type`
//! discriminator and, for board-change events, a `data` payload. Payloads
//! carry identifiers and minimal descriptive fields only - never full
//! entities. Receivers treat any board-change message as a hint to refetch
//! authoritative state from the REST API.
//!
//! `ping`/`pong` carry no payload; they are the application-level heartbeat.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Maximum serialized frame size in bytes (100 KiB).
///
/// Enforced identically on the server broadcast path and the client send
/// path. Oversized messages are dropped, never truncated or chunked.
pub const MAX_FRAME_BYTES: usize = 100 * 1024;

/// A message on the realtime channel.
///
/// Adding a variant forces every relay and dispatch site to handle it - the
/// matches there are exhaustive by design of this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardMessage {
    /// A task was created.
    #[serde(rename = "task:created")]
    TaskCreated {
        /// Event payload.
        data: TaskCreatedData,
    },
    /// A task's fields changed.
    #[serde(rename = "task:updated")]
    TaskUpdated {
        /// Event payload.
        data: TaskUpdatedData,
    },
    /// A task was deleted.
    #[serde(rename = "task:deleted")]
    TaskDeleted {
        /// Event payload.
        data: TaskDeletedData,
    },
    /// A task moved to another column or position.
    #[serde(rename = "task:moved")]
    TaskMoved {
        /// Event payload.
        data: TaskMovedData,
    },
    /// A column was created.
    #[serde(rename = "column:created")]
    ColumnCreated {
        /// Event payload.
        data: ColumnCreatedData,
    },
    /// A column's fields changed.
    #[serde(rename = "column:updated")]
    ColumnUpdated {
        /// Event payload.
        data: ColumnUpdatedData,
    },
    /// A column was deleted.
    #[serde(rename = "column:deleted")]
    ColumnDeleted {
        /// Event payload.
        data: ColumnDeletedData,
    },
    /// The board's columns were reordered.
    #[serde(rename = "columns:reordered")]
    ColumnsReordered {
        /// Event payload.
        data: ColumnsReorderedData,
    },
    /// Heartbeat request.
    #[serde(rename = "ping")]
    Ping,
    /// Heartbeat reply.
    #[serde(rename = "pong")]
    Pong,
}

/// Payload of a `task:created` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreatedData {
    /// Created task id.
    pub task_id: String,
    /// Column the task was created in.
    pub column_id: String,
    /// Task title.
    pub title: String,
}

/// Payload of a `task:updated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdatedData {
    /// Updated task id.
    pub task_id: String,
}

/// Payload of a `task:deleted` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeletedData {
    /// Deleted task id.
    pub task_id: String,
}

/// Payload of a `task:moved` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMovedData {
    /// Moved task id.
    pub task_id: String,
    /// Destination column id.
    pub column_id: String,
    /// Position within the destination column.
    pub order: i64,
}

/// Payload of a `column:created` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCreatedData {
    /// Created column id.
    pub column_id: String,
    /// Column name.
    pub name: String,
}

/// Payload of a `column:updated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdatedData {
    /// Updated column id.
    pub column_id: String,
}

/// Payload of a `column:deleted` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDeletedData {
    /// Deleted column id.
    pub column_id: String,
}

/// Payload of a `columns:reordered` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsReorderedData {
    /// New column positions.
    pub columns: Vec<ColumnPosition>,
}

/// One column's position after a reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPosition {
    /// Column id.
    pub id: String,
    /// Position on the board.
    pub order: i64,
}

impl BoardMessage {
    /// Returns the wire tag of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task:created",
            Self::TaskUpdated { .. } => "task:updated",
            Self::TaskDeleted { .. } => "task:deleted",
            Self::TaskMoved { .. } => "task:moved",
            Self::ColumnCreated { .. } => "column:created",
            Self::ColumnUpdated { .. } => "column:updated",
            Self::ColumnDeleted { .. } => "column:deleted",
            Self::ColumnsReordered { .. } => "columns:reordered",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Returns true if this is a heartbeat message (`ping` or `pong`).
    #[must_use]
    pub const fn is_keepalive(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }

    /// Serializes this message to a JSON frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialize {
            reason: e.to_string(),
        })
    }

    /// Serializes this message, rejecting frames larger than `limit` bytes.
    pub fn encode_bounded(&self, limit: usize) -> Result<String, ProtocolError> {
        let frame = self.encode()?;
        if frame.len() > limit {
            return Err(ProtocolError::FrameTooLarge {
                size: frame.len(),
                limit,
            });
        }
        Ok(frame)
    }

    /// Parses a JSON frame into a message.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
            reason: e.to_string(),
        })
    }
}
