//! WebSocket server configuration.

use kanri_core::MAX_FRAME_BYTES;
use serde::{Deserialize, Serialize};

/// WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Maximum serialized message size in bytes; larger events are dropped
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Maximum number of queued outbound messages per connection
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_queue_size: default_max_queue_size(),
        }
    }
}

fn default_max_message_size() -> usize {
    MAX_FRAME_BYTES
}

fn default_max_queue_size() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.max_message_size, 100 * 1024);
        assert!(config.max_queue_size > 0);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: WsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_message_size, MAX_FRAME_BYTES);
    }
}
