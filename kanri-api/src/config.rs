//! API server configuration.

use serde::{Deserialize, Serialize};

use crate::ws::WsConfig;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the external session service
    #[serde(default = "default_session_service_url")]
    pub session_service_url: String,

    /// WebSocket configuration
    #[serde(default)]
    pub websocket: WsConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_service_url: default_session_service_url(),
            websocket: WsConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Returns the server bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_session_service_url() -> String {
    "http://127.0.0.1:3000".to_string()
}
