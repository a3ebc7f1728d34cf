//! Shared application state.

use std::sync::Arc;

use crate::auth::SessionResolver;
use crate::config::ApiConfig;
use crate::ws::WsState;

/// Shared application state passed to all handlers.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration
    pub config: ApiConfig,
    /// WebSocket state (registry, broadcaster, resolver)
    pub ws: WsState,
}

impl AppState {
    /// Creates the application state. This is the composition root for the
    /// connection registry: one registry per state, nothing global.
    #[must_use]
    pub fn new(config: ApiConfig, resolver: Arc<dyn SessionResolver>) -> Self {
        let ws = WsState::new(config.websocket.clone(), resolver);
        Self { config, ws }
    }
}
