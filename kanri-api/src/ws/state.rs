//! WebSocket server state.

use std::fmt;
use std::sync::Arc;

use crate::auth::SessionResolver;

use super::broadcaster::EventBroadcaster;
use super::config::WsConfig;
use super::connection::ConnectionRegistry;

/// Shared state for the websocket endpoint.
///
/// Owns the registry and broadcaster; constructed once by the composition
/// root and injected into the router. Tests build their own with a stub
/// resolver.
pub struct WsState {
    /// Connection registry
    pub registry: Arc<ConnectionRegistry>,
    /// Scoped event broadcaster
    pub broadcaster: EventBroadcaster,
    /// Session resolver for handshake authorization
    pub resolver: Arc<dyn SessionResolver>,
    /// WebSocket configuration
    pub config: WsConfig,
}

impl WsState {
    /// Creates a new websocket state with a fresh registry.
    #[must_use]
    pub fn new(config: WsConfig, resolver: Arc<dyn SessionResolver>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = EventBroadcaster::new(Arc::clone(&registry), config.max_message_size);
        Self {
            registry,
            broadcaster,
            resolver,
            config,
        }
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}

impl fmt::Debug for WsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsState")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use async_trait::async_trait;
    use axum::http::HeaderMap;

    #[derive(Debug)]
    struct NoSession;

    #[async_trait]
    impl SessionResolver for NoSession {
        async fn resolve(&self, _headers: &HeaderMap) -> Option<Principal> {
            None
        }
    }

    #[test]
    fn test_ws_state_new() {
        let state = WsState::new(WsConfig::default(), Arc::new(NoSession));
        assert_eq!(state.connection_count(), 0);
    }
}
