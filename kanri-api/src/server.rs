//! API server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::SessionResolver;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::routes::create_router;
use crate::state::AppState;

/// Realtime API server.
pub struct ApiServer {
    /// Server configuration
    config: ApiConfig,
    /// Application state
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server with the given session resolver.
    #[must_use]
    pub fn new(config: ApiConfig, resolver: Arc<dyn SessionResolver>) -> Self {
        let state = Arc::new(AppState::new(config.clone(), resolver));
        Self { config, state }
    }

    /// Creates a new API server over existing state.
    #[must_use]
    pub fn with_state(config: ApiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Returns a reference to the application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Runs the server until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or run.
    pub async fn run(self) -> Result<(), ApiError> {
        let (listener, app) = self.bind().await?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {e}")))?;

        Ok(())
    }

    /// Runs the server until the shutdown future resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or run.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ApiError> {
        let (listener, app) = self.bind().await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {e}")))?;

        warn!("realtime server shutting down");

        Ok(())
    }

    async fn bind(self) -> Result<(TcpListener, axum::Router), ApiError> {
        let addr = self.config.bind_address();

        let app = create_router(self.state.clone()).layer(TraceLayer::new_for_http());

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| ApiError::Internal(format!("Invalid bind address: {e}")))?;

        let listener = TcpListener::bind(socket_addr)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to bind to {addr}: {e}")))?;

        info!("realtime server listening on {}", addr);

        Ok((listener, app))
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
    fn test_api_server_new() {
        let server = ApiServer::new(ApiConfig::default(), Arc::new(NoSession));
        assert_eq!(server.state().ws.connection_count(), 0);
    }

    #[test]
    fn test_api_server_with_state() {
        let config = ApiConfig::default();
        let state = Arc::new(AppState::new(config.clone(), Arc::new(NoSession)));
        let server = ApiServer::with_state(config, state.clone());

        assert!(Arc::ptr_eq(server.state(), &state));
    }
}
