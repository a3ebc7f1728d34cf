//! Router construction.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::ws::ws_handler;

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Active websocket connections
    pub connections: usize,
}

/// Creates the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// GET /api/v1/health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.ws.connection_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serializes() {
        let body = HealthResponse {
            status: "ok",
            connections: 3,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains(r#""status":"ok""#));
        assert!(json.contains(r#""connections":3"#));
    }
}
