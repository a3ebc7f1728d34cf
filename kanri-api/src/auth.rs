//! Session resolution.
//!
//! Authentication is owned by the platform's session service; this module
//! only defines the seam the websocket handshake consumes and the HTTP-backed
//! production implementation of it.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::Deserialize;

/// An authenticated caller as reported by the session service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User id.
    pub user_id: String,
    /// The organization the session is currently acting within, if any.
    pub org_id: Option<String>,
}

/// Resolves request credentials to an authenticated principal.
///
/// Implementations receive the raw request headers and return `None` when no
/// valid session exists. The handshake awaits this before a connection may
/// open; a stalled resolution stalls only that connection.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns the principal for the request, or `None` when unauthenticated.
    async fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Resolver backed by the platform's HTTP session service.
///
/// Forwards the request's `Cookie` header unchanged and deserializes the
/// session body. Any transport or decode failure is treated as
/// unauthenticated - the caller can always reconnect with fresh credentials.
#[derive(Debug, Clone)]
pub struct SessionServiceResolver {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    user_id: String,
    active_organization_id: Option<String>,
}

impl SessionServiceResolver {
    /// Creates a resolver talking to the session service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SessionResolver for SessionServiceResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let cookie = headers.get(header::COOKIE)?.to_str().ok()?;

        let response = self
            .client
            .get(format!("{}/api/auth/session", self.base_url))
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let body: SessionBody = response.json().await.ok()?;
        Some(Principal {
            user_id: body.user_id,
            org_id: body.active_organization_id,
        })
    }
}
