//! Client-side event callbacks.

use async_trait::async_trait;
use kanri_core::RealtimeError;

use crate::state::ClientStatus;

/// Callback trait wiring the realtime client to the application.
///
/// `on_invalidate` is the integration point with the local data cache: the
/// client makes no attempt to diff individual events, it reports "something
/// on this organization's board changed, refetch". All other methods default
/// to no-ops.
#[async_trait]
pub trait BoardCallback: Send + Sync {
    /// Board data changed for the organization; invalidate cached state and
    /// refetch.
    async fn on_invalidate(&self, org_id: &str);

    /// The client's observable status changed.
    async fn on_status(&self, status: ClientStatus) {
        let _ = status;
    }

    /// An error occurred. Never raised as a panic or return value.
    async fn on_error(&self, error: RealtimeError) {
        let _ = error;
    }

    /// A reconnection attempt is about to be made.
    async fn on_reconnecting(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }
}
