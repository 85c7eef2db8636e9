//! HTTP API
//!
//! Conversation control, the live event stream, and read access to the
//! transcript archive.

mod handlers;
mod sse;
mod types;
pub mod wire;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::participants::ParticipantRegistry;
use crate::runtime::SessionManager;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub participants: Arc<ParticipantRegistry>,
    pub db: Database,
    /// Fired on server shutdown; every open event stream ends
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>, participants: Arc<ParticipantRegistry>, db: Database) -> Self {
        Self {
            manager,
            participants,
            db,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Graceful-shutdown future for `axum::serve`.
///
/// Once `signal` fires, stops and archives the live conversation, then closes
/// every event stream so open connections can drain.
pub async fn shutdown_on(signal: impl Future<Output = ()>, state: AppState) {
    signal.await;
    tracing::info!("Shutdown signal received");

    if state.manager.stop().await.is_ok() {
        tracing::info!("Stopped live conversation on shutdown");
    }
    state.shutdown.cancel();
}
