//! HTTP server exposing the chat session to the single-page UI.
//!
//! Provides:
//! - `GET /api/view` for the rendered view model
//! - `POST /api/events` for user actions
//! - the static page as fallback

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Serve the chat page and its event API on `0.0.0.0:{port}`.
///
/// All requests share the one session held by `state`, so the page sees the
/// same conversation list and active conversation on every reload. In-flight
/// requests finish before the server returns once `shutdown_signal` completes.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(
        static_dir = %state.static_dir.display(),
        "Chatdesk listening on http://{}",
        addr
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app: Router = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::config::SessionConfig;
    use crate::llm::responder::scripted::ScriptedResponder;
    use crate::session::ChatSession;
    use crate::storage::{ConversationStore, SqliteConversationStore};

    #[tokio::test]
    async fn test_server_stops_on_shutdown_signal() {
        let store: Arc<dyn ConversationStore> =
            Arc::new(SqliteConversationStore::open_in_memory().await.unwrap());
        let session = ChatSession::new(
            store,
            Arc::new(ScriptedResponder::default()),
            &SessionConfig::default(),
        )
        .unwrap();
        let state = AppState::new(Arc::new(session), "static");

        let result = run_server_with_shutdown(state, 0, async {}).await;
        assert!(result.is_ok());
    }
}
