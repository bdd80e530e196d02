//! HTTP route handlers for the chat UI.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::domain::errors::{ChatError, ResponderError, StoreError};
use crate::session::{Notice, SessionEvent, ViewModel};

use super::state::AppState;

/// Create the router with all routes; unknown paths are served from the static directory.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/health", get(health_check))
        .route("/api/view", get(current_view))
        .route("/api/events", post(handle_event))
        .fallback_service(static_files)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatdesk",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Error body returned by the API.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message, suitable for a UI notice.
    pub error: String,
    /// Stable error category.
    pub kind: &'static str,
}

/// Chat error carried to the HTTP layer.
#[derive(Debug)]
pub struct ApiError(ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ChatError::InvalidInput(_) | ChatError::NoActiveConversation => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ChatError::ConversationNotFound(_)
            | ChatError::Store(StoreError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            ChatError::Busy => StatusCode::CONFLICT,
            ChatError::Responder(ResponderError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ChatError::Responder(_) => StatusCode::BAD_GATEWAY,
            ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "Request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

/// Current view without a notice.
async fn current_view(State(state): State<Arc<AppState>>) -> Result<Json<ViewModel>, ApiError> {
    Ok(Json(state.session.view(None).await?))
}

/// Apply one user action and return the updated view.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<SessionEvent>,
) -> Result<Json<ViewModel>, ApiError> {
    let outcome = state.session.dispatch(event).await?;
    let view = state
        .session
        .view(Some(Notice::info(outcome.describe())))
        .await?;
    Ok(Json(view))
}
