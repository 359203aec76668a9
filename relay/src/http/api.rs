//! Session control endpoints under `/api`.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    app::AppState,
    config::SessionOverrides,
    poll::{StartError, StopError},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session_status))
        .route("/session/start", post(handle_start_session))
        .route("/session/stop", post(handle_stop_session))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for StartError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::AlreadyRunning | Self::Stopping => StatusCode::CONFLICT,
            Self::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Connection(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(status, self)
    }
}

impl IntoResponse for StopError {
    fn into_response(self) -> Response {
        error_response(StatusCode::CONFLICT, self)
    }
}

/// Returns the current session status.
#[axum::debug_handler]
async fn get_session_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.status())
}

/// Starts a session from the config, with optional `{video_id, template}` overrides in the body.
///
/// An empty body starts with the configured defaults.
#[axum::debug_handler]
async fn handle_start_session(State(state): State<AppState>, body: Bytes) -> Response {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        SessionOverrides::default()
    } else {
        match serde_json::from_slice::<SessionOverrides>(&body) {
            Ok(overrides) => overrides,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
        }
    };

    let session = match state.config.session_config(&overrides) {
        Ok(session) => session,
        Err(e) => return StartError::from(e).into_response(),
    };

    match state.controller.start(session).await {
        Ok(status) => {
            info!(video_id = ?status.video_id, "Session started via API");
            Json(status).into_response()
        }
        Err(e) => {
            warn!("Start request rejected: {e}");
            e.into_response()
        }
    }
}

/// Requests the running session to stop. The loop winds down in the background.
#[axum::debug_handler]
async fn handle_stop_session(State(state): State<AppState>) -> Response {
    match state.controller.stop().await {
        Ok(status) => (StatusCode::ACCEPTED, Json(status)).into_response(),
        Err(e) => e.into_response(),
    }
}
