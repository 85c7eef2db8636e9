//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    BannerResponse, ErrorResponse, HealthResponse, MessageRequest, ParticipantInfo,
    ParticipantsResponse, StartRequest, TranscriptListResponse,
};
use super::AppState;
use crate::db::{Database, DbError, DbResult, Transcript};
use crate::runtime::CommandError;
use crate::state_machine::StatusSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/participants", get(list_participants))
        // Conversation control
        .route("/conversation/start", post(start_conversation))
        .route("/conversation/pause", post(pause_conversation))
        .route("/conversation/resume", post(resume_conversation))
        .route("/conversation/stop", post(stop_conversation))
        .route("/conversation/message", post(add_message))
        .route("/conversation/status", get(conversation_status))
        // SSE streaming
        .route("/conversation/stream", get(stream_conversation))
        // Archive
        .route("/transcripts", get(list_transcripts))
        .route("/transcripts/:id", get(get_transcript))
        .with_state(state)
}

// ============================================================
// Service
// ============================================================

async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Roundtable conversation API",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn list_participants(State(state): State<AppState>) -> Json<ParticipantsResponse> {
    Json(ParticipantsResponse {
        participants: state.participants.all().iter().map(ParticipantInfo::from).collect(),
    })
}

// ============================================================
// Conversation Control
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StatusSnapshot>, AppError> {
    let status = state.manager.start(req.topic, req.participants).await?;
    Ok(Json(status))
}

async fn pause_conversation(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, AppError> {
    Ok(Json(state.manager.pause().await?))
}

async fn resume_conversation(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, AppError> {
    Ok(Json(state.manager.resume().await?))
}

/// Stop, report the final status, and discard the session
async fn stop_conversation(State(state): State<AppState>) -> Result<Json<StatusSnapshot>, AppError> {
    Ok(Json(state.manager.stop_and_clear().await?))
}

async fn add_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<StatusSnapshot>, AppError> {
    Ok(Json(state.manager.add_human_message(&req.content).await?))
}

async fn conversation_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.manager.status().await)
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    sse_stream(state.manager.subscribe(), state.shutdown.clone())
}

// ============================================================
// Transcript Archive
// ============================================================

async fn list_transcripts(
    State(state): State<AppState>,
) -> Result<Json<TranscriptListResponse>, AppError> {
    let transcripts = blocking(&state.db, Database::list_transcripts).await?;
    Ok(Json(TranscriptListResponse { transcripts }))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transcript>, AppError> {
    let transcript = blocking(&state.db, move |db| db.get_transcript(&id)).await?;
    Ok(Json(transcript))
}

/// Run a database call off the async workers
async fn blocking<T, F>(db: &Database, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> DbResult<T> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| AppError::Internal(format!("Database task failed: {e}")))?
        .map_err(AppError::from)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Command(CommandError),
    NotFound(String),
    Internal(String),
}

impl From<CommandError> for AppError {
    fn from(e: CommandError) -> Self {
        AppError::Command(e)
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::TranscriptNotFound(_) => AppError::NotFound(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Command(e) if e.is_conflict() => (StatusCode::CONFLICT, e.to_string()),
            AppError::Command(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
