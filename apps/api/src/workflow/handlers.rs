//! Axum route handlers for the Workflow API.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    Extension,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::SessionClaims;
use crate::errors::AppError;
use crate::models::{ProfileUpdate, TargetRole};
use crate::state::AppState;
use crate::upload::{extract_text, UploadError};
use crate::workflow::session::{ResultSlot, SessionSnapshot};
use crate::workflow::store::SessionHandle;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<&'static str>,
    pub default_role: &'static str,
    pub custom_role: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub copied: bool,
}

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Sessions owned by someone else are reported as missing.
fn find_session(
    state: &AppState,
    claims: &SessionClaims,
    id: Uuid,
) -> Result<SessionHandle, AppError> {
    let owner = claims.owner().unwrap_or_default();
    state
        .sessions
        .get(id)
        .filter(|session| session.lock().belongs_to(owner))
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

fn snapshot(session: &SessionHandle) -> Json<SessionSnapshot> {
    Json(session.lock().snapshot())
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("resume.txt").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(UploadError::MissingFile.into())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/roles
pub async fn handle_list_roles() -> Json<RolesResponse> {
    Json(RolesResponse {
        roles: TargetRole::ALL.iter().map(|r| r.label()).collect(),
        default_role: TargetRole::default().label(),
        custom_role: TargetRole::Other.label(),
    })
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions.create(claims.owner().unwrap_or_default());
    (StatusCode::CREATED, snapshot(&session))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    Ok(snapshot(&session))
}

/// DELETE /api/v1/sessions/:id
///
/// Cancels anything still in flight for the session.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    find_session(&state, &claims, id)?;
    state.sessions.remove(id);
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/sessions/:id/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    session.lock().update_profile(update)?;
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/resume-file
///
/// Multipart upload with a single `file` field (.txt or .pdf).
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    let upload = read_file_field(&mut multipart).await?;
    let max_bytes = state.config.max_upload_bytes;

    let UploadedFile {
        file_name,
        content_type,
        bytes,
    } = upload;
    let extracted = tokio::task::spawn_blocking(move || {
        extract_text(&file_name, content_type.as_deref(), &bytes, max_bytes)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Document extraction task failed: {e}")))?;

    let document = match extracted {
        Ok(document) => document,
        Err(e) => {
            warn!("Session {id}: upload rejected: {e}");
            session.lock().record_error(e.to_string());
            return Err(e.into());
        }
    };

    info!(
        "Session {id}: read {} characters from '{}'",
        document.text.chars().count(),
        document.file_name
    );
    session
        .lock()
        .set_resume_file(document.file_name, document.text)?;
    Ok(snapshot(&session))
}

/// DELETE /api/v1/sessions/:id/resume-file
pub async fn handle_remove_resume(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    session.lock().remove_resume_file()?;
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/generate
///
/// Full pipeline: validate → skills extraction → resume synthesis.
/// On failure the session is back in `form` with its error message set.
pub async fn handle_generate(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    state.workflow.submit(&session).await?;
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/cover-letter
pub async fn handle_cover_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    state.workflow.generate_cover_letter(&session).await?;
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/interview-questions
pub async fn handle_interview_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    state.workflow.generate_interview_questions(&session).await?;
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/back
pub async fn handle_back_to_form(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    session.lock().return_to_form()?;
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    session.lock().reset();
    info!("Session {id} reset");
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/overlay/dismiss
pub async fn handle_dismiss_overlay(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find_session(&state, &claims, id)?;
    session.lock().dismiss_overlay();
    Ok(snapshot(&session))
}

/// POST /api/v1/sessions/:id/copy/:slot
pub async fn handle_copy(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path((id, slot)): Path<(Uuid, ResultSlot)>,
) -> Result<Json<CopyResponse>, AppError> {
    let session = find_session(&state, &claims, id)?;
    let copied = session.lock().copy_slot(slot);
    Ok(Json(CopyResponse { copied }))
}

/// GET /api/v1/sessions/:id/clipboard
pub async fn handle_get_clipboard(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, &claims, id)?;
    let text = session
        .lock()
        .clipboard_text()
        .ok_or_else(|| AppError::NotFound("Clipboard is empty".to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}
