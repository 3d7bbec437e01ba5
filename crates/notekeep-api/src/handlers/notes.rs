//! Note CRUD handlers
//!
//! Every operation is scoped to the authenticated user. A note owned by
//! someone else is reported exactly like a missing one.

use crate::auth::{AuthenticatedUser, MessageResponse};
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use notekeep_core::{NewNote, Note, NoteChanges};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Note as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            user_id: note.user_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Create note request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    #[schema(example = "Groceries")]
    pub title: String,

    #[serde(default)]
    pub content: String,
}

/// Partial note update; omitted fields are left unchanged
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateNoteRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub title: Option<String>,

    pub content: Option<String>,
}

fn parse_note_id(id: &str) -> Result<i64, AppError> {
    id.parse()
        .map_err(|_| AppError::BadRequest("Invalid note ID".to_string()))
}

/// Create a note
#[utoipa::path(
    post,
    path = "/api/notes",
    tag = "notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(req): ValidatedJson<CreateNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let note = state
        .notes
        .create_note(
            user.user_id,
            NewNote {
                title: req.title,
                content: req.content,
            },
        )
        .await?;

    tracing::debug!(user_id = user.user_id, note_id = note.id, "Note created");
    Ok((StatusCode::CREATED, Json(NoteResponse::from(note))))
}

/// List the caller's notes, newest first
#[utoipa::path(
    get,
    path = "/api/notes",
    tag = "notes",
    responses(
        (status = 200, description = "Notes of the current user", body = [NoteResponse]),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let notes: Vec<NoteResponse> = state
        .notes
        .list_notes(user.user_id)
        .await?
        .into_iter()
        .map(NoteResponse::from)
        .collect();

    Ok(Json(notes))
}

/// Get a single note
#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    tag = "notes",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Note details", body = NoteResponse),
        (status = 400, description = "Invalid note ID", body = crate::error::ApiError),
        (status = 404, description = "Note not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_note_id(&id)?;
    let note = state
        .notes
        .find_note(user.user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Note".to_string()))?;

    Ok(Json(NoteResponse::from(note)))
}

/// Update a note
#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    tag = "notes",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = NoteResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 404, description = "Note not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_note_id(&id)?;
    let changes = NoteChanges {
        title: req.title,
        content: req.content,
    };

    if changes.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let note = state
        .notes
        .update_note(user.user_id, id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Note".to_string()))?;

    Ok(Json(NoteResponse::from(note)))
}

/// Delete a note
#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    tag = "notes",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Note deleted", body = MessageResponse),
        (status = 400, description = "Invalid note ID", body = crate::error::ApiError),
        (status = 404, description = "Note not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_note_id(&id)?;

    if !state.notes.delete_note(user.user_id, id).await? {
        return Err(AppError::NotFound("Note".to_string()));
    }

    tracing::debug!(user_id = user.user_id, note_id = id, "Note deleted");
    Ok(Json(MessageResponse::new("Note deleted successfully")))
}
