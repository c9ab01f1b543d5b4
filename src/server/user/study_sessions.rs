use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::ActingUser;
use crate::server::AppState;
use crate::server::dto::{CreateStudySessionRequest, DateRangeParams, UpdateStudySessionRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_duration, validate_notes};
use crate::store::Store;
use crate::types::{NewStudySession, StudySession};

fn require_subject(store: &dyn Store, subject_id: Option<i64>) -> Result<(), ApiError> {
    if let Some(id) = subject_id {
        store
            .get_subject(id)
            .api_err("Failed to get subject")?
            .ok_or_else(|| ApiError::bad_request(format!("Unknown subject {id}")))?;
    }
    Ok(())
}

fn get_owned_session(
    store: &dyn Store,
    acting: &ActingUser,
    id: i64,
) -> Result<StudySession, ApiError> {
    store
        .get_study_session(id)
        .api_err("Failed to get study session")?
        .filter(|s| s.user_id == acting.id())
        .or_not_found("Study session not found")
}

pub async fn list_study_sessions(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DateRangeParams>,
) -> impl IntoResponse {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(ApiError::bad_request("'from' must not be after 'to'"));
        }
    }

    let sessions = state
        .store
        .list_study_sessions(Some(acting.id()), params.from, params.to)
        .api_err("Failed to list study sessions")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(sessions)))
}

pub async fn create_study_session(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStudySessionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    validate_duration(req.duration_minutes)?;
    validate_notes(req.notes.as_deref())?;
    require_subject(store, req.subject_id)?;

    let session = store
        .create_study_session(&NewStudySession {
            user_id: acting.id().to_string(),
            subject_id: req.subject_id,
            duration_minutes: req.duration_minutes,
            date: req.date,
            notes: req.notes,
        })
        .api_err("Failed to create study session")?;

    Ok::<_, ApiError>(ApiResponse::created(session))
}

pub async fn update_study_session(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStudySessionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut session = get_owned_session(store, &acting, id)?;

    if let Some(minutes) = req.duration_minutes {
        validate_duration(minutes)?;
        session.duration_minutes = minutes;
    }
    if let Some(subject_id) = req.subject_id {
        require_subject(store, subject_id)?;
        session.subject_id = subject_id;
    }
    if let Some(date) = req.date {
        session.date = date;
    }
    if let Some(notes) = req.notes {
        validate_notes(notes.as_deref())?;
        session.notes = notes;
    }

    store
        .update_study_session(&session)
        .api_err("Failed to update study session")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(session)))
}

pub async fn delete_study_session(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let session = get_owned_session(store, &acting, id)?;

    store
        .delete_study_session(session.id)
        .api_err("Failed to delete study session")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
