use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::auth::ActingUser;
use crate::engine::progress::{
    CompletedSet, ProgressUpdate, apply_update, compute_completion, dashboard_stats,
    syllabus_progress,
};
use crate::engine::syllabus::tree_topic_ids;
use crate::server::AppState;
use crate::server::dto::{ScopeParams, UpdateProgressRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_notes;

use super::syllabus::{ensure_seeded, load_tree, scope_for};

pub async fn list_progress(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let progress = state
        .store
        .list_progress(acting.id())
        .api_err("Failed to list progress")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(progress)))
}

pub async fn update_progress(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(topic_id): Path<i64>,
    Json(req): Json<UpdateProgressRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    validate_notes(req.notes.as_deref())?;

    store
        .get_topic(topic_id)
        .api_err("Failed to get topic")?
        .or_not_found("Topic not found")?;

    let existing = store
        .get_progress(acting.id(), topic_id)
        .api_err("Failed to get progress")?;

    let row = apply_update(
        acting.id(),
        topic_id,
        existing,
        ProgressUpdate {
            status: req.status,
            confidence: req.confidence,
            notes: req.notes,
        },
        state.now(),
    );

    let saved = store.upsert_progress(&row).api_err("Failed to save progress")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(saved)))
}

/// Completion per unit, per subject and overall for the requested scope.
pub async fn get_progress_summary(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    ensure_seeded(store)?;

    let tree = load_tree(store, scope_for(&acting.user, params.scope))?;
    let progress = store
        .list_progress(acting.id())
        .api_err("Failed to list progress")?;
    let completed = CompletedSet::from_progress(&progress);

    Ok::<_, ApiError>(Json(ApiResponse::success(syllabus_progress(
        &tree, &completed,
    ))))
}

pub async fn get_dashboard(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let user_id = acting.id();
    ensure_seeded(store)?;

    let tree = load_tree(store, scope_for(&acting.user, params.scope))?;
    let progress = store
        .list_progress(user_id)
        .api_err("Failed to list progress")?;
    let sessions = store
        .list_study_sessions(Some(user_id), None, None)
        .api_err("Failed to list study sessions")?;
    let revisions = store
        .list_revision_entries(user_id)
        .api_err("Failed to list revisions")?;
    let backlog = store
        .list_backlog_items(user_id)
        .api_err("Failed to list backlog")?;

    let completion = compute_completion(
        tree_topic_ids(&tree),
        &CompletedSet::from_progress(&progress),
    );
    let stats = dashboard_stats(&sessions, &revisions, &backlog, completion, state.today());

    Ok::<_, ApiError>(Json(ApiResponse::success(stats)))
}
