use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;

use crate::auth::ActingUser;
use crate::engine::revision::{RevisionSession, dedup_ids, group_sessions, reminder};
use crate::engine::syllabus::tree_units;
use crate::server::AppState;
use crate::server::dto::CreateRevisionRequest;
use crate::server::response::{
    ApiError, ApiResponse, CountResponse, StoreOptionExt, StoreResultExt,
};
use crate::store::Store;
use crate::types::{RevisionEntry, SyllabusScope};

use super::syllabus::load_tree;

fn load_sessions(state: &AppState, user_id: &str) -> Result<Vec<RevisionSession>, ApiError> {
    let store = state.store.as_ref();
    let entries = store
        .list_revision_entries(user_id)
        .api_err("Failed to list revisions")?;
    let tree = load_tree(store, SyllabusScope::Whole)?;
    Ok(group_sessions(entries, &tree_units(&tree), state.today()))
}

fn get_owned_entry(
    store: &dyn Store,
    acting: &ActingUser,
    id: i64,
) -> Result<RevisionEntry, ApiError> {
    store
        .get_revision_entry(id)
        .api_err("Failed to get revision entry")?
        .filter(|e| e.user_id == acting.id())
        .or_not_found("Revision entry not found")
}

/// Expands unit ids to their topics and checks every id exists.
/// The result keeps first occurrences in request order.
fn resolve_topic_ids(
    store: &dyn Store,
    topic_ids: &[i64],
    unit_ids: &[i64],
) -> Result<Vec<i64>, ApiError> {
    let known: HashSet<i64> = store
        .list_topics()
        .api_err("Failed to list topics")?
        .into_iter()
        .map(|t| t.id)
        .collect();

    if let Some(unknown) = topic_ids.iter().find(|id| !known.contains(*id)) {
        return Err(ApiError::bad_request(format!("Unknown topic {unknown}")));
    }

    let mut ids = topic_ids.to_vec();
    for &unit_id in unit_ids {
        store
            .get_unit(unit_id)
            .api_err("Failed to get unit")?
            .ok_or_else(|| ApiError::bad_request(format!("Unknown unit {unit_id}")))?;
        let topics = store
            .list_unit_topics(unit_id)
            .api_err("Failed to list unit topics")?;
        ids.extend(topics.into_iter().map(|t| t.id));
    }

    Ok(dedup_ids(ids))
}

pub async fn list_revisions(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let sessions = load_sessions(&state, acting.id())?;
    Ok::<_, ApiError>(Json(ApiResponse::success(sessions)))
}

pub async fn get_reminder(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let sessions = load_sessions(&state, acting.id())?;
    Ok::<_, ApiError>(Json(ApiResponse::success(reminder(&sessions))))
}

/// Schedules one revision date for many topics at once.
pub async fn create_revisions(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRevisionRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    if req.topic_ids.is_empty() && req.unit_ids.is_empty() {
        return Err(ApiError::bad_request(
            "Provide at least one topic or unit to revise",
        ));
    }

    let topic_ids = resolve_topic_ids(store, &req.topic_ids, &req.unit_ids)?;
    if topic_ids.is_empty() {
        return Err(ApiError::bad_request("The selected units have no topics"));
    }

    let entries = store
        .create_revision_entries(acting.id(), &topic_ids, req.scheduled_date)
        .api_err("Failed to schedule revision")?;

    tracing::info!(
        "Scheduled {} revision entries for {} on {} ({} already scheduled)",
        entries.len(),
        acting.id(),
        req.scheduled_date,
        topic_ids.len() - entries.len()
    );

    Ok::<_, ApiError>(ApiResponse::created(entries))
}

pub async fn complete_revision_entry(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let entry = get_owned_entry(store, &acting, id)?;

    let entry = store
        .complete_revision_entry(entry.id, state.now())
        .api_err("Failed to complete revision entry")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entry)))
}

pub async fn delete_revision_entry(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let entry = get_owned_entry(store, &acting, id)?;

    store
        .delete_revision_entry(entry.id)
        .api_err("Failed to delete revision entry")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn complete_revision_session(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> impl IntoResponse {
    let count = state
        .store
        .complete_revision_session(acting.id(), date, state.now())
        .api_err("Failed to complete revision session")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(CountResponse { count })))
}

pub async fn delete_revision_session(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> impl IntoResponse {
    let count = state
        .store
        .delete_revision_session(acting.id(), date)
        .api_err("Failed to delete revision session")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(CountResponse { count })))
}
