use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::ActingUser;
use crate::server::AppState;
use crate::server::dto::{CreateBacklogRequest, ListBacklogParams, UpdateBacklogRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_name, validate_notes};
use crate::store::Store;
use crate::types::{BacklogItem, BacklogScope, NewBacklogItem, Priority};

fn build_scope(
    store: &dyn Store,
    topic_id: Option<i64>,
    topic_ids: Option<Vec<i64>>,
) -> Result<BacklogScope, ApiError> {
    let scope = BacklogScope::from_parts(topic_id, topic_ids).map_err(ApiError::bad_request)?;

    for id in scope.topic_ids() {
        store
            .get_topic(id)
            .api_err("Failed to get topic")?
            .ok_or_else(|| ApiError::bad_request(format!("Unknown topic {id}")))?;
    }

    Ok(scope)
}

fn get_owned_item(
    store: &dyn Store,
    acting: &ActingUser,
    id: i64,
) -> Result<BacklogItem, ApiError> {
    store
        .get_backlog_item(id)
        .api_err("Failed to get backlog item")?
        .filter(|i| i.user_id == acting.id())
        .or_not_found("Backlog item not found")
}

pub async fn list_backlog(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListBacklogParams>,
) -> impl IntoResponse {
    let items: Vec<BacklogItem> = state
        .store
        .list_backlog_items(acting.id())
        .api_err("Failed to list backlog")?
        .into_iter()
        .filter(|i| params.completed.is_none_or(|c| i.is_completed == c))
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(items)))
}

pub async fn create_backlog_item(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBacklogRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    validate_name(&req.title, "Title")?;
    validate_notes(req.description.as_deref())?;
    let scope = build_scope(store, req.topic_id, req.topic_ids)?;

    let item = store
        .create_backlog_item(&NewBacklogItem {
            user_id: acting.id().to_string(),
            scope,
            title: req.title.trim().to_string(),
            description: req.description,
            priority: req.priority.unwrap_or(Priority::Medium),
            kind: req.kind,
            deadline: req.deadline,
        })
        .api_err("Failed to create backlog item")?;

    Ok::<_, ApiError>(ApiResponse::created(item))
}

pub async fn update_backlog_item(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBacklogRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut item = get_owned_item(store, &acting, id)?;

    if req.topic_id.is_some() || req.topic_ids.is_some() {
        item.scope = build_scope(store, req.topic_id, req.topic_ids)?;
    }
    if let Some(title) = req.title {
        validate_name(&title, "Title")?;
        item.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        validate_notes(description.as_deref())?;
        item.description = description;
    }
    if let Some(priority) = req.priority {
        item.priority = priority;
    }
    if let Some(kind) = req.kind {
        item.kind = kind;
    }
    if let Some(deadline) = req.deadline {
        item.deadline = deadline;
    }
    if let Some(is_completed) = req.is_completed {
        item.is_completed = is_completed;
    }

    store
        .update_backlog_item(&item)
        .api_err("Failed to update backlog item")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn delete_backlog_item(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let item = get_owned_item(store, &acting, id)?;

    store
        .delete_backlog_item(item.id)
        .api_err("Failed to delete backlog item")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
