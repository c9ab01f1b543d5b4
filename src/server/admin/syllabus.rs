use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{
    CreateSubjectRequest, CreateTopicRequest, CreateUnitRequest, SeedResponse,
    UpdateSubjectRequest, UpdateTopicRequest, UpdateUnitRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::user::syllabus::ensure_seeded;
use crate::server::validation::{validate_color, validate_name, validate_topic_levels};
use crate::store::Store;
use crate::types::{NewSubject, NewTopic, NewUnit};

fn require_subject(store: &dyn Store, id: i64) -> Result<(), ApiError> {
    store
        .get_subject(id)
        .api_err("Failed to get subject")?
        .ok_or_else(|| ApiError::bad_request(format!("Unknown subject {id}")))?;
    Ok(())
}

fn require_unit(store: &dyn Store, id: i64) -> Result<(), ApiError> {
    store
        .get_unit(id)
        .api_err("Failed to get unit")?
        .ok_or_else(|| ApiError::bad_request(format!("Unknown unit {id}")))?;
    Ok(())
}

pub async fn seed_syllabus(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let seeded = ensure_seeded(store)?;
    let subject_count = store.count_subjects().api_err("Failed to count subjects")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(SeedResponse {
        seeded,
        subject_count,
    })))
}

// Subjects

pub async fn create_subject(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSubjectRequest>,
) -> impl IntoResponse {
    validate_name(&req.name, "Subject name")?;
    if let Some(color) = &req.color {
        validate_color(color)?;
    }

    let subject = state
        .store
        .create_subject(&NewSubject {
            name: req.name.trim().to_string(),
            color: req.color,
        })
        .api_err("Failed to create subject")?;

    Ok::<_, ApiError>(ApiResponse::created(subject))
}

pub async fn update_subject(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSubjectRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut subject = store
        .get_subject(id)
        .api_err("Failed to get subject")?
        .or_not_found("Subject not found")?;

    if let Some(name) = req.name {
        validate_name(&name, "Subject name")?;
        subject.name = name.trim().to_string();
    }
    if let Some(color) = req.color {
        validate_color(&color)?;
        subject.color = Some(color);
    }

    store
        .update_subject(&subject)
        .api_err("Failed to update subject")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(subject)))
}

/// Deletes the subject with its units, topics and everything recorded
/// against those topics. Refused with 409 while a mock test scores it.
pub async fn delete_subject(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_subject(id)
        .api_err("Failed to delete subject")?;

    if !deleted {
        return Err(ApiError::not_found("Subject not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Units

pub async fn create_unit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUnitRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    validate_name(&req.name, "Unit name")?;
    require_subject(store, req.subject_id)?;

    let order = match req.order {
        Some(order) => order,
        None => {
            store
                .list_units()
                .api_err("Failed to list units")?
                .iter()
                .filter(|u| u.subject_id == req.subject_id)
                .map(|u| u.order)
                .max()
                .unwrap_or(0)
                + 1
        }
    };

    let unit = store
        .create_unit(&NewUnit {
            subject_id: req.subject_id,
            name: req.name.trim().to_string(),
            order,
        })
        .api_err("Failed to create unit")?;

    Ok::<_, ApiError>(ApiResponse::created(unit))
}

pub async fn update_unit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUnitRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut unit = store
        .get_unit(id)
        .api_err("Failed to get unit")?
        .or_not_found("Unit not found")?;

    if let Some(subject_id) = req.subject_id {
        require_subject(store, subject_id)?;
        unit.subject_id = subject_id;
    }
    if let Some(name) = req.name {
        validate_name(&name, "Unit name")?;
        unit.name = name.trim().to_string();
    }
    if let Some(order) = req.order {
        unit.order = order;
    }

    store.update_unit(&unit).api_err("Failed to update unit")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(unit)))
}

pub async fn delete_unit(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_unit(id)
        .api_err("Failed to delete unit")?;

    if !deleted {
        return Err(ApiError::not_found("Unit not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

// Topics

pub async fn create_topic(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTopicRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    validate_name(&req.name, "Topic name")?;
    validate_topic_levels(req.applies_to_class11, req.applies_to_class12)?;
    require_unit(store, req.unit_id)?;

    let order = match req.order {
        Some(order) => order,
        None => {
            store
                .list_unit_topics(req.unit_id)
                .api_err("Failed to list unit topics")?
                .iter()
                .map(|t| t.order)
                .max()
                .unwrap_or(0)
                + 1
        }
    };

    let topic = store
        .create_topic(&NewTopic {
            unit_id: req.unit_id,
            name: req.name.trim().to_string(),
            order,
            is_important: req.is_important,
            weightage: req.weightage,
            applies_to_class11: req.applies_to_class11,
            applies_to_class12: req.applies_to_class12,
        })
        .api_err("Failed to create topic")?;

    Ok::<_, ApiError>(ApiResponse::created(topic))
}

pub async fn update_topic(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTopicRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut topic = store
        .get_topic(id)
        .api_err("Failed to get topic")?
        .or_not_found("Topic not found")?;

    if let Some(unit_id) = req.unit_id {
        require_unit(store, unit_id)?;
        topic.unit_id = unit_id;
    }
    if let Some(name) = req.name {
        validate_name(&name, "Topic name")?;
        topic.name = name.trim().to_string();
    }
    if let Some(order) = req.order {
        topic.order = order;
    }
    if let Some(is_important) = req.is_important {
        topic.is_important = is_important;
    }
    if let Some(weightage) = req.weightage {
        topic.weightage = Some(weightage);
    }
    if let Some(class11) = req.applies_to_class11 {
        topic.applies_to_class11 = class11;
    }
    if let Some(class12) = req.applies_to_class12 {
        topic.applies_to_class12 = class12;
    }
    validate_topic_levels(topic.applies_to_class11, topic.applies_to_class12)?;

    store.update_topic(&topic).api_err("Failed to update topic")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(topic)))
}

pub async fn delete_topic(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_topic(id)
        .api_err("Failed to delete topic")?;

    if !deleted {
        return Err(ApiError::not_found("Topic not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
