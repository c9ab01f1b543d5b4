use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::auth::ActingUser;
use crate::engine::mock_test::{ValidatedTest, equal_split, score_series, validate_test};
use crate::server::AppState;
use crate::server::dto::{MockTestRequest, ScoreSeriesParams, SplitRequest, SplitResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_name, validate_notes};
use crate::store::Store;
use crate::types::{Coverage, MockTest, MockTestWithSubjects};

/// Runs the score rules, then checks every referenced subject and unit.
fn validate_request(store: &dyn Store, req: &mut MockTestRequest) -> Result<ValidatedTest, ApiError> {
    validate_name(&req.title, "Title")?;
    validate_notes(req.notes.as_deref())?;

    let inputs = std::mem::take(&mut req.subjects)
        .into_iter()
        .map(|s| s.into_input())
        .collect::<Result<Vec<_>, _>>()?;

    let validated = validate_test(req.max_score, inputs)?;

    for subject in &validated.subjects {
        store
            .get_subject(subject.subject_id)
            .api_err("Failed to get subject")?
            .ok_or_else(|| {
                ApiError::bad_request(format!("Unknown subject {}", subject.subject_id))
            })?;

        if let Some(Coverage::CustomUnits { unit_ids }) = &subject.coverage {
            for &unit_id in unit_ids {
                let unit = store.get_unit(unit_id).api_err("Failed to get unit")?;
                if unit.is_none_or(|u| u.subject_id != subject.subject_id) {
                    return Err(ApiError::bad_request(format!(
                        "Unit {unit_id} does not belong to subject {}",
                        subject.subject_id
                    )));
                }
            }
        }
    }

    Ok(validated)
}

fn get_owned_test(
    store: &dyn Store,
    acting: &ActingUser,
    id: &str,
) -> Result<MockTestWithSubjects, ApiError> {
    store
        .get_mock_test(id)
        .api_err("Failed to get mock test")?
        .filter(|t| t.test.user_id == acting.id())
        .or_not_found("Mock test not found")
}

pub async fn list_mock_tests(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let tests = state
        .store
        .list_mock_tests(acting.id())
        .api_err("Failed to list mock tests")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(tests)))
}

pub async fn create_mock_test(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<MockTestRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let validated = validate_request(store, &mut req)?;

    let test = MockTest {
        id: Uuid::new_v4().to_string(),
        user_id: acting.id().to_string(),
        title: req.title.trim().to_string(),
        test_date: req.test_date,
        max_score: validated.max_score,
        total_score: validated.total_score,
        notes: req.notes,
        created_at: state.now(),
    };

    let created = store
        .create_mock_test(&test, &validated.subjects)
        .api_err("Failed to create mock test")?;

    Ok::<_, ApiError>(ApiResponse::created(created))
}

pub async fn get_mock_test(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let test = get_owned_test(state.store.as_ref(), &acting, &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(test)))
}

/// Replaces the test and all of its subject rows.
pub async fn update_mock_test(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut req): Json<MockTestRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let existing = get_owned_test(store, &acting, &id)?;
    let validated = validate_request(store, &mut req)?;

    let test = MockTest {
        title: req.title.trim().to_string(),
        test_date: req.test_date,
        max_score: validated.max_score,
        total_score: validated.total_score,
        notes: req.notes,
        ..existing.test
    };

    let updated = store
        .replace_mock_test(&test, &validated.subjects)
        .api_err("Failed to update mock test")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}

pub async fn delete_mock_test(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let test = get_owned_test(store, &acting, &id)?;

    store
        .delete_mock_test(&test.test.id)
        .api_err("Failed to delete mock test")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// Percentage points for charting, optionally for one subject.
pub async fn get_score_series(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScoreSeriesParams>,
) -> impl IntoResponse {
    let tests = state
        .store
        .list_mock_tests(acting.id())
        .api_err("Failed to list mock tests")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(score_series(
        &tests,
        params.subject_id,
    ))))
}

/// Suggests per-subject maxes that add up to the test max.
pub async fn split_max_score(
    _acting: ActingUser,
    Json(req): Json<SplitRequest>,
) -> impl IntoResponse {
    if req.total <= 0 {
        return Err(ApiError::bad_request("Total must be positive"));
    }
    if req.subject_count == 0 {
        return Err(ApiError::bad_request("Subject count must be positive"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(SplitResponse {
        max_scores: equal_split(req.total, req.subject_count),
    })))
}
