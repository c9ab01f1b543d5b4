use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAuth;
use crate::engine::syllabus::{SubjectNode, build_tree};
use crate::server::AppState;
use crate::server::dto::ScopeParams;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::store::{SeedSyllabus, Store};
use crate::types::{SyllabusScope, User};

/// Seeds the canonical syllabus if there are no subjects yet.
/// Returns whether this call seeded.
pub(crate) fn ensure_seeded(store: &dyn Store) -> Result<bool, ApiError> {
    if store.count_subjects().api_err("Failed to count subjects")? > 0 {
        return Ok(false);
    }
    let seed = SeedSyllabus::canonical().api_err("Failed to load syllabus data")?;
    store
        .seed_syllabus_if_empty(&seed)
        .api_err("Failed to seed syllabus")
}

pub(crate) fn load_tree(
    store: &dyn Store,
    scope: SyllabusScope,
) -> Result<Vec<SubjectNode>, ApiError> {
    let subjects = store.list_subjects().api_err("Failed to list subjects")?;
    let units = store.list_units().api_err("Failed to list units")?;
    let topics = store.list_topics().api_err("Failed to list topics")?;
    Ok(build_tree(subjects, units, topics, scope))
}

/// The user's own class when no scope is requested, else the whole syllabus.
pub(crate) fn scope_for(user: &User, requested: Option<SyllabusScope>) -> SyllabusScope {
    requested.unwrap_or_else(|| {
        user.current_level
            .map_or(SyllabusScope::Whole, SyllabusScope::from)
    })
}

pub async fn get_syllabus(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    ensure_seeded(store)?;

    let tree = load_tree(store, params.scope.unwrap_or(SyllabusScope::Whole))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(tree)))
}
