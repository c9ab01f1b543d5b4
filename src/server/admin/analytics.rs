use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Duration;

use crate::auth::RequireAdmin;
use crate::engine::analytics::{DateRange, StudentInput, analytics_report, syllabus_overview};
use crate::engine::progress::CompletedSet;
use crate::engine::syllabus::tree_topic_ids;
use crate::server::AppState;
use crate::server::dto::{AnalyticsParams, ScopeParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::user::syllabus::{ensure_seeded, load_tree};
use crate::store::Store;
use crate::types::{BacklogItem, RevisionEntry, StudySession, SyllabusScope, User};

/// Default analytics window, ending today.
const DEFAULT_RANGE_DAYS: i64 = 30;

struct StudentData {
    user: User,
    sessions: Vec<StudySession>,
    revisions: Vec<RevisionEntry>,
    backlog: Vec<BacklogItem>,
    completed: CompletedSet,
}

impl StudentData {
    fn load(store: &dyn Store, user: User) -> Result<Self, ApiError> {
        let progress = store
            .list_progress(&user.id)
            .api_err("Failed to list progress")?;
        Ok(Self {
            sessions: store
                .list_study_sessions(Some(&user.id), None, None)
                .api_err("Failed to list study sessions")?,
            revisions: store
                .list_revision_entries(&user.id)
                .api_err("Failed to list revisions")?,
            backlog: store
                .list_backlog_items(&user.id)
                .api_err("Failed to list backlog")?,
            completed: CompletedSet::from_progress(&progress),
            user,
        })
    }

    fn as_input(&self) -> StudentInput<'_> {
        StudentInput {
            user: &self.user,
            sessions: &self.sessions,
            revisions: &self.revisions,
            backlog: &self.backlog,
            completed: &self.completed,
        }
    }
}

/// Every non-admin user, or just `user_id` when given.
fn select_students(state: &AppState, user_id: Option<&str>) -> Result<Vec<User>, ApiError> {
    let store = state.store.as_ref();
    match user_id {
        Some(id) => {
            let user = store
                .get_user(id)
                .api_err("Failed to get user")?
                .or_not_found("User not found")?;
            Ok(vec![user])
        }
        None => Ok(store
            .list_all_users()
            .api_err("Failed to list users")?
            .into_iter()
            .filter(|u| !state.is_admin(u))
            .collect()),
    }
}

pub async fn get_analytics(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let today = state.today();

    let to = params.to.unwrap_or(today);
    let from = params
        .from
        .unwrap_or(to - Duration::days(DEFAULT_RANGE_DAYS - 1));
    let range = DateRange::new(from, to).map_err(ApiError::bad_request)?;

    ensure_seeded(store)?;
    let topic_ids = tree_topic_ids(&load_tree(store, SyllabusScope::Whole)?);

    let students = select_students(&state, params.user_id.as_deref())?
        .into_iter()
        .map(|user| StudentData::load(store, user))
        .collect::<Result<Vec<_>, _>>()?;
    let inputs: Vec<StudentInput<'_>> = students.iter().map(StudentData::as_input).collect();

    let report = analytics_report(range, &topic_ids, &inputs, today);

    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}

/// Per-unit completion for every student plus the cohort figure.
pub async fn get_syllabus_overview(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScopeParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    ensure_seeded(store)?;
    let tree = load_tree(store, params.scope.unwrap_or(SyllabusScope::Whole))?;

    let mut completed_sets = Vec::new();
    for user in select_students(&state, None)? {
        let progress = store
            .list_progress(&user.id)
            .api_err("Failed to list progress")?;
        completed_sets.push((user.id, CompletedSet::from_progress(&progress)));
    }
    let students: Vec<(&str, &CompletedSet)> = completed_sets
        .iter()
        .map(|(id, set)| (id.as_str(), set))
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(syllabus_overview(
        &tree, &students,
    ))))
}
