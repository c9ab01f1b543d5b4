mod backlog;
mod mock_tests;
mod profile;
mod progress;
mod revisions;
mod study_sessions;
pub(crate) mod syllabus;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

/// Student routes. Every handler operates on the acting user, so an admin
/// can reach them for any student via `X-Act-As`.
pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(profile::get_me))
        // Syllabus and progress
        .route("/syllabus", get(syllabus::get_syllabus))
        .route("/progress", get(progress::list_progress))
        .route("/progress/summary", get(progress::get_progress_summary))
        .route("/progress/{topic_id}", put(progress::update_progress))
        .route("/dashboard", get(progress::get_dashboard))
        // Study sessions
        .route(
            "/study-sessions",
            get(study_sessions::list_study_sessions).post(study_sessions::create_study_session),
        )
        .route(
            "/study-sessions/{id}",
            put(study_sessions::update_study_session).delete(study_sessions::delete_study_session),
        )
        // Revision schedule
        .route(
            "/revisions",
            get(revisions::list_revisions).post(revisions::create_revisions),
        )
        .route("/revisions/reminder", get(revisions::get_reminder))
        .route(
            "/revisions/entries/{id}",
            delete(revisions::delete_revision_entry),
        )
        .route(
            "/revisions/entries/{id}/complete",
            post(revisions::complete_revision_entry),
        )
        .route(
            "/revisions/sessions/{date}",
            delete(revisions::delete_revision_session),
        )
        .route(
            "/revisions/sessions/{date}/complete",
            post(revisions::complete_revision_session),
        )
        // Backlog
        .route(
            "/backlog",
            get(backlog::list_backlog).post(backlog::create_backlog_item),
        )
        .route(
            "/backlog/{id}",
            put(backlog::update_backlog_item).delete(backlog::delete_backlog_item),
        )
        // Mock tests
        .route(
            "/mock-tests",
            get(mock_tests::list_mock_tests).post(mock_tests::create_mock_test),
        )
        .route("/mock-tests/series", get(mock_tests::get_score_series))
        .route("/mock-tests/split", post(mock_tests::split_max_score))
        .route(
            "/mock-tests/{id}",
            get(mock_tests::get_mock_test)
                .put(mock_tests::update_mock_test)
                .delete(mock_tests::delete_mock_test),
        )
}
