mod analytics;
mod syllabus;
mod tokens;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // User routes
        .route("/users", post(users::create_user))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/tokens", get(users::list_user_tokens))
        .route("/users/{id}/tokens", post(users::create_user_token))
        // Token routes
        .route("/tokens/{id}", get(tokens::get_token))
        .route("/tokens/{id}", delete(tokens::delete_token))
        // Syllabus routes
        .route("/syllabus/seed", post(syllabus::seed_syllabus))
        .route("/subjects", post(syllabus::create_subject))
        .route("/subjects/{id}", put(syllabus::update_subject))
        .route("/subjects/{id}", delete(syllabus::delete_subject))
        .route("/units", post(syllabus::create_unit))
        .route("/units/{id}", put(syllabus::update_unit))
        .route("/units/{id}", delete(syllabus::delete_unit))
        .route("/topics", post(syllabus::create_topic))
        .route("/topics/{id}", put(syllabus::update_topic))
        .route("/topics/{id}", delete(syllabus::delete_topic))
        // Analytics routes
        .route("/analytics", get(analytics::get_analytics))
        .route("/analytics/syllabus", get(analytics::get_syllabus_overview))
}
