use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::ActingUser;
use crate::server::AppState;
use crate::server::dto::MeResponse;
use crate::server::response::{ApiError, ApiResponse};

/// The user this request operates on, which differs from the caller when an
/// admin sends `X-Act-As`.
pub async fn get_me(acting: ActingUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let is_admin = state.is_admin(&acting.user);
    let response = MeResponse {
        user: acting.user,
        is_admin,
        acting_admin_id: acting.admin.map(|a| a.id),
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(response)))
}
