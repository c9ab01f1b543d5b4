use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Duration;
use uuid::Uuid;

use crate::auth::{RequireAdmin, issue_token};
use crate::server::AppState;
use crate::server::dto::{
    CreateTokenResponse, CreateUserRequest, CreateUserTokenRequest, PaginationParams,
    TokenResponse, UpdateUserRequest,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::validation::{parse_current_level, validate_email, validate_username};
use crate::store::Store;
use crate::types::{Role, User};

fn get_existing_user(store: &dyn Store, id: &str) -> Result<User, ApiError> {
    store
        .get_user(id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")
}

fn ensure_email_free(store: &dyn Store, email: &str, except_id: Option<&str>) -> Result<(), ApiError> {
    let existing = store
        .get_user_by_email(email)
        .api_err("Failed to check email")?;

    match existing {
        Some(u) if Some(u.id.as_str()) != except_id => {
            Err(ApiError::conflict("A user with this email already exists"))
        }
        _ => Ok(()),
    }
}

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;
    if let Some(username) = &req.username {
        validate_username(username)?;
    }
    let current_level = req.current_level.map(parse_current_level).transpose()?;

    ensure_email_free(store, &email, None)?;

    let now = state.now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        username: req.username,
        role: req.role.unwrap_or(Role::Student),
        current_level,
        created_at: now,
        updated_at: now,
    };

    store.create_user(&user).api_err("Failed to create user")?;
    tracing::info!("Created {} user {}", user.role, user.email);

    Ok::<_, ApiError>(ApiResponse::created(user))
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = state
        .store
        .list_users(cursor, DEFAULT_PAGE_SIZE + 1)
        .api_err("Failed to list users")?;

    let (users, next_cursor, has_more) =
        paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

pub async fn get_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = get_existing_user(state.store.as_ref(), &id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn update_user(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let mut user = get_existing_user(store, &id)?;

    if let Some(email) = req.email {
        let email = email.trim().to_lowercase();
        validate_email(&email)?;
        ensure_email_free(store, &email, Some(&user.id))?;
        user.email = email;
    }
    if let Some(username) = req.username {
        validate_username(&username)?;
        user.username = Some(username);
    }
    if let Some(role) = req.role {
        user.role = role;
        if user.id == admin.user.id && !state.is_admin(&user) {
            return Err(ApiError::bad_request("Cannot remove your own admin access"));
        }
    }
    if let Some(grade) = req.current_level {
        user.current_level = Some(parse_current_level(grade)?);
    }
    user.updated_at = state.now();

    store.update_user(&user).api_err("Failed to update user")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

pub async fn delete_user(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let user = get_existing_user(store, &id)?;

    if user.id == admin.user.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    store.delete_user(&user.id).api_err("Failed to delete user")?;
    tracing::info!("Deleted user {}", user.email);

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_user_tokens(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let user = get_existing_user(store, &id)?;

    let tokens: Vec<TokenResponse> = store
        .list_user_tokens(&user.id)
        .api_err("Failed to list user tokens")?
        .into_iter()
        .map(TokenResponse::from)
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(tokens)))
}

pub async fn create_user_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateUserTokenRequest>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let user = get_existing_user(store, &id)?;

    if req.expires_in_seconds.is_some_and(|s| s < 0) {
        return Err(ApiError::bad_request(
            "expires_in_seconds cannot be negative",
        ));
    }

    let expires_at = req
        .expires_in_seconds
        .map(|s| state.now() + Duration::seconds(s));

    let (raw_token, token) =
        issue_token(store, &user.id, expires_at).api_err("Failed to create token")?;

    Ok::<_, ApiError>(ApiResponse::created(CreateTokenResponse {
        token: raw_token,
        metadata: TokenResponse::from(token),
    }))
}
