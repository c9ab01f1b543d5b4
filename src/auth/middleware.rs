use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenValidationError, ValidatedToken, extract_token_from_header, validate_token};
use crate::server::AppState;
use crate::types::{Token, User};

/// Header an admin sends to operate on a student's data.
pub const ACT_AS_HEADER: &str = "x-act-as";

/// Extractor that requires any valid authentication
pub struct RequireAuth {
    pub token: Token,
    pub user: User,
}

/// Extractor that requires an admin caller (by role or configured email)
pub struct RequireAdmin {
    pub token: Token,
    pub user: User,
}

/// The user whose data a student route operates on.
///
/// Normally the caller. An admin may name another user with `X-Act-As`,
/// in which case `admin` holds the caller.
pub struct ActingUser {
    pub user: User,
    pub admin: Option<User>,
}

impl ActingUser {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotAdmin,
    ImpersonationDenied,
    UnknownActAsUser,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::ImpersonationDenied => (
                StatusCode::FORBIDDEN,
                "Only admins may act on behalf of another user",
            ),
            AuthError::UnknownActAsUser => (StatusCode::NOT_FOUND, "User not found"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                HeaderValue::from_static("Bearer realm=\"studytrack\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ValidatedToken { token, user } = extract_and_validate_token(parts, state)?;
        Ok(RequireAuth { token, user })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ValidatedToken { token, user } = extract_and_validate_token(parts, state)?;

        if !state.is_admin(&user) {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin { token, user })
    }
}

impl FromRequestParts<Arc<AppState>> for ActingUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ValidatedToken { user, .. } = extract_and_validate_token(parts, state)?;

        let act_as = parts
            .headers
            .get(ACT_AS_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(target_id) = act_as else {
            return Ok(ActingUser { user, admin: None });
        };

        if target_id == user.id {
            return Ok(ActingUser { user, admin: None });
        }

        if !state.is_admin(&user) {
            return Err(AuthError::ImpersonationDenied);
        }

        let target = state
            .store
            .get_user(target_id)
            .map_err(|_| AuthError::InternalError)?
            .ok_or(AuthError::UnknownActAsUser)?;

        tracing::debug!("{} acting as {}", user.email, target.email);

        Ok(ActingUser {
            user: target,
            admin: Some(user),
        })
    }
}

fn extract_and_validate_token(
    parts: &Parts,
    state: &Arc<AppState>,
) -> Result<ValidatedToken, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let raw_token = extract_token_from_header(auth_header)
        .map_err(map_validation_error)?
        .ok_or(AuthError::MissingAuth)?;

    validate_token(state, &raw_token).map_err(map_validation_error)
}

fn map_validation_error(e: TokenValidationError) -> AuthError {
    match e {
        TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
        TokenValidationError::InvalidToken => AuthError::InvalidToken,
        TokenValidationError::TokenExpired => AuthError::TokenExpired,
        TokenValidationError::InternalError => AuthError::InternalError,
    }
}
