use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use chrono::{DateTime, NaiveDate, Utc};

use super::admin::admin_router;
use super::user::user_router;
use crate::store::Store;
use crate::types::{Role, User};

pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Lowercased emails that are treated as admins whatever their role.
    pub admin_emails: Vec<String>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, admin_emails: Vec<String>) -> Self {
        Self {
            store,
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_admin(&self, user: &User) -> bool {
        user.role == Role::Admin || self.admin_emails.contains(&user.email.to_lowercase())
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Calendar day used for due/overdue decisions.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::warn!(
            "{} {} {} {}ms",
            method,
            uri.path(),
            status.as_u16(),
            latency.as_millis()
        );
    } else {
        tracing::info!(
            "{} {} {} {}ms",
            method,
            uri.path(),
            status.as_u16(),
            latency.as_millis()
        );
    }

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", user_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::store::SqliteStore;

    fn test_state(admin_emails: Vec<String>) -> (TempDir, Arc<AppState>) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let state = AppState::new(Arc::new(store), admin_emails);
        (temp, Arc::new(state))
    }

    fn user(email: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: "u1".to_string(),
            email: email.to_string(),
            username: None,
            role,
            current_level: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_admin_by_role_or_configured_email() {
        let (_temp, state) = test_state(vec![" Head@School.example ".to_string()]);

        assert!(state.is_admin(&user("x@school.example", Role::Admin)));
        assert!(state.is_admin(&user("HEAD@school.example", Role::Student)));
        assert!(!state.is_admin(&user("x@school.example", Role::Student)));
    }

    #[tokio::test]
    async fn test_health() {
        let (_temp, state) = test_state(Vec::new());
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let (_temp, state) = test_state(Vec::new());
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::get("/api/v1/syllabus")
                    .header("authorization", "Basic Zm9vOmJhcg==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
    }
}
