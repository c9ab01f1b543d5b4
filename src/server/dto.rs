use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::mock_test::SubjectScoreInput;
use crate::types::{
    BacklogKind, Confidence, Coverage, NamedScope, Priority, ProgressStatus, Role, SyllabusScope,
    Token, User,
};

use super::response::ApiError;

// Query parameters

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeParams {
    #[serde(default)]
    pub scope: Option<SyllabusScope>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeParams {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListBacklogParams {
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreSeriesParams {
    #[serde(default)]
    pub subject_id: Option<i64>,
}

// Users and tokens

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Numeric class, 11 or 12.
    #[serde(default)]
    pub current_level: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub current_level: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserTokenRequest {
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            id: token.id,
            user_id: token.user_id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub metadata: TokenResponse,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting_admin_id: Option<String>,
}

// Syllabus administration

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUnitRequest {
    pub subject_id: i64,
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUnitRequest {
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub unit_id: i64,
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub weightage: Option<String>,
    #[serde(default = "default_true")]
    pub applies_to_class11: bool,
    #[serde(default = "default_true")]
    pub applies_to_class12: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTopicRequest {
    #[serde(default)]
    pub unit_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_important: Option<bool>,
    #[serde(default)]
    pub weightage: Option<String>,
    #[serde(default)]
    pub applies_to_class11: Option<bool>,
    #[serde(default)]
    pub applies_to_class12: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub seeded: bool,
    pub subject_count: i64,
}

// Progress and study sessions

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProgressRequest {
    #[serde(default)]
    pub status: Option<ProgressStatus>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudySessionRequest {
    #[serde(default)]
    pub subject_id: Option<i64>,
    pub duration_minutes: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An explicit `null` clears `subject_id` or `notes`; a missing field keeps
/// the stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStudySessionRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub subject_id: Option<Option<i64>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub notes: Option<Option<String>>,
}

// Revision schedule

#[derive(Debug, Deserialize)]
pub struct CreateRevisionRequest {
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub topic_ids: Vec<i64>,
    /// Expanded to every topic of each unit.
    #[serde(default)]
    pub unit_ids: Vec<i64>,
}

// Backlog

#[derive(Debug, Deserialize)]
pub struct CreateBacklogRequest {
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub topic_ids: Option<Vec<i64>>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub kind: BacklogKind,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBacklogRequest {
    /// When either scope field is present the scope is replaced as a whole.
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub topic_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub title: Option<String>,
    /// `null` clears the description.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, rename = "type")]
    pub kind: Option<BacklogKind>,
    /// `null` clears the deadline.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

// Mock tests

#[derive(Debug, Deserialize)]
pub struct MockTestSubjectRequest {
    pub subject_id: i64,
    pub score: f64,
    #[serde(default)]
    pub negative_marks: f64,
    #[serde(default)]
    pub max_score: Option<i64>,
    #[serde(default)]
    pub scope: Option<NamedScope>,
    #[serde(default)]
    pub unit_ids: Option<Vec<i64>>,
}

impl MockTestSubjectRequest {
    pub fn into_input(self) -> Result<SubjectScoreInput, ApiError> {
        let coverage = Coverage::from_parts(self.scope, self.unit_ids).map_err(|e| {
            ApiError::bad_request(format!("Subject {}: {e}", self.subject_id))
        })?;
        Ok(SubjectScoreInput {
            subject_id: self.subject_id,
            score: self.score,
            negative_marks: self.negative_marks,
            max_score: self.max_score,
            coverage,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MockTestRequest {
    pub title: String,
    pub test_date: NaiveDate,
    pub max_score: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub subjects: Vec<MockTestSubjectRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    pub total: i64,
    pub subject_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SplitResponse {
    pub max_scores: Vec<i64>,
}
