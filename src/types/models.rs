use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{BacklogKind, ClassLevel, Confidence, NamedScope, Priority, ProgressStatus, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_level: Option<ClassLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: i64,
    pub subject_id: i64,
    pub name: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub unit_id: i64,
    pub name: String,
    pub order: i64,
    pub is_important: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weightage: Option<String>,
    pub applies_to_class11: bool,
    pub applies_to_class12: bool,
}

impl Topic {
    #[must_use]
    pub fn applies_to(&self, level: ClassLevel) -> bool {
        match level {
            ClassLevel::Class11 => self.applies_to_class11,
            ClassLevel::Class12 => self.applies_to_class12,
        }
    }
}

/// One row per (user, topic); created on the first progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub id: i64,
    pub user_id: String,
    pub topic_id: i64,
    pub status: ProgressStatus,
    pub confidence: Option<Confidence>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_revised_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: i64,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i64>,
    pub duration_minutes: i64,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub id: i64,
    pub user_id: String,
    pub topic_id: i64,
    pub scheduled_date: NaiveDate,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Which part of the syllabus a backlog item is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum BacklogScope {
    /// Unit-wide item with no topic reference.
    Unscoped,
    Topic { topic_id: i64 },
    Topics { topic_ids: Vec<i64> },
}

impl BacklogScope {
    /// Builds the scope from the flat nullable representation.
    pub fn from_parts(topic_id: Option<i64>, topic_ids: Option<Vec<i64>>) -> Result<Self, String> {
        match (topic_id, topic_ids) {
            (Some(_), Some(ids)) if !ids.is_empty() => {
                Err("Specify either topic_id or topic_ids, not both".to_string())
            }
            (Some(topic_id), _) => Ok(BacklogScope::Topic { topic_id }),
            (None, Some(ids)) if !ids.is_empty() => Ok(BacklogScope::Topics { topic_ids: ids }),
            (None, _) => Ok(BacklogScope::Unscoped),
        }
    }

    /// Splits the scope back into the flat nullable representation.
    #[must_use]
    pub fn to_parts(&self) -> (Option<i64>, Option<&[i64]>) {
        match self {
            BacklogScope::Unscoped => (None, None),
            BacklogScope::Topic { topic_id } => (Some(*topic_id), None),
            BacklogScope::Topics { topic_ids } => (None, Some(topic_ids)),
        }
    }

    #[must_use]
    pub fn topic_ids(&self) -> Vec<i64> {
        match self {
            BacklogScope::Unscoped => Vec::new(),
            BacklogScope::Topic { topic_id } => vec![*topic_id],
            BacklogScope::Topics { topic_ids } => topic_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogItem {
    pub id: i64,
    pub user_id: String,
    #[serde(flatten)]
    pub scope: BacklogScope,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: BacklogKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Declared syllabus coverage of one mock-test subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "coverage", rename_all = "snake_case")]
pub enum Coverage {
    Preset { scope: NamedScope },
    CustomUnits { unit_ids: Vec<i64> },
}

impl Coverage {
    /// Builds coverage from the flat nullable representation. A preset and a
    /// custom unit list are mutually exclusive.
    pub fn from_parts(
        scope: Option<NamedScope>,
        unit_ids: Option<Vec<i64>>,
    ) -> Result<Option<Self>, String> {
        let unit_ids = unit_ids.filter(|ids| !ids.is_empty());
        match (scope, unit_ids) {
            (Some(_), Some(_)) => {
                Err("Specify either a named scope or a custom unit list, not both".to_string())
            }
            (Some(scope), None) => Ok(Some(Coverage::Preset { scope })),
            (None, Some(unit_ids)) => Ok(Some(Coverage::CustomUnits { unit_ids })),
            (None, None) => Ok(None),
        }
    }

    #[must_use]
    pub fn to_parts(coverage: Option<&Coverage>) -> (Option<NamedScope>, Option<&[i64]>) {
        match coverage {
            Some(Coverage::Preset { scope }) => (Some(*scope), None),
            Some(Coverage::CustomUnits { unit_ids }) => (None, Some(unit_ids)),
            None => (None, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTest {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub test_date: NaiveDate,
    pub max_score: i64,
    pub total_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTestSubject {
    pub id: i64,
    pub mock_test_id: String,
    pub subject_id: i64,
    pub score: f64,
    pub negative_marks: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i64>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
}

impl MockTestSubject {
    #[must_use]
    pub fn net_score(&self) -> f64 {
        self.score - self.negative_marks
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTestWithSubjects {
    #[serde(flatten)]
    pub test: MockTest,
    pub subjects: Vec<MockTestSubject>,
}

// Rows whose integer id is assigned by the database on insert.

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUnit {
    pub subject_id: i64,
    pub name: String,
    pub order: i64,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub unit_id: i64,
    pub name: String,
    pub order: i64,
    pub is_important: bool,
    pub weightage: Option<String>,
    pub applies_to_class11: bool,
    pub applies_to_class12: bool,
}

#[derive(Debug, Clone)]
pub struct NewStudySession {
    pub user_id: String,
    pub subject_id: Option<i64>,
    pub duration_minutes: i64,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBacklogItem {
    pub user_id: String,
    pub scope: BacklogScope,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub kind: BacklogKind,
    pub deadline: Option<DateTime<Utc>>,
}
