mod schema;
pub mod seed;
mod sqlite;

pub use seed::SeedSyllabus;
pub use sqlite::SqliteStore;

use chrono::{DateTime, NaiveDate, Utc};

use crate::engine::mock_test::SubjectScoreInput;
use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Multi-row writes (seeding, batch revision inserts, session completion,
/// mock-test subject replacement) are applied atomically.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn list_all_users(&self) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;
    fn has_admin_user(&self) -> Result<bool>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_id(&self, id: &str) -> Result<Option<Token>>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Syllabus tree
    fn count_subjects(&self) -> Result<i64>;
    /// Inserts `seed` only if there are no subjects. Returns whether it did.
    fn seed_syllabus_if_empty(&self, seed: &SeedSyllabus) -> Result<bool>;
    fn create_subject(&self, subject: &NewSubject) -> Result<Subject>;
    fn get_subject(&self, id: i64) -> Result<Option<Subject>>;
    fn list_subjects(&self) -> Result<Vec<Subject>>;
    fn update_subject(&self, subject: &Subject) -> Result<()>;
    /// Fails with `Conflict` while a mock test scores the subject.
    fn delete_subject(&self, id: i64) -> Result<bool>;
    fn create_unit(&self, unit: &NewUnit) -> Result<Unit>;
    fn get_unit(&self, id: i64) -> Result<Option<Unit>>;
    fn list_units(&self) -> Result<Vec<Unit>>;
    fn update_unit(&self, unit: &Unit) -> Result<()>;
    fn delete_unit(&self, id: i64) -> Result<bool>;
    fn create_topic(&self, topic: &NewTopic) -> Result<Topic>;
    fn get_topic(&self, id: i64) -> Result<Option<Topic>>;
    fn list_topics(&self) -> Result<Vec<Topic>>;
    fn list_unit_topics(&self, unit_id: i64) -> Result<Vec<Topic>>;
    fn update_topic(&self, topic: &Topic) -> Result<()>;
    fn delete_topic(&self, id: i64) -> Result<bool>;

    // Topic progress (unique per user and topic)
    fn get_progress(&self, user_id: &str, topic_id: i64) -> Result<Option<TopicProgress>>;
    fn list_progress(&self, user_id: &str) -> Result<Vec<TopicProgress>>;
    fn upsert_progress(&self, progress: &TopicProgress) -> Result<TopicProgress>;

    // Study sessions
    fn create_study_session(&self, session: &NewStudySession) -> Result<StudySession>;
    fn get_study_session(&self, id: i64) -> Result<Option<StudySession>>;
    fn list_study_sessions(
        &self,
        user_id: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<StudySession>>;
    fn update_study_session(&self, session: &StudySession) -> Result<()>;
    fn delete_study_session(&self, id: i64) -> Result<bool>;

    // Revision schedule
    /// Returns only the entries created; a topic already scheduled for the
    /// date is skipped.
    fn create_revision_entries(
        &self,
        user_id: &str,
        topic_ids: &[i64],
        scheduled_date: NaiveDate,
    ) -> Result<Vec<RevisionEntry>>;
    fn get_revision_entry(&self, id: i64) -> Result<Option<RevisionEntry>>;
    fn list_revision_entries(&self, user_id: &str) -> Result<Vec<RevisionEntry>>;
    fn complete_revision_entry(&self, id: i64, at: DateTime<Utc>) -> Result<RevisionEntry>;
    fn complete_revision_session(
        &self,
        user_id: &str,
        scheduled_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<usize>;
    fn delete_revision_session(&self, user_id: &str, scheduled_date: NaiveDate) -> Result<usize>;
    fn delete_revision_entry(&self, id: i64) -> Result<bool>;

    // Backlog
    fn create_backlog_item(&self, item: &NewBacklogItem) -> Result<BacklogItem>;
    fn get_backlog_item(&self, id: i64) -> Result<Option<BacklogItem>>;
    fn list_backlog_items(&self, user_id: &str) -> Result<Vec<BacklogItem>>;
    fn update_backlog_item(&self, item: &BacklogItem) -> Result<()>;
    fn delete_backlog_item(&self, id: i64) -> Result<bool>;

    // Mock tests
    fn create_mock_test(
        &self,
        test: &MockTest,
        subjects: &[SubjectScoreInput],
    ) -> Result<MockTestWithSubjects>;
    fn get_mock_test(&self, id: &str) -> Result<Option<MockTestWithSubjects>>;
    fn list_mock_tests(&self, user_id: &str) -> Result<Vec<MockTestWithSubjects>>;
    /// Updates the test row and replaces all of its subject rows.
    fn replace_mock_test(
        &self,
        test: &MockTest,
        subjects: &[SubjectScoreInput],
    ) -> Result<MockTestWithSubjects>;
    fn delete_mock_test(&self, id: &str) -> Result<bool>;

    fn close(&self) -> Result<()>;
}
