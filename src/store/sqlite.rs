use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};

use super::Store;
use super::schema::SCHEMA;
use super::seed::SeedSyllabus;
use crate::engine::mock_test::SubjectScoreInput;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str = "id, email, username, role, current_level, created_at, updated_at";
const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";
const SUBJECT_COLUMNS: &str = "id, name, color";
const UNIT_COLUMNS: &str = "id, subject_id, name, sort_order";
const TOPIC_COLUMNS: &str = "id, unit_id, name, sort_order, is_important, weightage, \
     applies_to_class11, applies_to_class12";
const PROGRESS_COLUMNS: &str = "id, user_id, topic_id, status, confidence, notes, completed_at, \
     last_revised_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, subject_id, duration_minutes, date, notes, created_at";
const REVISION_COLUMNS: &str =
    "id, user_id, topic_id, scheduled_date, status, completed_at, created_at";
const BACKLOG_COLUMNS: &str = "id, user_id, topic_id, topic_ids, title, description, priority, \
     kind, deadline, is_completed, created_at";
const MOCK_TEST_COLUMNS: &str =
    "id, user_id, title, test_date, max_score, total_score, notes, created_at";
const MOCK_SUBJECT_COLUMNS: &str =
    "id, mock_test_id, subject_id, score, negative_marks, max_score, scope, unit_ids";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_ids(ids: &[i64]) -> rusqlite::Result<String> {
    serde_json::to_string(ids).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(parse_datetime(&row.get::<_, String>(idx)?))
}

fn opt_datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .map(|s| parse_datetime(&s)))
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e.to_string()))
}

fn enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn opt_enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| s.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn ids_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<i64>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        role: enum_col(row, 3)?,
        current_level: opt_enum_col(row, 4)?,
        created_at: datetime_col(row, 5)?,
        updated_at: datetime_col(row, 6)?,
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: datetime_col(row, 4)?,
        expires_at: opt_datetime_col(row, 5)?,
        last_used_at: opt_datetime_col(row, 6)?,
    })
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
    })
}

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        name: row.get(2)?,
        order: row.get(3)?,
    })
}

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        name: row.get(2)?,
        order: row.get(3)?,
        is_important: row.get(4)?,
        weightage: row.get(5)?,
        applies_to_class11: row.get(6)?,
        applies_to_class12: row.get(7)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<TopicProgress> {
    Ok(TopicProgress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        topic_id: row.get(2)?,
        status: enum_col(row, 3)?,
        confidence: opt_enum_col(row, 4)?,
        notes: row.get(5)?,
        completed_at: opt_datetime_col(row, 6)?,
        last_revised_at: opt_datetime_col(row, 7)?,
        updated_at: datetime_col(row, 8)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<StudySession> {
    Ok(StudySession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subject_id: row.get(2)?,
        duration_minutes: row.get(3)?,
        date: date_col(row, 4)?,
        notes: row.get(5)?,
        created_at: datetime_col(row, 6)?,
    })
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<RevisionEntry> {
    Ok(RevisionEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        topic_id: row.get(2)?,
        scheduled_date: date_col(row, 3)?,
        status: enum_col(row, 4)?,
        completed_at: opt_datetime_col(row, 5)?,
        created_at: datetime_col(row, 6)?,
    })
}

fn backlog_from_row(row: &Row<'_>) -> rusqlite::Result<BacklogItem> {
    let scope = BacklogScope::from_parts(row.get(2)?, ids_col(row, 3)?)
        .map_err(|e| conversion_error(2, e))?;
    Ok(BacklogItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        scope,
        title: row.get(4)?,
        description: row.get(5)?,
        priority: enum_col(row, 6)?,
        kind: enum_col(row, 7)?,
        deadline: opt_datetime_col(row, 8)?,
        is_completed: row.get(9)?,
        created_at: datetime_col(row, 10)?,
    })
}

fn mock_test_from_row(row: &Row<'_>) -> rusqlite::Result<MockTest> {
    Ok(MockTest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        test_date: date_col(row, 3)?,
        max_score: row.get(4)?,
        total_score: row.get(5)?,
        notes: row.get(6)?,
        created_at: datetime_col(row, 7)?,
    })
}

fn mock_subject_from_row(row: &Row<'_>) -> rusqlite::Result<MockTestSubject> {
    let coverage = Coverage::from_parts(opt_enum_col(row, 6)?, ids_col(row, 7)?)
        .map_err(|e| conversion_error(6, e))?;
    Ok(MockTestSubject {
        id: row.get(0)?,
        mock_test_id: row.get(1)?,
        subject_id: row.get(2)?,
        score: row.get(3)?,
        negative_marks: row.get(4)?,
        max_score: row.get(5)?,
        coverage,
    })
}

fn query_all<T, P>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>>
where
    P: rusqlite::Params,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn load_mock_test(conn: &Connection, id: &str) -> Result<Option<MockTestWithSubjects>> {
    let test = conn
        .query_row(
            &format!("SELECT {MOCK_TEST_COLUMNS} FROM mock_tests WHERE id = ?1"),
            params![id],
            mock_test_from_row,
        )
        .optional()?;

    let Some(test) = test else {
        return Ok(None);
    };

    let subjects = query_all(
        conn,
        &format!(
            "SELECT {MOCK_SUBJECT_COLUMNS} FROM mock_test_subjects
             WHERE mock_test_id = ?1 ORDER BY id"
        ),
        params![id],
        mock_subject_from_row,
    )?;

    Ok(Some(MockTestWithSubjects { test, subjects }))
}

fn insert_mock_subjects(conn: &Connection, test_id: &str, subjects: &[SubjectScoreInput]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO mock_test_subjects
             (mock_test_id, subject_id, score, negative_marks, max_score, scope, unit_ids)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for s in subjects {
        let (scope, unit_ids) = Coverage::to_parts(s.coverage.as_ref());
        let unit_ids = unit_ids.map(format_ids).transpose()?;
        stmt.execute(params![
            test_id,
            s.subject_id,
            s.score,
            s.negative_marks,
            s.max_score,
            scope.map(NamedScope::as_str),
            unit_ids,
        ])?;
    }
    Ok(())
}

/// Drops `deleted` from every multi-topic backlog scope. A scope left empty
/// becomes unscoped.
fn prune_backlog_topics(conn: &Connection, deleted: &HashSet<i64>) -> Result<()> {
    if deleted.is_empty() {
        return Ok(());
    }

    let scoped: Vec<(i64, Option<Vec<i64>>)> = query_all(
        conn,
        "SELECT id, topic_ids FROM backlog_items WHERE topic_ids IS NOT NULL",
        [],
        |row| Ok((row.get(0)?, ids_col(row, 1)?)),
    )?;

    let mut stmt = conn.prepare("UPDATE backlog_items SET topic_ids = ?1 WHERE id = ?2")?;
    for (id, ids) in scoped {
        let ids = ids.unwrap_or_default();
        if !ids.iter().any(|t| deleted.contains(t)) {
            continue;
        }
        let kept: Vec<i64> = ids.into_iter().filter(|t| !deleted.contains(t)).collect();
        let encoded = if kept.is_empty() {
            None
        } else {
            Some(format_ids(&kept)?)
        };
        stmt.execute(params![encoded, id])?;
    }
    Ok(())
}

fn topic_id_set(conn: &Connection, sql: &str, parent_id: i64) -> Result<HashSet<i64>> {
    let ids: Vec<i64> = query_all(conn, sql, params![parent_id], |row| row.get(0))?;
    Ok(ids.into_iter().collect())
}

/// Unique violations become `AlreadyExists`; a missing referenced row
/// becomes `Validation`.
fn map_constraint_violation(result: rusqlite::Result<usize>) -> Result<usize> {
    match result {
        Ok(n) => Ok(n),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Err(Error::Validation("referenced row does not exist".to_string()))
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::AlreadyExists)
        }
        Err(e) => Err(Error::from(e)),
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, email, username, role, current_level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.username,
                user.role.as_str(),
                user.current_level.map(ClassLevel::as_str),
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );
        map_constraint_violation(result)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>> {
        query_all(
            &self.conn(),
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id > ?1 ORDER BY id LIMIT ?2"),
            params![cursor, limit],
            user_from_row,
        )
    }

    fn list_all_users(&self) -> Result<Vec<User>> {
        query_all(
            &self.conn(),
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"),
            [],
            user_from_row,
        )
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "UPDATE users SET email = ?1, username = ?2, role = ?3, current_level = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                user.email,
                user.username,
                user.role.as_str(),
                user.current_level.map(ClassLevel::as_str),
                format_datetime(&user.updated_at),
                user.id,
            ],
        );

        if map_constraint_violation(result)? == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn has_admin_user(&self) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![Role::Admin.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_id(&self, id: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?1"),
                params![id],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: &str) -> Result<Vec<Token>> {
        query_all(
            &self.conn(),
            &format!(
                "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at DESC"
            ),
            params![user_id],
            token_from_row,
        )
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Syllabus tree

    fn count_subjects(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))
            .map_err(Error::from)
    }

    fn seed_syllabus_if_empty(&self, seed: &SeedSyllabus) -> Result<bool> {
        let mut conn = self.conn();
        // IMMEDIATE takes the write lock before the emptiness check, so a
        // second process racing the first sees the seeded rows.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(false);
        }

        for subject in &seed.subjects {
            tx.execute(
                "INSERT INTO subjects (name, color) VALUES (?1, ?2)",
                params![subject.name, subject.color],
            )?;
            let subject_id = tx.last_insert_rowid();

            for (unit_idx, unit) in subject.units.iter().enumerate() {
                tx.execute(
                    "INSERT INTO units (subject_id, name, sort_order) VALUES (?1, ?2, ?3)",
                    params![subject_id, unit.name, unit_idx as i64 + 1],
                )?;
                let unit_id = tx.last_insert_rowid();

                for (topic_idx, topic) in unit.topics.iter().enumerate() {
                    let levels = topic.effective_levels(unit);
                    tx.execute(
                        "INSERT INTO topics (unit_id, name, sort_order, is_important, weightage,
                                             applies_to_class11, applies_to_class12)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            unit_id,
                            topic.name,
                            topic_idx as i64 + 1,
                            topic.important,
                            topic.weightage,
                            levels.contains(&ClassLevel::Class11),
                            levels.contains(&ClassLevel::Class12),
                        ],
                    )?;
                }
            }
        }

        tx.commit()?;
        tracing::info!(
            "Seeded syllabus with {} subjects and {} topics",
            seed.subjects.len(),
            seed.topic_count()
        );
        Ok(true)
    }

    fn create_subject(&self, subject: &NewSubject) -> Result<Subject> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO subjects (name, color) VALUES (?1, ?2)",
            params![subject.name, subject.color],
        )?;
        Ok(Subject {
            id: conn.last_insert_rowid(),
            name: subject.name.clone(),
            color: subject.color.clone(),
        })
    }

    fn get_subject(&self, id: i64) -> Result<Option<Subject>> {
        self.conn()
            .query_row(
                &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?1"),
                params![id],
                subject_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_subjects(&self) -> Result<Vec<Subject>> {
        query_all(
            &self.conn(),
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY id"),
            [],
            subject_from_row,
        )
    }

    fn update_subject(&self, subject: &Subject) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE subjects SET name = ?1, color = ?2 WHERE id = ?3",
            params![subject.name, subject.color, subject.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_subject(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let scored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM mock_test_subjects WHERE subject_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if scored > 0 {
            return Err(Error::Conflict(format!(
                "Subject is scored in {scored} mock test entries"
            )));
        }

        let topics = topic_id_set(
            &tx,
            "SELECT t.id FROM topics t JOIN units u ON t.unit_id = u.id WHERE u.subject_id = ?1",
            id,
        )?;
        prune_backlog_topics(&tx, &topics)?;
        let rows = tx.execute("DELETE FROM subjects WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn create_unit(&self, unit: &NewUnit) -> Result<Unit> {
        let conn = self.conn();
        map_constraint_violation(conn.execute(
            "INSERT INTO units (subject_id, name, sort_order) VALUES (?1, ?2, ?3)",
            params![unit.subject_id, unit.name, unit.order],
        ))?;
        Ok(Unit {
            id: conn.last_insert_rowid(),
            subject_id: unit.subject_id,
            name: unit.name.clone(),
            order: unit.order,
        })
    }

    fn get_unit(&self, id: i64) -> Result<Option<Unit>> {
        self.conn()
            .query_row(
                &format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = ?1"),
                params![id],
                unit_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_units(&self) -> Result<Vec<Unit>> {
        query_all(
            &self.conn(),
            &format!("SELECT {UNIT_COLUMNS} FROM units ORDER BY subject_id, sort_order, id"),
            [],
            unit_from_row,
        )
    }

    fn update_unit(&self, unit: &Unit) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE units SET subject_id = ?1, name = ?2, sort_order = ?3 WHERE id = ?4",
            params![unit.subject_id, unit.name, unit.order, unit.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_unit(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let topics = topic_id_set(&tx, "SELECT id FROM topics WHERE unit_id = ?1", id)?;
        prune_backlog_topics(&tx, &topics)?;
        let rows = tx.execute("DELETE FROM units WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn create_topic(&self, topic: &NewTopic) -> Result<Topic> {
        let conn = self.conn();
        map_constraint_violation(conn.execute(
            "INSERT INTO topics (unit_id, name, sort_order, is_important, weightage,
                                 applies_to_class11, applies_to_class12)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                topic.unit_id,
                topic.name,
                topic.order,
                topic.is_important,
                topic.weightage,
                topic.applies_to_class11,
                topic.applies_to_class12,
            ],
        ))?;
        Ok(Topic {
            id: conn.last_insert_rowid(),
            unit_id: topic.unit_id,
            name: topic.name.clone(),
            order: topic.order,
            is_important: topic.is_important,
            weightage: topic.weightage.clone(),
            applies_to_class11: topic.applies_to_class11,
            applies_to_class12: topic.applies_to_class12,
        })
    }

    fn get_topic(&self, id: i64) -> Result<Option<Topic>> {
        self.conn()
            .query_row(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
                params![id],
                topic_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_topics(&self) -> Result<Vec<Topic>> {
        query_all(
            &self.conn(),
            &format!("SELECT {TOPIC_COLUMNS} FROM topics ORDER BY unit_id, sort_order, id"),
            [],
            topic_from_row,
        )
    }

    fn list_unit_topics(&self, unit_id: i64) -> Result<Vec<Topic>> {
        query_all(
            &self.conn(),
            &format!(
                "SELECT {TOPIC_COLUMNS} FROM topics WHERE unit_id = ?1 ORDER BY sort_order, id"
            ),
            params![unit_id],
            topic_from_row,
        )
    }

    fn update_topic(&self, topic: &Topic) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE topics SET unit_id = ?1, name = ?2, sort_order = ?3, is_important = ?4,
                               weightage = ?5, applies_to_class11 = ?6, applies_to_class12 = ?7
             WHERE id = ?8",
            params![
                topic.unit_id,
                topic.name,
                topic.order,
                topic.is_important,
                topic.weightage,
                topic.applies_to_class11,
                topic.applies_to_class12,
                topic.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_topic(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        prune_backlog_topics(&tx, &HashSet::from([id]))?;
        let rows = tx.execute("DELETE FROM topics WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    // Topic progress

    fn get_progress(&self, user_id: &str, topic_id: i64) -> Result<Option<TopicProgress>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {PROGRESS_COLUMNS} FROM topic_progress
                     WHERE user_id = ?1 AND topic_id = ?2"
                ),
                params![user_id, topic_id],
                progress_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_progress(&self, user_id: &str) -> Result<Vec<TopicProgress>> {
        query_all(
            &self.conn(),
            &format!(
                "SELECT {PROGRESS_COLUMNS} FROM topic_progress WHERE user_id = ?1 ORDER BY topic_id"
            ),
            params![user_id],
            progress_from_row,
        )
    }

    fn upsert_progress(&self, progress: &TopicProgress) -> Result<TopicProgress> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO topic_progress
                 (user_id, topic_id, status, confidence, notes, completed_at, last_revised_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id, topic_id) DO UPDATE SET
                 status = excluded.status,
                 confidence = excluded.confidence,
                 notes = excluded.notes,
                 completed_at = excluded.completed_at,
                 last_revised_at = excluded.last_revised_at,
                 updated_at = excluded.updated_at",
            params![
                progress.user_id,
                progress.topic_id,
                progress.status.as_str(),
                progress.confidence.map(Confidence::as_str),
                progress.notes,
                progress.completed_at.as_ref().map(format_datetime),
                progress.last_revised_at.as_ref().map(format_datetime),
                format_datetime(&progress.updated_at),
            ],
        )?;

        conn.query_row(
            &format!(
                "SELECT {PROGRESS_COLUMNS} FROM topic_progress WHERE user_id = ?1 AND topic_id = ?2"
            ),
            params![progress.user_id, progress.topic_id],
            progress_from_row,
        )
        .map_err(Error::from)
    }

    // Study sessions

    fn create_study_session(&self, session: &NewStudySession) -> Result<StudySession> {
        let conn = self.conn();
        let created_at = Utc::now();
        map_constraint_violation(conn.execute(
            "INSERT INTO study_sessions (user_id, subject_id, duration_minutes, date, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.user_id,
                session.subject_id,
                session.duration_minutes,
                format_date(session.date),
                session.notes,
                format_datetime(&created_at),
            ],
        ))?;
        Ok(StudySession {
            id: conn.last_insert_rowid(),
            user_id: session.user_id.clone(),
            subject_id: session.subject_id,
            duration_minutes: session.duration_minutes,
            date: session.date,
            notes: session.notes.clone(),
            created_at,
        })
    }

    fn get_study_session(&self, id: i64) -> Result<Option<StudySession>> {
        self.conn()
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE id = ?1"),
                params![id],
                session_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_study_sessions(
        &self,
        user_id: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<StudySession>> {
        let mut conditions = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(user_id) = user_id {
            values.push(Value::Text(user_id.to_string()));
            conditions.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(from) = from {
            values.push(Value::Text(format_date(from)));
            conditions.push(format!("date >= ?{}", values.len()));
        }
        if let Some(to) = to {
            values.push(Value::Text(format_date(to)));
            conditions.push(format!("date <= ?{}", values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        query_all(
            &self.conn(),
            &format!(
                "SELECT {SESSION_COLUMNS} FROM study_sessions {where_clause}
                 ORDER BY date DESC, id DESC"
            ),
            params_from_iter(values),
            session_from_row,
        )
    }

    fn update_study_session(&self, session: &StudySession) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE study_sessions SET subject_id = ?1, duration_minutes = ?2, date = ?3, notes = ?4
             WHERE id = ?5",
            params![
                session.subject_id,
                session.duration_minutes,
                format_date(session.date),
                session.notes,
                session.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_study_session(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM study_sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Revision schedule

    fn create_revision_entries(
        &self,
        user_id: &str,
        topic_ids: &[i64],
        scheduled_date: NaiveDate,
    ) -> Result<Vec<RevisionEntry>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let created_at = Utc::now();
        let mut entries = Vec::with_capacity(topic_ids.len());

        {
            let mut stmt = tx.prepare(
                "INSERT INTO revision_entries (user_id, topic_id, scheduled_date, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, topic_id, scheduled_date) DO NOTHING",
            )?;
            for topic_id in topic_ids {
                let inserted = stmt.execute(params![
                    user_id,
                    topic_id,
                    format_date(scheduled_date),
                    ProgressStatus::NotStarted.as_str(),
                    format_datetime(&created_at),
                ])?;
                // Already scheduled for that day
                if inserted == 0 {
                    continue;
                }
                entries.push(RevisionEntry {
                    id: tx.last_insert_rowid(),
                    user_id: user_id.to_string(),
                    topic_id: *topic_id,
                    scheduled_date,
                    status: ProgressStatus::NotStarted,
                    completed_at: None,
                    created_at,
                });
            }
        }

        tx.commit()?;
        Ok(entries)
    }

    fn get_revision_entry(&self, id: i64) -> Result<Option<RevisionEntry>> {
        self.conn()
            .query_row(
                &format!("SELECT {REVISION_COLUMNS} FROM revision_entries WHERE id = ?1"),
                params![id],
                revision_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_revision_entries(&self, user_id: &str) -> Result<Vec<RevisionEntry>> {
        query_all(
            &self.conn(),
            &format!(
                "SELECT {REVISION_COLUMNS} FROM revision_entries WHERE user_id = ?1
                 ORDER BY scheduled_date, id"
            ),
            params![user_id],
            revision_from_row,
        )
    }

    fn complete_revision_entry(&self, id: i64, at: DateTime<Utc>) -> Result<RevisionEntry> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stamp = format_datetime(&at);

        let rows = tx.execute(
            "UPDATE revision_entries SET status = ?1, completed_at = COALESCE(completed_at, ?2)
             WHERE id = ?3",
            params![ProgressStatus::Completed.as_str(), stamp, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        let entry = tx.query_row(
            &format!("SELECT {REVISION_COLUMNS} FROM revision_entries WHERE id = ?1"),
            params![id],
            revision_from_row,
        )?;

        // Only existing progress rows are touched; revision never creates one.
        tx.execute(
            "UPDATE topic_progress SET last_revised_at = ?1 WHERE user_id = ?2 AND topic_id = ?3",
            params![stamp, entry.user_id, entry.topic_id],
        )?;

        tx.commit()?;
        Ok(entry)
    }

    fn complete_revision_session(
        &self,
        user_id: &str,
        scheduled_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let stamp = format_datetime(&at);
        let date = format_date(scheduled_date);

        let rows = tx.execute(
            "UPDATE revision_entries SET status = ?1, completed_at = COALESCE(completed_at, ?2)
             WHERE user_id = ?3 AND scheduled_date = ?4",
            params![ProgressStatus::Completed.as_str(), stamp, user_id, date],
        )?;

        tx.execute(
            "UPDATE topic_progress SET last_revised_at = ?1
             WHERE user_id = ?2 AND topic_id IN (
                 SELECT topic_id FROM revision_entries WHERE user_id = ?2 AND scheduled_date = ?3
             )",
            params![stamp, user_id, date],
        )?;

        tx.commit()?;
        Ok(rows)
    }

    fn delete_revision_session(&self, user_id: &str, scheduled_date: NaiveDate) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM revision_entries WHERE user_id = ?1 AND scheduled_date = ?2",
            params![user_id, format_date(scheduled_date)],
        )?;
        Ok(rows)
    }

    fn delete_revision_entry(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM revision_entries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Backlog

    fn create_backlog_item(&self, item: &NewBacklogItem) -> Result<BacklogItem> {
        let conn = self.conn();
        let created_at = Utc::now();
        let (topic_id, topic_ids) = item.scope.to_parts();
        let topic_ids = topic_ids.map(format_ids).transpose()?;
        map_constraint_violation(conn.execute(
            "INSERT INTO backlog_items
                 (user_id, topic_id, topic_ids, title, description, priority, kind, deadline,
                  is_completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
            params![
                item.user_id,
                topic_id,
                topic_ids,
                item.title,
                item.description,
                item.priority.as_str(),
                item.kind.as_str(),
                item.deadline.as_ref().map(format_datetime),
                format_datetime(&created_at),
            ],
        ))?;
        Ok(BacklogItem {
            id: conn.last_insert_rowid(),
            user_id: item.user_id.clone(),
            scope: item.scope.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            priority: item.priority,
            kind: item.kind,
            deadline: item.deadline,
            is_completed: false,
            created_at,
        })
    }

    fn get_backlog_item(&self, id: i64) -> Result<Option<BacklogItem>> {
        self.conn()
            .query_row(
                &format!("SELECT {BACKLOG_COLUMNS} FROM backlog_items WHERE id = ?1"),
                params![id],
                backlog_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_backlog_items(&self, user_id: &str) -> Result<Vec<BacklogItem>> {
        query_all(
            &self.conn(),
            &format!(
                "SELECT {BACKLOG_COLUMNS} FROM backlog_items WHERE user_id = ?1
                 ORDER BY is_completed, created_at DESC, id DESC"
            ),
            params![user_id],
            backlog_from_row,
        )
    }

    fn update_backlog_item(&self, item: &BacklogItem) -> Result<()> {
        let (topic_id, topic_ids) = item.scope.to_parts();
        let topic_ids = topic_ids.map(format_ids).transpose()?;
        let rows = map_constraint_violation(self.conn().execute(
            "UPDATE backlog_items SET topic_id = ?1, topic_ids = ?2, title = ?3, description = ?4,
                                      priority = ?5, kind = ?6, deadline = ?7, is_completed = ?8
             WHERE id = ?9",
            params![
                topic_id,
                topic_ids,
                item.title,
                item.description,
                item.priority.as_str(),
                item.kind.as_str(),
                item.deadline.as_ref().map(format_datetime),
                item.is_completed,
                item.id,
            ],
        ))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_backlog_item(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM backlog_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Mock tests

    fn create_mock_test(
        &self,
        test: &MockTest,
        subjects: &[SubjectScoreInput],
    ) -> Result<MockTestWithSubjects> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO mock_tests (id, user_id, title, test_date, max_score, total_score, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                test.id,
                test.user_id,
                test.title,
                format_date(test.test_date),
                test.max_score,
                test.total_score,
                test.notes,
                format_datetime(&test.created_at),
            ],
        )?;
        insert_mock_subjects(&tx, &test.id, subjects)?;

        let created = load_mock_test(&tx, &test.id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(created)
    }

    fn get_mock_test(&self, id: &str) -> Result<Option<MockTestWithSubjects>> {
        load_mock_test(&self.conn(), id)
    }

    fn list_mock_tests(&self, user_id: &str) -> Result<Vec<MockTestWithSubjects>> {
        let conn = self.conn();
        let tests = query_all(
            &conn,
            &format!(
                "SELECT {MOCK_TEST_COLUMNS} FROM mock_tests WHERE user_id = ?1
                 ORDER BY test_date, created_at"
            ),
            params![user_id],
            mock_test_from_row,
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MOCK_SUBJECT_COLUMNS} FROM mock_test_subjects
             WHERE mock_test_id = ?1 ORDER BY id"
        ))?;

        tests
            .into_iter()
            .map(|test| {
                let subjects = stmt
                    .query_map(params![test.id], mock_subject_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(MockTestWithSubjects { test, subjects })
            })
            .collect()
    }

    fn replace_mock_test(
        &self,
        test: &MockTest,
        subjects: &[SubjectScoreInput],
    ) -> Result<MockTestWithSubjects> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE mock_tests SET title = ?1, test_date = ?2, max_score = ?3, total_score = ?4,
                                   notes = ?5
             WHERE id = ?6",
            params![
                test.title,
                format_date(test.test_date),
                test.max_score,
                test.total_score,
                test.notes,
                test.id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.execute(
            "DELETE FROM mock_test_subjects WHERE mock_test_id = ?1",
            params![test.id],
        )?;
        insert_mock_subjects(&tx, &test.id, subjects)?;

        let updated = load_mock_test(&tx, &test.id)?.ok_or(Error::NotFound)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_mock_test(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM mock_tests WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
