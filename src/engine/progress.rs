//! Completion percentages, progress upserts and per-student dashboard numbers.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::syllabus::SubjectNode;
use crate::types::{
    BacklogItem, Confidence, ProgressStatus, RevisionEntry, StudySession, TopicProgress,
};

/// Topic ids a single user has completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedSet(HashSet<i64>);

impl CompletedSet {
    pub fn from_progress<'a, I>(progress: I) -> Self
    where
        I: IntoIterator<Item = &'a TopicProgress>,
    {
        Self(
            progress
                .into_iter()
                .filter(|p| p.status == ProgressStatus::Completed)
                .map(|p| p.topic_id)
                .collect(),
        )
    }

    #[must_use]
    pub fn contains(&self, topic_id: i64) -> bool {
        self.0.contains(&topic_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<i64> for CompletedSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

/// `round(completed / total * 100)`, rounding half away from zero; 0 when
/// `total` is 0.
#[must_use]
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = completed.min(total) as f64 / total as f64;
    (ratio * 100.0).round() as u8
}

pub fn compute_completion<I>(topic_ids: I, completed: &CompletedSet) -> Completion
where
    I: IntoIterator<Item = i64>,
{
    let mut total = 0;
    let mut done = 0;
    for id in topic_ids {
        total += 1;
        if completed.contains(id) {
            done += 1;
        }
    }
    Completion {
        completed: done,
        total,
        percentage: completion_percentage(done, total),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitProgress {
    pub unit_id: i64,
    pub name: String,
    #[serde(flatten)]
    pub completion: Completion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectProgress {
    pub subject_id: i64,
    pub name: String,
    #[serde(flatten)]
    pub completion: Completion,
    pub units: Vec<UnitProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyllabusProgress {
    pub overall: Completion,
    pub subjects: Vec<SubjectProgress>,
}

/// Rolls one user's completions up the tree. Subject and overall figures are
/// recomputed from the flat topic set beneath them, not averaged from children.
pub fn syllabus_progress(tree: &[SubjectNode], completed: &CompletedSet) -> SyllabusProgress {
    let subjects = tree
        .iter()
        .map(|subject| SubjectProgress {
            subject_id: subject.subject.id,
            name: subject.subject.name.clone(),
            completion: compute_completion(subject.topic_ids(), completed),
            units: subject
                .units
                .iter()
                .map(|unit| UnitProgress {
                    unit_id: unit.unit.id,
                    name: unit.unit.name.clone(),
                    completion: compute_completion(unit.topic_ids(), completed),
                })
                .collect(),
        })
        .collect();

    SyllabusProgress {
        overall: compute_completion(tree.iter().flat_map(SubjectNode::topic_ids), completed),
        subjects,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCompletion {
    pub user_id: String,
    #[serde(flatten)]
    pub completion: Completion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortCompletion {
    pub users: Vec<UserCompletion>,
    /// Completed (user, topic) pairs over all possible pairs.
    pub aggregate: u8,
}

/// Per-user completion over `topic_ids`, plus the cohort aggregate
/// `sum(completed) / (topics * users)`. The aggregate is not the mean of the
/// per-user percentages.
pub fn cohort_completion<'a, I>(topic_ids: &[i64], users: I) -> CohortCompletion
where
    I: IntoIterator<Item = (&'a str, &'a CompletedSet)>,
{
    let users: Vec<UserCompletion> = users
        .into_iter()
        .map(|(user_id, completed)| UserCompletion {
            user_id: user_id.to_string(),
            completion: compute_completion(topic_ids.iter().copied(), completed),
        })
        .collect();

    let completed_pairs: usize = users.iter().map(|u| u.completion.completed).sum();
    let possible_pairs = topic_ids.len() * users.len();

    CohortCompletion {
        aggregate: completion_percentage(completed_pairs, possible_pairs),
        users,
    }
}

/// Fields a student may change on a topic's progress row.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub confidence: Option<Confidence>,
    pub notes: Option<String>,
}

/// Produces the row to upsert for `(user_id, topic_id)`.
///
/// `completed_at` is stamped when the status becomes completed, kept while it
/// stays completed, and cleared for any other status.
pub fn apply_update(
    user_id: &str,
    topic_id: i64,
    existing: Option<TopicProgress>,
    update: ProgressUpdate,
    now: DateTime<Utc>,
) -> TopicProgress {
    let mut row = existing.unwrap_or_else(|| TopicProgress {
        id: 0,
        user_id: user_id.to_string(),
        topic_id,
        status: ProgressStatus::NotStarted,
        confidence: None,
        notes: None,
        completed_at: None,
        last_revised_at: None,
        updated_at: now,
    });

    if let Some(status) = update.status {
        row.status = status;
    }
    row.completed_at = match row.status {
        ProgressStatus::Completed => row.completed_at.or(Some(now)),
        _ => None,
    };
    if let Some(confidence) = update.confidence {
        row.confidence = Some(confidence);
    }
    if let Some(notes) = update.notes {
        row.notes = Some(notes);
    }
    row.updated_at = now;
    row
}

#[must_use]
pub fn study_hours(minutes: i64) -> i64 {
    (minutes as f64 / 60.0).round() as i64
}

/// Entries still open whose date is today or earlier.
pub fn revision_due_count(entries: &[RevisionEntry], today: NaiveDate) -> usize {
    entries
        .iter()
        .filter(|e| e.status != ProgressStatus::Completed && e.scheduled_date <= today)
        .count()
}

pub fn open_backlog_count(items: &[BacklogItem]) -> usize {
    items.iter().filter(|i| !i.is_completed).count()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub study_hours: i64,
    pub study_minutes: i64,
    pub session_count: usize,
    pub revision_due: usize,
    pub backlog_open: usize,
    pub completion: Completion,
}

pub fn dashboard_stats(
    sessions: &[StudySession],
    revisions: &[RevisionEntry],
    backlog: &[BacklogItem],
    completion: Completion,
    today: NaiveDate,
) -> DashboardStats {
    let study_minutes: i64 = sessions.iter().map(|s| s.duration_minutes).sum();
    DashboardStats {
        study_hours: study_hours(study_minutes),
        study_minutes,
        session_count: sessions.len(),
        revision_due: revision_due_count(revisions, today),
        backlog_open: open_backlog_count(backlog),
        completion,
    }
}
