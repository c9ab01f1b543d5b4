//! Groups revision entries into dated sessions and classifies them.
//!
//! A session is every entry a user has on one calendar date. Sessions are
//! never stored; they are derived on each read.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use super::syllabus::UnitNode;
use crate::types::{ProgressStatus, RevisionEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Overdue,
    DueToday,
    Upcoming,
}

/// Classifies a session by calendar day. A completed session is never
/// overdue or due.
#[must_use]
pub fn classify(date: NaiveDate, all_completed: bool, today: NaiveDate) -> SessionStatus {
    if all_completed {
        SessionStatus::Completed
    } else if date < today {
        SessionStatus::Overdue
    } else if date == today {
        SessionStatus::DueToday
    } else {
        SessionStatus::Upcoming
    }
}

/// How a session is presented: as whole units when its topics are exactly
/// the union of fully covered units, otherwise as a topic count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum SessionLabel {
    Units(usize),
    Topics(usize),
}

impl fmt::Display for SessionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionLabel::Units(1) => f.write_str("1 unit"),
            SessionLabel::Units(n) => write!(f, "{n} units"),
            SessionLabel::Topics(1) => f.write_str("1 topic"),
            SessionLabel::Topics(n) => write!(f, "{n} topics"),
        }
    }
}

pub fn describe_session<'a, I>(topic_ids: &BTreeSet<i64>, units: I) -> SessionLabel
where
    I: IntoIterator<Item = &'a UnitNode>,
{
    let mut covered_units = 0;
    let mut covered_topics: HashSet<i64> = HashSet::new();

    for unit in units {
        // An empty unit is a subset of anything and says nothing about coverage.
        if unit.topics.is_empty() {
            continue;
        }
        if unit.topic_ids().all(|id| topic_ids.contains(&id)) {
            covered_units += 1;
            covered_topics.extend(unit.topic_ids());
        }
    }

    if covered_units > 0
        && covered_topics.len() == topic_ids.len()
        && topic_ids.iter().all(|id| covered_topics.contains(id))
    {
        SessionLabel::Units(covered_units)
    } else {
        SessionLabel::Topics(topic_ids.len())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevisionSession {
    pub date: NaiveDate,
    pub status: SessionStatus,
    pub label: SessionLabel,
    pub summary: String,
    pub completed_count: usize,
    pub topic_ids: Vec<i64>,
    pub entries: Vec<RevisionEntry>,
}

impl RevisionSession {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

/// Groups entries by date and orders open sessions before completed ones,
/// each by ascending date.
pub fn group_sessions(
    entries: Vec<RevisionEntry>,
    units: &[&UnitNode],
    today: NaiveDate,
) -> Vec<RevisionSession> {
    let mut by_date: BTreeMap<NaiveDate, Vec<RevisionEntry>> = BTreeMap::new();
    for entry in entries {
        by_date.entry(entry.scheduled_date).or_default().push(entry);
    }

    let mut sessions: Vec<RevisionSession> = by_date
        .into_iter()
        .map(|(date, mut entries)| {
            entries.sort_by_key(|e| e.id);
            let completed_count = entries
                .iter()
                .filter(|e| e.status == ProgressStatus::Completed)
                .count();
            let topic_set: BTreeSet<i64> = entries.iter().map(|e| e.topic_id).collect();
            let label = describe_session(&topic_set, units.iter().copied());
            RevisionSession {
                date,
                status: classify(date, completed_count == entries.len(), today),
                label,
                summary: label.to_string(),
                completed_count,
                topic_ids: topic_set.into_iter().collect(),
                entries,
            }
        })
        .collect();

    sessions.sort_by_key(|s| (s.is_completed(), s.date));
    sessions
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub due_today_sessions: usize,
    pub overdue_sessions: usize,
    pub pending_entries: usize,
    pub should_notify: bool,
}

/// Counts for the once-per-visit revision advisory.
pub fn reminder(sessions: &[RevisionSession]) -> Reminder {
    let mut r = Reminder::default();
    for session in sessions {
        let open = session.entries.len() - session.completed_count;
        match session.status {
            SessionStatus::DueToday => {
                r.due_today_sessions += 1;
                r.pending_entries += open;
            }
            SessionStatus::Overdue => {
                r.overdue_sessions += 1;
                r.pending_entries += open;
            }
            SessionStatus::Completed | SessionStatus::Upcoming => {}
        }
    }
    r.should_notify = r.due_today_sessions + r.overdue_sessions > 0;
    r
}

/// Drops repeated ids, keeping first occurrences in order.
pub fn dedup_ids<I: IntoIterator<Item = i64>>(ids: I) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
