//! Cross-student rollups for the admin views. Each student is computed on its
//! own inputs; nothing is shared between students.

use chrono::NaiveDate;
use serde::Serialize;

use super::progress::{
    CompletedSet, Completion, UserCompletion, cohort_completion, compute_completion,
    open_backlog_count, revision_due_count, study_hours,
};
use super::syllabus::SubjectNode;
use crate::types::{BacklogItem, RevisionEntry, StudySession, User};

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, String> {
        if from > to {
            return Err(format!("Range start {from} is after range end {to}"));
        }
        Ok(Self { from, to })
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Everything needed to compute one student's row.
pub struct StudentInput<'a> {
    pub user: &'a User,
    pub sessions: &'a [StudySession],
    pub revisions: &'a [RevisionEntry],
    pub backlog: &'a [BacklogItem],
    pub completed: &'a CompletedSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStats {
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub completion: Completion,
    pub study_hours: i64,
    pub study_minutes: i64,
    pub session_count: usize,
    pub revision_due: usize,
    pub backlog_open: usize,
}

/// One student's row. Study time is limited to `range`; revision and backlog
/// counts reflect the student's current state.
pub fn student_stats(
    input: &StudentInput<'_>,
    topic_ids: &[i64],
    range: DateRange,
    today: NaiveDate,
) -> StudentStats {
    let (minutes, count) = input
        .sessions
        .iter()
        .filter(|s| range.contains(s.date))
        .fold((0, 0), |(m, c), s| (m + s.duration_minutes, c + 1));

    StudentStats {
        user_id: input.user.id.clone(),
        email: input.user.email.clone(),
        username: input.user.username.clone(),
        completion: compute_completion(topic_ids.iter().copied(), input.completed),
        study_hours: study_hours(minutes),
        study_minutes: minutes,
        session_count: count,
        revision_due: revision_due_count(input.revisions, today),
        backlog_open: open_backlog_count(input.backlog),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    #[serde(flatten)]
    pub range: DateRange,
    pub total_study_hours: i64,
    pub total_study_minutes: i64,
    pub session_count: usize,
    pub students: Vec<StudentStats>,
}

pub fn analytics_report(
    range: DateRange,
    topic_ids: &[i64],
    students: &[StudentInput<'_>],
    today: NaiveDate,
) -> AnalyticsReport {
    let students: Vec<StudentStats> = students
        .iter()
        .map(|s| student_stats(s, topic_ids, range, today))
        .collect();

    // Hours are rounded once over the total, not summed from per-student rounding.
    let total_minutes: i64 = students.iter().map(|s| s.study_minutes).sum();

    AnalyticsReport {
        range,
        total_study_hours: study_hours(total_minutes),
        total_study_minutes: total_minutes,
        session_count: students.iter().map(|s| s.session_count).sum(),
        students,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOverview {
    pub subject_id: i64,
    pub subject_name: String,
    pub unit_id: i64,
    pub unit_name: String,
    pub topic_count: usize,
    pub students: Vec<UserCompletion>,
    pub cohort: u8,
}

/// Per unit: every student's completion and the cohort aggregate.
pub fn syllabus_overview(
    tree: &[SubjectNode],
    students: &[(&str, &CompletedSet)],
) -> Vec<UnitOverview> {
    tree.iter()
        .flat_map(|subject| {
            subject.units.iter().map(move |unit| {
                let topic_ids: Vec<i64> = unit.topic_ids().collect();
                let cohort = cohort_completion(&topic_ids, students.iter().copied());
                UnitOverview {
                    subject_id: subject.subject.id,
                    subject_name: subject.subject.name.clone(),
                    unit_id: unit.unit.id,
                    unit_name: unit.unit.name.clone(),
                    topic_count: topic_ids.len(),
                    students: cohort.users,
                    cohort: cohort.aggregate,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::engine::syllabus::build_tree;
    use crate::engine::syllabus::tests::{subject, topic, unit};
    use crate::types::{ProgressStatus, Role, SyllabusScope};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: None,
            role: Role::Student,
            current_level: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn session(user_id: &str, day: &str, minutes: i64) -> StudySession {
        StudySession {
            id: 0,
            user_id: user_id.to_string(),
            subject_id: None,
            duration_minutes: minutes,
            date: date(day),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_range_validation() {
        assert!(DateRange::new(date("2024-02-02"), date("2024-02-01")).is_err());
        let range = DateRange::new(date("2024-02-01"), date("2024-02-01")).unwrap();
        assert!(range.contains(date("2024-02-01")));
        assert!(!range.contains(date("2024-02-02")));
    }

    #[test]
    fn test_report_filters_sessions_by_inclusive_range() {
        let a = user("a");
        let b = user("b");
        let a_sessions = vec![
            session("a", "2024-01-31", 600),
            session("a", "2024-02-01", 45),
            session("a", "2024-02-07", 45),
        ];
        let b_sessions = vec![session("b", "2024-02-03", 30)];
        let revisions = vec![RevisionEntry {
            id: 1,
            user_id: "b".to_string(),
            topic_id: 1,
            scheduled_date: date("2024-02-05"),
            status: ProgressStatus::NotStarted,
            completed_at: None,
            created_at: Utc::now(),
        }];
        let a_done: CompletedSet = [1].into_iter().collect();
        let b_done = CompletedSet::default();

        let inputs = vec![
            StudentInput {
                user: &a,
                sessions: &a_sessions,
                revisions: &[],
                backlog: &[],
                completed: &a_done,
            },
            StudentInput {
                user: &b,
                sessions: &b_sessions,
                revisions: &revisions,
                backlog: &[],
                completed: &b_done,
            },
        ];

        let range = DateRange::new(date("2024-02-01"), date("2024-02-07")).unwrap();
        let report = analytics_report(range, &[1, 2], &inputs, date("2024-02-10"));

        assert_eq!(report.session_count, 3);
        assert_eq!(report.total_study_minutes, 120);
        assert_eq!(report.total_study_hours, 2);
        assert_eq!(report.students[0].study_hours, 2, "90 minutes rounds to 2");
        assert_eq!(report.students[1].study_hours, 1, "30 minutes rounds to 1");
        assert_eq!(report.students[0].completion.percentage, 50);
        assert_eq!(report.students[1].revision_due, 1);
    }

    #[test]
    fn test_syllabus_overview_per_unit() {
        let tree = build_tree(
            vec![subject(1, "Physics")],
            vec![unit(10, 1, 1), unit(11, 1, 2)],
            vec![
                topic(1, 10, 1, true, false),
                topic(2, 10, 2, true, false),
                topic(3, 11, 1, true, false),
            ],
            SyllabusScope::Whole,
        );
        let a: CompletedSet = [1, 2, 3].into_iter().collect();
        let b: CompletedSet = [1].into_iter().collect();
        let overview = syllabus_overview(&tree, &[("a", &a), ("b", &b)]);

        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].unit_id, 10);
        assert_eq!(overview[0].students[1].completion.percentage, 50);
        assert_eq!(overview[0].cohort, 75);
        assert_eq!(overview[1].cohort, 50);
    }
}
