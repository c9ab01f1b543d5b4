//! Mock-test score validation, score series for charts and max-mark splitting.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::types::{Coverage, MockTestWithSubjects};

/// Tolerance for comparing fractional marks (e.g. quarter-mark negatives).
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectScoreInput {
    pub subject_id: i64,
    pub score: f64,
    pub negative_marks: f64,
    pub max_score: Option<i64>,
    pub coverage: Option<Coverage>,
}

impl SubjectScoreInput {
    #[must_use]
    pub fn net_score(&self) -> f64 {
        self.score - self.negative_marks
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("Test max must be positive")]
    InvalidTestMax,

    #[error("At least one subject is required")]
    NoSubjects,

    #[error("Subject {0} is listed more than once")]
    DuplicateSubject(i64),

    #[error("Score and negative marks cannot be negative")]
    NegativeMarks { subject_id: i64 },

    #[error("Total exceeds test max")]
    TotalExceedsMax { total: f64, max: i64 },

    #[error("Max marks required")]
    MaxRequired { subject_id: i64 },

    #[error("Invalid max scores")]
    MaxSumMismatch { sum: i64, max: i64 },

    #[error("Marks exceed max for subject {subject_id}")]
    SubjectExceedsMax { subject_id: i64, net: f64, max: i64 },
}

impl ScoreError {
    /// The subject the error is about, if any.
    #[must_use]
    pub fn subject_id(&self) -> Option<i64> {
        match self {
            ScoreError::DuplicateSubject(id)
            | ScoreError::NegativeMarks { subject_id: id }
            | ScoreError::MaxRequired { subject_id: id }
            | ScoreError::SubjectExceedsMax { subject_id: id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTest {
    pub max_score: i64,
    /// Sum of subject nets, computed here and never taken from the client.
    pub total_score: f64,
    pub subjects: Vec<SubjectScoreInput>,
}

/// Checks a test's subject entries against its max score.
///
/// Multi-subject tests need a positive max on every subject and those maxes
/// must add up to the test max. A single subject is capped by the test max.
pub fn validate_test(
    test_max: i64,
    subjects: Vec<SubjectScoreInput>,
) -> Result<ValidatedTest, ScoreError> {
    if test_max <= 0 {
        return Err(ScoreError::InvalidTestMax);
    }
    if subjects.is_empty() {
        return Err(ScoreError::NoSubjects);
    }

    let mut seen = HashSet::new();
    for s in &subjects {
        if !seen.insert(s.subject_id) {
            return Err(ScoreError::DuplicateSubject(s.subject_id));
        }
        if s.score < 0.0 || s.negative_marks < 0.0 {
            return Err(ScoreError::NegativeMarks {
                subject_id: s.subject_id,
            });
        }
    }

    let total: f64 = subjects.iter().map(SubjectScoreInput::net_score).sum();
    if total > test_max as f64 + SCORE_EPSILON {
        return Err(ScoreError::TotalExceedsMax {
            total,
            max: test_max,
        });
    }

    let multi = subjects.len() > 1;
    if multi {
        let mut sum = 0;
        for s in &subjects {
            match s.max_score {
                Some(max) if max > 0 => sum += max,
                _ => {
                    return Err(ScoreError::MaxRequired {
                        subject_id: s.subject_id,
                    });
                }
            }
        }
        if sum != test_max {
            return Err(ScoreError::MaxSumMismatch { sum, max: test_max });
        }
    }

    for s in &subjects {
        let cap = if multi {
            s.max_score.unwrap_or(test_max)
        } else {
            test_max
        };
        let net = s.net_score();
        if net > cap as f64 + SCORE_EPSILON {
            return Err(ScoreError::SubjectExceedsMax {
                subject_id: s.subject_id,
                net,
                max: cap,
            });
        }
    }

    Ok(ValidatedTest {
        max_score: test_max,
        total_score: total,
        subjects,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    pub test_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub net_score: f64,
    pub max_score: f64,
    pub percentage: i64,
    /// True when the subject max was estimated as `test max / subject count`.
    pub estimated_max: bool,
}

/// Percentage points for charting, ascending by date.
///
/// With a subject filter, tests without that subject are skipped and a
/// missing subject max falls back to an even share of the test max. Points
/// whose max works out to zero are skipped.
pub fn score_series(tests: &[MockTestWithSubjects], subject_id: Option<i64>) -> Vec<ScorePoint> {
    let mut points: Vec<ScorePoint> = tests
        .iter()
        .filter_map(|t| {
            let (net, max, estimated) = match subject_id {
                None => (
                    t.subjects.iter().map(|s| s.net_score()).sum::<f64>(),
                    t.test.max_score as f64,
                    false,
                ),
                Some(id) => {
                    let subject = t.subjects.iter().find(|s| s.subject_id == id)?;
                    match subject.max_score {
                        Some(max) if max > 0 => (subject.net_score(), max as f64, false),
                        _ => (
                            subject.net_score(),
                            t.test.max_score as f64 / t.subjects.len() as f64,
                            true,
                        ),
                    }
                }
            };
            if max <= 0.0 {
                return None;
            }
            Some(ScorePoint {
                test_id: t.test.id.clone(),
                title: t.test.title.clone(),
                date: t.test.test_date,
                net_score: net,
                max_score: max,
                percentage: (net / max * 100.0).round() as i64,
                estimated_max: estimated,
            })
        })
        .collect();

    points.sort_by_key(|p| p.date);
    points
}

/// Splits `total` across `n` subjects as evenly as possible; the first
/// `total % n` subjects get one extra mark.
#[must_use]
pub fn equal_split(total: i64, n: usize) -> Vec<i64> {
    if n == 0 {
        return Vec::new();
    }
    let n_i = n as i64;
    let base = total.div_euclid(n_i);
    let extra = total.rem_euclid(n_i) as usize;
    (0..n).map(|i| base + i64::from(i < extra)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{MockTest, MockTestSubject};

    fn entry(subject_id: i64, score: f64, negative: f64, max: Option<i64>) -> SubjectScoreInput {
        SubjectScoreInput {
            subject_id,
            score,
            negative_marks: negative,
            max_score: max,
            coverage: None,
        }
    }

    #[test]
    fn test_max_sum_mismatch_rejected() {
        let err = validate_test(
            100,
            vec![entry(1, 50.0, 0.0, Some(60)), entry(2, 20.0, 0.0, Some(30))],
        )
        .unwrap_err();
        assert_eq!(err, ScoreError::MaxSumMismatch { sum: 90, max: 100 });
        assert_eq!(err.to_string(), "Invalid max scores");
    }

    #[test]
    fn test_valid_two_subject_test_totals_nets() {
        let test = validate_test(
            100,
            vec![entry(1, 50.0, 0.0, Some(60)), entry(2, 20.0, 0.0, Some(40))],
        )
        .unwrap();
        assert_eq!(test.total_score, 70.0);
    }

    #[test]
    fn test_negative_marks_are_subtracted() {
        let test = validate_test(
            100,
            vec![entry(1, 52.0, 2.0, Some(60)), entry(2, 21.0, 1.0, Some(40))],
        )
        .unwrap();
        assert_eq!(test.total_score, 70.0);
    }

    #[test]
    fn test_total_exceeding_max_rejected() {
        let err = validate_test(50, vec![entry(1, 60.0, 0.0, None)]).unwrap_err();
        assert_eq!(err.to_string(), "Total exceeds test max");
    }

    #[test]
    fn test_multi_subject_requires_max() {
        let err = validate_test(100, vec![entry(1, 10.0, 0.0, Some(50)), entry(2, 10.0, 0.0, None)])
            .unwrap_err();
        assert_eq!(err, ScoreError::MaxRequired { subject_id: 2 });
        assert_eq!(err.to_string(), "Max marks required");

        let err =
            validate_test(100, vec![entry(1, 10.0, 0.0, Some(100)), entry(2, 0.0, 0.0, Some(0))])
                .unwrap_err();
        assert_eq!(err, ScoreError::MaxRequired { subject_id: 2 });
    }

    #[test]
    fn test_subject_over_its_cap_rejected() {
        let err = validate_test(
            100,
            vec![entry(1, 45.0, 0.0, Some(40)), entry(2, 10.0, 0.0, Some(60))],
        )
        .unwrap_err();
        assert_eq!(err.subject_id(), Some(1));
        assert!(matches!(err, ScoreError::SubjectExceedsMax { max: 40, .. }));
    }

    #[test]
    fn test_single_subject_capped_by_test_max() {
        // The subject's own max is ignored for a single-subject test.
        let test = validate_test(80, vec![entry(1, 75.0, 0.0, Some(50))]).unwrap();
        assert_eq!(test.total_score, 75.0);
    }

    #[test]
    fn test_fractional_negative_marks() {
        let test = validate_test(
            3,
            vec![
                entry(1, 1.25, 0.25, Some(1)),
                entry(2, 1.0, 0.0, Some(1)),
                entry(3, 1.0, 0.0, Some(1)),
            ],
        )
        .unwrap();
        assert!((test.total_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(validate_test(0, vec![entry(1, 0.0, 0.0, None)]), Err(ScoreError::InvalidTestMax));
        assert_eq!(validate_test(100, Vec::new()), Err(ScoreError::NoSubjects));
        assert_eq!(
            validate_test(100, vec![entry(1, 1.0, 0.0, Some(50)), entry(1, 1.0, 0.0, Some(50))]),
            Err(ScoreError::DuplicateSubject(1))
        );
        assert_eq!(
            validate_test(100, vec![entry(1, 1.0, -1.0, None)]),
            Err(ScoreError::NegativeMarks { subject_id: 1 })
        );
    }

    #[test]
    fn test_equal_split() {
        assert_eq!(equal_split(100, 3), vec![34, 33, 33]);
        assert_eq!(equal_split(300, 3), vec![100, 100, 100]);
        assert_eq!(equal_split(101, 3), vec![34, 34, 33]);
        assert_eq!(equal_split(2, 3), vec![1, 1, 0]);
        assert!(equal_split(100, 0).is_empty());
        assert_eq!(equal_split(100, 3).iter().sum::<i64>(), 100);
    }

    fn mock(id: &str, day: &str, max: i64, subjects: Vec<(i64, f64, Option<i64>)>) -> MockTestWithSubjects {
        MockTestWithSubjects {
            test: MockTest {
                id: id.to_string(),
                user_id: "u1".to_string(),
                title: format!("Mock {id}"),
                test_date: day.parse().unwrap(),
                max_score: max,
                total_score: subjects.iter().map(|s| s.1).sum(),
                notes: None,
                created_at: Utc::now(),
            },
            subjects: subjects
                .into_iter()
                .enumerate()
                .map(|(i, (subject_id, score, max_score))| MockTestSubject {
                    id: i as i64,
                    mock_test_id: id.to_string(),
                    subject_id,
                    score,
                    negative_marks: 0.0,
                    max_score,
                    coverage: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_series_sorted_by_date() {
        let tests = vec![
            mock("b", "2024-02-01", 100, vec![(1, 80.0, None)]),
            mock("a", "2024-01-01", 200, vec![(1, 50.0, Some(100)), (2, 50.0, Some(100))]),
        ];
        let points = score_series(&tests, None);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].test_id, "a");
        assert_eq!(points[0].percentage, 50);
        assert_eq!(points[1].percentage, 80);
    }

    #[test]
    fn test_series_subject_filter_and_estimate() {
        let tests = vec![
            mock("a", "2024-01-01", 300, vec![(1, 60.0, Some(120)), (2, 30.0, Some(180))]),
            mock("b", "2024-01-08", 300, vec![(1, 75.0, None), (2, 30.0, None), (3, 0.0, None)]),
            mock("c", "2024-01-15", 100, vec![(2, 30.0, None)]),
        ];
        let points = score_series(&tests, Some(1));
        assert_eq!(points.len(), 2, "test c has no subject 1");
        assert_eq!(points[0].percentage, 50);
        assert!(!points[0].estimated_max);
        assert_eq!(points[1].max_score, 100.0);
        assert_eq!(points[1].percentage, 75);
        assert!(points[1].estimated_max);
    }
}
