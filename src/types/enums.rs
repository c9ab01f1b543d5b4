use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declares a closed set of snake_case string values shared by the API and
/// the database columns.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Converts a stored or submitted string to its variant.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| {
                    let allowed: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                    format!("invalid {} '{s}', expected one of: {}", stringify!($name), allowed.join(", "))
                })
            }
        }
    };
}

string_enum!(
    /// Status shared by topic progress and revision entries.
    ProgressStatus {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
    }
);

string_enum!(
    Confidence {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

string_enum!(
    Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

string_enum!(
    /// Why a topic landed in the backlog.
    BacklogKind {
        Concept => "concept",
        Practice => "practice",
        Forgetting => "forgetting",
    }
);

string_enum!(
    Role {
        Admin => "admin",
        Student => "student",
    }
);

string_enum!(
    /// Class level a topic applies to, or a student is currently in.
    ClassLevel {
        Class11 => "class_11",
        Class12 => "class_12",
    }
);

string_enum!(
    /// View filter for loading the syllabus tree.
    SyllabusScope {
        Class11 => "class_11",
        Class12 => "class_12",
        Whole => "whole",
    }
);

string_enum!(
    /// Named syllabus presets a mock-test subject can declare as its coverage.
    NamedScope {
        Class11 => "class_11",
        Class12 => "class_12",
        Full => "full",
    }
);

impl SyllabusScope {
    /// The class level this scope filters on, or `None` for the whole syllabus.
    #[must_use]
    pub const fn level(self) -> Option<ClassLevel> {
        match self {
            SyllabusScope::Class11 => Some(ClassLevel::Class11),
            SyllabusScope::Class12 => Some(ClassLevel::Class12),
            SyllabusScope::Whole => None,
        }
    }
}

impl From<ClassLevel> for SyllabusScope {
    fn from(level: ClassLevel) -> Self {
        match level {
            ClassLevel::Class11 => SyllabusScope::Class11,
            ClassLevel::Class12 => SyllabusScope::Class12,
        }
    }
}

impl ClassLevel {
    /// Numeric grade used by clients ("current level" 11 or 12).
    #[must_use]
    pub const fn grade(self) -> i64 {
        match self {
            ClassLevel::Class11 => 11,
            ClassLevel::Class12 => 12,
        }
    }

    pub fn from_grade(grade: i64) -> Option<Self> {
        match grade {
            11 => Some(ClassLevel::Class11),
            12 => Some(ClassLevel::Class12),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(
            ProgressStatus::parse("completed"),
            Some(ProgressStatus::Completed)
        );
        assert_eq!(ProgressStatus::parse("done"), None);
    }

    #[test]
    fn test_from_str_error_lists_values() {
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(err.contains("low, medium, high"));
    }

    #[test]
    fn test_serde_uses_snake_case_strings() {
        let json = serde_json::to_string(&BacklogKind::Forgetting).unwrap();
        assert_eq!(json, "\"forgetting\"");
        let scope: NamedScope = serde_json::from_str("\"class_12\"").unwrap();
        assert_eq!(scope, NamedScope::Class12);
    }

    #[test]
    fn test_scope_level() {
        assert_eq!(SyllabusScope::Class11.level(), Some(ClassLevel::Class11));
        assert_eq!(SyllabusScope::Whole.level(), None);
        assert_eq!(ClassLevel::from_grade(12), Some(ClassLevel::Class12));
        assert_eq!(ClassLevel::from_grade(10), None);
    }
}
