use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::ClassLevel;

const CANONICAL_SYLLABUS: &str = include_str!("syllabus.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSyllabus {
    pub subjects: Vec<SeedSubject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSubject {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub units: Vec<SeedUnit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUnit {
    pub name: String,
    pub levels: Vec<ClassLevel>,
    #[serde(default)]
    pub topics: Vec<SeedTopic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTopic {
    pub name: String,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub weightage: Option<String>,
    #[serde(default)]
    pub levels: Option<Vec<ClassLevel>>,
}

impl SeedTopic {
    /// The topic's own levels, or its unit's when it has none.
    #[must_use]
    pub fn effective_levels<'a>(&'a self, unit: &'a SeedUnit) -> &'a [ClassLevel] {
        self.levels.as_deref().unwrap_or(&unit.levels)
    }
}

impl SeedSyllabus {
    /// The syllabus shipped with the binary.
    pub fn canonical() -> Result<Self> {
        Self::parse(CANONICAL_SYLLABUS)
    }

    pub fn parse(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::Config(format!("invalid syllabus data: {e}")))
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.subjects
            .iter()
            .flat_map(|s| &s.units)
            .map(|u| u.topics.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_syllabus_parses() {
        let seed = SeedSyllabus::canonical().unwrap();
        assert_eq!(seed.subjects.len(), 3);
        assert!(seed.topic_count() > 40);
    }

    #[test]
    fn test_every_canonical_topic_has_a_level() {
        let seed = SeedSyllabus::canonical().unwrap();
        for unit in seed.subjects.iter().flat_map(|s| &s.units) {
            for topic in &unit.topics {
                assert!(
                    !topic.effective_levels(unit).is_empty(),
                    "{} has no class level",
                    topic.name
                );
            }
        }
    }

    #[test]
    fn test_topic_levels_override_unit() {
        let seed = SeedSyllabus::parse(
            r#"
            [[subjects]]
            name = "Mathematics"

            [[subjects.units]]
            name = "Calculus"
            levels = ["class_12"]
            topics = [
                { name = "Limits", levels = ["class_11", "class_12"] },
                { name = "Integrals" },
            ]
            "#,
        )
        .unwrap();
        let unit = &seed.subjects[0].units[0];
        assert_eq!(
            unit.topics[0].effective_levels(unit),
            &[ClassLevel::Class11, ClassLevel::Class12]
        );
        assert_eq!(unit.topics[1].effective_levels(unit), &[ClassLevel::Class12]);
    }

    #[test]
    fn test_invalid_level_is_config_error() {
        let result = SeedSyllabus::parse(
            r#"
            [[subjects]]
            name = "Physics"

            [[subjects.units]]
            name = "Optics"
            levels = ["class_13"]
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
