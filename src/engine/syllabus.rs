//! Assembles the Subject → Unit → Topic tree from flat rows.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Subject, SyllabusScope, Topic, Unit};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitNode {
    #[serde(flatten)]
    pub unit: Unit,
    pub topics: Vec<Topic>,
}

impl UnitNode {
    pub fn topic_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.topics.iter().map(|t| t.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectNode {
    #[serde(flatten)]
    pub subject: Subject,
    pub units: Vec<UnitNode>,
}

impl SubjectNode {
    pub fn topic_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.units.iter().flat_map(UnitNode::topic_ids)
    }
}

/// All topic ids of a tree, in tree order.
pub fn tree_topic_ids(tree: &[SubjectNode]) -> Vec<i64> {
    tree.iter().flat_map(SubjectNode::topic_ids).collect()
}

/// All units of a tree, in tree order.
pub fn tree_units(tree: &[SubjectNode]) -> Vec<&UnitNode> {
    tree.iter().flat_map(|s| s.units.iter()).collect()
}

/// Nests the flat rows into a tree sorted by `(order, id)`.
///
/// A class scope keeps only topics flagged for that class and prunes units
/// left without topics, then subjects left without units. The whole scope
/// keeps empty containers.
pub fn build_tree(
    mut subjects: Vec<Subject>,
    units: Vec<Unit>,
    topics: Vec<Topic>,
    scope: SyllabusScope,
) -> Vec<SubjectNode> {
    let level = scope.level();

    let mut topics_by_unit: HashMap<i64, Vec<Topic>> = HashMap::new();
    for topic in topics {
        if level.is_some_and(|l| !topic.applies_to(l)) {
            continue;
        }
        topics_by_unit.entry(topic.unit_id).or_default().push(topic);
    }

    let mut units_by_subject: HashMap<i64, Vec<UnitNode>> = HashMap::new();
    for unit in units {
        let mut topics = topics_by_unit.remove(&unit.id).unwrap_or_default();
        if level.is_some() && topics.is_empty() {
            continue;
        }
        topics.sort_by_key(|t| (t.order, t.id));
        units_by_subject
            .entry(unit.subject_id)
            .or_default()
            .push(UnitNode { unit, topics });
    }

    subjects.sort_by_key(|s| s.id);
    subjects
        .into_iter()
        .filter_map(|subject| {
            let mut units = units_by_subject.remove(&subject.id).unwrap_or_default();
            if level.is_some() && units.is_empty() {
                return None;
            }
            units.sort_by_key(|u| (u.unit.order, u.unit.id));
            Some(SubjectNode { subject, units })
        })
        .collect()
}
