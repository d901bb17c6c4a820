//! Membership diff between two versions of an entity list.
//!
//! Lists are compared by exact string equality and membership, not position:
//! reordering a list yields an empty diff.

use std::collections::HashSet;

use serde::Serialize;

/// The additions and removals between two versions of one entity list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityListDiff {
    /// Values in the new list but not the old one, in new-list order.
    pub added: Vec<String>,
    /// Values in the old list but not the new one, in old-list order.
    pub removed: Vec<String>,
}

impl EntityListDiff {
    /// True when neither side gained nor lost a value.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff `old` against `new`.
///
/// Each value appears at most once in `added` / `removed`, at the position of
/// its first occurrence.
pub fn diff_entity_lists(old: &[String], new: &[String]) -> EntityListDiff {
    EntityListDiff {
        added: missing_from(new, old),
        removed: missing_from(old, new),
    }
}

/// Distinct values of `source` absent from `other`, in `source` order.
fn missing_from(source: &[String], other: &[String]) -> Vec<String> {
    let other: HashSet<&str> = other.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    source
        .iter()
        .filter(|v| !other.contains(v.as_str()) && seen.insert(v.as_str()))
        .cloned()
        .collect()
}
