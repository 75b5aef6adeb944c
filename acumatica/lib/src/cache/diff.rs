use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome of comparing one component category against a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentDiff {
    /// Same hash as the snapshot; reused as-is.
    pub retained: Vec<String>,
    /// Changed or new; generated again from the live schema.
    pub regenerated: Vec<String>,
    /// In the snapshot but gone from the live schema.
    pub removed: Vec<String>,
}

impl ComponentDiff {
    pub fn counts(&self) -> ComponentCounts {
        ComponentCounts {
            retained: self.retained.len(),
            regenerated: self.regenerated.len(),
            removed: self.removed.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComponentCounts {
    pub retained: usize,
    pub regenerated: usize,
    pub removed: usize,
}

/// Diffs per-component hashes, all lists in name order.
pub fn diff_components(
    previous: &BTreeMap<String, u64>,
    current: &BTreeMap<String, u64>,
) -> ComponentDiff {
    let mut diff = ComponentDiff::default();
    for (name, hash) in current {
        match previous.get(name) {
            Some(old) if old == hash => diff.retained.push(name.clone()),
            _ => diff.regenerated.push(name.clone()),
        }
    }
    diff.removed = previous
        .keys()
        .filter(|name| !current.contains_key(*name))
        .cloned()
        .collect();
    diff
}
