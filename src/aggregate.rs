//! Failure-mode tag parsing and counting.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureModeCount {
    pub label: String,
    pub count: u64,
}

/// Split a comma-separated tag field into trimmed, non-empty labels.
pub fn parse_labels(failure_modes: &str) -> impl Iterator<Item = &str> {
    failure_modes
        .split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

pub fn has_failures(failure_modes: &str) -> bool {
    parse_labels(failure_modes).next().is_some()
}

/// Count every label occurrence across the given tag fields, in first-seen
/// order. A label repeated within one field counts each time.
pub fn count_failure_modes<'a, I>(fields: I) -> Vec<FailureModeCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<FailureModeCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for field in fields {
        for label in parse_labels(field) {
            match index.get(label) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(label.to_string(), counts.len());
                    counts.push(FailureModeCount {
                        label: label.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }
    counts
}

/// Sorted set of all distinct labels, used for export column headers.
pub fn distinct_labels<'a, I>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let set: BTreeSet<&str> = fields.into_iter().flat_map(parse_labels).collect();
    set.into_iter().map(String::from).collect()
}
