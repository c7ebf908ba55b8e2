//! Bounded per-data-point history, and pruning of empty branches.

use indexmap::IndexMap;
use serde_json::Value;

use crate::record::Record;
use crate::types::{DataBranch, DataTree, Directive};

/// Default number of records kept per history list.
pub const DEFAULT_RETENTION: usize = 5;

/// Merge records into `tree[location][record.data_name]`, newest first.
///
/// Creates the location and history lists when absent. Each list is
/// truncated to `retention`; overflow is dropped, not archived.
pub fn merge<'a>(
    records: Vec<Record>,
    tree: &'a mut DataTree,
    location: &str,
    retention: usize,
) -> &'a mut DataTree {
    let retention = retention.max(1);
    let branch = tree.entry(location.to_string()).or_default();

    for record in records {
        let history = branch.entry(record.data_name.clone()).or_default();
        history.insert(0, record);
        if history.len() > retention {
            let discarded = history.split_off(retention);
            tracing::debug!(
                location,
                data_name = %history[0].data_name,
                discarded = discarded.len(),
                oldest = %discarded.last().map(|r| r.accessed.as_str()).unwrap_or(""),
                "Discarded history beyond retention"
            );
        }
    }

    tree
}

/// Add an empty branch for every directive name missing from `tree`.
pub fn ensure_branches(tree: &mut DataTree, directives: &IndexMap<String, Directive>) {
    for name in directives.keys() {
        if !tree.contains_key(name) {
            tree.insert(name.clone(), DataBranch::new());
        }
    }
}

/// Values that can tell whether they are an empty mapping.
pub trait EmptyMapping {
    fn is_empty_mapping(&self) -> bool;
}

impl EmptyMapping for Value {
    fn is_empty_mapping(&self) -> bool {
        matches!(self, Value::Object(map) if map.is_empty())
    }
}

impl<K, V> EmptyMapping for IndexMap<K, V> {
    fn is_empty_mapping(&self) -> bool {
        self.is_empty()
    }
}

/// Remove every top-level key whose value is an empty mapping.
///
/// Non-recursive. Empty lists, empty strings and nulls are kept.
pub fn prune<K, V: EmptyMapping>(tree: &mut IndexMap<K, V>) -> &mut IndexMap<K, V> {
    tree.retain(|_, v| !v.is_empty_mapping());
    tree
}

/// [`prune`] for a raw JSON object.
pub fn prune_json(tree: &mut serde_json::Map<String, Value>) -> &mut serde_json::Map<String, Value> {
    tree.retain(|_, v| !v.is_empty_mapping());
    tree
}
