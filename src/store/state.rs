//! Per-instance attribute state.
//!
//! Four parallel maps keyed by attribute name. An entry exists only once the
//! attribute has been touched (read or written) in this instance's lifetime:
//!
//! | Map | Holds |
//! |-----|-------|
//! | `current` | value returned by `get` |
//! | `initial` | value at first access, or at the last rebase |
//! | `before_cast` | raw value of the last assignment |
//! | `changes` | `current != initial`, recomputed at every write |
//!
//! This type is pure bookkeeping. It never calls handlers, hooks or other
//! aggregates; [`Aggregate`](super::Aggregate) does that around it.

use hashbrown::HashMap;

use crate::model::Value;
use crate::store::Aggregate;

/// One attribute's change: value before, value after.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub before: Value,
    pub after: Value,
}

/// Changed attributes in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<(String, Change)>,
}

impl ChangeSet {
    pub fn push(&mut self, name: impl Into<String>, before: Value, after: Value) {
        self.entries.push((name.into(), Change { before, after }));
    }

    pub fn get(&self, name: &str) -> Option<&Change> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }
}

#[derive(Debug, Default)]
pub struct AttributeStore {
    current: HashMap<String, Value>,
    initial: HashMap<String, Value>,
    before_cast: HashMap<String, Value>,
    changes: HashMap<String, bool>,

    changed: bool,
    load_notified: bool,
    save_in_progress: bool,
    changed_on_save: bool,
    saved_changes: ChangeSet,
}

impl AttributeStore {
    pub fn new() -> Self { Self::default() }

    // ---- per attribute ----

    pub fn is_loaded(&self, name: &str) -> bool { self.initial.contains_key(name) }
    pub fn current(&self, name: &str) -> Option<&Value> { self.current.get(name) }
    pub fn initial(&self, name: &str) -> Option<&Value> { self.initial.get(name) }
    pub fn before_cast(&self, name: &str) -> Option<&Value> { self.before_cast.get(name) }
    pub fn is_dirty(&self, name: &str) -> bool { self.changes.get(name).copied().unwrap_or(false) }

    /// First access: the loaded value becomes both current and initial.
    pub fn record_load(&mut self, name: &str, value: Value) {
        self.initial.insert(name.to_owned(), value.clone());
        self.current.insert(name.to_owned(), value);
    }

    /// An assignment that changed the current value. `differs_from_initial`
    /// is computed by the caller, outside any borrow of the owning aggregate.
    pub fn record_assignment(&mut self, name: &str, raw: Value, coerced: Value, differs_from_initial: bool) {
        self.before_cast.insert(name.to_owned(), raw);
        self.current.insert(name.to_owned(), coerced);
        self.changes.insert(name.to_owned(), differs_from_initial);
    }

    pub fn any_dirty(&self) -> bool { self.changes.values().any(|&c| c) }

    /// Attribute-bearing values currently held, in no particular order.
    pub fn loaded_aggregates(&self) -> Vec<Aggregate> {
        self.current.values().flat_map(Value::aggregates).collect()
    }

    // ---- instance flags ----

    pub fn changed(&self) -> bool { self.changed }
    pub fn set_changed(&mut self, changed: bool) { self.changed = changed }

    /// True exactly once: the first time it is called.
    pub fn begin_load_notification(&mut self) -> bool {
        !std::mem::replace(&mut self.load_notified, true)
    }

    pub fn save_in_progress(&self) -> bool { self.save_in_progress }
    pub fn set_save_in_progress(&mut self, in_progress: bool) { self.save_in_progress = in_progress }

    pub fn changed_on_save(&self) -> bool { self.changed_on_save }
    pub fn saved_changes(&self) -> &ChangeSet { &self.saved_changes }

    pub fn capture_saved(&mut self, changed: bool, changes: ChangeSet) {
        self.changed_on_save = changed;
        self.saved_changes = changes;
        self.save_in_progress = false;
    }

    /// Commit-time rebase: current values become the new initial values.
    pub fn rebase(&mut self) {
        self.initial = self.current.clone();
        self.before_cast.clear();
        self.changes.clear();
        self.changed = false;
    }
}
