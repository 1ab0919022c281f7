//! The attribute-bearing entity.
//!
//! An [`Aggregate`] is a cheap, cloneable handle to one instance of a
//! [`Schema`]. It is usable alone, nested inside another aggregate, or as the
//! root of a [`Container`](super::Container).
//!
//! ## Lifecycle of one attribute
//!
//! ```text
//!   get / set ──► first access? ──yes──► load (backing map | default)
//!                      │                       │
//!                      no                      ▼
//!                      │               adopt children, load hooks (once)
//!                      ▼                       │
//!                 current value ◄──────────────┘
//! ```
//!
//! Handles share state: cloning an `Aggregate` gives another handle to the
//! same instance. Borrows of the shared state are never held while handlers,
//! hooks, children or owners run, so any of them may call back in.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::attribute::AttributeHandler;
use crate::model::{Errors, ForeignKeyReference, JsonMap, Value};
use crate::store::{ChangeSet, Host, HookPoint, MissingKeyPolicy, Schema};
use crate::store::state::AttributeStore;
use crate::{Error, Result};

struct AggregateInner {
    schema: Arc<Schema>,
    store: AttributeStore,
    decoded: Option<JsonMap>,
    loaded_from_store: bool,
    owner: Option<Weak<RefCell<AggregateInner>>>,
    host: Option<Rc<dyn Host>>,
    errors: Errors,
}

#[derive(Clone)]
pub struct Aggregate(Rc<RefCell<AggregateInner>>);

// ============================================================================
// Construction
// ============================================================================

impl Aggregate {
    /// A new, unsaved instance with no backing map: every attribute starts at
    /// its default.
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self::from_decoded(schema, None, false)
    }

    /// A new instance with each pair assigned in order.
    pub fn with_attributes<I, K, V>(schema: &Arc<Schema>, attributes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let aggregate = Self::new(schema);
        for (name, value) in attributes {
            aggregate.set(name.as_ref(), value)?;
        }
        Ok(aggregate)
    }

    /// A new instance from a JSON object of attribute values.
    pub fn from_map(schema: &Arc<Schema>, map: &JsonMap) -> Result<Self> {
        Self::with_attributes(schema, map.iter().map(|(k, v)| (k, Value::from(v.clone()))))
    }

    /// An instance loaded from storage. Not a new record.
    pub fn from_store(schema: &Arc<Schema>, decoded: JsonMap) -> Self {
        Self::from_decoded(schema, Some(decoded), true)
    }

    /// An instance backed by JSON text. Blank text, `null` and `{}` mean no
    /// backing map. The result counts as a new record.
    pub fn from_json(schema: &Arc<Schema>, text: &str) -> Result<Self> {
        Ok(Self::from_decoded(schema, decode(text)?, false))
    }

    pub(crate) fn from_decoded(
        schema: &Arc<Schema>,
        decoded: Option<JsonMap>,
        loaded_from_store: bool,
    ) -> Self {
        Self(Rc::new(RefCell::new(AggregateInner {
            schema: schema.clone(),
            store: AttributeStore::new(),
            decoded,
            loaded_from_store,
            owner: None,
            host: None,
            errors: Errors::new(),
        })))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_store()?)?)
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.0.borrow().schema.clone()
    }

    pub fn is_new_record(&self) -> bool {
        !self.0.borrow().loaded_from_store
    }

    /// Same instance, not merely equal content.
    pub fn ptr_eq(&self, other: &Aggregate) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn owner(&self) -> Option<Aggregate> {
        self.0.borrow().owner.as_ref().and_then(Weak::upgrade).map(Aggregate)
    }

    /// The top of the owner chain; `self` when unowned.
    pub fn root_owner(&self) -> Aggregate {
        let mut current = self.clone();
        while let Some(owner) = current.owner() {
            current = owner;
        }
        current
    }

    /// Report host-level dirtiness through this aggregate's change queries.
    pub fn attach_host(&self, host: Rc<dyn Host>) {
        self.0.borrow_mut().host = Some(host);
    }

    fn host(&self) -> Option<Rc<dyn Host>> {
        self.0.borrow().host.clone()
    }
}

/// Decode storage text into a backing map.
pub(crate) fn decode(text: &str) -> Result<Option<JsonMap>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<JsonValue>(text)? {
        JsonValue::Null => Ok(None),
        JsonValue::Object(map) if map.is_empty() => Ok(None),
        JsonValue::Object(map) => Ok(Some(map)),
        other => Err(Error::WrongType { attribute: "aggregate store".into(), value: other.to_string() }),
    }
}

// ============================================================================
// Per-attribute operations
// ============================================================================

impl Aggregate {
    fn handler(&self, name: &str) -> Result<Arc<dyn AttributeHandler>> {
        self.0.borrow().schema.require_handler(name)
    }

    /// Current value, loading it on first access.
    pub fn get(&self, name: &str) -> Result<Value> {
        let handler = self.handler(name)?;
        self.load(&handler)
    }

    /// Coerce and assign. Returns the raw value.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<Value> {
        let handler = self.handler(name)?;
        let raw = value.into();
        let coerced = handler.from_value(raw.clone())?;
        let current = self.load(&handler)?;
        if coerced == current {
            return Ok(raw);
        }

        let key = handler.name();
        let initial = self.0.borrow().store.initial(key).cloned();
        let differs_from_initial = initial.is_none_or(|initial| coerced != initial);
        self.adopt(&coerced);
        self.0.borrow_mut().store.record_assignment(key, raw.clone(), coerced, differs_from_initial);
        self.refresh_changed();
        Ok(raw)
    }

    /// Dirty since load, or holding a child that is.
    pub fn attribute_changed(&self, name: &str) -> Result<bool> {
        let handler = self.handler(name)?;
        Ok(self.key_changed(handler.name()))
    }

    fn key_changed(&self, key: &str) -> bool {
        let (dirty, value) = {
            let inner = self.0.borrow();
            (inner.store.is_dirty(key), inner.store.current(key).cloned())
        };
        dirty || value.is_some_and(|v| v.aggregates().iter().any(Aggregate::changed))
    }

    /// The raw value of the last assignment, or the loaded value.
    pub fn before_type_cast(&self, name: &str) -> Result<Value> {
        let handler = self.handler(name)?;
        self.load(&handler)?;
        let inner = self.0.borrow();
        let key = handler.name();
        Ok(inner.store.before_cast(key).or(inner.store.initial(key)).cloned().unwrap_or(Value::Null))
    }

    /// Build a fresh value of the attribute's type and assign it.
    pub fn build(&self, name: &str, args: impl Into<Value>) -> Result<Value> {
        let handler = self.handler(name)?;
        let built = handler.build(args.into())?;
        self.set(name, built.clone())?;
        Ok(built)
    }

    /// Changed in the last finalized commit, directly or through a child.
    pub fn saved_change_to(&self, name: &str) -> Result<bool> {
        let handler = self.handler(name)?;
        self.ensure_saved_changes_up_to_date()?;
        let key = handler.name();
        let (in_snapshot, value) = {
            let inner = self.0.borrow();
            (inner.store.saved_changes().contains(key), inner.store.current(key).cloned())
        };
        if in_snapshot {
            return Ok(true);
        }
        for child in value.map(|v| v.aggregates()).unwrap_or_default() {
            if child.saved_changes()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn is_loaded(&self, name: &str) -> Result<bool> {
        let handler = self.handler(name)?;
        Ok(self.0.borrow().store.is_loaded(handler.name()))
    }

    /// The reference held by a belongs-to attribute, by either of its names.
    pub fn reference(&self, name: &str) -> Result<Option<ForeignKeyReference>> {
        Ok(self.get(name)?.as_reference().cloned())
    }

    /// Name → value for every attribute, nested aggregates expanded.
    pub fn attributes(&self) -> Result<JsonMap> {
        let schema = self.schema();
        let mut map = JsonMap::new();
        for handler in schema.handlers() {
            let value = self.load(handler)?;
            let json = match &value {
                Value::Aggregate(child) => JsonValue::Object(child.attributes()?),
                _ => handler.to_store(&value)?,
            };
            map.insert(handler.name().to_owned(), json);
        }
        Ok(map)
    }

    fn load(&self, handler: &Arc<dyn AttributeHandler>) -> Result<Value> {
        let key = handler.name();
        if let Some(value) = self.0.borrow().store.current(key) {
            return Ok(value.clone());
        }

        let value = match self.stored_value(key) {
            Some(stored) => handler.from_store(&stored)?,
            None => handler.default(),
        };
        self.adopt(&value);
        self.0.borrow_mut().store.record_load(key, value);
        tracing::trace!(attribute = key, "attribute loaded");

        self.notify_if_first_access()?;
        Ok(self.0.borrow().store.current(key).cloned().unwrap_or(Value::Null))
    }

    /// `None` means "use the default".
    fn stored_value(&self, key: &str) -> Option<JsonValue> {
        let inner = self.0.borrow();
        let decoded = inner.decoded.as_ref()?;
        match decoded.get(key) {
            Some(stored) => Some(stored.clone()),
            None => match inner.schema.missing_key_policy() {
                MissingKeyPolicy::UseDefault => None,
                MissingKeyPolicy::TreatAsNull => Some(JsonValue::Null),
            },
        }
    }

    fn adopt(&self, value: &Value) {
        for child in value.aggregates() {
            child.0.borrow_mut().owner = Some(Rc::downgrade(&self.0));
        }
    }

    fn notify_if_first_access(&self) -> Result<()> {
        if !self.0.borrow_mut().store.begin_load_notification() {
            return Ok(());
        }
        let schema = self.schema();
        for point in [HookPoint::CheckSchema, HookPoint::Loaded] {
            let hooks = schema.hooks(point);
            if !hooks.is_empty() {
                tracing::debug!(schema = %schema.name(), ?point, hooks = hooks.len(), "running load hooks");
            }
            for hook in hooks {
                hook(self)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Instance change tracking
// ============================================================================

impl Aggregate {
    /// Host-level dirtiness or the instance flag.
    pub fn changed(&self) -> bool {
        let flag = self.0.borrow().store.changed();
        self.host().is_some_and(|host| host.changed()) || flag
    }

    /// Like [`changed`](Self::changed), but only meaningful with a host.
    pub fn changed_for_autosave(&self) -> Result<bool> {
        let host = self.host().ok_or_else(|| Error::NoAutosaveHost(self.schema().name().to_owned()))?;
        Ok(host.changed() || self.0.borrow().store.changed())
    }

    pub fn saved_changes(&self) -> Result<bool> {
        self.ensure_saved_changes_up_to_date()?;
        let (changed_on_save, snapshot_empty) = {
            let inner = self.0.borrow();
            (inner.store.changed_on_save(), inner.store.saved_changes().is_empty())
        };
        Ok(self.host().is_some_and(|host| host.saved_changes()) || changed_on_save || !snapshot_empty)
    }

    /// Dirty attributes as (initial, current), in declaration order.
    pub fn attribute_changes(&self) -> ChangeSet {
        let schema = self.schema();
        let inner = self.0.borrow();
        let mut changes = ChangeSet::default();
        for handler in schema.handlers() {
            let key = handler.name();
            if inner.store.is_dirty(key) {
                let before = inner.store.initial(key).cloned().unwrap_or(Value::Null);
                let after = inner.store.current(key).cloned().unwrap_or(Value::Null);
                changes.push(key, before, after);
            }
        }
        changes
    }

    pub fn attribute_saved_changes(&self) -> Result<ChangeSet> {
        self.ensure_saved_changes_up_to_date()?;
        Ok(self.0.borrow().store.saved_changes().clone())
    }

    /// Recompute the instance flag and pass the news up the owner chain.
    fn refresh_changed(&self) {
        let (dirty, children) = {
            let inner = self.0.borrow();
            (inner.store.any_dirty(), inner.store.loaded_aggregates())
        };
        let changed = dirty || children.iter().any(Aggregate::changed);
        let owner = {
            let mut inner = self.0.borrow_mut();
            inner.store.set_changed(changed);
            inner.owner.as_ref().and_then(Weak::upgrade)
        };
        if let Some(owner) = owner {
            Aggregate(owner).refresh_changed();
        }
    }

    fn loaded_children(&self) -> Vec<Aggregate> {
        self.0.borrow().store.loaded_aggregates()
    }

    // ---- commit boundary ----

    /// Mark a save in progress here and in every loaded descendant.
    pub fn start_save(&self) {
        self.0.borrow_mut().store.set_save_in_progress(true);
        for child in self.loaded_children() {
            child.start_save();
        }
    }

    pub fn end_save(&self) {
        self.0.borrow_mut().store.set_save_in_progress(false);
        for child in self.loaded_children() {
            child.end_save();
        }
    }

    /// Capture the saved-changes snapshot from the current dirty diff, here
    /// and in every loaded child.
    pub fn finalize_commit(&self) -> Result<()> {
        let changes = self.attribute_changes();
        let changed = self.0.borrow().store.changed();
        tracing::trace!(schema = %self.schema().name(), changes = changes.len(), "finalizing commit");
        self.0.borrow_mut().store.capture_saved(changed, changes);

        let schema = self.schema();
        for handler in schema.handlers() {
            let value = self.0.borrow().store.current(handler.name()).cloned();
            if let Some(value) = value {
                handler.assign_saved_changes(&value)?;
            }
        }
        Ok(())
    }

    fn ensure_saved_changes_up_to_date(&self) -> Result<()> {
        if self.0.borrow().store.save_in_progress() {
            self.finalize_commit()?;
        }
        Ok(())
    }

    /// Current values become the new initial values, recursively.
    pub fn reset_changes(&self) {
        self.0.borrow_mut().store.rebase();
        for child in self.loaded_children() {
            child.reset_changes();
        }
    }
}

// ============================================================================
// Serialization, validation, comparison
// ============================================================================

impl Aggregate {
    /// Storage form in declaration order. Null attributes with a null default
    /// are left out unless the schema is versioned.
    pub fn to_store(&self) -> Result<JsonMap> {
        let schema = self.schema();
        let versioned = schema.has_schema_version();
        let mut map = JsonMap::new();
        for handler in schema.handlers() {
            let value = self.load(handler)?;
            if versioned || !value.is_null() || !handler.default().is_null() {
                map.insert(handler.name().to_owned(), handler.to_store(&value)?);
            }
        }
        Ok(map)
    }

    /// Run attribute and custom validations. Returns whether none failed.
    pub fn validate(&self) -> Result<bool> {
        let schema = self.schema();
        let new_record = self.is_new_record();
        let mut errors = Errors::new();

        for handler in schema.handlers() {
            let key = handler.name();
            let loaded = self.0.borrow().store.is_loaded(key);
            if new_record || handler.force_validation() || loaded || self.key_changed(key) {
                let value = self.load(handler)?;
                for message in handler.validation_errors(&value) {
                    errors.add(key, message);
                }
            }
        }
        for validator in schema.validators() {
            validator(self, &mut errors)?;
        }

        if !errors.is_empty() {
            tracing::debug!(schema = %schema.name(), errors = errors.len(), "validation failed");
        }
        let valid = errors.is_empty();
        self.0.borrow_mut().errors = errors;
        Ok(valid)
    }

    pub fn valid(&self) -> Result<bool> {
        self.validate()
    }

    /// Messages from the last [`validate`](Self::validate).
    pub fn errors(&self) -> Errors {
        self.0.borrow().errors.clone()
    }

    /// Whether any attribute differs from its default.
    pub fn any_non_default_values(&self) -> Result<bool> {
        let schema = self.schema();
        for handler in schema.handlers() {
            if handler.is_schema_version() {
                continue;
            }
            if self.load(handler)? != handler.default() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Attribute-by-attribute ordering in declaration order. `None` when a pair
    /// of values cannot be ordered or `other` lacks an attribute.
    pub fn compare(&self, other: &Aggregate) -> Result<Option<Ordering>> {
        if self.ptr_eq(other) {
            return Ok(Some(Ordering::Equal));
        }
        let schema = self.schema();
        let other_schema = other.schema();
        for handler in schema.handlers() {
            let Some(other_handler) = other_schema.handler(handler.name()) else {
                return Ok(None);
            };
            let left = self.load(handler)?;
            let right = other.load(other_handler)?;
            match left.sort_cmp(&right)? {
                Some(Ordering::Equal) => continue,
                decided => return Ok(decided),
            }
        }
        Ok(Some(Ordering::Equal))
    }

    /// Indented tree of attribute values.
    pub fn inspect(&self) -> Result<String> {
        self.inspect_at(1)
    }

    fn inspect_at(&self, level: usize) -> Result<String> {
        let schema = self.schema();
        let indent = "    ".repeat(level);
        let mut lines = Vec::with_capacity(schema.handlers().len());
        for handler in schema.handlers() {
            let rendered = match self.load(handler)? {
                Value::Aggregate(child) => format!("\n{}", child.inspect_at(level + 1)?),
                other => other.inspect(),
            };
            lines.push(format!("{indent}:{} => {rendered}", handler.name()));
        }
        Ok(lines.join("\n"))
    }
}

// ============================================================================
// Persistence belongs to the container
// ============================================================================

impl Aggregate {
    pub fn save(&self) -> Result<()> { Err(Error::ForbiddenPersistence { method: "save" }) }
    pub fn save_strict(&self) -> Result<()> { Err(Error::ForbiddenPersistence { method: "save!" }) }
    pub fn create_or_update(&self) -> Result<()> { Err(Error::ForbiddenPersistence { method: "create_or_update" }) }
    pub fn create(&self) -> Result<()> { Err(Error::ForbiddenPersistence { method: "create" }) }
    pub fn update(&self) -> Result<()> { Err(Error::ForbiddenPersistence { method: "update" }) }
    pub fn destroy(&self) -> Result<()> { Err(Error::ForbiddenPersistence { method: "destroy" }) }
}

impl PartialEq for Aggregate {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || matches!(self.compare(other), Ok(Some(Ordering::Equal)))
    }
}

impl PartialOrd for Aggregate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok().flatten()
    }
}

impl fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => f
                .debug_struct("Aggregate")
                .field("schema", &inner.schema.name())
                .field("new_record", &!inner.loaded_from_store)
                .field("changed", &inner.store.changed())
                .finish_non_exhaustive(),
            Err(_) => f.write_str("Aggregate(<in use>)"),
        }
    }
}
