//! # Attribute Handlers
//!
//! One handler per declared attribute, shared by every instance of a schema.
//! A handler is a strategy object with three conversions:
//!
//! | Conversion | Direction | Used by |
//! |------------|-----------|---------|
//! | `from_value` | raw user input → typed value | `Aggregate::set` |
//! | `from_store` | decoded JSON → typed value | first access of a loaded aggregate |
//! | `to_store` | typed value → JSON | `Aggregate::to_store` |
//!
//! plus `default`, `validation_errors` and the commit-time hook
//! `assign_saved_changes` for attribute-bearing values.
//!
//! Handlers are built through [`factory`], which validates the declared
//! [`Options`] against each handler's allow-list.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

use crate::model::{Scalar, Value};
use crate::{Error, Result};

pub mod bitfield;
pub mod boolean;
pub mod datetime;
pub mod decimal;
pub mod enumeration;
pub mod factory;
pub mod float;
pub mod foreign_key;
pub mod hash;
pub mod integer;
pub mod list;
pub mod nested;
pub mod schema_version;
pub mod string;

pub use factory::{AttributeType, IntoAttributeType, belongs_to_factory, factory, has_many_factory};

/// Validation messages for one attribute. Almost always zero or one.
pub type ValidationErrors = SmallVec<[String; 2]>;

// ============================================================================
// Handler trait
// ============================================================================

pub trait AttributeHandler: fmt::Debug + Send + Sync {
    /// Storage key of the attribute.
    fn name(&self) -> &str;

    fn options(&self) -> &Options;

    /// Coerce a raw assigned value.
    fn from_value(&self, value: Value) -> Result<Value>;

    /// Decode a value read from the backing map.
    fn from_store(&self, stored: &JsonValue) -> Result<Value>;

    /// Encode a value for the backing map.
    fn to_store(&self, value: &Value) -> Result<JsonValue>;

    /// Fresh default value, produced on every call.
    fn default(&self) -> Value {
        self.options().default_value()
    }

    fn validation_errors(&self, value: &Value) -> ValidationErrors {
        common_validation(self.options(), value)
    }

    fn force_validation(&self) -> bool {
        self.options().force_validation
    }

    /// Construct a new value of this attribute's type from `args`.
    fn build(&self, args: Value) -> Result<Value> {
        self.from_value(args)
    }

    /// Let attribute-bearing values finalize their saved-changes snapshot.
    fn assign_saved_changes(&self, _value: &Value) -> Result<()> {
        Ok(())
    }

    fn is_schema_version(&self) -> bool {
        false
    }
}

/// Null and `required` ⇒ "must be set"; present, `limit` allow-list set and
/// not a member ⇒ "is not in list".
pub fn common_validation(options: &Options, value: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if value.is_null() {
        if options.required {
            errors.push("must be set".to_owned());
        }
    } else if let Some(Limit::Values(allowed)) = &options.limit {
        if !allowed.iter().any(|candidate| candidate.matches(value)) {
            let listed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            errors.push(format!(
                "is not in list ({} not in [{}])",
                value.inspect(),
                listed.join(", ")
            ));
        }
    }
    errors
}

pub(crate) fn wrong_type(attribute: &str, value: &Value) -> Error {
    Error::WrongType { attribute: attribute.to_owned(), value: value.inspect() }
}

// ============================================================================
// Options
// ============================================================================

/// Produces a default value each time it is called.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Custom datetime encoder.
pub type Formatter = Arc<dyn Fn(&DateTime<FixedOffset>) -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Limit {
    /// Allow-list for scalar attributes.
    Values(Vec<Scalar>),
    /// Maximum number of slots for bitfields.
    Length(usize),
}

impl From<usize> for Limit {
    fn from(v: usize) -> Self { Limit::Length(v) }
}

impl<T: Into<Scalar>> From<Vec<T>> for Limit {
    fn from(v: Vec<T>) -> Self { Limit::Values(v.into_iter().map(Into::into).collect()) }
}

/// Backing store the serialized field lives in; changes some encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Relational,
    Elasticsearch,
}

/// Declared attribute options.
///
/// Built fluently; every option set is remembered by name so handlers can
/// reject options they do not understand.
#[derive(Clone, Default)]
pub struct Options {
    keys: Vec<&'static str>,
    pub(crate) default: Option<DefaultFactory>,
    pub(crate) limit: Option<Limit>,
    pub(crate) required: bool,
    pub(crate) force_validation: bool,
    pub(crate) size: Option<usize>,
    pub(crate) encrypted: bool,
    pub(crate) format: Option<String>,
    pub(crate) formatter: Option<Formatter>,
    pub(crate) scale: Option<i64>,
    pub(crate) store_hash_as_json: Option<bool>,
    pub(crate) mapping: Option<Vec<(char, Scalar)>>,
    pub(crate) collapse_errors: bool,
    pub(crate) storage_type: Option<StorageType>,
}

/// Options every handler accepts.
pub const COMMON_OPTIONS: &[&str] = &["default", "limit", "required", "force_validation", "storage_type"];

impl Options {
    pub fn new() -> Self { <Self as Default>::default() }

    fn mark(mut self, key: &'static str) -> Self {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    pub fn keys(&self) -> &[&'static str] { &self.keys }
    pub fn has(&self, key: &str) -> bool { self.keys.contains(&key) }

    /// Literal default; cloned into a fresh value on every access.
    pub fn default<V>(self, value: V) -> Self
    where
        V: Into<Value> + Clone + Send + Sync + 'static,
    {
        self.default_with(move || value.clone().into())
    }

    /// Default computed by a closure on every access.
    pub fn default_with(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(f));
        self.mark("default")
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self.mark("limit")
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.mark("required")
    }

    pub fn force_validation(mut self) -> Self {
        self.force_validation = true;
        self.mark("force_validation")
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self.mark("size")
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self.mark("encrypted")
    }

    /// strftime pattern, or one of the named formats `short`, `long`, `db`.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self.mark("format")
    }

    pub fn formatter(
        mut self,
        f: impl Fn(&DateTime<FixedOffset>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Some(Arc::new(f));
        self.mark("formatter")
    }

    pub fn scale(mut self, scale: i64) -> Self {
        self.scale = Some(scale);
        self.mark("scale")
    }

    pub fn store_hash_as_json(mut self, as_json: bool) -> Self {
        self.store_hash_as_json = Some(as_json);
        self.mark("store_hash_as_json")
    }

    pub fn mapping<I, S>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (char, S)>,
        S: Into<Scalar>,
    {
        self.mapping = Some(mapping.into_iter().map(|(c, v)| (c, v.into())).collect());
        self.mark("mapping")
    }

    pub fn collapse_errors(mut self) -> Self {
        self.collapse_errors = true;
        self.mark("collapse_errors")
    }

    pub fn storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = Some(storage_type);
        self.mark("storage_type")
    }

    /// Removes `collapse_errors`, returning whether it was set. Used when
    /// splitting list options from element options.
    pub(crate) fn take_collapse_errors(&mut self) -> bool {
        self.keys.retain(|k| *k != "collapse_errors");
        std::mem::take(&mut self.collapse_errors)
    }

    pub(crate) fn default_value(&self) -> Value {
        self.default.as_ref().map_or(Value::Null, |f| f())
    }

    pub(crate) fn is_elasticsearch(&self) -> bool {
        self.storage_type == Some(StorageType::Elasticsearch)
    }

    /// Fail on the first option outside `COMMON_OPTIONS` and `extra`.
    pub(crate) fn assert_valid_keys(
        &self,
        handler: &'static str,
        attribute: &str,
        extra: &[&str],
    ) -> Result<()> {
        match self
            .keys
            .iter()
            .find(|key| !COMMON_OPTIONS.contains(key) && !extra.contains(key))
        {
            Some(key) => Err(Error::UnknownOption {
                attribute: attribute.to_owned(),
                handler,
                option: (*key).to_owned(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("keys", &self.keys)
            .field("limit", &self.limit)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        let options = Options::new().required();
        assert_eq!(common_validation(&options, &Value::Null).as_slice(), ["must be set"]);
        assert!(common_validation(&options, &Value::from("x")).is_empty());
    }

    #[test]
    fn test_limit_allow_list() {
        let options = Options::new().limit(vec![Scalar::symbol("red"), Scalar::symbol("blue")]);
        assert!(common_validation(&options, &Value::symbol("red")).is_empty());
        assert_eq!(
            common_validation(&options, &Value::symbol("azure")).as_slice(),
            ["is not in list (:azure not in [:red, :blue])"]
        );
        assert!(common_validation(&options, &Value::Null).is_empty());
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let options = Options::new().size(4).scale(2);
        let err = options.assert_valid_keys("string", "name", &["size"]).unwrap_err();
        assert_eq!(err.to_string(), "unknown option 'scale' for string attribute 'name'");
    }

    #[test]
    fn test_default_is_fresh_per_call() {
        let options = Options::new().default_with(|| Value::List(vec![]));
        assert_eq!(options.default_value(), Value::List(vec![]));
        assert_eq!(Options::new().default_value(), Value::Null);
    }

    #[test]
    fn test_take_collapse_errors() {
        let mut options = Options::new().collapse_errors().required();
        assert!(options.take_collapse_errors());
        assert_eq!(options.keys(), ["required"]);
        assert!(!options.take_collapse_errors());
    }
}
