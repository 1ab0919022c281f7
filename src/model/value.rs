//! Dynamic value type held by every attribute.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value as JsonValue;

use super::{Bitfield, ForeignKeyReference, PersistedRecord};
use crate::Result;
use crate::store::Aggregate;

/// A decoded JSON object, kept in insertion order.
pub type JsonMap = serde_json::Map<String, JsonValue>;

/// Attribute value.
///
/// Covers everything a handler can produce:
/// - Scalars: Null, Bool, Int, Float, String, Symbol
/// - Typed: DateTime, Decimal, Map, Bitfield
/// - Composite: List, Aggregate
/// - External: Reference (lazy id), Record (a resolved host entity)
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Symbol(String),
    DateTime(DateTime<FixedOffset>),
    Decimal(BigDecimal),
    Map(JsonMap),
    Bitfield(Bitfield),
    List(Vec<Value>),
    Aggregate(Aggregate),
    Reference(ForeignKeyReference),
    Record(Rc<dyn PersistedRecord>),
}

// ============================================================================
// Scalar
// ============================================================================

/// The hashable subset of [`Value`], used where values must be table keys:
/// bitfield mappings and `limit` allow-lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Symbol(String),
}

impl Scalar {
    pub fn symbol(name: impl Into<String>) -> Self { Scalar::Symbol(name.into()) }

    pub fn from_value(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(i) => Some(Scalar::Int(*i)),
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Symbol(s) => Some(Scalar::Symbol(s.clone())),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        Scalar::from_value(value).as_ref() == Some(self)
    }
}

impl From<bool> for Scalar { fn from(v: bool) -> Self { Scalar::Bool(v) } }
impl From<i32> for Scalar { fn from(v: i32) -> Self { Scalar::Int(v as i64) } }
impl From<i64> for Scalar { fn from(v: i64) -> Self { Scalar::Int(v) } }
impl From<&str> for Scalar { fn from(v: &str) -> Self { Scalar::Str(v.to_owned()) } }
impl From<String> for Scalar { fn from(v: String) -> Self { Scalar::Str(v) } }

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        match v {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Str(s) => Value::String(s),
            Scalar::Symbol(s) => Value::Symbol(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Str(s) => write!(f, "{s:?}"),
            Scalar::Symbol(s) => write!(f, ":{s}"),
        }
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn symbol(name: impl Into<String>) -> Self { Value::Symbol(name.into()) }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::DateTime(_) => "datetime",
            Value::Decimal(_) => "decimal",
            Value::Map(_) => "hash",
            Value::Bitfield(_) => "bitfield",
            Value::List(_) => "list",
            Value::Aggregate(_) => "aggregate",
            Value::Reference(_) => "reference",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    /// Null, whitespace-only strings and empty collections.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) | Value::Symbol(s) => s.trim().is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Bitfield(b) => b.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&JsonMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_bitfield(&self) -> Option<&Bitfield> {
        match self {
            Value::Bitfield(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&Aggregate> {
        match self {
            Value::Aggregate(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ForeignKeyReference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Attribute-bearing values held directly by this value: the value itself
    /// when it is an aggregate, or the aggregate elements of a list.
    pub fn aggregates(&self) -> Vec<Aggregate> {
        match self {
            Value::Aggregate(a) => vec![a.clone()],
            Value::List(items) => items.iter().filter_map(|v| v.as_aggregate().cloned()).collect(),
            _ => Vec::new(),
        }
    }

    /// Debug-style rendering used in validation messages.
    pub fn inspect(&self) -> String {
        match self {
            Value::String(s) => format!("{s:?}"),
            Value::Symbol(s) => format!(":{s}"),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::inspect).collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<u32> for Value { fn from(v: u32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<BigDecimal> for Value { fn from(v: BigDecimal) -> Self { Value::Decimal(v) } }
impl From<DateTime<FixedOffset>> for Value { fn from(v: DateTime<FixedOffset>) -> Self { Value::DateTime(v) } }
impl From<DateTime<Utc>> for Value { fn from(v: DateTime<Utc>) -> Self { Value::DateTime(v.fixed_offset()) } }
impl From<JsonMap> for Value { fn from(v: JsonMap) -> Self { Value::Map(v) } }
impl From<Bitfield> for Value { fn from(v: Bitfield) -> Self { Value::Bitfield(v) } }
impl From<Aggregate> for Value { fn from(v: Aggregate) -> Self { Value::Aggregate(v) } }
impl From<ForeignKeyReference> for Value { fn from(v: ForeignKeyReference) -> Self { Value::Reference(v) } }
impl From<Rc<dyn PersistedRecord>> for Value { fn from(v: Rc<dyn PersistedRecord>) -> Self { Value::Record(v) } }
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Value::List(v.into_iter().map(Into::into).collect()) }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Map(map),
        }
    }
}

// ============================================================================
// Display
// ============================================================================

/// Plain-text rendering, also used for string coercion.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) | Value::Symbol(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Map(m) => write!(f, "{}", JsonValue::Object(m.clone())),
            Value::Bitfield(b) => write!(f, "{b}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Aggregate(a) => write!(f, "#<{}>", a.schema().name()),
            Value::Reference(r) => write!(f, "{}", r.id()),
            Value::Record(r) => write!(f, "{}#{}", r.type_name(), r.id()),
        }
    }
}

// ============================================================================
// Equality and ordering
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Int(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Int(a)) => BigDecimal::from(*a) == *b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Bitfield(a), Value::Bitfield(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Aggregate(a), Value::Aggregate(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.type_name() == b.type_name() && a.id() == b.id()
            }
            _ => false,
        }
    }
}

impl Value {
    /// Sort rank: null above booleans above symbols above everything else.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 3,
            Value::Bool(_) => 2,
            Value::Symbol(_) => 1,
            _ => 0,
        }
    }

    /// Ordering used when comparing aggregates attribute by attribute.
    /// `None` when the two values are not comparable.
    pub fn sort_cmp(&self, other: &Value) -> Result<Option<Ordering>> {
        let ordering = match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Symbol(a), Value::Symbol(b)) => Some(a.cmp(b)),
            _ if self.rank() != other.rank() => Some(self.rank().cmp(&other.rank())),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Decimal(b)) => Some(BigDecimal::from(*a).cmp(b)),
            (Value::Decimal(a), Value::Int(b)) => Some(a.cmp(&BigDecimal::from(*b))),
            (Value::Bitfield(a), Value::Bitfield(b)) => Some(a.cmp(b)),
            (Value::Map(a), Value::Map(b)) => (a == b).then_some(Ordering::Equal),
            (Value::Reference(a), Value::Reference(b)) => Some(a.id().cmp(&b.id())),
            (Value::Aggregate(a), Value::Aggregate(b)) => return a.compare(b),
            (Value::List(a), Value::List(b)) => {
                for (left, right) in a.iter().zip(b) {
                    match left.sort_cmp(right)? {
                        Some(Ordering::Equal) => continue,
                        decided => return Ok(decided),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        };
        Ok(ordering)
    }
}
