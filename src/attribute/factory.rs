//! Builds handlers from declared types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::bitfield::BitfieldHandler;
use super::boolean::BooleanHandler;
use super::datetime::DateTimeHandler;
use super::decimal::DecimalHandler;
use super::enumeration::EnumHandler;
use super::float::FloatHandler;
use super::foreign_key::ForeignKeyHandler;
use super::hash::HashHandler;
use super::integer::IntegerHandler;
use super::list::ListHandler;
use super::nested::NestedHandler;
use super::string::StringHandler;
use super::{AttributeHandler, Options};
use crate::model::RecordFinder;
use crate::store::Schema;
use crate::{Error, Result};

/// Declared type of an attribute.
#[derive(Clone)]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    Enum,
    DateTime,
    Decimal,
    Hash,
    Bitfield,
    Nested(Arc<Schema>),
}

impl FromStr for AttributeType {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Ok(match name {
            "string" => AttributeType::String,
            "integer" => AttributeType::Integer,
            "float" => AttributeType::Float,
            "boolean" => AttributeType::Boolean,
            "enum" => AttributeType::Enum,
            "datetime" => AttributeType::DateTime,
            "decimal" => AttributeType::Decimal,
            "hash" => AttributeType::Hash,
            "bitfield" => AttributeType::Bitfield,
            other => return Err(Error::UnknownType(other.to_owned())),
        })
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Nested(schema) => write!(f, "Nested({})", schema.name()),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

impl AttributeType {
    pub fn type_name(&self) -> &str {
        match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::Enum => "enum",
            AttributeType::DateTime => "datetime",
            AttributeType::Decimal => "decimal",
            AttributeType::Hash => "hash",
            AttributeType::Bitfield => "bitfield",
            AttributeType::Nested(schema) => schema.name(),
        }
    }
}

/// Anything that names an attribute type: a builtin type name, a nested
/// schema, or an [`AttributeType`].
pub trait IntoAttributeType {
    fn into_attribute_type(self) -> Result<AttributeType>;
}

impl IntoAttributeType for AttributeType {
    fn into_attribute_type(self) -> Result<AttributeType> { Ok(self) }
}

impl IntoAttributeType for &str {
    fn into_attribute_type(self) -> Result<AttributeType> { self.parse() }
}

impl IntoAttributeType for Arc<Schema> {
    fn into_attribute_type(self) -> Result<AttributeType> { Ok(AttributeType::Nested(self)) }
}

impl IntoAttributeType for &Arc<Schema> {
    fn into_attribute_type(self) -> Result<AttributeType> { Ok(AttributeType::Nested(self.clone())) }
}

/// Handler for a single-valued attribute.
pub fn factory(
    name: &str,
    ty: impl IntoAttributeType,
    options: Options,
) -> Result<Arc<dyn AttributeHandler>> {
    Ok(match ty.into_attribute_type()? {
        AttributeType::String => Arc::new(StringHandler::new(name, options)?),
        AttributeType::Integer => Arc::new(IntegerHandler::new(name, options)?),
        AttributeType::Float => Arc::new(FloatHandler::new(name, options)?),
        AttributeType::Boolean => Arc::new(BooleanHandler::new(name, options)?),
        AttributeType::Enum => Arc::new(EnumHandler::new(name, options)?),
        AttributeType::DateTime => Arc::new(DateTimeHandler::new(name, options)?),
        AttributeType::Decimal => Arc::new(DecimalHandler::new(name, options)?),
        AttributeType::Hash => Arc::new(HashHandler::new(name, options)?),
        AttributeType::Bitfield => Arc::new(BitfieldHandler::new(name, options)?),
        AttributeType::Nested(schema) => Arc::new(NestedHandler::new(name, schema, options)?),
    })
}

/// List handler. `collapse_errors` stays on the list; every other option
/// configures the element handler.
pub fn has_many_factory(
    name: &str,
    ty: impl IntoAttributeType,
    mut options: Options,
) -> Result<Arc<dyn AttributeHandler>> {
    let collapse_errors = options.take_collapse_errors();
    let storage_type = options.storage_type;
    let element = factory("element", ty, options)?;

    let mut list_options = Options::new();
    if collapse_errors {
        list_options = list_options.collapse_errors();
    }
    if let Some(storage_type) = storage_type {
        list_options = list_options.storage_type(storage_type);
    }
    Ok(Arc::new(ListHandler::new(name, element, list_options)?))
}

/// Foreign-key handler stored under `<name>_id`.
pub fn belongs_to_factory(
    name: &str,
    finder: Arc<dyn RecordFinder>,
    options: Options,
) -> Result<Arc<dyn AttributeHandler>> {
    Ok(Arc::new(ForeignKeyHandler::new(&format!("{name}_id"), finder, options)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn test_builtin_names() {
        for name in ["string", "integer", "float", "boolean", "enum", "datetime", "decimal", "hash", "bitfield"] {
            let handler = factory("testme", name, Options::new()).unwrap();
            assert_eq!(handler.name(), "testme");
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = factory("testme", "money", Options::new()).unwrap_err();
        assert_eq!(err.to_string(), "unknown attribute type 'money'");
    }

    #[test]
    fn test_options_are_checked_per_type() {
        assert!(factory("testme", "string", Options::new().size(3)).is_ok());
        assert!(matches!(
            factory("testme", "integer", Options::new().size(3)),
            Err(Error::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_has_many_splits_options() {
        let handler =
            has_many_factory("names", "string", Options::new().collapse_errors().size(2)).unwrap();
        assert_eq!(handler.name(), "names");
        assert!(handler.options().collapse_errors);
        let errors = handler.validation_errors(&Value::from(vec!["abc"]));
        assert_eq!(errors.as_slice(), ["is too long (maximum is 2 characters)"]);
    }

    #[test]
    fn test_has_many_element_options_still_checked() {
        assert!(has_many_factory("names", "integer", Options::new().size(2)).is_err());
    }
}
