//! Bitfield attributes: bounded lists of mapped values in one string.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Limit, Options, ValidationErrors, wrong_type};
use crate::model::{Bitfield, BitfieldConfig, Scalar, Value};
use crate::{Error, Result};

#[derive(Debug)]
pub struct BitfieldHandler {
    name: String,
    options: Options,
    config: Arc<BitfieldConfig>,
}

impl BitfieldHandler {
    pub const OPTIONS: &'static [&'static str] = &["mapping"];

    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("bitfield", name, Self::OPTIONS)?;

        let limit = match &options.limit {
            None => None,
            Some(Limit::Length(n)) => Some(*n),
            Some(Limit::Values(_)) => {
                return Err(Error::InvalidOption {
                    attribute: name.to_owned(),
                    message: "bitfield limit must be a length".into(),
                });
            }
        };

        let declared_default = options.default_value();
        let default = Scalar::from_value(&declared_default).ok_or_else(|| Error::InvalidOption {
            attribute: name.to_owned(),
            message: format!("bitfield default {} is not a scalar", declared_default.inspect()),
        })?;

        let config = match &options.mapping {
            Some(mapping) => BitfieldConfig::new(mapping.iter().cloned(), default, limit)?,
            None if default == Scalar::Null => BitfieldConfig::boolean(limit),
            None => BitfieldConfig::new(
                BitfieldConfig::boolean(None).mapping_pairs(),
                default,
                limit,
            )?,
        };

        Ok(Self { name: name.to_owned(), options, config: Arc::new(config) })
    }

    pub fn config(&self) -> &Arc<BitfieldConfig> { &self.config }

    fn coerce(&self, value: &Value) -> Result<Bitfield> {
        match value {
            Value::Null => Ok(Bitfield::empty(self.config.clone())),
            Value::String(s) => Ok(Bitfield::parse(self.config.clone(), s)),
            Value::Bitfield(b) => Ok(Bitfield::parse(self.config.clone(), &b.canonical())),
            Value::List(items) => {
                let scalars = items
                    .iter()
                    .map(|v| Scalar::from_value(v).ok_or_else(|| Error::UnsupportedBitfieldValue(v.inspect())))
                    .collect::<Result<Vec<_>>>()?;
                Bitfield::from_values(self.config.clone(), &scalars)
            }
            other => Err(wrong_type(&self.name, other)),
        }
    }
}

impl AttributeHandler for BitfieldHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        self.coerce(&value).map(Value::Bitfield)
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        self.coerce(&Value::from(stored.clone())).map(Value::Bitfield)
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        let bitfield = self.coerce(value)?;
        Ok(if bitfield.is_empty() { JsonValue::Null } else { JsonValue::String(bitfield.canonical()) })
    }

    fn default(&self) -> Value {
        Value::Bitfield(Bitfield::empty(self.config.clone()))
    }

    fn validation_errors(&self, _value: &Value) -> ValidationErrors {
        ValidationErrors::new()
    }
}
