//! Several short string fields packed into one newline-separated column.
//!
//! Untyped fields hold their display text. Typed fields go through an
//! attribute handler and hold the JSON of its storage form, so `true` and
//! `5` round-trip as a boolean and an integer.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde_json::Value as JsonValue;

use crate::attribute::{AttributeHandler, IntoAttributeType, Options, factory};
use crate::model::Value;
use crate::{Error, Result};

#[derive(Debug)]
pub struct CombinedStringField {
    host_attribute: String,
    fields: Vec<(String, Option<Arc<dyn AttributeHandler>>)>,
}

/// Per-record state: the packed column text and which fields were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedValues {
    pub text: String,
    changed: HashSet<String>,
}

impl CombinedValues {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), changed: HashSet::new() }
    }
}

impl CombinedStringField {
    pub fn new(host_attribute: impl Into<String>) -> Self {
        Self { host_attribute: host_attribute.into(), fields: Vec::new() }
    }

    pub fn field(mut self, name: &str) -> Self {
        self.fields.push((name.to_owned(), None));
        self
    }

    pub fn typed_field(mut self, name: &str, ty: impl IntoAttributeType) -> Result<Self> {
        let handler = factory(name, ty, Options::new())?;
        self.fields.push((name.to_owned(), Some(handler)));
        Ok(self)
    }

    pub fn host_attribute(&self) -> &str { &self.host_attribute }

    fn position(&self, name: &str) -> Result<usize> {
        self.fields.iter().position(|(n, _)| n == name).ok_or_else(|| Error::UnknownAttribute {
            entity: self.host_attribute.clone(),
            name: name.to_owned(),
        })
    }

    fn split<'a>(&self, values: &'a CombinedValues) -> HashMap<&str, &'a str> {
        self.fields.iter().map(|(n, _)| n.as_str()).zip(values.text.split('\n')).collect()
    }

    /// The field's value. Fields past the end of the text read as blank.
    pub fn read(&self, values: &CombinedValues, name: &str) -> Result<Value> {
        let position = self.position(name)?;
        let text = self.split(values).get(name).copied().unwrap_or("");
        match &self.fields[position].1 {
            None => Ok(Value::from(text)),
            Some(handler) if text.is_empty() => handler.from_value(Value::from(text)),
            Some(handler) => match serde_json::from_str::<JsonValue>(text) {
                Ok(stored) => handler.from_store(&stored),
                Err(_) => handler.from_value(Value::from(text)),
            },
        }
    }

    pub fn write(&self, values: &mut CombinedValues, name: &str, value: impl Into<Value>) -> Result<()> {
        let position = self.position(name)?;
        let value = value.into();
        let encoded = match &self.fields[position].1 {
            None if value.is_null() => String::new(),
            None => value.to_string(),
            Some(handler) => serde_json::to_string(&handler.to_store(&handler.from_value(value)?)?)?,
        };
        if encoded.contains('\n') {
            return Err(Error::InvalidValue {
                attribute: name.to_owned(),
                message: format!("Cannot store newlines in combined fields storing {encoded:?} in {name}"),
            });
        }

        let text = {
            let parts = self.split(values);
            let packed: Vec<&str> = self
                .fields
                .iter()
                .map(|(n, _)| if n == name { encoded.as_str() } else { parts.get(n.as_str()).copied().unwrap_or("") })
                .collect();
            packed.join("\n")
        };
        values.text = text;
        values.changed.insert(name.to_owned());
        Ok(())
    }

    pub fn changed(&self, values: &CombinedValues, name: &str) -> Result<bool> {
        self.position(name)?;
        Ok(values.changed.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combined() -> CombinedStringField {
        CombinedStringField::new("combined")
            .field("first")
            .field("second")
            .field("third")
            .typed_field("flag", "boolean")
            .unwrap()
    }

    #[test]
    fn test_packs_fields_in_order() {
        let field = combined();
        let mut values = CombinedValues::default();
        field.write(&mut values, "first", "abc").unwrap();
        field.write(&mut values, "second", "def").unwrap();
        field.write(&mut values, "third", "ghi").unwrap();
        field.write(&mut values, "flag", true).unwrap();
        assert_eq!(values.text, "abc\ndef\nghi\ntrue");
        assert_eq!(field.read(&values, "second").unwrap(), Value::from("def"));
        assert_eq!(field.read(&values, "flag").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_rewrite_keeps_other_fields() {
        let field = combined();
        let mut values = CombinedValues::new("abc\ndef");
        field.write(&mut values, "second", "xyz").unwrap();
        field.write(&mut values, "first", "uvw").unwrap();
        assert_eq!(values.text, "uvw\nxyz\n\n");
        assert_eq!(field.read(&values, "first").unwrap(), Value::from("uvw"));
        assert_eq!(field.read(&values, "second").unwrap(), Value::from("xyz"));
    }

    #[test]
    fn test_missing_fields_read_blank() {
        let field = combined();
        let values = CombinedValues::new("abc");
        assert_eq!(field.read(&values, "third").unwrap(), Value::from(""));
        assert_eq!(field.read(&values, "flag").unwrap(), Value::Null);
    }

    #[test]
    fn test_rejects_newlines() {
        let field = combined();
        let mut values = CombinedValues::default();
        let err = field.write(&mut values, "first", "abc\n123").unwrap_err();
        assert!(err.to_string().contains("Cannot store newlines in combined fields storing \"abc\\n123\" in first"));
    }

    #[test]
    fn test_tracks_written_fields() {
        let field = combined();
        let mut values = CombinedValues::default();
        field.write(&mut values, "second", "x").unwrap();
        assert!(field.changed(&values, "second").unwrap());
        assert!(!field.changed(&values, "first").unwrap());
        assert!(field.changed(&values, "fourth").is_err());
    }
}
