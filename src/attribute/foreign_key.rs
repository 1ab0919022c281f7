//! Belongs-to attributes: an id stored, a lazily resolved reference held.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, wrong_type};
use crate::model::{ForeignKeyReference, RecordFinder, Value};
use crate::Result;

#[derive(Debug)]
pub struct ForeignKeyHandler {
    name: String,
    options: Options,
    finder: Arc<dyn RecordFinder>,
}

impl ForeignKeyHandler {
    /// `name` is the storage key, conventionally `<association>_id`.
    pub fn new(name: &str, finder: Arc<dyn RecordFinder>, options: Options) -> Result<Self> {
        options.assert_valid_keys("foreign key", name, &[])?;
        Ok(Self { name: name.to_owned(), options, finder })
    }

    fn reference(&self, id: i64) -> Value {
        Value::Reference(ForeignKeyReference::new(self.finder.clone(), id))
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Reference(reference) => Ok(Value::Reference(reference.clone())),
            Value::Record(record) => Ok(Value::Reference(ForeignKeyReference::resolved(
                self.finder.clone(),
                record.clone(),
            ))),
            Value::Int(id) => Ok(self.reference(*id)),
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) => s.trim().parse().map(|id| self.reference(id)).map_err(|_| wrong_type(&self.name, value)),
            other => Err(wrong_type(&self.name, other)),
        }
    }
}

impl AttributeHandler for ForeignKeyHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        self.coerce(&value)
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        self.coerce(&Value::from(stored.clone()))
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        Ok(match self.coerce(value)? {
            Value::Reference(reference) => JsonValue::from(reference.id()),
            _ => JsonValue::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersistedRecord;
    use std::any::Any;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Passport(i64);

    impl PersistedRecord for Passport {
        fn id(&self) -> i64 { self.0 }
        fn type_name(&self) -> &str { "Passport" }
        fn as_any(&self) -> &dyn Any { self }
    }

    #[derive(Debug)]
    struct Passports;

    impl RecordFinder for Passports {
        fn type_name(&self) -> &str { "Passport" }
        fn find(&self, id: i64) -> Result<Rc<dyn PersistedRecord>> { Ok(Rc::new(Passport(id))) }
    }

    fn handler() -> ForeignKeyHandler {
        ForeignKeyHandler::new("passport_id", Arc::new(Passports), Options::new()).unwrap()
    }

    #[test]
    fn test_stores_id_only() {
        let handler = handler();
        let record: Rc<dyn PersistedRecord> = Rc::new(Passport(12));
        let value = handler.from_value(Value::Record(record)).unwrap();
        assert!(value.as_reference().unwrap().is_loaded());
        assert_eq!(handler.to_store(&value).unwrap(), JsonValue::from(12));
    }

    #[test]
    fn test_loads_lazily() {
        let value = handler().from_store(&JsonValue::from(5)).unwrap();
        let reference = value.as_reference().unwrap();
        assert!(!reference.is_loaded());
        assert_eq!(reference.value().unwrap().id(), 5);
    }

    #[test]
    fn test_numeric_strings_are_ids() {
        let value = handler().from_value(Value::from(" 9 ")).unwrap();
        assert_eq!(value.as_reference().unwrap().id(), 9);
        assert!(handler().from_value(Value::from("nine")).is_err());
    }
}
