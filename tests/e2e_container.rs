//! End-to-end tests for the host-record adapter: decoding the storage column,
//! writing it back on save, and the save/commit/reload cycle.

use std::sync::Arc;

use aggregate_rs::{ContainerType, Error, Options, Schema, Value};
use pretty_assertions::assert_eq;

fn passport_type() -> Arc<ContainerType> {
    let photo = Schema::builder("PassportPhoto")
        .attribute("photo_url", "string", Options::new())
        .build()
        .unwrap();
    let schema = Schema::builder("Passport")
        .attribute("city", "string", Options::new())
        .attribute("weight", "decimal", Options::new().default(100))
        .attribute("photo", &photo, Options::new())
        .build()
        .unwrap();
    ContainerType::builder(&schema)
        .store_aggregates_using("aggregate_field", Some("old_aggregate_field"))
        .unwrap()
        .build()
}

// ============================================================================
// 1. Defaults are not written
// ============================================================================

#[test]
fn test_default_weight_is_not_stored() {
    let mut record = passport_type().load("", None);
    assert_eq!(record.get("weight").unwrap().to_string(), "100");
    record.save().unwrap();
    assert_eq!(record.storage(), "");

    let mut reread = passport_type().load(record.storage().to_owned(), None);
    assert_eq!(reread.get("weight").unwrap().to_string(), "100");
    reread.save().unwrap();
    assert_eq!(reread.storage(), "");
}

#[test]
fn test_versioned_schema_always_written() {
    let schema = Schema::builder("Versioned")
        .attribute("city", "string", Options::new())
        .schema_version("3", |_, _| Ok(()))
        .build()
        .unwrap();
    let mut record = ContainerType::builder(&schema).build().new_record();
    record.get("city").unwrap();
    record.save().unwrap();
    assert_eq!(record.storage(), "{\"city\":null,\"data_schema_version\":\"3\"}");
}

// ============================================================================
// 2. Save and commit
// ============================================================================

#[test]
fn test_save_writes_assigned_values() {
    let mut record = passport_type().new_record();
    assert!(record.is_new_record());
    record.set("city", "Ojai").unwrap();
    record.root().unwrap().build("photo", Value::Null).unwrap();
    record.save().unwrap();
    assert_eq!(record.storage(), "{\"city\":\"Ojai\",\"weight\":\"100\",\"photo\":{}}");
    assert!(!record.is_new_record());
}

#[test]
fn test_commit_captures_and_resets() {
    let mut record = passport_type().load("{\"city\":\"Ojai\"}", None);
    record.set("city", "Solvang").unwrap();
    assert!(record.changed());

    record.save().unwrap();
    record.commit().unwrap();

    assert!(!record.changed());
    assert!(record.saved_changes().unwrap());
    let root = record.root().unwrap();
    assert!(root.saved_change_to("city").unwrap());
    let change = root.attribute_saved_changes().unwrap();
    assert_eq!(change.get("city").unwrap().before, Value::from("Ojai"));

    record.set("city", "Ojai").unwrap();
    assert!(record.changed(), "the committed value is the new baseline");
}

#[test]
fn test_nested_changes_dirty_the_record() {
    let record = passport_type().load("{\"photo\":{\"photo_url\":\"a\"}}", None);
    let photo = record.get("photo").unwrap().as_aggregate().cloned().unwrap();
    assert!(!record.changed());
    photo.set("photo_url", "b").unwrap();
    assert!(record.changed());
    assert!(record.changed_for_autosave().unwrap());
}

// ============================================================================
// 3. Host-level flags
// ============================================================================

#[test]
fn test_host_changes_without_decoding() {
    let mut record = passport_type().load("{\"city\":\"Ojai\"}", None);
    record.mark_host_changed();
    assert!(record.changed());
    record.save().unwrap();
    record.commit().unwrap();
    assert!(record.saved_changes().unwrap());
    assert_eq!(record.storage(), "{\"city\":\"Ojai\"}");
}

// ============================================================================
// 4. Migration and reload
// ============================================================================

#[test]
fn test_migrates_from_legacy_field() {
    let mut record = passport_type().load("  ", Some("{\"city\":\"Lompoc\"}".into()));
    assert_eq!(record.get("city").unwrap(), Value::from("Lompoc"));
    record.save().unwrap();
    assert_eq!(record.storage(), "{\"city\":\"Lompoc\",\"weight\":\"100\"}");
}

#[test]
fn test_storage_wins_over_legacy() {
    let record = passport_type().load("{\"city\":\"Ojai\"}", Some("{\"city\":\"Lompoc\"}".into()));
    assert_eq!(record.get("city").unwrap(), Value::from("Ojai"));
}

#[test]
fn test_reload() {
    let mut record = passport_type().load("{\"city\":\"Ojai\"}", None);
    record.set("city", "Solvang").unwrap();
    record.mark_host_changed();
    record.reload("{\"city\":\"Buellton\"}", None);
    assert!(!record.changed());
    assert_eq!(record.get("city").unwrap(), Value::from("Buellton"));
}

#[test]
fn test_corrupt_storage_is_an_error() {
    let record = passport_type().load("{not json", None);
    assert!(matches!(record.get("city"), Err(Error::Json(_))));
}

// ============================================================================
// 5. Declaration errors
// ============================================================================

#[test]
fn test_storage_already_defined() {
    let schema = Schema::builder("Passport").build().unwrap();
    let builder = ContainerType::builder(&schema).store_aggregates_using("aggregate_store", None).unwrap();
    let err = builder.store_aggregates_using("other_store", None).unwrap_err();
    assert!(matches!(err, Error::StorageAlreadyDefined { ref existing } if existing == "aggregate_store"));
}

#[test]
fn test_validation_through_container() {
    let schema = Schema::builder("Visa")
        .attribute("country", "string", Options::new().required())
        .build()
        .unwrap();
    let record = ContainerType::builder(&schema).build().new_record();
    assert!(!record.validate().unwrap());
    assert_eq!(record.errors().full_messages(), ["Country must be set"]);
}
