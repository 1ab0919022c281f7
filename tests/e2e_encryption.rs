//! End-to-end tests for encrypted string attributes and key rotation.
//!
//! The key list is process-wide, so every test holds `CONFIG_LOCK` while it
//! reconfigures keys.

use std::sync::Arc;

use aggregate_rs::config::reset;
use aggregate_rs::{Aggregate, Error, JsonMap, Options, Schema, Value, configure};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

static CONFIG_LOCK: Mutex<()> = Mutex::new(());

const KEY_1: &str = "zJ8Z1q2Ac2Ppp0U8rrtFZd4ykXyCR8MhpqTqUpNzB5w=";
const KEY_2: &str = "ZxdLF0Ew+B+gU77TOfiLaaw5mhwpthMUsUxrA2szIRM=";
const KEY_3: &str = "czwDpWADhRQgVFr3HZaQe2e3R9Vos7EZcj0UlZPtueY=";

fn use_keys(keys: &[&str]) {
    configure(|config| config.encryption_keys = keys.iter().map(|k| k.to_string()).collect());
}

fn identity_schema() -> Arc<Schema> {
    Schema::builder("Identity")
        .attribute("name", "string", Options::new())
        .attribute("ssn", "string", Options::new().encrypted())
        .build()
        .unwrap()
}

fn encrypted_record(keys: &[&str]) -> JsonMap {
    use_keys(keys);
    let identity = Aggregate::new(&identity_schema());
    identity.set("name", "Ada").unwrap();
    identity.set("ssn", "123-45-6789").unwrap();
    identity.to_store().unwrap()
}

// ============================================================================
// 1. Round trip
// ============================================================================

#[test]
fn test_encrypted_round_trip() {
    let _guard = CONFIG_LOCK.lock();
    let stored = encrypted_record(&[KEY_1, KEY_2]);

    let envelope: serde_json::Value = serde_json::from_str(stored["ssn"].as_str().unwrap()).unwrap();
    assert!(envelope["encrypted_data"].is_string());
    assert!(envelope["initialization_vector"].is_string());
    assert!(!stored["ssn"].as_str().unwrap().contains("123-45-6789"));
    assert_eq!(stored["name"], "Ada");

    let loaded = Aggregate::from_store(&identity_schema(), stored);
    assert_eq!(loaded.get("ssn").unwrap(), Value::from("123-45-6789"));
    reset();
}

#[test]
fn test_each_write_uses_a_fresh_iv() {
    let _guard = CONFIG_LOCK.lock();
    use_keys(&[KEY_1]);
    let identity = Aggregate::new(&identity_schema());
    identity.set("ssn", "123-45-6789").unwrap();
    assert_ne!(identity.to_store().unwrap()["ssn"], identity.to_store().unwrap()["ssn"]);
    reset();
}

// ============================================================================
// 2. Key rotation
// ============================================================================

#[test]
fn test_old_key_still_decrypts_after_rotation() {
    let _guard = CONFIG_LOCK.lock();
    let stored = encrypted_record(&[KEY_1]);

    use_keys(&[KEY_3, KEY_1]);
    let loaded = Aggregate::from_store(&identity_schema(), stored);
    assert_eq!(loaded.get("ssn").unwrap(), Value::from("123-45-6789"));
    reset();
}

#[test]
fn test_wrong_key_cannot_decrypt() {
    let _guard = CONFIG_LOCK.lock();
    let stored = encrypted_record(&[KEY_1, KEY_2]);

    use_keys(&[KEY_2]);
    let err = Aggregate::from_store(&identity_schema(), stored).get("ssn").unwrap_err();
    assert!(matches!(err, Error::Decryption { .. }));
    assert_eq!(err.to_string(), "could not decrypt ssn because the correct decryption key is not found");
    reset();
}

#[test]
fn test_no_keys_configured() {
    let _guard = CONFIG_LOCK.lock();
    let stored = encrypted_record(&[KEY_1]);

    use_keys(&[]);
    let err = Aggregate::from_store(&identity_schema(), stored).get("ssn").unwrap_err();
    assert_eq!(err.to_string(), "must specify a key for decryption");

    let identity = Aggregate::new(&identity_schema());
    identity.set("ssn", "x").unwrap();
    assert!(matches!(identity.to_store(), Err(Error::MissingEncryptionKey { operation: "encryption" })));
    reset();
}

#[test]
fn test_plain_attributes_need_no_keys() {
    let _guard = CONFIG_LOCK.lock();
    use_keys(&[]);
    let identity = Aggregate::new(&identity_schema());
    identity.set("name", "Ada").unwrap();
    assert_eq!(identity.to_store().unwrap()["name"], "Ada");
    reset();
}
