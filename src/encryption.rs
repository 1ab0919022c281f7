//! AES-256-GCM envelope for encrypted string attributes.
//!
//! Stored form is a JSON object with base64 fields:
//!
//! ```text
//! {"encrypted_data": "<ciphertext+tag>", "initialization_vector": "<12-byte nonce>"}
//! ```
//!
//! Envelopes written with the older misspelled `initilization_vector` field
//! are still accepted on decrypt.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::config::{self, KEY_LEN};
use crate::{Error, Result};

const NONCE_LEN: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    encrypted_data: String,
    #[serde(alias = "initilization_vector")]
    initialization_vector: String,
}

/// Encrypt with the first configured key.
pub fn encrypt(attribute: &str, plaintext: &str) -> Result<String> {
    let keys = config::configuration().secret_keys()?;
    encrypt_with(attribute, plaintext, &keys)
}

/// Decrypt with the first configured key that authenticates the payload.
pub fn decrypt(attribute: &str, payload: &str) -> Result<String> {
    let keys = config::configuration().secret_keys()?;
    decrypt_with(attribute, payload, &keys)
}

pub fn encrypt_with(attribute: &str, plaintext: &str, keys: &[[u8; KEY_LEN]]) -> Result<String> {
    let key = keys.first().ok_or(Error::MissingEncryptionKey { operation: "encryption" })?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let iv: [u8; NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| Error::Encryption { attribute: attribute.to_owned() })?;

    let envelope = Envelope {
        encrypted_data: STANDARD.encode(ciphertext),
        initialization_vector: STANDARD.encode(iv),
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decrypt_with(attribute: &str, payload: &str, keys: &[[u8; KEY_LEN]]) -> Result<String> {
    let envelope: Envelope = serde_json::from_str(payload)?;
    if keys.is_empty() {
        return Err(Error::MissingEncryptionKey { operation: "decryption" });
    }

    let not_found = || Error::Decryption { attribute: attribute.to_owned() };
    let ciphertext = STANDARD.decode(&envelope.encrypted_data).map_err(|_| not_found())?;
    let iv = STANDARD.decode(&envelope.initialization_vector).map_err(|_| not_found())?;
    if iv.len() != NONCE_LEN {
        return Err(not_found());
    }

    for (position, key) in keys.iter().enumerate() {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        match cipher.decrypt(Nonce::from_slice(&iv), ciphertext.as_slice()) {
            Ok(plaintext) => {
                return String::from_utf8(plaintext).map_err(|_| not_found());
            }
            Err(_) => {
                tracing::trace!(attribute, position, "decryption key did not match, trying next");
            }
        }
    }

    tracing::warn!(attribute, keys = keys.len(), "no configured key decrypts attribute");
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    const KEY_1: &str = "zJ8Z1q2Ac2Ppp0U8rrtFZd4ykXyCR8MhpqTqUpNzB5w=";
    const KEY_2: &str = "ZxdLF0Ew+B+gU77TOfiLaaw5mhwpthMUsUxrA2szIRM=";

    fn keys(list: &[&str]) -> Vec<[u8; KEY_LEN]> {
        Configuration::with_keys(list.iter().copied()).secret_keys().unwrap()
    }

    #[test]
    fn test_round_trip() {
        let keys = keys(&[KEY_1]);
        let payload = encrypt_with("ssn", "123-45-6789", &keys).unwrap();
        assert!(payload.contains("\"initialization_vector\""));
        assert!(!payload.contains("123-45-6789"));
        assert_eq!(decrypt_with("ssn", &payload, &keys).unwrap(), "123-45-6789");
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let keys = keys(&[KEY_1]);
        let a = encrypt_with("ssn", "same", &keys).unwrap();
        let b = encrypt_with("ssn", "same", &keys).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rotated_keys_fall_through() {
        let old = encrypt_with("ssn", "secret", &keys(&[KEY_2])).unwrap();
        assert_eq!(decrypt_with("ssn", &old, &keys(&[KEY_1, KEY_2])).unwrap(), "secret");
    }

    #[test]
    fn test_wrong_key() {
        let payload = encrypt_with("ssn", "secret", &keys(&[KEY_1])).unwrap();
        let err = decrypt_with("ssn", &payload, &keys(&[KEY_2])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not decrypt ssn because the correct decryption key is not found"
        );
    }

    #[test]
    fn test_no_keys() {
        let payload = encrypt_with("ssn", "secret", &keys(&[KEY_1])).unwrap();
        let err = decrypt_with("ssn", &payload, &[]).unwrap_err();
        assert_eq!(err.to_string(), "must specify a key for decryption");
        let err = encrypt_with("ssn", "secret", &[]).unwrap_err();
        assert_eq!(err.to_string(), "must specify a key for encryption");
    }

    #[test]
    fn test_legacy_field_name() {
        let keys = keys(&[KEY_1]);
        let payload = encrypt_with("ssn", "secret", &keys).unwrap();
        let legacy = payload.replace("initialization_vector", "initilization_vector");
        assert_eq!(decrypt_with("ssn", &legacy, &keys).unwrap(), "secret");
    }
}
