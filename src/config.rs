//! Process-wide configuration.
//!
//! Holds the ordered encryption key list used by encrypted string attributes.
//! The first key encrypts; decryption tries every key in order, so rotating
//! keys means prepending the new one and keeping the old ones around until
//! every stored value has been rewritten.
//!
//! ```rust,no_run
//! aggregate_rs::configure(|config| {
//!     config.encryption_keys = vec!["zJ8Z1q2Ac2Ppp0U8rrtFZd4ykXyCR8MhpqTqUpNzB5w=".into()];
//! });
//! ```

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Environment variable read by [`Configuration::from_env`].
pub const KEYS_ENV: &str = "AGGREGATE_ENCRYPTION_KEYS";

/// Size of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Base64 encoded 32-byte keys. A single string is accepted as a one-key list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub encryption_keys: Vec<String>,
}

impl Configuration {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { encryption_keys: keys.into_iter().map(Into::into).collect() }
    }

    /// Comma separated keys from `AGGREGATE_ENCRYPTION_KEYS`; empty when unset.
    pub fn from_env() -> Self {
        let keys = std::env::var(KEYS_ENV).unwrap_or_default();
        Self::with_keys(keys.split(',').map(str::trim).filter(|k| !k.is_empty()))
    }

    /// Decode the key list, rejecting anything that is not a base64 32-byte key.
    pub fn secret_keys(&self) -> Result<Vec<[u8; KEY_LEN]>> {
        self.encryption_keys
            .iter()
            .enumerate()
            .map(|(position, encoded)| {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| Error::InvalidKeyList(format!("key {position}: {e}")))?;
                <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
                    Error::InvalidKeyList(format!(
                        "key {position}: expected {KEY_LEN} bytes, got {}",
                        bytes.len()
                    ))
                })
            })
            .collect()
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(key) => vec![key],
        OneOrMany::Many(keys) => keys,
    })
}

// ============================================================================
// Process-wide value
// ============================================================================

static CONFIGURATION: Lazy<RwLock<Arc<Configuration>>> =
    Lazy::new(|| RwLock::new(Arc::new(Configuration::from_env())));

/// Snapshot of the current configuration.
pub fn configuration() -> Arc<Configuration> {
    CONFIGURATION.read().clone()
}

/// Update the process-wide configuration in place.
pub fn configure(f: impl FnOnce(&mut Configuration)) {
    let mut guard = CONFIGURATION.write();
    let mut next = Configuration::clone(&guard);
    f(&mut next);
    tracing::debug!(keys = next.encryption_keys.len(), "aggregate configuration updated");
    *guard = Arc::new(next);
}

/// Back to an empty configuration.
pub fn reset() {
    *CONFIGURATION.write() = Arc::new(Configuration::default());
}

/// Serializes unit tests that touch the process-wide configuration.
#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "zJ8Z1q2Ac2Ppp0U8rrtFZd4ykXyCR8MhpqTqUpNzB5w=";

    #[test]
    fn test_deserialize_single_key() {
        let config: Configuration =
            serde_json::from_str(&format!(r#"{{"encryption_keys": "{KEY}"}}"#)).unwrap();
        assert_eq!(config.encryption_keys, vec![KEY.to_string()]);
    }

    #[test]
    fn test_deserialize_defaults_to_no_keys() {
        let config: Configuration = serde_json::from_str("{}").unwrap();
        assert!(config.encryption_keys.is_empty());
    }

    #[test]
    fn test_secret_keys_decode() {
        let keys = Configuration::with_keys([KEY]).secret_keys().unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_short_key_is_rejected() {
        let err = Configuration::with_keys(["c2hvcnQ="]).secret_keys().unwrap_err();
        assert!(matches!(err, Error::InvalidKeyList(_)));
    }

    #[test]
    fn test_configure_and_reset() {
        let _guard = TEST_LOCK.lock();
        configure(|c| c.encryption_keys = vec![KEY.into()]);
        assert_eq!(configuration().encryption_keys.len(), 1);
        reset();
        assert!(configuration().encryption_keys.is_empty());
    }
}
