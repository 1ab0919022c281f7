//! Positional string encoding for bounded lists of enumerable values.
//!
//! Each index of the list owns one character slot of the encoded string. The
//! character for a slot comes from a bidirectional mapping shared by every
//! bitfield of the same attribute:
//!
//! ```text
//!   mapping { 't' ⇔ true, 'f' ⇔ false, ' ' ⇔ null }, default null
//!
//!   [true, false, null, true]  ⇔  "tf t"
//!   [true, null, null]         ⇔  "t"      (trailing defaults are trimmed)
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bimap::BiMap;

use super::value::Scalar;
use crate::{Error, Result};

// ============================================================================
// Config
// ============================================================================

/// Mapping, default and limit shared by every bitfield of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldConfig {
    mapping: BiMap<char, Scalar>,
    default: Scalar,
    default_char: char,
    limit: Option<usize>,
}

impl BitfieldConfig {
    /// Build a config, rejecting duplicate characters, duplicate values and a
    /// default that is not one of the mapped values.
    pub fn new<I>(mapping: I, default: Scalar, limit: Option<usize>) -> Result<Self>
    where
        I: IntoIterator<Item = (char, Scalar)>,
    {
        let mut table = BiMap::new();
        for (character, value) in mapping {
            if table.contains_right(&value) {
                return Err(Error::InvalidMapping("mapping must have unique values".into()));
            }
            if table.contains_left(&character) {
                return Err(Error::InvalidMapping(format!(
                    "character {character:?} is mapped more than once"
                )));
            }
            table.insert(character, value);
        }

        let default_char = *table.get_by_right(&default).ok_or_else(|| {
            Error::InvalidMapping(format!("default value {default} not provided in mapping"))
        })?;

        Ok(Self { mapping: table, default, default_char, limit })
    }

    /// `'t' ⇔ true`, `'f' ⇔ false`, `' ' ⇔ null`, default null.
    pub fn boolean(limit: Option<usize>) -> Self {
        let mut mapping = BiMap::new();
        mapping.insert('t', Scalar::Bool(true));
        mapping.insert('f', Scalar::Bool(false));
        mapping.insert(' ', Scalar::Null);
        Self { mapping, default: Scalar::Null, default_char: ' ', limit }
    }

    pub fn mapping_pairs(&self) -> Vec<(char, Scalar)> {
        self.mapping.iter().map(|(c, v)| (*c, v.clone())).collect()
    }

    pub fn default_value(&self) -> &Scalar { &self.default }
    pub fn default_char(&self) -> char { self.default_char }
    pub fn limit(&self) -> Option<usize> { self.limit }

    pub fn char_for(&self, value: &Scalar) -> Option<char> {
        self.mapping.get_by_right(value).copied()
    }

    pub fn value_for(&self, character: char) -> Option<&Scalar> {
        self.mapping.get_by_left(&character)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        match self.limit {
            Some(limit) if index >= limit => Err(Error::IndexOutOfBounds { index, limit }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Bitfield
// ============================================================================

/// A list of mapped values stored as one character per index.
#[derive(Debug, Clone)]
pub struct Bitfield {
    config: Arc<BitfieldConfig>,
    slots: Vec<char>,
}

impl Bitfield {
    /// An empty bitfield: every index reads as the default.
    pub fn empty(config: Arc<BitfieldConfig>) -> Self {
        Self { config, slots: Vec::new() }
    }

    /// Wrap an encoded string. Characters are checked lazily, on read.
    pub fn parse(config: Arc<BitfieldConfig>, encoded: &str) -> Self {
        Self { config, slots: encoded.chars().collect() }
    }

    /// Encode a list of values, index by index.
    pub fn from_values<'a, I>(config: Arc<BitfieldConfig>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Scalar>,
    {
        let mut bitfield = Self::empty(config);
        for (index, value) in values.into_iter().enumerate() {
            bitfield.set(index, value.clone())?;
        }
        Ok(bitfield)
    }

    pub fn config(&self) -> &Arc<BitfieldConfig> { &self.config }
    pub fn limit(&self) -> Option<usize> { self.config.limit }

    pub fn get(&self, index: usize) -> Result<Scalar> {
        self.config.check_index(index)?;
        match self.slots.get(index) {
            None => Ok(self.config.default.clone()),
            Some(&character) => self.config.value_for(character).cloned().ok_or_else(|| {
                Error::CorruptBitfield { character, encoded: self.slots.iter().collect() }
            }),
        }
    }

    pub fn set(&mut self, index: usize, value: impl Into<Scalar>) -> Result<()> {
        self.config.check_index(index)?;
        let value = value.into();
        let character = self
            .config
            .char_for(&value)
            .ok_or_else(|| Error::UnsupportedBitfieldValue(value.to_string()))?;
        if index >= self.slots.len() {
            let limit = self.config.limit.unwrap_or(usize::MAX);
            let overflow = || Error::IndexOutOfBounds { index, limit };
            let len = index.checked_add(1).ok_or_else(overflow)?;
            self.slots.try_reserve_exact(len - self.slots.len()).map_err(|_| overflow())?;
            self.slots.resize(len, self.config.default_char);
        }
        self.slots[index] = character;
        Ok(())
    }

    /// Decode every stored slot. Trailing defaults are not included.
    pub fn values(&self) -> Result<Vec<Scalar>> {
        (0..self.canonical().chars().count()).map(|i| self.get(i)).collect()
    }

    /// The encoded string with the trailing run of default characters removed.
    pub fn canonical(&self) -> String {
        let default_char = self.config.default_char;
        let end = self
            .slots
            .iter()
            .rposition(|&c| c != default_char)
            .map_or(0, |last| last + 1);
        self.slots[..end].iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|&c| c == self.config.default_char)
    }
}

// ============================================================================
// Equality / ordering on the canonical string
// ============================================================================

impl PartialEq for Bitfield {
    fn eq(&self, other: &Self) -> bool { self.canonical() == other.canonical() }
}

impl Eq for Bitfield {}

impl PartialOrd for Bitfield {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Bitfield {
    fn cmp(&self, other: &Self) -> Ordering { self.canonical().cmp(&other.canonical()) }
}

impl Hash for Bitfield {
    fn hash<H: Hasher>(&self, state: &mut H) { self.canonical().hash(state) }
}

impl fmt::Display for Bitfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
