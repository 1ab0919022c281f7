//! Per-entity validation error sink.

use std::fmt;

/// Validation messages keyed by attribute name, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errors {
    entries: Vec<(String, String)>,
}

impl Errors {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.entries.push((attribute.into(), message.into()));
    }

    pub fn get(&self, attribute: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(name, _)| name == attribute)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn clear(&mut self) { self.entries.clear() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, message)| (name.as_str(), message.as_str()))
    }

    /// `"Weight in ounces is too long"`: humanized attribute name, then message.
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, message)| format!("{} {message}", humanize(name)))
            .collect()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

/// `"photo_url"` → `"Photo url"`; a trailing `_id` is dropped.
pub fn humanize(attribute: &str) -> String {
    let trimmed = attribute.strip_suffix("_id").unwrap_or(attribute);
    let spaced = trimmed.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
