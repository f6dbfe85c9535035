//! Ordered row type for CIF categories.
//!
//! This module provides [`Row`], a wrapper around [`IndexMap`] mapping item
//! names to their literal text. Insertion order is kept, so a row written back
//! out lists its items in the order they were read.
//!
//! ## Examples
//!
//! ```rust
//! use cif_sac::Row;
//!
//! let mut row = Row::new();
//! row.insert("id".to_string(), "1".to_string());
//! row.insert("name".to_string(), "aap".to_string());
//!
//! assert_eq!(row.len(), 2);
//! assert_eq!(row.get("name"), Some("aap"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The unknown marker.
pub const UNKNOWN: &str = "?";
/// The inapplicable marker.
pub const INAPPLICABLE: &str = ".";

/// Returns `true` for the empty string and the `?` and `.` markers, the
/// values that carry no data.
///
/// # Examples
///
/// ```rust
/// use cif_sac::is_null_value;
///
/// assert!(is_null_value("?"));
/// assert!(is_null_value("."));
/// assert!(!is_null_value("?x"));
/// ```
#[must_use]
pub fn is_null_value(value: &str) -> bool {
    value.is_empty() || value == UNKNOWN || value == INAPPLICABLE
}

/// One row of a category: item name to literal value text.
///
/// # Examples
///
/// ```rust
/// use cif_sac::Row;
///
/// let row: Row = [("b", "2"), ("a", "1")]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v.to_string()))
///     .collect();
///
/// // Iteration maintains insertion order
/// let keys: Vec<_> = row.keys().cloned().collect();
/// assert_eq!(keys, vec!["b", "a"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, String>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Row(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Row(IndexMap::with_capacity(capacity))
    }

    /// Sets an item, returning the previous value if there was one.
    pub fn insert(&mut self, item: String, value: String) -> Option<String> {
        self.0.insert(item, value)
    }

    /// Looks up an item by exact name, then case-insensitively.
    ///
    /// ```rust
    /// use cif_sac::Row;
    ///
    /// let mut row = Row::new();
    /// row.insert("Cartn_x".to_string(), "1.5".to_string());
    /// assert_eq!(row.get("Cartn_x"), Some("1.5"));
    /// assert_eq!(row.get("cartn_x"), Some("1.5"));
    /// assert_eq!(row.get("Cartn_y"), None);
    /// ```
    #[must_use]
    pub fn get(&self, item: &str) -> Option<&str> {
        match self.0.get(item) {
            Some(value) => Some(value.as_str()),
            None => self
                .0
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(item))
                .map(|(_, value)| value.as_str()),
        }
    }

    /// `true` when the item is present with a value other than `?` or `.`.
    #[must_use]
    pub fn has_value(&self, item: &str) -> bool {
        self.get(item).map_or(false, |v| !is_null_value(v))
    }

    #[must_use]
    pub fn contains(&self, item: &str) -> bool {
        self.get(item).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the item names, in insertion order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, String> {
        self.0.keys()
    }

    /// Returns an iterator over the values, in insertion order.
    pub fn values(&self) -> indexmap::map::Values<'_, String, String> {
        self.0.values()
    }

    /// Returns an iterator over the item/value pairs, in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl IntoIterator for Row {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Row(IndexMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces() {
        let mut row = Row::new();
        assert!(row.insert("id".into(), "1".into()).is_none());
        assert_eq!(row.insert("id".into(), "2".into()), Some("1".to_string()));
        assert_eq!(row.get("id"), Some("2"));
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_has_value() {
        let row: Row = [("a", "?"), ("b", "."), ("c", "x")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(!row.has_value("a"));
        assert!(!row.has_value("b"));
        assert!(row.has_value("c"));
        assert!(!row.has_value("d"));
        assert!(row.contains("a"));
    }

    #[test]
    fn test_serializes_as_object() {
        let mut row = Row::new();
        row.insert("id".into(), "1".into());
        row.insert("name".into(), "aap".into());
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":"1","name":"aap"}"#);
    }
}
