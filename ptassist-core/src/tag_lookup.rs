//! Tag lookup utility for capability checks
//!
//! Wraps a primitive's tag map with the access helpers the mode rules need.

use crate::primitives::Tags;

/// Helper for looking up tags on a single primitive
#[derive(Debug, Clone, Copy)]
pub struct TagLookup<'a> {
    tags: &'a Tags,
}

impl<'a> TagLookup<'a> {
    pub fn new(tags: &'a Tags) -> Self {
        Self { tags }
    }

    /// Get a tag value by key name
    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Value of the first key present, in the order given.
    ///
    /// Used for OSM key hierarchies where the most specific key wins
    /// (`bus` before `psv` before `motor_vehicle` before `access`).
    pub fn first_of<K: AsRef<str>>(&self, keys: &[K]) -> Option<&'a str> {
        keys.iter().find_map(|k| self.get_str(k.as_ref()))
    }

    /// `true` when the value is one of the usual "yes" spellings
    pub fn is_yes(&self, key: &str) -> bool {
        matches!(self.get_str(key), Some("yes") | Some("1") | Some("true"))
    }

    /// Iterate keys sharing `prefix`, e.g. every `restriction*` key of a relation.
    pub fn with_prefix<'p>(&self, prefix: &'p str) -> impl Iterator<Item = (&'a str, &'a str)> + 'p
    where
        'a: 'p,
    {
        self.tags
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
