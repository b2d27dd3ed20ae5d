// ABOUTME: Space-delimited OAuth scope parsing with set semantics for subset and duplicate checks
// ABOUTME: Keeps the raw value list alongside the sorted unique set so duplicates stay detectable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Parsed OAuth scope.
///
/// Scopes compare as sets. The raw value count is retained so callers can
/// reject requests such as `read:profile read:profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    raw_len: usize,
    values: BTreeSet<String>,
}

impl ScopeSet {
    /// Parse a space-delimited scope string; blank entries are dropped
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.split_whitespace().collect()
    }

    /// Empty scope
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw_len: 0,
            values: BTreeSet::new(),
        }
    }

    /// Whether the original input repeated any value
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.raw_len != self.values.len()
    }

    /// Whether no scope values were supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct scope values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether `scope` is part of this set
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.values.contains(scope)
    }

    /// Whether every value here is also in `other`
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.values.is_subset(&other.values)
    }

    /// Whether every value of `other` is also here
    #[must_use]
    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.values.is_superset(&other.values)
    }

    /// Distinct values in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// Distinct values as owned strings, sorted
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.values.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut raw_len = 0;
        let mut values = BTreeSet::new();
        for value in iter {
            for part in value.as_ref().split_whitespace() {
                raw_len += 1;
                values.insert(part.to_owned());
            }
        }
        Self { raw_len, values }
    }
}

impl FromStr for ScopeSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in &self.values {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(value)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_whitespace_and_order() {
        let scope = ScopeSet::parse("  write:profile   read:profile ");
        assert_eq!(scope.len(), 2);
        assert!(!scope.has_duplicates());
        assert_eq!(scope.to_string(), "read:profile write:profile");
    }

    #[test]
    fn test_duplicates_are_detected() {
        let scope = ScopeSet::parse("read:profile read:profile");
        assert!(scope.has_duplicates());
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.to_string(), "read:profile");
    }

    #[test]
    fn test_subset_relations() {
        let client: ScopeSet = ["read:profile", "write:profile"].into_iter().collect();
        let requested = ScopeSet::parse("read:profile");

        assert!(requested.is_subset_of(&client));
        assert!(client.is_superset_of(&requested));
        assert!(!client.is_subset_of(&requested));
        assert!(ScopeSet::empty().is_subset_of(&requested));
        assert!(!ScopeSet::parse("admin").is_subset_of(&client));
    }

    #[test]
    fn test_empty_input() {
        let scope: ScopeSet = "   ".parse().unwrap();
        assert!(scope.is_empty());
        assert_eq!(scope.to_string(), "");
        assert_eq!(scope, ScopeSet::empty());
    }
}
