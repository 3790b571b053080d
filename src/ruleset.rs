//! Rule-based lookups for local business rules.
//!
//! A [`Ruleset`] maps an object to a value by running each rule in order:
//! every rule extracts a key from the object and looks it up in a
//! [`Lookup`]. Later matches override earlier ones, so general rules go
//! first and overrides last.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::ruleset::{MapLookup, PatternLookup, Ruleset};
//!
//! struct Item { location: &'static str, itype: u32 }
//!
//! let requestable = Ruleset::new(true)
//!     .rule(|i: &Item| i.location.to_string(), PatternLookup::new([(r"^czm", false)]).unwrap())
//!     .rule(|i: &Item| i.itype.to_string(), MapLookup::from_iter([("7".to_string(), false)]))
//!     .rule(
//!         |i: &Item| format!("{}|{}", i.itype, i.location),
//!         MapLookup::from_iter([("7|xmus".to_string(), true)]),
//!     );
//!
//! assert!(!requestable.evaluate(&Item { location: "czm", itype: 1 }));
//! assert!(!requestable.evaluate(&Item { location: "w", itype: 7 }));
//! assert!(requestable.evaluate(&Item { location: "xmus", itype: 7 }));
//! assert!(requestable.evaluate(&Item { location: "w", itype: 1 }));
//! ```

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::collections::HashMap;
use std::hash::Hash;

/// Something that maps keys to values, with a default for misses.
pub trait Lookup<K: ?Sized, V> {
    /// The value for `key`, if any.
    fn get(&self, key: &K) -> Option<V>;

    /// The value for `key`, or `default`.
    fn get_or(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }
}

/// Exact-key lookup.
#[derive(Debug, Clone, Default)]
pub struct MapLookup<K, V> {
    map: HashMap<K, V>,
}

impl<K: Eq + Hash, V> MapLookup<K, V> {
    /// Wrap an existing map.
    pub fn new(map: HashMap<K, V>) -> Self {
        MapLookup { map }
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for MapLookup<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapLookup {
            map: iter.into_iter().collect(),
        }
    }
}

impl<K, Q, V> Lookup<Q, V> for MapLookup<K, V>
where
    K: Eq + Hash + std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
    V: Clone,
{
    fn get(&self, key: &Q) -> Option<V> {
        self.map.get(key).cloned()
    }
}

/// Maps strings to values by regex pattern; the first matching pattern
/// wins. Keys on the exclusion list never match.
#[derive(Debug, Clone)]
pub struct PatternLookup<V> {
    patterns: Vec<(Regex, V)>,
    exclude: Vec<String>,
}

impl<V> PatternLookup<V> {
    /// Compile `(pattern, value)` pairs, in match order.
    ///
    /// # Errors
    ///
    /// Returns the regex error for the first pattern that doesn't compile.
    pub fn new<'p>(patterns: impl IntoIterator<Item = (&'p str, V)>) -> Result<Self, regex::Error> {
        let patterns = patterns
            .into_iter()
            .map(|(pattern, value)| Ok((Regex::new(pattern)?, value)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(PatternLookup {
            patterns,
            exclude: Vec::new(),
        })
    }

    /// Keys that never match any pattern.
    #[must_use]
    pub fn with_exclude<S: Into<String>>(mut self, exclude: impl IntoIterator<Item = S>) -> Self {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }
}

impl<V: Clone> Lookup<str, V> for PatternLookup<V> {
    fn get(&self, key: &str) -> Option<V> {
        if self.exclude.iter().any(|e| e == key) {
            return None;
        }
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.is_match(key))
            .map(|(_, value)| value.clone())
    }
}

type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type BoxedLookup<V> = Box<dyn Lookup<str, V> + Send + Sync>;

/// Ordered rules mapping an object of type `T` to a value of type `V`.
pub struct Ruleset<T, V> {
    rules: Vec<(KeyFn<T>, BoxedLookup<V>)>,
    default: V,
}

impl<T, V: Clone> Ruleset<T, V> {
    /// An empty ruleset that evaluates to `default`.
    pub fn new(default: V) -> Self {
        Ruleset {
            rules: Vec::new(),
            default,
        }
    }

    /// Append a rule: `key` extracts the comparison key from the object
    /// and `lookup` maps it to a value.
    #[must_use]
    pub fn rule<F, L>(mut self, key: F, lookup: L) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
        L: Lookup<str, V> + Send + Sync + 'static,
    {
        self.rules.push((Box::new(key), Box::new(lookup)));
        self
    }

    /// Run every rule in order; each match replaces the running result.
    pub fn evaluate(&self, obj: &T) -> V {
        self.rules
            .iter()
            .fold(self.default.clone(), |result, (key, lookup)| {
                lookup.get_or(&key(obj), result)
            })
    }
}

impl<T, V: std::fmt::Debug> std::fmt::Debug for Ruleset<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ruleset")
            .field("rules", &self.rules.len())
            .field("default", &self.default)
            .finish()
    }
}

/// Reverse a one-to-many mapping, keeping every key a value appears
/// under.
///
/// `{"Coll1": ["a", "b"], "Coll2": ["b"]}` gives
/// `{"a": {"Coll1"}, "b": {"Coll1", "Coll2"}}`.
pub fn reverse_mapping<K, V>(forward: &IndexMap<K, Vec<V>>) -> IndexMap<V, IndexSet<K>>
where
    K: Clone + Eq + Hash,
    V: Clone + Eq + Hash,
{
    let mut reverse: IndexMap<V, IndexSet<K>> = IndexMap::new();
    for (key, values) in forward {
        for value in values {
            reverse.entry(value.clone()).or_default().insert(key.clone());
        }
    }
    reverse
}

/// Reverse a one-to-many mapping into a single-valued map. Where a value
/// appears under several keys, the last key in `forward` order wins.
pub fn reverse_mapping_single<K, V>(forward: &IndexMap<K, Vec<V>>) -> IndexMap<V, K>
where
    K: Clone,
    V: Clone + Eq + Hash,
{
    let mut reverse = IndexMap::new();
    for (key, values) in forward {
        for value in values {
            reverse.insert(value.clone(), key.clone());
        }
    }
    reverse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_lookup() {
        let pmap = PatternLookup::new([(r"^w", "Willis Library"), (r"^s", "Eagle Commons Library")])
            .unwrap()
            .with_exclude(["wx"]);
        assert_eq!(pmap.get("w3"), Some("Willis Library"));
        assert_eq!(pmap.get("sdus"), Some("Eagle Commons Library"));
        assert_eq!(pmap.get("wx"), None);
        assert_eq!(pmap.get("abcd"), None);
        assert_eq!(pmap.get_or("wx", "Error"), "Error");
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        assert!(PatternLookup::new([("(", 1)]).is_err());
    }

    struct Item {
        location: String,
        itype: u32,
    }

    fn item(location: &str, itype: u32) -> Item {
        Item {
            location: location.to_string(),
            itype,
        }
    }

    #[test]
    fn test_later_rules_override_earlier() {
        let ruleset = Ruleset::new("default")
            .rule(
                |i: &Item| i.location.clone(),
                MapLookup::from_iter([("x".to_string(), "first")]),
            )
            .rule(
                |i: &Item| format!("{}|{}", i.location, i.itype),
                MapLookup::from_iter([("x|7".to_string(), "second")]),
            );
        assert_eq!(ruleset.evaluate(&item("x", 7)), "second");
        assert_eq!(ruleset.evaluate(&item("x", 8)), "first");
        assert_eq!(ruleset.evaluate(&item("q", 7)), "default");
    }

    #[test]
    fn test_reverse_mapping() {
        let forward: IndexMap<&str, Vec<&str>> =
            IndexMap::from([
                ("Collection1", vec!["code1", "code2"]),
                ("Collection2", vec!["code2", "code3"]),
            ]);

        let multi = reverse_mapping(&forward);
        assert_eq!(multi["code1"], IndexSet::from(["Collection1"]));
        assert_eq!(multi["code2"], IndexSet::from(["Collection1", "Collection2"]));
        assert_eq!(multi["code3"], IndexSet::from(["Collection2"]));

        let single = reverse_mapping_single(&forward);
        assert_eq!(single["code2"], "Collection2");
        assert_eq!(single.len(), 3);
    }
}
