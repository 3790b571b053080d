//! Strategies for packing record keys into chunk bundles.

use crate::config::BundlerKind;
use crate::error::{ExportError, ExportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;

/// What a plan stores for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bundle {
    /// The chunk's keys, listed out.
    Keys(Vec<String>),
    /// An inclusive key range and how many keys it covers.
    Range {
        /// First key.
        start: String,
        /// Last key.
        end: String,
        /// Number of keys.
        count: usize,
    },
}

/// Packs a record set's keys into bundles of at most `size` keys and
/// recovers each bundle's keys later.
pub trait RecordSetBundler: Debug + Send + Sync {
    /// Split `keys` into bundles of at most `size`.
    fn pack(&self, keys: &[String], size: usize) -> Vec<Bundle>;

    /// The keys of `bundle`, taken from the full set `all_keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if this bundler didn't produce `bundle`.
    fn unpack(&self, bundle: &Bundle, all_keys: &[String]) -> ExportResult<Vec<String>>;

    /// Number of keys `bundle` stands for.
    fn count(&self, bundle: &Bundle) -> usize {
        match bundle {
            Bundle::Keys(keys) => keys.len(),
            Bundle::Range { count, .. } => *count,
        }
    }

    /// 0-based position of the bundle's first key within its record set.
    fn offset(&self, _bundle: &Bundle, part_num: usize, size: usize) -> usize {
        part_num * size
    }

    /// Plural noun for what is bundled, used in chunk labels.
    fn label(&self, _bundle: &Bundle) -> &'static str {
        "Records"
    }
}

fn sorted(keys: &[String]) -> Vec<&String> {
    let mut sorted: Vec<&String> = keys.iter().collect();
    sorted.sort();
    sorted
}

/// Stores each chunk's sorted keys explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitKeyBundler;

impl RecordSetBundler for ExplicitKeyBundler {
    fn pack(&self, keys: &[String], size: usize) -> Vec<Bundle> {
        sorted(keys)
            .chunks(size.max(1))
            .map(|chunk| Bundle::Keys(chunk.iter().map(|k| (*k).clone()).collect()))
            .collect()
    }

    fn unpack(&self, bundle: &Bundle, all_keys: &[String]) -> ExportResult<Vec<String>> {
        let Bundle::Keys(wanted) = bundle else {
            return Err(ExportError::Task("explicit-key bundler got a key range".to_string()));
        };
        let wanted: HashSet<&String> = wanted.iter().collect();
        Ok(sorted(all_keys)
            .into_iter()
            .filter(|k| wanted.contains(k))
            .cloned()
            .collect())
    }
}

/// Stores each chunk as the first and last of its sorted keys plus a
/// count, so large plans stay small.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyRangeBundler;

impl RecordSetBundler for KeyRangeBundler {
    fn pack(&self, keys: &[String], size: usize) -> Vec<Bundle> {
        sorted(keys)
            .chunks(size.max(1))
            .filter_map(|chunk| {
                Some(Bundle::Range {
                    start: (*chunk.first()?).clone(),
                    end: (*chunk.last()?).clone(),
                    count: chunk.len(),
                })
            })
            .collect()
    }

    fn unpack(&self, bundle: &Bundle, all_keys: &[String]) -> ExportResult<Vec<String>> {
        let Bundle::Range { start, end, count } = bundle else {
            return Err(ExportError::Task("key-range bundler got explicit keys".to_string()));
        };
        Ok(sorted(all_keys)
            .into_iter()
            .filter(|k| *k >= start && *k <= end)
            .take(*count)
            .cloned()
            .collect())
    }
}

/// The bundler for a configured [`BundlerKind`].
#[must_use]
pub fn bundler_for(kind: BundlerKind) -> Box<dyn RecordSetBundler> {
    match kind {
        BundlerKind::ExplicitKey => Box::new(ExplicitKeyBundler),
        BundlerKind::KeyRange => Box::new(KeyRangeBundler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (1..=n).rev().map(|i| format!("b{i:07}")).collect()
    }

    #[test]
    fn test_explicit_key_pack_and_unpack() {
        let all = keys(5);
        let bundles = ExplicitKeyBundler.pack(&all, 2);
        assert_eq!(bundles.len(), 3);
        assert_eq!(
            bundles[0],
            Bundle::Keys(vec!["b0000001".to_string(), "b0000002".to_string()])
        );
        assert_eq!(ExplicitKeyBundler.count(&bundles[2]), 1);
        assert_eq!(
            ExplicitKeyBundler.unpack(&bundles[1], &all).unwrap(),
            vec!["b0000003", "b0000004"]
        );
        assert_eq!(ExplicitKeyBundler.offset(&bundles[2], 2, 2), 4);
    }

    #[test]
    fn test_key_range_pack_and_unpack() {
        let all = keys(5);
        let bundles = KeyRangeBundler.pack(&all, 3);
        assert_eq!(
            bundles[1],
            Bundle::Range {
                start: "b0000004".to_string(),
                end: "b0000005".to_string(),
                count: 2
            }
        );
        assert_eq!(
            KeyRangeBundler.unpack(&bundles[0], &all).unwrap(),
            vec!["b0000001", "b0000002", "b0000003"]
        );
        assert!(KeyRangeBundler.unpack(&Bundle::Keys(vec![]), &all).is_err());
    }

    #[test]
    fn test_pack_empty_set() {
        assert!(ExplicitKeyBundler.pack(&[], 10).is_empty());
        assert!(KeyRangeBundler.pack(&[], 10).is_empty());
    }
}
