//! Chunked, batched export jobs.
//!
//! An export job moves a set of source records into a document store.
//! The pieces:
//!
//! - [`JobPlan`] splits the record keys of each [`Operation`] into chunks
//!   (via a [`RecordSetBundler`]) and groups chunks into batches, keeping
//!   what is still in flight in a shared [`PlanRegistry`].
//! - An [`Exporter`] knows where records come from and what exporting or
//!   deleting a chunk means. [`MarcIndexExporter`] compiles Sierra records
//!   to MARC and indexes them in a [`DocumentStore`].
//! - A [`ChunkExecutor`] runs the chunks of one batch, in parallel with
//!   [`RayonExecutor`] or in order with [`SerialExecutor`].
//! - [`JobRunner`] drives a job from plan to final cleanup and returns a
//!   [`JobReport`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use sierra_marc::config::ExportSettings;
//! use sierra_marc::export::{JobRunner, JobStatus, MarcIndexExporter, MemoryStore, SerialExecutor};
//! use sierra_marc::sierra::{BibRecord, FixtureSource, VarFieldRow};
//!
//! let mut bib = BibRecord::new("b1000001");
//! bib.varfields.push(VarFieldRow {
//!     varfield_type_code: 't',
//!     marc_tag: Some("245".into()),
//!     marc_ind1: '1',
//!     marc_ind2: '0',
//!     occ_num: 0,
//!     field_content: "|aSongs of innocence /".into(),
//! });
//!
//! let settings = ExportSettings::default();
//! let store = Arc::new(MemoryStore::new());
//! let exporter = MarcIndexExporter::new(
//!     "BibsToIndex",
//!     settings.exporter("BibsToIndex"),
//!     FixtureSource::from_records([bib]),
//!     Arc::clone(&store),
//! );
//!
//! let report = JobRunner::new("1", &settings.plan)
//!     .run(&exporter, &SerialExecutor)
//!     .unwrap();
//! assert_eq!(report.status, JobStatus::Success);
//! assert_eq!(store.committed_count(), 1);
//! ```

mod bundler;
mod executor;
mod exporter;
mod plan;
mod registry;
mod runner;
mod store;

pub use bundler::{bundler_for, Bundle, ExplicitKeyBundler, KeyRangeBundler, RecordSetBundler};
pub use executor::{ChunkExecutor, ChunkOutcome, ChunkTask, RayonExecutor, SerialExecutor};
pub use exporter::{default_call_number_rules, BibDocument, Exporter, MarcIndexExporter};
pub use plan::{ChunkInfo, JobPlan, PlanTotals};
pub use registry::{ChunkEntry, ChunkState, PlanRegistry};
pub use runner::{JobReport, JobRunner, JobState};
pub use store::{Document, DocumentStore, MemoryStore};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

use crate::error::ExportError;

/// Values returned by chunk operations and merged across a job.
pub type Vals = Value;

/// What a chunk does with its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Export (index) the records.
    Export,
    /// Delete the records from the index.
    Deletion,
}

/// Both operations, in the order a plan runs them.
pub const OPERATIONS: [Operation; 2] = [Operation::Export, Operation::Deletion];

impl Operation {
    /// Lowercase name used in chunk ids and labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Export => "export",
            Operation::Deletion => "deletion",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "export" => Ok(Operation::Export),
            "deletion" => Ok(Operation::Deletion),
            other => Err(ExportError::InvalidChunkId(format!("unknown operation {other:?}"))),
        }
    }
}

/// Record keys for one operation: one unnamed set or several named ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSets {
    /// A single, unnamed set.
    Single(Vec<String>),
    /// Named sets, in insertion order.
    Named(IndexMap<String, Vec<String>>),
}

impl RecordSets {
    /// `(name, keys)` pairs; the single set has no name.
    #[must_use]
    pub fn sets(&self) -> Vec<(Option<&str>, &[String])> {
        match self {
            RecordSets::Single(keys) => vec![(None, keys.as_slice())],
            RecordSets::Named(sets) => sets
                .iter()
                .map(|(name, keys)| (Some(name.as_str()), keys.as_slice()))
                .collect(),
        }
    }

    /// Keys of the set called `name` (`None` for the single set).
    #[must_use]
    pub fn get(&self, name: Option<&str>) -> Option<&[String]> {
        match (self, name) {
            (RecordSets::Single(keys), None) => Some(keys),
            (RecordSets::Named(sets), Some(name)) => sets.get(name).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Total number of keys across sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets().iter().map(|(_, keys)| keys.len()).sum()
    }

    /// True if there are no keys in any set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The records one chunk works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecords {
    /// The record set the keys come from, if sets are named.
    pub record_set: Option<String>,
    /// Record keys, in bundler order.
    pub keys: Vec<String>,
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No errors were logged.
    Success,
    /// The job ran to the end but logged errors.
    DoneWithErrors,
    /// The job failed as a whole.
    Errors,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Success => "success",
            JobStatus::DoneWithErrors => "done_with_errors",
            JobStatus::Errors => "errors",
        })
    }
}

/// Recursively merge `update` into `orig`: objects merge key by key,
/// arrays concatenate and anything else is replaced.
pub fn merge_vals(orig: &mut Vals, update: &Vals) {
    match (orig, update) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match value {
                    Value::Object(_) => {
                        let slot = target
                            .entry(key.clone())
                            .or_insert_with(|| Value::Object(serde_json::Map::new()));
                        if !slot.is_object() {
                            *slot = Value::Object(serde_json::Map::new());
                        }
                        merge_vals(slot, value);
                    },
                    Value::Array(items) => {
                        let slot = target
                            .entry(key.clone())
                            .or_insert_with(|| Value::Array(Vec::new()));
                        match slot {
                            Value::Array(existing) => existing.extend(items.iter().cloned()),
                            other => *other = value.clone(),
                        }
                    },
                    _ => {
                        target.insert(key.clone(), value.clone());
                    },
                }
            }
        },
        (orig, update) => *orig = update.clone(),
    }
}

/// Merge a list of vals; non-objects are skipped. Returns `Null` when
/// nothing was merged.
#[must_use]
pub fn compile_vals(results: &[Vals]) -> Vals {
    let mut vals = Value::Object(serde_json::Map::new());
    for item in results.iter().filter(|v| v.is_object()) {
        merge_vals(&mut vals, item);
    }
    match &vals {
        Value::Object(map) if map.is_empty() => Value::Null,
        _ => vals,
    }
}

/// Job-scoped logging that also counts warnings and errors.
#[derive(Debug)]
pub struct JobLog {
    label: String,
    warnings: AtomicU64,
    errors: AtomicU64,
}

impl JobLog {
    /// A log whose messages are tagged with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        JobLog {
            label: label.into(),
            warnings: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Log at info level.
    pub fn info(&self, message: &str) {
        info!(exporter = %self.label, "{message}");
    }

    /// Log a warning and count it.
    pub fn warning(&self, message: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        warn!(exporter = %self.label, "{message}");
    }

    /// Log an error and count it.
    pub fn error(&self, message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        error!(exporter = %self.label, "{message}");
    }

    /// Warnings logged so far.
    #[must_use]
    pub fn warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Errors logged so far.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_vals_merges_nested_and_concatenates_lists() {
        let merged = compile_vals(&[
            Value::Null,
            json!({"outer": {"inner": {"a": [0], "b": 1}}}),
            json!({"outer": {"inner": {"a": [1]}}, "count": 2}),
            json!("not a dict"),
        ]);
        assert_eq!(merged, json!({"outer": {"inner": {"a": [0, 1], "b": 1}}, "count": 2}));
    }

    #[test]
    fn test_compile_vals_of_nothing_is_null() {
        assert_eq!(compile_vals(&[]), Value::Null);
        assert_eq!(compile_vals(&[Value::Null, json!({})]), Value::Null);
    }

    #[test]
    fn test_record_sets() {
        let single = RecordSets::Single(vec!["b1".into(), "b2".into()]);
        assert_eq!(single.sets(), vec![(None, &["b1".to_string(), "b2".to_string()][..])]);
        assert_eq!(single.len(), 2);

        let named = RecordSets::Named(IndexMap::from([
            ("items".to_string(), vec!["i1".to_string()]),
            ("holdings".to_string(), vec![]),
        ]));
        assert_eq!(named.get(Some("items")), Some(&["i1".to_string()][..]));
        assert_eq!(named.get(None), None);
        assert_eq!(named.len(), 1);
    }

    #[test]
    fn test_job_log_counts() {
        let log = JobLog::new("Test");
        log.info("hello");
        log.warning("careful");
        log.error("broken");
        log.error("broken again");
        assert_eq!((log.warnings(), log.errors()), (1, 2));
    }

    #[test]
    fn test_operation_round_trips_through_str() {
        for op in OPERATIONS {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("export2".parse::<Operation>().is_err());
    }
}
