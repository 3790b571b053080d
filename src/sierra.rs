//! Sierra relational rows and the record sources that deliver them.
//!
//! A bibliographic record in Sierra is spread across several tables: an
//! optional leader-field row, control-field rows and variable-field rows.
//! [`BibRecord`] gathers the rows for one record; the [`SourceRecord`]
//! trait is what the converter reads, so a failing database collaborator
//! can report that rows couldn't be retrieved.
//!
//! [`RecordSource`] is the collection-level collaborator used by the
//! export subsystem. [`FixtureSource`] is an in-memory implementation
//! loaded from a Django-style JSON fixture.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::sierra::{default_model_resolver, FixtureSource, RecordSource};
//!
//! let json = r#"[
//!   {"model": "base.bibrecord", "pk": 1, "fields": {"record_num": "b1000001"}},
//!   {"model": "base.varfield", "pk": 1, "fields": {
//!     "record": 1, "varfield_type_code": "t", "marc_tag": "245",
//!     "marc_ind1": "1", "marc_ind2": "0", "occ_num": 0,
//!     "field_content": "|aA title"}}
//! ]"#;
//! let source = FixtureSource::from_json(json, default_model_resolver).unwrap();
//! assert_eq!(source.record_keys().unwrap(), vec!["b1000001".to_string()]);
//! ```

use crate::error::SourceError;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coded leader values stored on a Sierra leader-field row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderFieldRow {
    /// Leader position 5.
    pub record_status_code: char,
    /// Leader position 6.
    pub record_type_code: char,
    /// Leader position 7.
    pub bib_level_code: char,
    /// Leader position 8.
    pub control_type_code: char,
    /// Leader position 9.
    pub char_encoding_scheme_code: char,
    /// Leader position 17.
    pub encoding_level_code: char,
    /// Leader position 18.
    pub descriptive_cat_form_code: char,
    /// Leader position 19.
    pub multipart_level_code: char,
}

/// A Sierra control-field row (`001`-`009`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFieldRow {
    /// Numeric control tag; `8` is field `008`.
    pub control_num: u16,
    /// Field data, verbatim.
    pub data: String,
}

impl ControlFieldRow {
    /// The three-digit MARC tag.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("{:03}", self.control_num)
    }
}

/// A Sierra variable-field row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarFieldRow {
    /// Sierra field group tag (`a` author, `t` title, `n` note, ...).
    pub varfield_type_code: char,
    /// MARC tag; rows without one are not MARC fields.
    #[serde(default)]
    pub marc_tag: Option<String>,
    /// First indicator.
    #[serde(default = "blank")]
    pub marc_ind1: char,
    /// Second indicator.
    #[serde(default = "blank")]
    pub marc_ind2: char,
    /// Position of this field among fields with the same group tag.
    pub occ_num: u32,
    /// Field content with `|x` subfield markers.
    pub field_content: String,
}

fn blank() -> char {
    ' '
}

/// Read access to the rows of one source record.
///
/// Retrieval is fallible because the rows usually come from a database.
pub trait SourceRecord {
    /// Identifier used in error messages and as the MARC record number.
    fn record_id(&self) -> &str;

    /// The leader-field row, if the record has one.
    fn leader_field(&self) -> Option<&LeaderFieldRow>;

    /// Control-field rows.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the rows can't be retrieved.
    fn control_fields(&self) -> Result<&[ControlFieldRow], SourceError>;

    /// Variable-field rows, in storage order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the rows can't be retrieved.
    fn varfields(&self) -> Result<&[VarFieldRow], SourceError>;
}

/// The rows of one bibliographic record, held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibRecord {
    /// Record number, e.g. `b1000001`.
    pub record_num: String,
    /// Marked deleted in the source; deleted records are exported as
    /// deletions.
    #[serde(default)]
    pub deleted: bool,
    /// Optional leader-field row.
    #[serde(default)]
    pub leader: Option<LeaderFieldRow>,
    /// Control-field rows.
    #[serde(default)]
    pub control_fields: Vec<ControlFieldRow>,
    /// Variable-field rows.
    #[serde(default)]
    pub varfields: Vec<VarFieldRow>,
}

impl BibRecord {
    /// An empty record with the given number.
    pub fn new(record_num: impl Into<String>) -> Self {
        BibRecord {
            record_num: record_num.into(),
            ..BibRecord::default()
        }
    }
}

impl SourceRecord for BibRecord {
    fn record_id(&self) -> &str {
        &self.record_num
    }

    fn leader_field(&self) -> Option<&LeaderFieldRow> {
        self.leader.as_ref()
    }

    fn control_fields(&self) -> Result<&[ControlFieldRow], SourceError> {
        Ok(&self.control_fields)
    }

    fn varfields(&self) -> Result<&[VarFieldRow], SourceError> {
        Ok(&self.varfields)
    }
}

/// Collection-level access to source records, keyed by record number.
pub trait RecordSource: Send + Sync {
    /// Keys of every record to export, in source order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source can't be queried.
    fn record_keys(&self) -> Result<Vec<String>, SourceError>;

    /// Keys of records to delete from the index.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source can't be queried.
    fn deletion_keys(&self) -> Result<Vec<String>, SourceError>;

    /// Fetch the records for `keys`. Unknown keys are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source can't be queried.
    fn fetch(&self, keys: &[String]) -> Result<Vec<BibRecord>, SourceError>;
}

/// Which kind of row a fixture model label holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// A bibliographic record.
    Bib,
    /// A leader-field row.
    LeaderField,
    /// A control-field row.
    ControlField,
    /// A variable-field row.
    VarField,
    /// A model the loader should skip.
    Ignored,
}

/// Resolves the fixture labels of the Sierra `base` app.
#[must_use]
pub fn default_model_resolver(label: &str) -> Option<RowKind> {
    match label.to_ascii_lowercase().as_str() {
        "base.bibrecord" => Some(RowKind::Bib),
        "base.leaderfield" => Some(RowKind::LeaderField),
        "base.controlfield" => Some(RowKind::ControlField),
        "base.varfield" => Some(RowKind::VarField),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    model: String,
    pk: u64,
    fields: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BibFields {
    record_num: String,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct Owned<T> {
    record: u64,
    #[serde(flatten)]
    row: T,
}

fn fields<T: DeserializeOwned>(entry: &FixtureEntry) -> Result<T, SourceError> {
    serde_json::from_value(entry.fields.clone()).map_err(|e| {
        SourceError(format!(
            "Bad fields for {} pk {}: {e}",
            entry.model, entry.pk
        ))
    })
}

/// In-memory [`RecordSource`] loaded from a JSON fixture.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    records: IndexMap<String, BibRecord>,
}

impl FixtureSource {
    /// Build a source from already assembled records.
    pub fn from_records(records: impl IntoIterator<Item = BibRecord>) -> Self {
        FixtureSource {
            records: records
                .into_iter()
                .map(|r| (r.record_num.clone(), r))
                .collect(),
        }
    }

    /// Load a Django-style fixture: a list of `{model, pk, fields}`
    /// objects. `resolve` maps each model label to the kind of row it
    /// holds; child rows name their bib by pk in a `record` field.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the JSON is malformed, a label doesn't
    /// resolve, or a child row names a bib that isn't in the fixture.
    pub fn from_json<F>(json: &str, resolve: F) -> Result<Self, SourceError>
    where
        F: Fn(&str) -> Option<RowKind>,
    {
        let entries: Vec<FixtureEntry> =
            serde_json::from_str(json).map_err(|e| SourceError(format!("Bad fixture: {e}")))?;

        let mut bibs: IndexMap<u64, BibRecord> = IndexMap::new();
        let mut children = Vec::new();
        for entry in &entries {
            let kind = resolve(&entry.model)
                .ok_or_else(|| SourceError(format!("Unknown model {}", entry.model)))?;
            match kind {
                RowKind::Bib => {
                    let f: BibFields = fields(entry)?;
                    let mut bib = BibRecord::new(f.record_num);
                    bib.deleted = f.deleted;
                    bibs.insert(entry.pk, bib);
                },
                RowKind::Ignored => {
                    debug!(model = %entry.model, pk = entry.pk, "skipping fixture row");
                },
                _ => children.push((kind, entry)),
            }
        }

        for (kind, entry) in children {
            let owner = |record: u64| {
                SourceError(format!(
                    "{} pk {} refers to missing record {record}",
                    entry.model, entry.pk
                ))
            };
            match kind {
                RowKind::LeaderField => {
                    let row: Owned<LeaderFieldRow> = fields(entry)?;
                    let bib = bibs.get_mut(&row.record).ok_or_else(|| owner(row.record))?;
                    bib.leader = Some(row.row);
                },
                RowKind::ControlField => {
                    let row: Owned<ControlFieldRow> = fields(entry)?;
                    let bib = bibs.get_mut(&row.record).ok_or_else(|| owner(row.record))?;
                    bib.control_fields.push(row.row);
                },
                RowKind::VarField => {
                    let row: Owned<VarFieldRow> = fields(entry)?;
                    let bib = bibs.get_mut(&row.record).ok_or_else(|| owner(row.record))?;
                    bib.varfields.push(row.row);
                },
                RowKind::Bib | RowKind::Ignored => {},
            }
        }

        Ok(FixtureSource::from_records(bibs.into_values()))
    }

    /// Look up one record by number.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BibRecord> {
        self.records.get(key)
    }

    /// Number of records, deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the source holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for FixtureSource {
    fn record_keys(&self) -> Result<Vec<String>, SourceError> {
        Ok(self
            .records
            .values()
            .filter(|r| !r.deleted)
            .map(|r| r.record_num.clone())
            .collect())
    }

    fn deletion_keys(&self) -> Result<Vec<String>, SourceError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.deleted)
            .map(|r| r.record_num.clone())
            .collect())
    }

    fn fetch(&self, keys: &[String]) -> Result<Vec<BibRecord>, SourceError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.records.get(k))
            .cloned()
            .collect())
    }
}
