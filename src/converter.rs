//! Compiling Sierra source records into MARC records.
//!
//! [`SierraToMarcConverter`] turns the leader, control-field and
//! variable-field rows of each [`SourceRecord`] into a [`Record`]. Bad
//! records never stop a batch: their errors are collected on the converter
//! and the rest of the batch carries on.
//!
//! Variable fields are put back in the order a cataloger sees them in
//! Sierra. Rows are sorted by MARC tag, numbered by runs of the same field
//! group tag, and then sorted by `group * 1000 + occurrence`.
//!
//! # Examples
//!
//! ```
//! use sierra_marc::converter::SierraToMarcConverter;
//! use sierra_marc::sierra::{BibRecord, VarFieldRow};
//!
//! let mut bib = BibRecord::new("b1000001");
//! bib.varfields.push(VarFieldRow {
//!     varfield_type_code: 't',
//!     marc_tag: Some("245".into()),
//!     marc_ind1: '1',
//!     marc_ind2: '0',
//!     occ_num: 0,
//!     field_content: "|aA title /|cby Someone.".into(),
//! });
//!
//! let mut converter = SierraToMarcConverter::default();
//! let records = converter.to_marc(&[bib], true);
//! assert_eq!(converter.success_count(), 1);
//! assert_eq!(records[0].get_field("t245").unwrap().get_subfield('c'), Some("by Someone."));
//! ```

use crate::config::ConverterConfig;
use crate::error::{CompileError, MarcError, Result};
use crate::leader::Leader;
use crate::reader::MarcReader;
use crate::record::{is_control_tag, Field, Record, Subfield};
use crate::sierra::{LeaderFieldRow, SourceRecord, VarFieldRow};
use crate::writer::MarcWriter;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

lazy_static! {
    static ref SIERRA_SUBFIELD: Regex = Regex::new(r"\|([a-z0-9])").expect("valid regex");
}

/// Converts Sierra source records to MARC, collecting per-record errors.
#[derive(Debug, Clone)]
pub struct SierraToMarcConverter {
    base_leader: Leader,
    force_utf8: bool,
    errors: Vec<CompileError>,
    warnings: Vec<CompileError>,
    success_count: usize,
}

impl Default for SierraToMarcConverter {
    fn default() -> Self {
        SierraToMarcConverter::new(Leader::default(), true)
    }
}

impl SierraToMarcConverter {
    /// A converter that overlays leader-field rows on `base_leader`.
    #[must_use]
    pub fn new(base_leader: Leader, force_utf8: bool) -> Self {
        SierraToMarcConverter {
            base_leader,
            force_utf8,
            errors: Vec::new(),
            warnings: Vec::new(),
            success_count: 0,
        }
    }

    /// A converter built from the `[converter]` settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base leader is invalid.
    pub fn from_config(config: &ConverterConfig) -> anyhow::Result<Self> {
        Ok(SierraToMarcConverter::new(config.leader()?, config.force_utf8))
    }

    /// Clear collected errors, warnings and the success count.
    pub fn reset(&mut self) {
        self.errors.clear();
        self.warnings.clear();
        self.success_count = 0;
    }

    /// Records that were skipped, with the reason.
    #[must_use]
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Fields that were dropped from otherwise good records.
    #[must_use]
    pub fn warnings(&self) -> &[CompileError] {
        &self.warnings
    }

    /// Records compiled (by [`to_marc`](Self::to_marc)) or written (by
    /// [`to_file`](Self::to_file)) in the last run.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.success_count
    }

    /// Overlay the coded positions of a leader-field row on `base`.
    #[must_use]
    pub fn compile_leader(row: Option<&LeaderFieldRow>, base: &Leader) -> Leader {
        let mut leader = base.clone();
        if let Some(lf) = row {
            leader.record_status = lf.record_status_code;
            leader.record_type = lf.record_type_code;
            leader.bibliographic_level = lf.bib_level_code;
            leader.control_record_type = lf.control_type_code;
            leader.character_coding = lf.char_encoding_scheme_code;
            leader.encoding_level = lf.encoding_level_code;
            leader.cataloging_form = lf.descriptive_cat_form_code;
            leader.multipart_level = lf.multipart_level_code;
        }
        leader
    }

    fn compile_control_fields<R: SourceRecord>(
        record: &R,
    ) -> std::result::Result<Vec<Field>, CompileError> {
        let rows = record.control_fields().map_err(|e| {
            CompileError::new(
                record.record_id(),
                format!("Skipped. Couldn't retrieve control fields. ({e})"),
            )
        })?;
        rows.iter()
            .map(|cf| {
                let tag = cf.tag();
                Field::control(tag.as_str(), cf.data.as_str()).map_err(|e| {
                    CompileError::new(
                        record.record_id(),
                        format!("Skipped. Couldn't create MARC field for {tag}. ({e})"),
                    )
                })
            })
            .collect()
    }

    /// Put variable-field rows in cataloger order. Rows without a MARC
    /// tag are dropped. Ties keep their storage order.
    #[must_use]
    pub fn order_varfields(varfields: &[VarFieldRow]) -> Vec<&VarFieldRow> {
        let mut by_tag: Vec<&VarFieldRow> = varfields.iter().collect();
        by_tag.sort_by(|a, b| {
            a.marc_tag
                .as_deref()
                .unwrap_or("")
                .cmp(b.marc_tag.as_deref().unwrap_or(""))
        });

        let mut group_num = 0u64;
        let mut last_type: Option<char> = None;
        let mut keyed: Vec<(u64, &VarFieldRow)> = Vec::with_capacity(by_tag.len());
        for vf in by_tag {
            if vf.marc_tag.as_deref().map_or(true, str::is_empty) {
                continue;
            }
            if last_type.is_some_and(|t| t != vf.varfield_type_code) {
                group_num += 1;
            }
            keyed.push((group_num * 1000 + u64::from(vf.occ_num), vf));
            last_type = Some(vf.varfield_type_code);
        }
        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, vf)| vf).collect()
    }

    /// Build one MARC field from a variable-field row. Content that
    /// doesn't open with a `|x` marker is treated as `|a`.
    ///
    /// # Errors
    ///
    /// Returns an error if the row has no tag or the tag is malformed.
    pub fn varfield_to_field(vf: &VarFieldRow) -> Result<Field> {
        let tag = vf
            .marc_tag
            .as_deref()
            .ok_or_else(|| MarcError::InvalidField("Varfield has no MARC tag".to_string()))?;
        if is_control_tag(tag) {
            return Field::control(tag, vf.field_content.as_str());
        }

        let content = if vf.field_content.starts_with('|') {
            vf.field_content.clone()
        } else {
            format!("|a{}", vf.field_content)
        };
        let markers: Vec<_> = SIERRA_SUBFIELD.captures_iter(&content).collect();
        let subfields = markers.iter().enumerate().filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let code = caps[1].chars().next()?;
            let end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(content.len(), |m| m.start());
            Some(Subfield::new(code, &content[whole.end()..end]))
        });
        Ok(Field::data(tag, [vf.marc_ind1, vf.marc_ind2], subfields)?
            .with_group_tag(vf.varfield_type_code))
    }

    fn compile_varfields<R: SourceRecord>(
        &mut self,
        record: &R,
    ) -> std::result::Result<Vec<Field>, CompileError> {
        let rows = record.varfields().map_err(|e| {
            CompileError::new(
                record.record_id(),
                format!("Skipped. Couldn't retrieve varfields. ({e})"),
            )
        })?;
        let mut fields = Vec::with_capacity(rows.len());
        for vf in Self::order_varfields(rows) {
            match Self::varfield_to_field(vf) {
                Ok(field) => fields.push(field),
                Err(e) => {
                    let tag = vf.marc_tag.as_deref().unwrap_or("");
                    warn!(record = record.record_id(), tag, error = %e, "dropping varfield");
                    self.warnings.push(CompileError::new(
                        record.record_id(),
                        format!("Couldn't create MARC field for {tag}. ({e})"),
                    ));
                },
            }
        }
        Ok(fields)
    }

    /// Compile one source record.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if control fields or varfields can't be
    /// retrieved, a control field can't be built, or the record ends up
    /// with no fields.
    pub fn compile_original_marc<R: SourceRecord>(
        &mut self,
        record: &R,
    ) -> std::result::Result<Record, CompileError> {
        let mut marc = Record::new(Self::compile_leader(record.leader_field(), &self.base_leader))
            .with_record_num(record.record_id());
        marc.add_fields(Self::compile_control_fields(record)?);
        marc.add_fields(self.compile_varfields(record)?);
        if marc.fields.is_empty() {
            return Err(CompileError::new(
                record.record_id(),
                "Skipped. No MARC fields on Bib record.",
            ));
        }
        Ok(marc)
    }

    /// Compile every record, keeping the ones that succeed. Failures go to
    /// [`errors`](Self::errors). With `reset`, earlier errors are cleared
    /// first.
    pub fn to_marc<R: SourceRecord>(&mut self, records: &[R], reset: bool) -> Vec<Record> {
        if reset {
            self.reset();
        }
        let mut compiled = Vec::with_capacity(records.len());
        for record in records {
            match self.compile_original_marc(record) {
                Ok(marc) => compiled.push(marc),
                Err(e) => {
                    warn!(record = %e.record_id, message = %e.message, "record skipped");
                    self.errors.push(e);
                },
            }
        }
        self.success_count = compiled.len();
        debug!(compiled = compiled.len(), errors = self.errors.len(), "converted batch");
        compiled
    }

    fn write_marc_records<W: Write>(
        &mut self,
        records: &[Record],
        writer: &mut MarcWriter<W>,
    ) -> usize {
        let mut written = 0;
        for record in records {
            match writer.write_record(record) {
                Ok(()) => written += 1,
                Err(e) => {
                    let id = record.record_num.clone().unwrap_or_default();
                    self.errors.push(CompileError::new(
                        id,
                        format!("Could not write record to file. {e}"),
                    ));
                },
            }
        }
        written
    }

    /// Write `records` to `dir/filename` as binary MARC and return the path
    /// written.
    ///
    /// Without a `filename` a timestamped name is used. If the file exists
    /// and `append` is set, its records are read and written back ahead of
    /// the new ones; without `append` a fresh name is chosen instead of
    /// overwriting. Records that can't be written are added to
    /// [`errors`](Self::errors) and [`success_count`](Self::success_count)
    /// counts the new records actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing file can't be read back or the
    /// target can't be created or flushed.
    pub fn to_file(
        &mut self,
        records: &[Record],
        dir: &Path,
        filename: Option<&str>,
        append: bool,
    ) -> Result<PathBuf> {
        self.success_count = 0;
        let mut path = dir.join(filename.map_or_else(timestamp_filename, str::to_string));

        let mut existing = Vec::new();
        if path.exists() {
            if append {
                let mut reader = MarcReader::new(BufReader::new(File::open(&path)?));
                existing = reader.read_all()?;
                debug!(
                    path = %path.display(),
                    records = existing.len(),
                    "appending to existing file"
                );
            } else {
                path = unused_path(dir);
            }
        }

        let mut writer = MarcWriter::new(BufWriter::new(File::create(&path)?))
            .with_force_utf8(self.force_utf8);
        if !existing.is_empty() {
            self.write_marc_records(&existing, &mut writer);
        }
        self.success_count = self.write_marc_records(records, &mut writer);
        writer.finish()?;
        info!(path = %path.display(), written = self.success_count, "wrote MARC file");
        Ok(path)
    }
}

fn timestamp_filename() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}.mrc", now.as_secs(), now.subsec_micros())
}

fn unused_path(dir: &Path) -> PathBuf {
    let base = timestamp_filename();
    let stem = base.trim_end_matches(".mrc");
    let mut candidate = dir.join(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}-{n}.mrc"));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sierra::{BibRecord, ControlFieldRow};

    fn vf(type_code: char, tag: Option<&str>, occ_num: u32, content: &str) -> VarFieldRow {
        VarFieldRow {
            varfield_type_code: type_code,
            marc_tag: tag.map(str::to_string),
            marc_ind1: ' ',
            marc_ind2: ' ',
            occ_num,
            field_content: content.to_string(),
        }
    }

    #[test]
    fn test_order_varfields_drops_untagged_rows() {
        let rows = vec![
            vf('n', Some("500"), 0, "|aNote"),
            vf('x', None, 0, "Internal note"),
            vf('x', Some(""), 1, "Blank tag"),
        ];
        let ordered = SierraToMarcConverter::order_varfields(&rows);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].marc_tag.as_deref(), Some("500"));
    }

    #[test]
    fn test_order_varfields_is_stable_for_shared_occurrence() {
        let rows = vec![vf('n', Some("500"), 0, "|aFirst"), vf('n', Some("500"), 0, "|aSecond")];
        let ordered = SierraToMarcConverter::order_varfields(&rows);
        assert_eq!(ordered[0].field_content, "|aFirst");
        assert_eq!(ordered[1].field_content, "|aSecond");
    }

    #[test]
    fn test_varfield_content_gets_implicit_subfield_a() {
        let field =
            SierraToMarcConverter::varfield_to_field(&vf('n', Some("500"), 0, "Plain note|bmore"))
                .unwrap();
        assert_eq!(field.get_subfield('a'), Some("Plain note"));
        assert_eq!(field.get_subfield('b'), Some("more"));
        assert_eq!(field.group_tag(), 'n');
    }

    #[test]
    fn test_varfield_with_control_tag_becomes_control_field() {
        let field =
            SierraToMarcConverter::varfield_to_field(&vf('y', Some("001"), 0, "ocm123")).unwrap();
        assert_eq!(field.control_data(), Some("ocm123"));
    }

    #[test]
    fn test_leader_overlay() {
        let row = LeaderFieldRow {
            record_status_code: 'c',
            record_type_code: 'a',
            bib_level_code: 'm',
            control_type_code: ' ',
            char_encoding_scheme_code: 'a',
            encoding_level_code: 'I',
            descriptive_cat_form_code: 'i',
            multipart_level_code: ' ',
        };
        let leader = SierraToMarcConverter::compile_leader(Some(&row), &Leader::default());
        assert_eq!(leader.to_string(), "00000cam a2200000Ii 4500");
        assert_eq!(
            SierraToMarcConverter::compile_leader(None, &Leader::default()),
            Leader::default()
        );
    }

    #[test]
    fn test_bad_control_field_skips_record() {
        let mut bib = BibRecord::new("b1");
        bib.control_fields.push(ControlFieldRow {
            control_num: 10,
            data: "oops".into(),
        });
        bib.varfields.push(vf('t', Some("245"), 0, "|aTitle"));
        let mut converter = SierraToMarcConverter::default();
        assert!(converter.to_marc(&[bib], true).is_empty());
        assert!(converter.errors()[0]
            .message
            .starts_with("Skipped. Couldn't create MARC field for 010."));
    }

    #[test]
    fn test_bad_varfield_is_dropped_with_warning() {
        let mut bib = BibRecord::new("b2");
        bib.varfields.push(vf('t', Some("245"), 0, "|aTitle"));
        bib.varfields.push(vf('n', Some("5!0"), 0, "|aBad tag"));
        let mut converter = SierraToMarcConverter::default();
        let records = converter.to_marc(&[bib], true);
        assert_eq!(records[0].fields.len(), 1);
        assert_eq!(converter.warnings().len(), 1);
        assert!(converter.errors().is_empty());
    }

    struct Unreachable;

    impl SourceRecord for Unreachable {
        fn record_id(&self) -> &str {
            "b3"
        }
        fn leader_field(&self) -> Option<&LeaderFieldRow> {
            None
        }
        fn control_fields(&self) -> std::result::Result<&[ControlFieldRow], SourceError> {
            Ok(&[])
        }
        fn varfields(&self) -> std::result::Result<&[VarFieldRow], SourceError> {
            Err(SourceError("connection lost".into()))
        }
    }

    #[test]
    fn test_retrieval_failure_is_reported() {
        let mut converter = SierraToMarcConverter::default();
        assert!(converter.to_marc(&[Unreachable], true).is_empty());
        assert_eq!(
            converter.errors()[0].to_string(),
            "Record b3: Skipped. Couldn't retrieve varfields. (connection lost)"
        );
    }
}
