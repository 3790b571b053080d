//! Exporters: what a job does with each chunk of records.

use super::store::{Document, DocumentStore};
use super::{ChunkRecords, JobLog, JobStatus, RecordSets, Vals};
use crate::call_number::{self, searchable_call_number, CallNumberKind};
use crate::config::ExporterConfig;
use crate::converter::SierraToMarcConverter;
use crate::error::{CompileError, ExportError, ExportResult};
use crate::names::{
    shorten_name, OrgEventNameParser, ParsedName, PersonalNameParser, PersonalNamePermutator,
    SequentialFieldParser,
};
use crate::record::{Field, Record};
use crate::ruleset::{MapLookup, Ruleset};
use crate::sierra::{BibRecord, RecordSource, SourceRecord};
use crate::text::{clean, extract_years, split_pdate_and_cdate};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::debug;

/// One kind of export job.
///
/// Implementors list the records to export and delete, and say what
/// exporting or deleting one chunk means. The remaining hooks have no-op
/// defaults. Chunk methods run concurrently, so they take `&self`.
pub trait Exporter: Send + Sync {
    /// Name of the export type, used in logs.
    fn export_type(&self) -> &str;

    /// Chunk sizes and bundler for this exporter.
    fn config(&self) -> &ExporterConfig;

    /// Keys of the records to export.
    ///
    /// # Errors
    ///
    /// Returns an error if the source can't be queried.
    fn get_records(&self) -> ExportResult<RecordSets>;

    /// Keys of the records to delete, or `None` if this exporter never
    /// deletes.
    ///
    /// # Errors
    ///
    /// Returns an error if the source can't be queried.
    fn get_deletions(&self) -> ExportResult<Option<RecordSets>> {
        Ok(None)
    }

    /// Export one chunk.
    ///
    /// # Errors
    ///
    /// An error fails the chunk.
    fn export_records(&self, records: &ChunkRecords, log: &JobLog) -> ExportResult<Vals>;

    /// Delete one chunk.
    ///
    /// # Errors
    ///
    /// An error fails the chunk.
    fn delete_records(&self, _records: &ChunkRecords, _log: &JobLog) -> ExportResult<Vals> {
        Ok(Vals::Null)
    }

    /// Merge the vals of a batch's chunks (and the running total).
    fn compile_vals(&self, results: &[Vals]) -> Vals {
        super::compile_vals(results)
    }

    /// Runs once before the plan is generated; the returned vals seed the
    /// job's running total.
    ///
    /// # Errors
    ///
    /// An error fails the job before any chunk runs.
    fn initialize(&self, _log: &JobLog) -> ExportResult<Vals> {
        Ok(Vals::Null)
    }

    /// Runs once after every batch, unless a batch couldn't be delegated.
    ///
    /// # Errors
    ///
    /// An error is logged as a job error.
    fn final_callback(&self, _vals: &Vals, _status: JobStatus, _log: &JobLog) -> ExportResult<()> {
        Ok(())
    }
}

const CALL_NUMBER_TAGS: &[&str] = &["050", "082", "086", "090", "092", "099", "852"];

/// Rules choosing a call number scheme from the field it was cataloged in:
/// `050`/`090` are LC, `082`/`092` Dewey, `086` SuDoc and `099` local.
/// For `852` the first indicator decides.
#[must_use]
pub fn default_call_number_rules() -> Ruleset<Field, CallNumberKind> {
    Ruleset::new(CallNumberKind::Default)
        .rule(
            |f: &Field| f.tag().to_string(),
            MapLookup::from_iter([
                ("050".to_string(), CallNumberKind::Lc),
                ("090".to_string(), CallNumberKind::Lc),
                ("082".to_string(), CallNumberKind::Dewey),
                ("092".to_string(), CallNumberKind::Dewey),
                ("086".to_string(), CallNumberKind::Sudoc),
                ("099".to_string(), CallNumberKind::Other),
            ]),
        )
        .rule(
            |f: &Field| format!("{}|{}", f.tag(), f.indicator1()),
            MapLookup::from_iter([
                ("852|0".to_string(), CallNumberKind::Lc),
                ("852|1".to_string(), CallNumberKind::Dewey),
                ("852|3".to_string(), CallNumberKind::Sudoc),
                ("852|8".to_string(), CallNumberKind::Other),
            ]),
        )
}

/// Search index document for one bibliographic record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibDocument {
    /// Record number.
    pub id: String,
    /// Cleaned `245 $a $b $n $p`.
    pub title: Option<String>,
    /// Search permutations of every personal, organization and event
    /// name in `1XX` and `7XX`.
    pub author_search: Vec<String>,
    /// Short form of the main entry.
    pub author_short: Option<String>,
    /// Call numbers as cataloged.
    pub call_numbers: Vec<String>,
    /// Sort key of the first call number.
    pub call_number_sort: Option<String>,
    /// Prefix-search shingles of every call number.
    pub call_number_search: Vec<String>,
    /// Years from `260`/`264 $c`, publication and copyright dates alike.
    pub publication_years: Vec<String>,
}

fn join_subfields(field: &Field, codes: &str) -> String {
    field
        .filter_subfields(codes, "")
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl BibDocument {
    /// Build the document for a compiled record.
    #[must_use]
    pub fn from_marc(
        id: &str,
        record: &Record,
        call_number_rules: &Ruleset<Field, CallNumberKind>,
    ) -> Self {
        let mut doc = BibDocument {
            id: id.to_string(),
            title: record
                .get_field("245")
                .map(|f| clean(&join_subfields(f, "abnp")))
                .filter(|t| !t.is_empty()),
            ..BibDocument::default()
        };
        doc.add_authors(record);
        doc.add_call_numbers(record, call_number_rules);

        let mut years = IndexSet::new();
        for field in record.fields_matching(&["260", "264"]) {
            for date in field.subfields_by_code('c') {
                let (pub_date, copyright_date) = split_pdate_and_cdate(date);
                years.extend(extract_years(&pub_date));
                years.extend(extract_years(&copyright_date));
            }
        }
        doc.publication_years = years.into_iter().collect();
        doc
    }

    fn add_authors(&mut self, record: &Record) {
        let mut search = IndexSet::new();
        for field in record.fields_matching(&["100", "700"]) {
            let parsed = PersonalNameParser::new(field).parse();
            if parsed.heading.is_none() {
                continue;
            }
            search.extend(PersonalNamePermutator::new(&parsed).get_search_permutations());
            if self.author_short.is_none() && field.tag() == "100" {
                self.author_short = Some(shorten_name(&ParsedName::Person(parsed)));
            }
        }
        for field in record.fields_matching(&["110", "111", "710", "711"]) {
            for heading in OrgEventNameParser::new(field).parse() {
                search.extend(heading.heading_parts.iter().map(|part| part.name.clone()));
                if self.author_short.is_none() && field.tag().starts_with('1') {
                    self.author_short = Some(shorten_name(&ParsedName::OrgEvent(heading)));
                }
            }
        }
        self.author_search = search.into_iter().filter(|s| !s.is_empty()).collect();
    }

    fn add_call_numbers(&mut self, record: &Record, rules: &Ruleset<Field, CallNumberKind>) {
        let mut search = IndexSet::new();
        for field in record.fields_matching(CALL_NUMBER_TAGS) {
            let codes = if field.tag() == "852" { "hi" } else { "ab" };
            let call = join_subfields(field, codes);
            if call.is_empty() {
                continue;
            }
            let kind = rules.evaluate(field);
            if self.call_number_sort.is_none() {
                self.call_number_sort = Some(call_number::normalize(&call, kind));
            }
            search.extend(searchable_call_number(&call));
            self.call_numbers.push(call);
        }
        self.call_number_search = search.into_iter().collect();
    }

    /// The document as stored.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] if the document can't be serialized.
    pub fn to_document(&self) -> ExportResult<Document> {
        let body = serde_json::to_value(self).map_err(|e| ExportError::Store(e.to_string()))?;
        Ok(Document {
            id: self.id.clone(),
            body,
        })
    }
}

/// Exports bibliographic records to a search index: each record is
/// compiled to MARC, turned into a [`BibDocument`] and added to the store
/// without committing. Deleted records are removed from the store. The
/// final callback commits.
pub struct MarcIndexExporter<S, D> {
    export_type: String,
    config: ExporterConfig,
    source: S,
    store: D,
    converter: SierraToMarcConverter,
    call_number_rules: Ruleset<Field, CallNumberKind>,
}

impl<S, D> fmt::Debug for MarcIndexExporter<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcIndexExporter")
            .field("export_type", &self.export_type)
            .field("config", &self.config)
            .field("call_number_rules", &self.call_number_rules)
            .finish_non_exhaustive()
    }
}

impl<S: RecordSource, D: DocumentStore> MarcIndexExporter<S, D> {
    /// An exporter reading from `source` and writing to `store`, with a
    /// default converter and [`default_call_number_rules`].
    pub fn new(
        export_type: impl Into<String>,
        config: ExporterConfig,
        source: S,
        store: D,
    ) -> Self {
        MarcIndexExporter {
            export_type: export_type.into(),
            config,
            source,
            store,
            converter: SierraToMarcConverter::default(),
            call_number_rules: default_call_number_rules(),
        }
    }

    /// Use `converter` (e.g. one built from configuration) to compile
    /// records.
    #[must_use]
    pub fn with_converter(mut self, converter: SierraToMarcConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Replace the call number scheme rules.
    #[must_use]
    pub fn with_call_number_rules(mut self, rules: Ruleset<Field, CallNumberKind>) -> Self {
        self.call_number_rules = rules;
        self
    }

    /// The document store.
    pub fn store(&self) -> &D {
        &self.store
    }

    /// Compile one source record and build its document. Fields the
    /// converter had to drop are logged as warnings.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Compile`] if the record can't be compiled.
    pub fn compile(&self, bib: &BibRecord, log: &JobLog) -> ExportResult<BibDocument> {
        let mut converter = self.converter.clone();
        converter.reset();
        let record = converter.compile_original_marc(bib)?;
        for warning in converter.warnings() {
            log.warning(&format!("{} field dropped: {}", warning.record_id, warning.message));
        }
        Ok(BibDocument::from_marc(bib.record_id(), &record, &self.call_number_rules))
    }
}

impl<S: RecordSource, D: DocumentStore> Exporter for MarcIndexExporter<S, D> {
    fn export_type(&self) -> &str {
        &self.export_type
    }

    fn config(&self) -> &ExporterConfig {
        &self.config
    }

    fn get_records(&self) -> ExportResult<RecordSets> {
        Ok(RecordSets::Single(self.source.record_keys()?))
    }

    fn get_deletions(&self) -> ExportResult<Option<RecordSets>> {
        Ok(Some(RecordSets::Single(self.source.deletion_keys()?)))
    }

    fn export_records(&self, records: &ChunkRecords, log: &JobLog) -> ExportResult<Vals> {
        let bibs = self.source.fetch(&records.keys)?;
        let mut docs = Vec::with_capacity(bibs.len());
        let mut exported = Vec::new();
        let mut skipped = Vec::new();
        for bib in &bibs {
            match self.compile(bib, log) {
                Ok(doc) => {
                    exported.push(doc.id.clone());
                    docs.push(doc.to_document()?);
                },
                Err(ExportError::Compile(CompileError { record_id, message })) => {
                    log.warning(&format!("{record_id} update skipped due to error: {message}"));
                    skipped.push(record_id);
                },
                Err(e) => return Err(e),
            }
        }
        for key in &records.keys {
            if !bibs.iter().any(|b| &b.record_num == key) {
                log.warning(&format!("{key} update skipped due to error: record not found"));
                skipped.push(key.clone());
            }
        }
        debug!(
            exporter = %self.export_type,
            docs = docs.len(),
            skipped = skipped.len(),
            "indexing chunk"
        );
        self.store.add(docs, false)?;
        Ok(json!({ "exported": exported, "skipped": skipped }))
    }

    fn delete_records(&self, records: &ChunkRecords, _log: &JobLog) -> ExportResult<Vals> {
        self.store.delete(&records.keys, false)?;
        Ok(json!({ "deleted": records.keys }))
    }

    fn final_callback(&self, _vals: &Vals, _status: JobStatus, log: &JobLog) -> ExportResult<()> {
        log.info(&format!("Committing {} updates...", self.export_type));
        self.store.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemoryStore;
    use crate::record::Subfield;
    use crate::sierra::{FixtureSource, VarFieldRow};
    use std::sync::Arc;

    fn varfield(code: char, tag: &str, occ: u32, content: &str) -> VarFieldRow {
        VarFieldRow {
            varfield_type_code: code,
            marc_tag: Some(tag.to_string()),
            marc_ind1: ' ',
            marc_ind2: ' ',
            occ_num: occ,
            field_content: content.to_string(),
        }
    }

    fn sample_bib() -> BibRecord {
        let mut bib = BibRecord::new("b1000001");
        let mut author = varfield('a', "100", 0, "|aAdams, Henry,|d1838-1918.");
        author.marc_ind1 = '1';
        bib.varfields = vec![
            author,
            varfield('t', "245", 0, "|aThe education of Henry Adams :|ban autobiography."),
            varfield('p', "260", 0, "|aBoston :|bHoughton Mifflin,|c1918, c1907."),
            varfield('c', "050", 0, "|aE175.5.A2|bA3"),
        ];
        bib
    }

    fn data_field(tag: &str, ind1: char) -> Field {
        Field::data(tag, [ind1, ' '], vec![Subfield::new('h', "QA76")]).unwrap()
    }

    #[test]
    fn test_call_number_rules() {
        let rules = default_call_number_rules();
        assert_eq!(rules.evaluate(&data_field("050", ' ')), CallNumberKind::Lc);
        assert_eq!(rules.evaluate(&data_field("092", ' ')), CallNumberKind::Dewey);
        assert_eq!(rules.evaluate(&data_field("852", '3')), CallNumberKind::Sudoc);
        assert_eq!(rules.evaluate(&data_field("852", '7')), CallNumberKind::Default);
        assert_eq!(rules.evaluate(&data_field("500", ' ')), CallNumberKind::Default);
    }

    #[test]
    fn test_document_fields() {
        let exporter = MarcIndexExporter::new(
            "BibsToIndex",
            ExporterConfig::default(),
            FixtureSource::from_records([]),
            MemoryStore::new(),
        );
        let log = JobLog::new("BibsToIndex");
        let doc = exporter.compile(&sample_bib(), &log).unwrap();

        assert_eq!(doc.id, "b1000001");
        assert_eq!(doc.title.as_deref(), Some("The education of Henry Adams : an autobiography"));
        assert_eq!(doc.author_short.as_deref(), Some("Adams, H."));
        assert!(doc.author_search.iter().any(|p| p.contains("Henry Adams")));
        assert_eq!(doc.call_numbers, vec!["E175.5.A2 A3"]);
        assert_eq!(
            doc.call_number_sort,
            Some(call_number::normalize("E175.5.A2 A3", CallNumberKind::Lc))
        );
        assert_eq!(doc.call_number_search.first().map(String::as_str), Some("E"));
        assert_eq!(doc.publication_years, vec!["1918", "1907"]);
        assert_eq!(log.warnings(), 0);
    }

    #[test]
    fn test_export_skips_bad_records_with_a_warning() {
        let store = Arc::new(MemoryStore::new());
        let exporter = MarcIndexExporter::new(
            "BibsToIndex",
            ExporterConfig::default(),
            FixtureSource::from_records([sample_bib(), BibRecord::new("b2")]),
            Arc::clone(&store),
        );
        let log = JobLog::new("BibsToIndex");
        let chunk = ChunkRecords {
            record_set: None,
            keys: vec!["b1000001".into(), "b2".into(), "b404".into()],
        };
        let vals = exporter.export_records(&chunk, &log).unwrap();

        assert_eq!(vals, json!({"exported": ["b1000001"], "skipped": ["b2", "b404"]}));
        assert_eq!(log.warnings(), 2);
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.committed_count(), 0);

        exporter.final_callback(&vals, JobStatus::Success, &log).unwrap();
        assert_eq!(store.committed_count(), 1);
        assert_eq!(
            store.get("b1000001").unwrap()["title"],
            json!("The education of Henry Adams : an autobiography")
        );
    }

    #[test]
    fn test_deletions() {
        let mut gone = BibRecord::new("b9");
        gone.deleted = true;
        let store = Arc::new(MemoryStore::new());
        let exporter = MarcIndexExporter::new(
            "BibsToIndex",
            ExporterConfig::default(),
            FixtureSource::from_records([sample_bib(), gone]),
            Arc::clone(&store),
        );
        assert_eq!(
            exporter.get_deletions().unwrap(),
            Some(RecordSets::Single(vec!["b9".to_string()]))
        );
        let log = JobLog::new("BibsToIndex");
        let chunk = ChunkRecords {
            record_set: None,
            keys: vec!["b9".into()],
        };
        assert_eq!(exporter.delete_records(&chunk, &log).unwrap(), json!({"deleted": ["b9"]}));
    }
}
