//! Breaking export jobs into batches and chunks.
//!
//! Identifiers:
//! - batch id: `{instance}:{batch:05}`
//! - chunk id: `{batch_id}-{chunk}-{op}[-{record_set}]-{part}`, where the
//!   chunk number is zero-padded to the width of `batch_size - 1` and
//!   `part` counts chunks within one record set.
//!
//! Chunk numbers run from 0 to `batch_size - 1` and then wrap, starting the
//! next batch. Packing is deterministic for a given key set, so re-running
//! a job after a partial failure gives the same chunks.

use super::bundler::{bundler_for, Bundle, RecordSetBundler};
use super::exporter::Exporter;
use super::registry::PlanRegistry;
use super::{ChunkRecords, JobLog, Operation, RecordSets, OPERATIONS};
use crate::config::ExporterConfig;
use crate::error::{ExportError, ExportResult};
use indexmap::IndexMap;
use std::sync::Arc;

/// The parts of a chunk id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Batch the chunk belongs to.
    pub batch_id: String,
    /// Position of the chunk within its batch.
    pub chunk_num: usize,
    /// What the chunk does.
    pub op: Operation,
    /// Record set name, when sets are named.
    pub record_set: Option<String>,
    /// Position of the chunk within its record set.
    pub part_num: usize,
}

/// Counts for a generated plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanTotals {
    /// Number of batches.
    pub batches: usize,
    /// Number of chunks.
    pub chunks: usize,
    /// Chunks per operation.
    pub chunks_by_op: IndexMap<Operation, usize>,
    /// Number of records.
    pub records: usize,
    /// Records per operation and record set (`None` for an unnamed set).
    pub records_by_op_and_rset: IndexMap<Operation, IndexMap<Option<String>, usize>>,
}

impl PlanTotals {
    /// Records for one operation across its record sets.
    #[must_use]
    pub fn records_for(&self, op: Operation) -> usize {
        self.records_by_op_and_rset
            .get(&op)
            .map_or(0, |sets| sets.values().sum())
    }
}

struct PackedChunk {
    batch_id: String,
    chunk_id: String,
    op: Operation,
    record_set: Option<String>,
    bundle: Bundle,
}

/// Plan of batches and chunks for one job instance.
#[derive(Debug)]
pub struct JobPlan {
    instance: String,
    batch_size: usize,
    operations: Vec<Operation>,
    chunk_sizes: IndexMap<Operation, usize>,
    bundler: Box<dyn RecordSetBundler>,
    registry: Arc<PlanRegistry>,
    totals: PlanTotals,
}

impl JobPlan {
    /// A plan for job `instance` with a fresh registry.
    #[must_use]
    pub fn new(instance: impl Into<String>, config: &ExporterConfig, batch_size: usize) -> Self {
        JobPlan::with_registry(instance, config, batch_size, Arc::new(PlanRegistry::new()))
    }

    /// A plan that shares an existing registry, e.g. to inspect or clear
    /// what an earlier plan for the same instance left behind.
    #[must_use]
    pub fn with_registry(
        instance: impl Into<String>,
        config: &ExporterConfig,
        batch_size: usize,
        registry: Arc<PlanRegistry>,
    ) -> Self {
        JobPlan {
            instance: instance.into(),
            batch_size: batch_size.max(1),
            operations: OPERATIONS.to_vec(),
            chunk_sizes: IndexMap::from([
                (Operation::Export, config.max_rec_chunk.max(1)),
                (Operation::Deletion, config.max_del_chunk.max(1)),
            ]),
            bundler: bundler_for(config.bundler),
            registry,
            totals: PlanTotals::default(),
        }
    }

    /// Limit the plan to `operations`, in the given order.
    #[must_use]
    pub fn with_operations(mut self, operations: &[Operation]) -> Self {
        self.operations = operations.to_vec();
        self
    }

    /// The job instance id.
    #[must_use]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Chunks per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PlanRegistry> {
        &self.registry
    }

    /// Totals from the last [`generate`](Self::generate).
    #[must_use]
    pub fn totals(&self) -> &PlanTotals {
        &self.totals
    }

    /// Maximum chunk size for `op`.
    #[must_use]
    pub fn chunk_size(&self, op: Operation) -> usize {
        self.chunk_sizes.get(&op).copied().unwrap_or(1)
    }

    /// Batch id for batch number `batch_num`.
    #[must_use]
    pub fn batch_id(&self, batch_num: usize) -> String {
        format!("{}:{batch_num:05}", self.instance)
    }

    /// Chunk id for the given position.
    #[must_use]
    pub fn chunk_id(
        &self,
        batch_num: usize,
        chunk_num: usize,
        op: Operation,
        record_set: Option<&str>,
        part_num: usize,
    ) -> String {
        let width = (self.batch_size - 1).to_string().len();
        let batch_id = self.batch_id(batch_num);
        match record_set {
            None => format!("{batch_id}-{chunk_num:0width$}-{op}-{part_num}"),
            Some(name) => format!("{batch_id}-{chunk_num:0width$}-{op}-{name}-{part_num}"),
        }
    }

    /// Split a chunk id into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidChunkId`] if the id doesn't have four
    /// or five parts or a number doesn't parse.
    pub fn chunk_info(&self, chunk_id: &str) -> ExportResult<ChunkInfo> {
        let invalid = || ExportError::InvalidChunkId(chunk_id.to_string());
        let parts: Vec<&str> = chunk_id.split('-').collect();
        let (batch_id, chunk_num, op, record_set, part_num) = match parts.as_slice() {
            [b, c, op, p] => (*b, *c, *op, None, *p),
            [b, c, op, rs, p] => (*b, *c, *op, Some((*rs).to_string()), *p),
            _ => return Err(invalid()),
        };
        Ok(ChunkInfo {
            batch_id: batch_id.to_string(),
            chunk_num: chunk_num.parse().map_err(|_| invalid())?,
            op: op.parse().map_err(|_| invalid())?,
            record_set,
            part_num: part_num.parse().map_err(|_| invalid())?,
        })
    }

    /// The stored bundle for a registered chunk.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnknownChunk`] if the chunk isn't registered.
    pub fn bundle(&self, chunk_id: &str) -> ExportResult<Bundle> {
        self.registry
            .chunk(chunk_id)
            .map(|entry| entry.bundle)
            .ok_or_else(|| ExportError::UnknownChunk(chunk_id.to_string()))
    }

    /// Human-readable label, e.g. ``"`items` Records 1 - 3000 for export"``.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed or not registered.
    pub fn chunk_label(&self, chunk_id: &str) -> ExportResult<String> {
        let info = self.chunk_info(chunk_id)?;
        let bundle = self.bundle(chunk_id)?;
        let count = self.bundler.count(&bundle);
        let start = self
            .bundler
            .offset(&bundle, info.part_num, self.chunk_size(info.op))
            + 1;
        let end = (start + count).saturating_sub(1);
        let label = format!(
            "{} {start} - {end} for {}",
            self.bundler.label(&bundle),
            info.op
        );
        Ok(match info.record_set {
            Some(name) => format!("`{name}` {label}"),
            None => label,
        })
    }

    /// Registered chunks that haven't been finished, sorted.
    #[must_use]
    pub fn unprocessed_chunks(&self) -> Vec<String> {
        self.registry.unprocessed()
    }

    fn records_for_operation(
        exp: &dyn Exporter,
        op: Operation,
    ) -> ExportResult<Option<RecordSets>> {
        match op {
            Operation::Export => exp.get_records().map(Some),
            Operation::Deletion => exp.get_deletions(),
        }
    }

    fn pack_records(&self, exp: &dyn Exporter) -> ExportResult<Vec<PackedChunk>> {
        let mut packed = Vec::new();
        let (mut batch_num, mut chunk_num) = (0, 0);
        for &op in &self.operations {
            let Some(sets) = Self::records_for_operation(exp, op)? else {
                continue;
            };
            let size = self.chunk_size(op);
            for (name, keys) in sets.sets() {
                if let Some(name) = name.filter(|n| n.is_empty() || n.contains('-')) {
                    return Err(ExportError::Config(format!(
                        "record set name {name:?} can't be used in chunk ids"
                    )));
                }
                for (part_num, bundle) in self.bundler.pack(keys, size).into_iter().enumerate() {
                    packed.push(PackedChunk {
                        batch_id: self.batch_id(batch_num),
                        chunk_id: self.chunk_id(batch_num, chunk_num, op, name, part_num),
                        op,
                        record_set: name.map(str::to_string),
                        bundle,
                    });
                    if chunk_num == self.batch_size - 1 {
                        chunk_num = 0;
                        batch_num += 1;
                    } else {
                        chunk_num += 1;
                    }
                }
            }
        }
        Ok(packed)
    }

    /// Pack the exporter's records and deletions into chunks and register
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::AlreadyRegistered`] if the registry isn't
    /// empty, [`ExportError::Config`] for an unusable instance or record
    /// set name, or the exporter's error if records can't be listed.
    pub fn generate(&mut self, exp: &dyn Exporter) -> ExportResult<()> {
        if !self.registry.is_empty() {
            return Err(ExportError::AlreadyRegistered(self.instance.clone()));
        }
        if self.instance.contains('-') {
            return Err(ExportError::Config(format!(
                "instance id {:?} can't be used in chunk ids",
                self.instance
            )));
        }

        let mut totals = PlanTotals {
            chunks_by_op: self.operations.iter().map(|&op| (op, 0)).collect(),
            records_by_op_and_rset: self
                .operations
                .iter()
                .map(|&op| (op, IndexMap::new()))
                .collect(),
            ..PlanTotals::default()
        };
        for chunk in self.pack_records(exp)? {
            let count = self.bundler.count(&chunk.bundle);
            self.registry.register(&chunk.batch_id, &chunk.chunk_id, chunk.bundle);
            totals.chunks += 1;
            *totals.chunks_by_op.entry(chunk.op).or_default() += 1;
            *totals
                .records_by_op_and_rset
                .entry(chunk.op)
                .or_default()
                .entry(chunk.record_set)
                .or_default() += count;
        }
        totals.records = self.operations.iter().map(|&op| totals.records_for(op)).sum();
        totals.batches = self.registry.batch_ids().len();
        self.totals = totals;
        Ok(())
    }

    /// Fetch the keys a registered chunk covers.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk is unknown, its record set is gone,
    /// or the exporter can't list records.
    pub fn unpack_chunk(&self, exp: &dyn Exporter, chunk_id: &str) -> ExportResult<ChunkRecords> {
        let bundle = self.bundle(chunk_id)?;
        let info = self.chunk_info(chunk_id)?;
        let sets = Self::records_for_operation(exp, info.op)?
            .unwrap_or(RecordSets::Single(Vec::new()));
        let all_keys = sets.get(info.record_set.as_deref()).ok_or_else(|| {
            ExportError::Task(format!(
                "record set {:?} not found for chunk {chunk_id}",
                info.record_set
            ))
        })?;
        Ok(ChunkRecords {
            keys: self.bundler.unpack(&bundle, all_keys)?,
            record_set: info.record_set,
        })
    }

    /// Write the `JOB PLAN` summary to the job log.
    pub fn log_plan_summary(&self, log: &JobLog) {
        fn plural(word: &str, count: usize, add: &str) -> String {
            if count == 1 {
                word.to_string()
            } else {
                format!("{word}{add}")
            }
        }

        let mut lines = vec!["JOB PLAN".to_string()];
        for &op in &self.operations {
            let rec_count = self.totals.records_for(op);
            let chunk_count = self.totals.chunks_by_op.get(&op).copied().unwrap_or(0);
            lines.push(format!("`{op}`: {rec_count} {}", plural("record", rec_count, "s")));
            lines.push(format!(
                "`{op}`: {chunk_count} {} (chunk size is {})",
                plural("chunk", chunk_count, "s"),
                self.chunk_size(op)
            ));
            if let Some(sets) = self.totals.records_by_op_and_rset.get(&op) {
                for (name, count) in sets {
                    if let Some(name) = name {
                        lines.push(format!(
                            "    `{name}`: {count} {}",
                            plural("record", *count, "s")
                        ));
                    }
                }
            }
        }
        let (chunks, batches) = (self.totals.chunks, self.totals.batches);
        lines.push(format!("- {chunks} total {}", plural("chunk", chunks, "s")));
        lines.push(format!(
            "- {batches} total {} ({} chunks per batch)",
            plural("batch", batches, "es"),
            self.batch_size
        ));

        let batch_ids = self.registry.batch_ids();
        if let (Some(first), Some(last)) = (batch_ids.first(), batch_ids.last()) {
            let first_chunk = self
                .registry
                .batch_chunks(first)
                .first()
                .cloned()
                .unwrap_or_default();
            let last_chunk = self.registry.batch_chunks(last).last().cloned().unwrap_or_default();
            lines.push(format!("Batch ID Range: {first} to {last}"));
            lines.push(format!("Chunk ID Range: {first_chunk} to {last_chunk}"));
        }

        for line in lines {
            log.info(&format!("| {line}"));
        }
    }

    /// Remove a finished chunk from the registry. Returns false if it was
    /// already removed.
    pub fn finish_chunk(&self, chunk_id: &str) -> bool {
        self.registry.finish(chunk_id)
    }

    /// Drop every registered batch and chunk.
    pub fn clear(&self) {
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundlerKind;
    use crate::export::{ChunkRecords, Vals};

    #[derive(Debug)]
    struct KeysOnly {
        records: RecordSets,
        deletions: Option<RecordSets>,
        config: ExporterConfig,
    }

    impl Exporter for KeysOnly {
        fn export_type(&self) -> &str {
            "KeysOnly"
        }
        fn config(&self) -> &ExporterConfig {
            &self.config
        }
        fn get_records(&self) -> ExportResult<RecordSets> {
            Ok(self.records.clone())
        }
        fn get_deletions(&self) -> ExportResult<Option<RecordSets>> {
            Ok(self.deletions.clone())
        }
        fn export_records(&self, _records: &ChunkRecords, _log: &JobLog) -> ExportResult<Vals> {
            Ok(Vals::Null)
        }
    }

    fn keys(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i:04}")).collect()
    }

    fn exporter(
        records: RecordSets,
        deletions: Option<RecordSets>,
        rec: usize,
        del: usize,
    ) -> KeysOnly {
        KeysOnly {
            records,
            deletions,
            config: ExporterConfig {
                max_rec_chunk: rec,
                max_del_chunk: del,
                bundler: BundlerKind::ExplicitKey,
            },
        }
    }

    #[test]
    fn test_ids_round_trip() {
        let plan = JobPlan::new("42", &ExporterConfig::default(), 200);
        assert_eq!(plan.batch_id(3), "42:00003");
        let id = plan.chunk_id(3, 7, Operation::Export, None, 12);
        assert_eq!(id, "42:00003-007-export-12");
        let named = plan.chunk_id(0, 199, Operation::Deletion, Some("items"), 0);
        assert_eq!(named, "42:00000-199-deletion-items-0");

        let info = plan.chunk_info(&named).unwrap();
        assert_eq!(info.batch_id, "42:00000");
        assert_eq!(info.chunk_num, 199);
        assert_eq!(info.op, Operation::Deletion);
        assert_eq!(info.record_set.as_deref(), Some("items"));
        assert_eq!(info.part_num, 0);

        assert!(plan.chunk_info("42:00000-x-export-0").is_err());
        assert!(plan.chunk_info("nonsense").is_err());
    }

    #[test]
    fn test_chunk_numbers_wrap_into_batches() {
        let exp = exporter(
            RecordSets::Single(keys("b", 10)),
            Some(RecordSets::Single(keys("d", 3))),
            2,
            1,
        );
        let mut plan = JobPlan::new("1", &exp.config, 3);
        plan.generate(&exp).unwrap();

        // 5 export chunks and 3 deletion chunks, 3 per batch
        let totals = plan.totals();
        assert_eq!(totals.chunks, 8);
        assert_eq!(totals.batches, 3);
        assert_eq!(totals.chunks_by_op[&Operation::Export], 5);
        assert_eq!(totals.chunks_by_op[&Operation::Deletion], 3);
        assert_eq!(totals.records, 13);
        assert_eq!(
            plan.registry().batch_chunks("1:00001"),
            vec!["1:00001-0-export-3", "1:00001-1-export-4", "1:00001-2-deletion-0"]
        );
        assert_eq!(plan.unprocessed_chunks().len(), 8);
    }

    #[test]
    fn test_generate_refuses_existing_registry() {
        let exp = exporter(RecordSets::Single(keys("b", 2)), None, 10, 10);
        let mut plan = JobPlan::new("1", &exp.config, 200);
        plan.generate(&exp).unwrap();

        let mut again = JobPlan::with_registry("1", &exp.config, 200, Arc::clone(plan.registry()));
        assert!(matches!(again.generate(&exp), Err(ExportError::AlreadyRegistered(_))));

        again.clear();
        assert!(again.generate(&exp).is_ok());
    }

    #[test]
    fn test_labels_and_unpack_with_named_sets() {
        let sets = RecordSets::Named(IndexMap::from([
            ("items".to_string(), keys("i", 5)),
            ("holdings".to_string(), keys("c", 1)),
        ]));
        let exp = exporter(sets, None, 2, 2);
        let mut plan = JobPlan::new("9", &exp.config, 200);
        plan.generate(&exp).unwrap();

        let unprocessed = plan.unprocessed_chunks();
        let items_part2 = unprocessed
            .iter()
            .find(|id| id.ends_with("-items-2"))
            .unwrap();
        assert_eq!(plan.chunk_label(items_part2).unwrap(), "`items` Records 5 - 5 for export");
        let records = plan.unpack_chunk(&exp, items_part2).unwrap();
        assert_eq!(records.record_set.as_deref(), Some("items"));
        assert_eq!(records.keys, vec!["i0004"]);

        let by_set = &plan.totals().records_by_op_and_rset[&Operation::Export];
        assert_eq!(by_set[&Some("holdings".to_string())], 1);
        assert_eq!(by_set[&Some("items".to_string())], 5);
    }

    #[test]
    fn test_finish_chunk_empties_registry() {
        let exp = exporter(RecordSets::Single(keys("b", 3)), None, 1, 1);
        let mut plan = JobPlan::new("5", &exp.config, 200);
        plan.generate(&exp).unwrap();
        assert_eq!(plan.chunk_label("5:00000-000-export-0").unwrap(), "Records 1 - 1 for export");
        for id in plan.unprocessed_chunks() {
            assert!(plan.finish_chunk(&id));
        }
        assert!(plan.unprocessed_chunks().is_empty());
        assert!(matches!(plan.bundle("5:00000-000-export-0"), Err(ExportError::UnknownChunk(_))));
        plan.clear();
        assert!(plan.registry().is_empty());
    }

    #[test]
    fn test_bad_record_set_name() {
        let sets = RecordSets::Named(IndexMap::from([("bad-name".to_string(), keys("x", 1))]));
        let exp = exporter(sets, None, 1, 1);
        let mut plan = JobPlan::new("1", &exp.config, 10);
        assert!(matches!(plan.generate(&exp), Err(ExportError::Config(_))));
    }
}
