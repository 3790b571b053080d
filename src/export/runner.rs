//! Driving an export job from plan to final cleanup.
//!
//! A job moves through [`JobState`]s:
//!
//! ```text
//! Planned -> Chunked -> Dispatching -> Aggregating -> Done(status)
//! ```
//!
//! Batches run one after another; the chunks of a batch run on a
//! [`ChunkExecutor`]. A failed chunk is retried up to
//! `max_retries` times and then counted as a job error without stopping
//! its siblings, unless `escalate_on_chunk_failure` is set. The final
//! cleanup always runs once the plan exists: it calls the exporter's final
//! callback (skipped if a batch couldn't be delegated), logs any chunks
//! that were never finished and releases the job's registry.

use super::executor::{ChunkExecutor, ChunkTask};
use super::exporter::Exporter;
use super::plan::{JobPlan, PlanTotals};
use super::registry::PlanRegistry;
use super::{JobLog, JobStatus, Operation, Vals};
use crate::config::PlanConfig;
use crate::error::{ExportError, ExportResult};
use std::sync::Arc;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, plan not generated yet.
    Planned,
    /// Chunks and batches are registered.
    Chunked,
    /// Batches are running.
    Dispatching,
    /// Results are being merged and the final callback runs.
    Aggregating,
    /// Finished with the given status.
    Done(JobStatus),
}

/// Summary of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    /// Job instance id.
    pub instance: String,
    /// Final status.
    pub status: JobStatus,
    /// Plan totals.
    pub totals: PlanTotals,
    /// Warnings logged during the job.
    pub warnings: u64,
    /// Errors logged during the job.
    pub errors: u64,
    /// Chunks that failed after every attempt.
    pub failed_chunks: Vec<String>,
    /// Chunks still registered at cleanup (failed or never run), released
    /// before the report was built.
    pub unprocessed_chunks: Vec<String>,
    /// Merged vals of every successful chunk.
    pub vals: Vals,
    /// Every state the job passed through, in order.
    pub states: Vec<JobState>,
}

enum BatchEnd {
    Continue,
    Escalate,
}

/// Runs one export job.
#[derive(Debug)]
pub struct JobRunner {
    instance: String,
    config: PlanConfig,
    registry: Arc<PlanRegistry>,
    states: Vec<JobState>,
}

impl JobRunner {
    /// A runner for job `instance` with a fresh registry.
    #[must_use]
    pub fn new(instance: impl Into<String>, config: &PlanConfig) -> Self {
        JobRunner {
            instance: instance.into(),
            config: config.clone(),
            registry: Arc::new(PlanRegistry::new()),
            states: vec![JobState::Planned],
        }
    }

    /// Keep the job's bookkeeping in `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PlanRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.states.last().copied().unwrap_or(JobState::Planned)
    }

    fn transition(&mut self, next: JobState) {
        tracing::debug!(instance = %self.instance, from = ?self.state(), to = ?next, "job state");
        self.states.push(next);
    }

    fn status_for(&self, errors: u64) -> JobStatus {
        match self.config.errors_threshold {
            _ if errors == 0 => JobStatus::Success,
            Some(threshold) if errors >= threshold => JobStatus::Errors,
            _ => JobStatus::DoneWithErrors,
        }
    }

    /// Run the job.
    ///
    /// # Errors
    ///
    /// Returns an error, without touching the registry, if the exporter
    /// can't be initialized or the plan can't be generated. Once the plan
    /// exists every failure is reported through the [`JobReport`].
    pub fn run(
        mut self,
        exporter: &dyn Exporter,
        executor: &dyn ChunkExecutor,
    ) -> ExportResult<JobReport> {
        let log = JobLog::new(exporter.export_type());
        log.info(&format!("EXPORTER {} -- {}", self.instance, exporter.export_type()));
        let mut vals = exporter.initialize(&log)?;

        let mut plan = JobPlan::with_registry(
            self.instance.clone(),
            exporter.config(),
            self.config.batch_size,
            Arc::clone(&self.registry),
        );
        log.info("Initializing job plan.");
        plan.generate(exporter)?;
        self.transition(JobState::Chunked);
        plan.log_plan_summary(&log);

        self.transition(JobState::Dispatching);
        let mut failed_chunks = Vec::new();
        let mut delegate_error = None;
        let mut escalated = false;
        for batch_id in plan.registry().batch_ids() {
            match self.run_batch(
                &plan,
                exporter,
                executor,
                &log,
                &batch_id,
                &mut vals,
                &mut failed_chunks,
            ) {
                Ok(BatchEnd::Continue) => {},
                Ok(BatchEnd::Escalate) => {
                    log.error(&format!(
                        "Chunk failure in batch {batch_id}; no further batches will run."
                    ));
                    escalated = true;
                    break;
                },
                Err(e) => {
                    log.error(&format!("Batch {batch_id} could not be delegated: {e}"));
                    delegate_error = Some(e);
                    break;
                },
            }
        }

        self.transition(JobState::Aggregating);
        let status = self.final_cleanup(
            &plan,
            exporter,
            &log,
            &vals,
            delegate_error.is_some(),
            escalated,
        );
        let unprocessed_chunks = Self::release(&plan, &log);
        self.transition(JobState::Done(status));

        Ok(JobReport {
            instance: self.instance,
            status,
            totals: plan.totals().clone(),
            warnings: log.warnings(),
            errors: log.errors(),
            failed_chunks,
            unprocessed_chunks,
            vals,
            states: self.states,
        })
    }

    fn chunk_tasks(plan: &JobPlan, batch_id: &str) -> ExportResult<Vec<ChunkTask>> {
        plan.registry()
            .batch_chunks(batch_id)
            .into_iter()
            .map(|chunk_id| {
                Ok(ChunkTask {
                    op: plan.chunk_info(&chunk_id)?.op,
                    label: plan.chunk_label(&chunk_id)?,
                    chunk_id,
                })
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn run_batch(
        &self,
        plan: &JobPlan,
        exporter: &dyn Exporter,
        executor: &dyn ChunkExecutor,
        log: &JobLog,
        batch_id: &str,
        vals: &mut Vals,
        failed_chunks: &mut Vec<String>,
    ) -> ExportResult<BatchEnd> {
        let mut tasks = Self::chunk_tasks(plan, batch_id)?;
        if tasks.is_empty() {
            return Err(ExportError::Task(format!("batch {batch_id} has no chunks")));
        }

        let run = |task: &ChunkTask| -> ExportResult<Vals> {
            plan.registry().dispatch(&task.chunk_id);
            log.info(&format!("Starting {} ({}).", task.chunk_id, task.label));
            let records = plan.unpack_chunk(exporter, &task.chunk_id)?;
            let result = match task.op {
                Operation::Export => exporter.export_records(&records, log)?,
                Operation::Deletion => exporter.delete_records(&records, log)?,
            };
            log.info(&format!("Finished {} ({}).", task.chunk_id, task.label));
            Ok(result)
        };

        let mut results = vec![vals.clone()];
        let mut batch_failed = false;
        let mut attempt = 0;
        while !tasks.is_empty() {
            let mut retry = Vec::new();
            // Delivery is at least once: a chunk may report more than once,
            // and any success settles it.
            let (successes, failures): (Vec<_>, Vec<_>) = executor
                .run_batch(&tasks, &run)
                .into_iter()
                .partition(|outcome| outcome.result.is_ok());
            for outcome in successes {
                if let Ok(chunk_vals) = outcome.result {
                    if plan.finish_chunk(&outcome.chunk_id) {
                        results.push(chunk_vals);
                    }
                }
            }
            for outcome in failures {
                let Err(message) = outcome.result else {
                    continue;
                };
                let settled = plan.registry().chunk(&outcome.chunk_id).is_none()
                    || retry.iter().any(|t: &ChunkTask| t.chunk_id == outcome.chunk_id)
                    || failed_chunks.contains(&outcome.chunk_id);
                if settled {
                    continue;
                }
                let Some(task) = tasks.iter().find(|t| t.chunk_id == outcome.chunk_id) else {
                    continue;
                };
                if attempt < self.config.max_retries {
                    log.info(&format!(
                        "Retrying {} ({}) after error: {message}",
                        task.chunk_id, task.label
                    ));
                    retry.push(task.clone());
                } else {
                    plan.registry().fail(&task.chunk_id);
                    log.error(&format!("{} ({}) failed: {message}", task.chunk_id, task.label));
                    failed_chunks.push(task.chunk_id.clone());
                    batch_failed = true;
                }
            }
            tasks = retry;
            attempt += 1;
        }

        *vals = exporter.compile_vals(&results);
        if batch_failed && self.config.escalate_on_chunk_failure {
            Ok(BatchEnd::Escalate)
        } else {
            Ok(BatchEnd::Continue)
        }
    }

    fn final_cleanup(
        &self,
        plan: &JobPlan,
        exporter: &dyn Exporter,
        log: &JobLog,
        vals: &Vals,
        delegate_error: bool,
        escalated: bool,
    ) -> JobStatus {
        if delegate_error {
            log.info("PROBLEM: A fatal error occurred during batch delegation!");
            log.info(
                "This job has ended prematurely. The final callback for the exporter DID NOT run.",
            );
            log.info(
                "Please roll back any uncommitted changes this job may have made before trying again.",
            );
            return JobStatus::Errors;
        }

        let status = if escalated {
            JobStatus::Errors
        } else {
            self.status_for(log.errors())
        };
        if let Err(e) = exporter.final_callback(vals, status, log) {
            log.error(&format!("Final callback failed: {e}"));
        }

        let status = if escalated {
            JobStatus::Errors
        } else {
            self.status_for(log.errors())
        };
        match status {
            JobStatus::Success => log.info("Job finished successfully."),
            _ => log.info("Job finished, with errors."),
        }
        tracing::info!(
            instance = %plan.instance(),
            status = %status,
            warnings = log.warnings(),
            errors = log.errors(),
            "job done"
        );
        status
    }

    fn release(plan: &JobPlan, log: &JobLog) -> Vec<String> {
        let unprocessed = plan.unprocessed_chunks();
        if !unprocessed.is_empty() {
            log.warning(&format!(
                "The following chunks were not fully processed and are being released: {}",
                unprocessed.join(", ")
            ));
        }
        plan.clear();
        unprocessed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;
    use crate::config::ExecutorConfig;
    use crate::export::{ChunkOutcome, ChunkRecords, RayonExecutor, RecordSets, SerialExecutor};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        config: ExporterConfig,
        keys: Vec<String>,
        deletions: Vec<String>,
        fail_keys: Vec<String>,
        panic_keys: Vec<String>,
        flaky_failures: AtomicU32,
        callback_status: Mutex<Option<JobStatus>>,
    }

    impl Recorder {
        fn new(n: usize) -> Self {
            Recorder {
                config: ExporterConfig {
                    max_rec_chunk: 2,
                    max_del_chunk: 2,
                    ..ExporterConfig::default()
                },
                keys: (0..n).map(|i| format!("b{i:03}")).collect(),
                ..Recorder::default()
            }
        }
    }

    impl Exporter for Recorder {
        fn export_type(&self) -> &str {
            "Recorder"
        }

        fn config(&self) -> &ExporterConfig {
            &self.config
        }

        fn get_records(&self) -> ExportResult<RecordSets> {
            Ok(RecordSets::Single(self.keys.clone()))
        }

        fn get_deletions(&self) -> ExportResult<Option<RecordSets>> {
            Ok(Some(RecordSets::Single(self.deletions.clone())))
        }

        fn export_records(&self, records: &ChunkRecords, _log: &JobLog) -> ExportResult<Vals> {
            if records.keys.iter().any(|k| self.panic_keys.contains(k)) {
                panic!("cannot export {:?}", records.keys);
            }
            if records.keys.iter().any(|k| self.fail_keys.contains(k)) {
                return Err(ExportError::Task("store unavailable".to_string()));
            }
            if self.flaky_failures.load(Ordering::SeqCst) > 0 {
                self.flaky_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ExportError::Task("timeout".to_string()));
            }
            Ok(json!({ "exported": records.keys }))
        }

        fn delete_records(&self, records: &ChunkRecords, _log: &JobLog) -> ExportResult<Vals> {
            Ok(json!({ "deleted": records.keys }))
        }

        fn final_callback(
            &self,
            _vals: &Vals,
            status: JobStatus,
            _log: &JobLog,
        ) -> ExportResult<()> {
            if let Ok(mut slot) = self.callback_status.lock() {
                *slot = Some(status);
            }
            Ok(())
        }
    }

    fn plan_config(batch_size: usize) -> PlanConfig {
        PlanConfig {
            batch_size,
            ..PlanConfig::default()
        }
    }

    fn exported(report: &JobReport) -> Vec<String> {
        let mut keys: Vec<String> = report.vals["exported"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    #[test]
    fn test_successful_job() {
        let mut exporter = Recorder::new(5);
        exporter.deletions = vec!["d1".to_string()];
        let registry = Arc::new(PlanRegistry::new());
        let report = JobRunner::new("7", &plan_config(2))
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &SerialExecutor)
            .unwrap();

        assert_eq!(report.status, JobStatus::Success);
        assert_eq!(report.totals.chunks, 4);
        assert_eq!(report.totals.batches, 2);
        assert_eq!(exported(&report), vec!["b000", "b001", "b002", "b003", "b004"]);
        assert_eq!(report.vals["deleted"], json!(["d1"]));
        assert_eq!(
            report.states,
            vec![
                JobState::Planned,
                JobState::Chunked,
                JobState::Dispatching,
                JobState::Aggregating,
                JobState::Done(JobStatus::Success)
            ]
        );
        assert_eq!(*exporter.callback_status.lock().unwrap(), Some(JobStatus::Success));
        assert!(registry.is_empty());
        assert!(report.unprocessed_chunks.is_empty());
    }

    #[test]
    fn test_failed_chunk_does_not_stop_siblings() {
        let mut exporter = Recorder::new(6);
        exporter.fail_keys = vec!["b002".to_string()];
        exporter.panic_keys = vec!["b004".to_string()];
        let registry = Arc::new(PlanRegistry::new());
        let executor = RayonExecutor::new(&ExecutorConfig {
            threads: 3,
            channel_capacity: 2,
        })
        .unwrap();
        let report = JobRunner::new("8", &plan_config(200))
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &executor)
            .unwrap();

        assert_eq!(report.status, JobStatus::DoneWithErrors);
        assert_eq!(report.errors, 2);
        assert_eq!(exported(&report), vec!["b000", "b001"]);
        let mut failed = report.failed_chunks.clone();
        failed.sort();
        assert_eq!(failed, vec!["8:00000-001-export-1", "8:00000-002-export-2"]);
        assert_eq!(report.unprocessed_chunks, failed);
        assert_eq!(*exporter.callback_status.lock().unwrap(), Some(JobStatus::DoneWithErrors));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_retries_recover_flaky_chunks() {
        let exporter = Recorder::new(2);
        exporter.flaky_failures.store(2, Ordering::SeqCst);
        let config = PlanConfig {
            max_retries: 2,
            ..plan_config(200)
        };
        let report = JobRunner::new("9", &config).run(&exporter, &SerialExecutor).unwrap();
        assert_eq!(report.status, JobStatus::Success);
        assert_eq!(report.errors, 0);
        assert_eq!(exported(&report), vec!["b000", "b001"]);
    }

    #[test]
    fn test_errors_threshold_and_escalation() {
        let mut exporter = Recorder::new(6);
        exporter.fail_keys = vec!["b000".to_string()];
        let config = PlanConfig {
            errors_threshold: Some(1),
            ..plan_config(1)
        };
        let report = JobRunner::new("3", &config).run(&exporter, &SerialExecutor).unwrap();
        assert_eq!(report.status, JobStatus::Errors);
        assert_eq!(exported(&report).len(), 4);

        let config = PlanConfig {
            escalate_on_chunk_failure: true,
            ..plan_config(1)
        };
        let registry = Arc::new(PlanRegistry::new());
        let report = JobRunner::new("4", &config)
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &SerialExecutor)
            .unwrap();
        assert_eq!(report.status, JobStatus::Errors);
        assert_eq!(report.vals, Vals::Null);
        assert_eq!(report.unprocessed_chunks.len(), 3);
        assert!(registry.is_empty());
    }

    /// Runs every batch twice and reports both rounds of outcomes.
    #[derive(Debug)]
    struct Redelivering;

    impl ChunkExecutor for Redelivering {
        fn run_batch(
            &self,
            tasks: &[ChunkTask],
            run: &(dyn Fn(&ChunkTask) -> ExportResult<Vals> + Sync),
        ) -> Vec<ChunkOutcome> {
            let mut outcomes = SerialExecutor.run_batch(tasks, run);
            outcomes.extend(SerialExecutor.run_batch(tasks, run));
            outcomes
        }
    }

    /// Reports a lost worker for every task before the real outcome.
    #[derive(Debug)]
    struct LostThenDelivered;

    impl ChunkExecutor for LostThenDelivered {
        fn run_batch(
            &self,
            tasks: &[ChunkTask],
            run: &(dyn Fn(&ChunkTask) -> ExportResult<Vals> + Sync),
        ) -> Vec<ChunkOutcome> {
            tasks
                .iter()
                .map(|task| ChunkOutcome {
                    chunk_id: task.chunk_id.clone(),
                    result: Err("worker lost".to_string()),
                })
                .chain(SerialExecutor.run_batch(tasks, run))
                .collect()
        }
    }

    #[test]
    fn test_redelivered_outcomes_merge_once() {
        let exporter = Recorder::new(5);
        let registry = Arc::new(PlanRegistry::new());
        let report = JobRunner::new("11", &plan_config(2))
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &Redelivering)
            .unwrap();

        assert_eq!(report.status, JobStatus::Success);
        assert_eq!(report.errors, 0);
        assert_eq!(exported(&report), vec!["b000", "b001", "b002", "b003", "b004"]);
        assert!(registry.is_empty());
        assert!(report.unprocessed_chunks.is_empty());
    }

    #[test]
    fn test_redelivered_failure_counts_once() {
        let mut exporter = Recorder::new(4);
        exporter.fail_keys = vec!["b000".to_string()];
        let registry = Arc::new(PlanRegistry::new());
        let report = JobRunner::new("12", &plan_config(200))
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &Redelivering)
            .unwrap();

        assert_eq!(report.status, JobStatus::DoneWithErrors);
        assert_eq!(report.errors, 1);
        assert_eq!(report.failed_chunks, vec!["12:00000-000-export-0"]);
        assert_eq!(exported(&report), vec!["b002", "b003"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_success_after_partial_execution_settles_chunk() {
        let exporter = Recorder::new(3);
        let registry = Arc::new(PlanRegistry::new());
        let report = JobRunner::new("13", &plan_config(200))
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &LostThenDelivered)
            .unwrap();

        assert_eq!(report.status, JobStatus::Success);
        assert_eq!(report.errors, 0);
        assert!(report.failed_chunks.is_empty());
        assert_eq!(exported(&report), vec!["b000", "b001", "b002"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_generate_failure_leaves_registry_alone() {
        let exporter = Recorder::new(2);
        let registry = Arc::new(PlanRegistry::new());
        registry.register("1:00000", "1:00000-000-export-0", crate::export::Bundle::Keys(vec![]));
        let result = JobRunner::new("1", &plan_config(200))
            .with_registry(Arc::clone(&registry))
            .run(&exporter, &SerialExecutor);
        assert!(matches!(result, Err(ExportError::AlreadyRegistered(_))));
        assert_eq!(registry.unprocessed(), vec!["1:00000-000-export-0"]);
    }
}
