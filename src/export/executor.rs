//! Running the chunk tasks of one batch.
//!
//! An executor takes the tasks of a batch and a function that runs one
//! task, and returns one [`ChunkOutcome`] per task. Panics inside a task
//! are caught and reported as that task's failure, so one bad chunk never
//! takes down its siblings.

use super::{Operation, Vals};
use crate::config::ExecutorConfig;
use crate::error::{ExportError, ExportResult};
use crossbeam_channel::bounded;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// One chunk handed to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    /// Registered chunk id.
    pub chunk_id: String,
    /// What the chunk does.
    pub op: Operation,
    /// Human-readable label for logs.
    pub label: String,
}

/// Result of running one chunk task once.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    /// The chunk the outcome is for.
    pub chunk_id: String,
    /// Vals on success, or the failure message.
    pub result: Result<Vals, String>,
}

/// Runs the chunk tasks of a batch and collects their outcomes.
pub trait ChunkExecutor: Send + Sync {
    /// Run every task once with `run`. Outcomes may come back in any
    /// order, but there is exactly one per task.
    fn run_batch(
        &self,
        tasks: &[ChunkTask],
        run: &(dyn Fn(&ChunkTask) -> ExportResult<Vals> + Sync),
    ) -> Vec<ChunkOutcome>;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_caught(
    task: &ChunkTask,
    run: &(dyn Fn(&ChunkTask) -> ExportResult<Vals> + Sync),
) -> ChunkOutcome {
    let result = match catch_unwind(AssertUnwindSafe(|| run(task))) {
        Ok(Ok(vals)) => Ok(vals),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("task panicked: {}", panic_message(payload.as_ref()))),
    };
    ChunkOutcome {
        chunk_id: task.chunk_id.clone(),
        result,
    }
}

/// Runs tasks one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialExecutor;

impl ChunkExecutor for SerialExecutor {
    fn run_batch(
        &self,
        tasks: &[ChunkTask],
        run: &(dyn Fn(&ChunkTask) -> ExportResult<Vals> + Sync),
    ) -> Vec<ChunkOutcome> {
        tasks.iter().map(|task| run_caught(task, run)).collect()
    }
}

/// Runs tasks in parallel on a rayon thread pool. Outcomes stream back
/// through a bounded channel to the calling thread, which is the only
/// place they are collected.
#[derive(Debug)]
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
    channel_capacity: usize,
}

impl RayonExecutor {
    /// An executor with `config.threads` workers (0 lets rayon decide).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Config`] if the thread pool can't be built.
    pub fn new(config: &ExecutorConfig) -> ExportResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("chunk-worker-{i}"))
            .build()
            .map_err(|e| ExportError::Config(format!("Failed to build thread pool: {e}")))?;
        Ok(RayonExecutor {
            pool,
            channel_capacity: config.channel_capacity.max(1),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ChunkExecutor for RayonExecutor {
    fn run_batch(
        &self,
        tasks: &[ChunkTask],
        run: &(dyn Fn(&ChunkTask) -> ExportResult<Vals> + Sync),
    ) -> Vec<ChunkOutcome> {
        let (sender, receiver) = bounded(self.channel_capacity);
        let mut outcomes = Vec::with_capacity(tasks.len());
        // The calling thread drains the channel while the pool runs tasks,
        // so a full channel only pauses workers.
        self.pool.in_place_scope(|scope| {
            for task in tasks {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    // The receiver outlives the scope.
                    let _ = sender.send(run_caught(task, run));
                });
            }
            drop(sender);
            outcomes.extend(receiver.iter());
        });
        debug!(tasks = tasks.len(), outcomes = outcomes.len(), "batch finished");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tasks(n: usize) -> Vec<ChunkTask> {
        (0..n)
            .map(|i| ChunkTask {
                chunk_id: format!("1:00000-{i}-export-{i}"),
                op: Operation::Export,
                label: format!("Records {} - {} for export", i + 1, i + 1),
            })
            .collect()
    }

    fn flaky(task: &ChunkTask) -> ExportResult<Vals> {
        match task.chunk_id.as_str() {
            "1:00000-1-export-1" => Err(ExportError::Task("boom".to_string())),
            "1:00000-2-export-2" => panic!("exporter bug"),
            id => Ok(json!({ "done": [id] })),
        }
    }

    fn check(mut outcomes: Vec<ChunkOutcome>) {
        outcomes.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].result, Ok(json!({"done": ["1:00000-0-export-0"]})));
        assert_eq!(outcomes[1].result, Err("Task failed: boom".to_string()));
        assert_eq!(outcomes[2].result, Err("task panicked: exporter bug".to_string()));
        assert!(outcomes[3].result.is_ok());
    }

    #[test]
    fn test_serial_executor_catches_failures() {
        check(SerialExecutor.run_batch(&tasks(4), &flaky));
    }

    #[test]
    fn test_rayon_executor_catches_failures() {
        let config = ExecutorConfig {
            threads: 2,
            channel_capacity: 1,
        };
        let executor = RayonExecutor::new(&config).unwrap();
        assert_eq!(executor.threads(), 2);
        check(executor.run_batch(&tasks(4), &flaky));
    }

    #[test]
    fn test_empty_batch() {
        let executor = RayonExecutor::new(&ExecutorConfig::default()).unwrap();
        assert!(executor.run_batch(&[], &flaky).is_empty());
    }
}
