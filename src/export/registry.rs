//! Shared bookkeeping of in-flight chunks.
//!
//! The registry maps each batch id to its chunk ids and each chunk id to
//! its bundle and lifecycle state. Chunk tasks finish concurrently, so the
//! maps are [`DashMap`]s: removing a chunk is atomic and reports whether
//! this call was the one that removed it.

use super::bundler::Bundle;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Where a registered chunk is in its lifecycle. Finished chunks are
/// removed rather than marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    /// Planned, not yet handed to an executor.
    Pending,
    /// Handed to an executor.
    Dispatched,
    /// Failed after all attempts.
    Failed,
}

/// One registered chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// Keys or key range of the chunk.
    pub bundle: Bundle,
    /// Lifecycle state.
    pub state: ChunkState,
    /// Times the chunk has been dispatched.
    pub attempts: u32,
}

/// Registry of one job's batches and chunks.
#[derive(Debug, Default)]
pub struct PlanRegistry {
    batches: DashMap<String, Vec<String>>,
    chunks: DashMap<String, ChunkEntry>,
}

impl PlanRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `chunk_id` as the next chunk of `batch_id`.
    pub fn register(&self, batch_id: &str, chunk_id: &str, bundle: Bundle) {
        self.batches
            .entry(batch_id.to_string())
            .or_default()
            .push(chunk_id.to_string());
        self.chunks.insert(
            chunk_id.to_string(),
            ChunkEntry {
                bundle,
                state: ChunkState::Pending,
                attempts: 0,
            },
        );
    }

    /// True when no batches or chunks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty() && self.chunks.is_empty()
    }

    /// Registered batch ids, sorted.
    #[must_use]
    pub fn batch_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.batches.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// True if `batch_id` is registered.
    #[must_use]
    pub fn has_batch(&self, batch_id: &str) -> bool {
        self.batches.contains_key(batch_id)
    }

    /// Chunk ids of `batch_id`, in plan order.
    #[must_use]
    pub fn batch_chunks(&self, batch_id: &str) -> Vec<String> {
        self.batches
            .get(batch_id)
            .map(|chunks| chunks.value().clone())
            .unwrap_or_default()
    }

    /// A copy of the entry for `chunk_id`, if it is still registered.
    #[must_use]
    pub fn chunk(&self, chunk_id: &str) -> Option<ChunkEntry> {
        self.chunks.get(chunk_id).map(|e| e.value().clone())
    }

    /// Move a chunk to `Dispatched` and count the attempt. Returns false if
    /// the chunk is no longer registered.
    pub fn dispatch(&self, chunk_id: &str) -> bool {
        match self.chunks.get_mut(chunk_id) {
            Some(mut entry) => {
                entry.state = ChunkState::Dispatched;
                entry.attempts += 1;
                true
            },
            None => false,
        }
    }

    /// Mark a chunk failed. Returns false if it is no longer registered.
    pub fn fail(&self, chunk_id: &str) -> bool {
        match self.chunks.get_mut(chunk_id) {
            Some(mut entry) => {
                entry.state = ChunkState::Failed;
                true
            },
            None => false,
        }
    }

    /// Remove a finished chunk. Only the first call for a chunk returns
    /// true, however many threads race on it.
    pub fn finish(&self, chunk_id: &str) -> bool {
        self.chunks.remove(chunk_id).is_some()
    }

    /// Chunk ids still registered, sorted.
    #[must_use]
    pub fn unprocessed(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.chunks.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Drop every batch and chunk.
    pub fn clear(&self) {
        self.chunks.clear();
        self.batches.clear();
    }
}
