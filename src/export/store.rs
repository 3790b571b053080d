//! Document store collaborator with deferred commits.

use crate::error::{ExportError, ExportResult};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// A document to index: an id plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique document id.
    pub id: String,
    /// Indexed fields.
    pub body: Value,
}

/// Add/delete/commit interface of a search index. Writes made with
/// `commit = false` stay invisible until [`commit`](Self::commit).
pub trait DocumentStore: Send + Sync {
    /// Add or replace documents.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] if the store rejects the write.
    fn add(&self, docs: Vec<Document>, commit: bool) -> ExportResult<()>;

    /// Delete documents by id. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] if the store rejects the delete.
    fn delete(&self, ids: &[String], commit: bool) -> ExportResult<()>;

    /// Make pending writes visible.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Store`] if the commit fails.
    fn commit(&self) -> ExportResult<()>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    fn add(&self, docs: Vec<Document>, commit: bool) -> ExportResult<()> {
        (**self).add(docs, commit)
    }

    fn delete(&self, ids: &[String], commit: bool) -> ExportResult<()> {
        (**self).delete(ids, commit)
    }

    fn commit(&self) -> ExportResult<()> {
        (**self).commit()
    }
}

#[derive(Debug)]
enum PendingOp {
    Add(Document),
    Delete(String),
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    pending: Mutex<Vec<PendingOp>>,
    committed: DashMap<String, Value>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> ExportResult<MutexGuard<'_, Vec<PendingOp>>> {
        self.pending
            .lock()
            .map_err(|_| ExportError::Store("pending write queue poisoned".to_string()))
    }

    /// A committed document's body.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Value> {
        self.committed.get(id).map(|doc| doc.value().clone())
    }

    /// Number of committed documents.
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    /// Number of uncommitted writes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending().map_or(0, |p| p.len())
    }
}

impl DocumentStore for MemoryStore {
    fn add(&self, docs: Vec<Document>, commit: bool) -> ExportResult<()> {
        self.pending()?.extend(docs.into_iter().map(PendingOp::Add));
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    fn delete(&self, ids: &[String], commit: bool) -> ExportResult<()> {
        self.pending()?
            .extend(ids.iter().cloned().map(PendingOp::Delete));
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&self) -> ExportResult<()> {
        let ops = std::mem::take(&mut *self.pending()?);
        for op in ops {
            match op {
                PendingOp::Add(doc) => {
                    self.committed.insert(doc.id, doc.body);
                },
                PendingOp::Delete(id) => {
                    self.committed.remove(&id);
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            body: json!({"id": id}),
        }
    }

    #[test]
    fn test_writes_wait_for_commit() {
        let store = MemoryStore::new();
        store.add(vec![doc("a"), doc("b")], false).unwrap();
        assert_eq!(store.committed_count(), 0);
        assert_eq!(store.pending_count(), 2);

        store.delete(&["a".to_string()], false).unwrap();
        store.commit().unwrap();
        assert_eq!(store.committed_count(), 1);
        assert_eq!(store.get("b"), Some(json!({"id": "b"})));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_immediate_commit() {
        let store = MemoryStore::new();
        store.add(vec![doc("a")], true).unwrap();
        assert!(store.get("a").is_some());
    }
}
