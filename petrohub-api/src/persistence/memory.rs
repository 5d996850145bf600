//! In-memory store

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use super::error::StorageError;
use super::store::{Change, RowKey, Store};

/// Store backed by a concurrent map
///
/// Batches are validated in full before any row is touched, and one batch is
/// applied at a time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: DashMap<RowKey, Value>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all entity sets
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn validate(&self, changes: &[Change]) -> Result<(), StorageError> {
        // Track keys created or removed earlier in the same batch
        let mut present: std::collections::HashMap<&RowKey, bool> = Default::default();

        for change in changes {
            let key = change.key();
            let exists = present
                .get(key)
                .copied()
                .unwrap_or_else(|| self.rows.contains_key(key));

            match change {
                Change::Insert { .. } if exists => {
                    return Err(StorageError::already_exists(&key.entity_type, &key.entity_id));
                }
                Change::Update { .. } | Change::Delete { .. } if !exists => {
                    return Err(StorageError::not_found(&key.entity_type, &key.entity_id));
                }
                Change::Delete { .. } => {
                    present.insert(key, false);
                }
                _ => {
                    present.insert(key, true);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, key: &RowKey) -> Result<Option<Value>, StorageError> {
        Ok(self.rows.get(key).map(|row| row.value().clone()))
    }

    async fn load_all(&self, entity_type: &str) -> Result<Vec<Value>, StorageError> {
        let mut rows: Vec<(RowKey, Value)> = self
            .rows
            .iter()
            .filter(|entry| entry.key().entity_type == entity_type)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;
        self.validate(&changes)?;

        let affected = changes.len();
        for change in changes {
            match change {
                Change::Insert { key, row } | Change::Update { key, row } => {
                    self.rows.insert(key, row);
                }
                Change::Delete { key } => {
                    self.rows.remove(&key);
                }
            }
        }

        tracing::debug!(affected, "Applied changes to memory store");
        Ok(affected)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
