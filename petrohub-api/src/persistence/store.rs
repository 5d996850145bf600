//! Storage backends
//!
//! A [`Store`] holds rows as JSON documents keyed by entity set and primary
//! key. It knows nothing about audit fields or soft deletes; the
//! [`DataContext`](super::DataContext) handles both before rows reach it.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use super::error::StorageError;

/// Row key: entity set name plus primary key rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey {
    pub entity_type: String,
    pub entity_id: String,
}

impl RowKey {
    /// Create a key
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// A single pending write
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// New row; fails if the key exists
    Insert { key: RowKey, row: Value },
    /// Replace an existing row; fails if the key is missing
    Update { key: RowKey, row: Value },
    /// Remove an existing row; fails if the key is missing
    Delete { key: RowKey },
}

impl Change {
    /// Key this change targets
    pub fn key(&self) -> &RowKey {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Persistence backend
///
/// [`Store::apply`] is all-or-nothing: either every change is written or none
/// is.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load one row
    async fn load(&self, key: &RowKey) -> Result<Option<Value>, StorageError>;

    /// Load every row of an entity set, ordered by key
    async fn load_all(&self, entity_type: &str) -> Result<Vec<Value>, StorageError>;

    /// Write a batch of changes in one transaction, returning affected rows
    async fn apply(&self, changes: Vec<Change>) -> Result<usize, StorageError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), StorageError>;

    /// Backend name for health reports
    fn name(&self) -> &'static str;
}
