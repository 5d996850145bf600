//! Storage error types
//!
//! ```rust
//! use petrohub_api::persistence::{StorageError, StorageErrorKind, StorageOperation};
//!
//! let error = StorageError::unregistered("Station");
//! assert_eq!(error.kind, StorageErrorKind::Unregistered);
//! assert_eq!(error.operation, StorageOperation::Query);
//! ```

use std::fmt;

/// What the data context or store was doing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    /// Loading a single row by key
    Load,
    /// Querying every row of an entity set
    Query,
    /// Writing tracked changes
    Save,
    /// Checking store availability
    Ping,
    /// Opening a connection pool or schema
    Connect,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Query => write!(f, "query"),
            Self::Save => write!(f, "save"),
            Self::Ping => write!(f, "ping"),
            Self::Connect => write!(f, "connect"),
        }
    }
}

/// Category of storage error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// The entity type is not part of the model
    Unregistered,
    /// A soft-deletable entity type was registered without its read filter
    MissingSoftDeleteFilter,
    /// A row with the same key is already stored
    AlreadyExists,
    /// The row to update or delete is not stored
    NotFound,
    /// Could not reach the database
    ConnectionFailed,
    /// The database rejected the statement
    DatabaseError,
    /// A row could not be converted to or from JSON
    SerializationError,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "unregistered"),
            Self::MissingSoftDeleteFilter => write!(f, "missing_soft_delete_filter"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::NotFound => write!(f, "not_found"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
        }
    }
}

/// Structured storage error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// The operation being performed
    pub operation: StorageOperation,
    /// The category of error
    pub kind: StorageErrorKind,
    /// Human-readable message
    pub message: String,
    /// Entity set involved (e.g. "Station")
    pub entity_type: Option<String>,
    /// Key of the row involved
    pub entity_id: Option<String>,
}

impl StorageError {
    /// Create a new storage error
    pub fn new(
        operation: StorageOperation,
        kind: StorageErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// The entity type was never registered with the model
    pub fn unregistered(entity_type: impl Into<String>) -> Self {
        Self {
            operation: StorageOperation::Query,
            kind: StorageErrorKind::Unregistered,
            message: "Entity type is not registered in the model".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: None,
        }
    }

    /// A soft-deletable record whose type was registered with `ModelBuilder::entity`
    pub fn missing_soft_delete_filter(entity_type: impl Into<String>) -> Self {
        Self {
            operation: StorageOperation::Save,
            kind: StorageErrorKind::MissingSoftDeleteFilter,
            message: "Soft-deletable entity type must be registered with ModelBuilder::soft_deletable"
                .to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: None,
        }
    }

    /// An insert collided with an existing row
    pub fn already_exists(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            StorageOperation::Save,
            StorageErrorKind::AlreadyExists,
            "Row already exists",
        )
        .with_entity(entity_type, entity_id)
    }

    /// An update or delete targeted a missing row
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            StorageOperation::Save,
            StorageErrorKind::NotFound,
            "Row not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Could not connect to the database
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            StorageOperation::Connect,
            StorageErrorKind::ConnectionFailed,
            message,
        )
    }

    /// The database reported an error
    pub fn database_error(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::DatabaseError, message)
    }

    /// A row failed to (de)serialize
    pub fn serialization_error(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::SerializationError, message)
    }

    /// Attach entity context
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Override the operation
    #[must_use]
    pub fn with_operation(mut self, operation: StorageOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Transient failures that may succeed on retry
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, StorageErrorKind::ConnectionFailed)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        match (&self.entity_type, &self.entity_id) {
            (Some(entity_type), Some(entity_id)) => write!(f, " [{}: {}]", entity_type, entity_id)?,
            (Some(entity_type), None) => write!(f, " [{}]", entity_type)?,
            _ => {}
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(StorageOperation::Load, err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::connection_failed(err.to_string())
            }
            other => Self::database_error(StorageOperation::Save, other.to_string()),
        }
    }
}
