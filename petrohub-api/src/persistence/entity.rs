//! Entity capabilities
//!
//! A persisted type implements [`Entity`] and exposes its capabilities through
//! the `as_*` accessors. Audit stamping and soft-delete filtering key off
//! those accessors; nothing is discovered at runtime.
//!
//! ```rust
//! use petrohub_api::persistence::{AuditFields, Auditable, Entity};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Station {
//!     id: u32,
//!     name: String,
//!     #[serde(flatten)]
//!     audit: AuditFields,
//! }
//!
//! impl Auditable for Station {
//!     fn audit(&self) -> &AuditFields {
//!         &self.audit
//!     }
//!     fn audit_mut(&mut self) -> &mut AuditFields {
//!         &mut self.audit
//!     }
//! }
//!
//! impl Entity for Station {
//!     const NAME: &'static str = "Station";
//!     type Id = u32;
//!
//!     fn id(&self) -> u32 {
//!         self.id
//!     }
//!
//!     fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
//!         Some(self)
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;

/// A persisted record type
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity set name; also the storage partition
    const NAME: &'static str;

    /// Primary key type
    type Id: Display + Send + Sync;

    /// Primary key of this record
    fn id(&self) -> Self::Id;

    /// Audit capability, if any
    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }

    /// Soft-delete capability, if any
    ///
    /// Types returning `Some` are registered with
    /// [`ModelBuilder::soft_deletable`](super::ModelBuilder::soft_deletable).
    fn as_soft_deletable(&self) -> Option<&dyn SoftDeletable> {
        None
    }
}

/// Creation and modification tracking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    /// Set once, when the record is first saved
    pub created_at: DateTime<Utc>,
    /// Set on every later save of a modification
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// Logical deletion markers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteFields {
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

/// Records stamped with [`AuditFields`] on save
pub trait Auditable {
    /// Audit fields
    fn audit(&self) -> &AuditFields;

    /// Mutable audit fields
    fn audit_mut(&mut self) -> &mut AuditFields;

    /// Stamp a first insert
    fn mark_created(&mut self, now: DateTime<Utc>, actor: Option<&str>) {
        let audit = self.audit_mut();
        audit.created_at = now;
        audit.created_by = actor.map(str::to_string);
    }

    /// Stamp a modification; leaves creation fields alone
    fn mark_updated(&mut self, now: DateTime<Utc>, actor: Option<&str>) {
        let audit = self.audit_mut();
        audit.updated_at = Some(now);
        audit.updated_by = actor.map(str::to_string);
    }
}

/// Records that are flagged rather than removed on delete
pub trait SoftDeletable {
    /// Deletion markers
    fn deletion(&self) -> &SoftDeleteFields;

    /// Mutable deletion markers
    fn deletion_mut(&mut self) -> &mut SoftDeleteFields;

    /// Whether the record is logically deleted
    fn is_deleted(&self) -> bool {
        self.deletion().is_deleted
    }

    /// Flag the record as deleted
    fn mark_deleted(&mut self, now: DateTime<Utc>, actor: Option<&str>) {
        let deletion = self.deletion_mut();
        deletion.is_deleted = true;
        deletion.deleted_at = Some(now);
        deletion.deleted_by = actor.map(str::to_string);
    }

    /// Clear the deletion flag
    fn restore(&mut self) {
        *self.deletion_mut() = SoftDeleteFields::default();
    }
}
