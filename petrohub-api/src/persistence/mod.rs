//! Entity persistence with audit stamping and soft deletes
//!
//! Handlers work through a [`DataContext`], a unit of work over a shared
//! [`Store`]. On [`DataContext::save_changes`] the context stamps audit fields
//! on every auditable entry and writes the whole batch at once. Entity types
//! are registered in a [`Model`]; soft-deletable types get a query filter that
//! hides deleted rows unless a query opts out.
//!
//! ```rust,ignore
//! let model = Arc::new(Model::builder().soft_deletable::<Station>().build());
//! let mut ctx = DataContext::new(store, model);
//!
//! ctx.add(station)?;
//! ctx.save_changes().await?;
//!
//! let active = ctx.query::<Station>().all().await?;
//! let everything = ctx.query::<Station>().ignore_query_filters().all().await?;
//! ```

pub mod context;
pub mod entity;
pub mod error;
pub mod memory;
pub mod model;
pub mod store;

#[cfg(feature = "database")]
pub mod pg;

pub use context::{ActorProvider, Clock, DataContext, EntryState, NoActor, Query, SystemClock};
pub use entity::{AuditFields, Auditable, Entity, SoftDeletable, SoftDeleteFields};
pub use error::{StorageError, StorageErrorKind, StorageOperation};
pub use memory::MemoryStore;
pub use model::{EntityModel, Model, ModelBuilder, QueryFilter};
pub use store::{Change, RowKey, Store};

#[cfg(feature = "database")]
pub use pg::PgStore;
