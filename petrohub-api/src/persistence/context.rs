//! Unit of work over a [`Store`]
//!
//! A [`DataContext`] tracks added, modified and removed entities and writes
//! them in one batch on [`DataContext::save_changes`]. Audit fields are
//! stamped at that point, from the context's [`Clock`] and
//! [`ActorProvider`]. Default reads apply the model's query filters, so
//! soft-deleted rows stay hidden unless the caller opts out.
//!
//! ```rust,ignore
//! let mut db = DataContext::new(store, model);
//! db.add(station)?;
//! db.save_changes().await?;
//!
//! let visible = db.query::<Station>().all().await?;
//! let everything = db.query::<Station>().ignore_query_filters().all().await?;
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use super::entity::{Entity, SoftDeletable};
use super::error::{StorageError, StorageOperation};
use super::model::Model;
use super::store::{Change, RowKey, Store};

/// Source of the current time for audit stamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Identity of whoever is making the current changes
///
/// Feeds `created_by`, `updated_by` and `deleted_by`.
pub trait ActorProvider: Send + Sync {
    fn current_actor(&self) -> Option<String>;
}

/// Provides no actor; `*_by` fields stay unset
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActor;

impl ActorProvider for NoActor {
    fn current_actor(&self) -> Option<String> {
        None
    }
}

/// Tracking state of a pending entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
}

trait Pending: Send + Sync {
    fn stamp(&mut self, state: EntryState, now: DateTime<Utc>, actor: Option<&str>);
    fn to_row(&self) -> Result<Value, StorageError>;
}

impl<T: Entity> Pending for T {
    fn stamp(&mut self, state: EntryState, now: DateTime<Utc>, actor: Option<&str>) {
        let Some(auditable) = self.as_auditable_mut() else {
            return;
        };
        match state {
            EntryState::Added => auditable.mark_created(now, actor),
            EntryState::Modified => auditable.mark_updated(now, actor),
            EntryState::Deleted => {}
        }
    }

    fn to_row(&self) -> Result<Value, StorageError> {
        serde_json::to_value(self)
            .map_err(|e| StorageError::serialization_error(StorageOperation::Save, e.to_string()))
    }
}

struct Tracked {
    key: RowKey,
    state: EntryState,
    entity: Box<dyn Pending>,
}

/// Unit of work with change tracking
pub struct DataContext {
    store: Arc<dyn Store>,
    model: Arc<Model>,
    clock: Arc<dyn Clock>,
    actor: Arc<dyn ActorProvider>,
    tracked: Vec<Tracked>,
}

impl DataContext {
    /// Context using the system clock and no actor
    pub fn new(store: Arc<dyn Store>, model: Arc<Model>) -> Self {
        Self {
            store,
            model,
            clock: Arc::new(SystemClock),
            actor: Arc::new(NoActor),
            tracked: Vec::new(),
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the actor provider
    #[must_use]
    pub fn with_actor(mut self, actor: Arc<dyn ActorProvider>) -> Self {
        self.actor = actor;
        self
    }

    /// The registered model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Track a new entity for insertion
    pub fn add<T: Entity>(&mut self, entity: T) -> Result<(), StorageError> {
        self.track(entity, EntryState::Added)
    }

    /// Track an existing entity as modified
    pub fn update<T: Entity>(&mut self, entity: T) -> Result<(), StorageError> {
        self.track(entity, EntryState::Modified)
    }

    /// Track an entity for physical removal
    pub fn remove<T: Entity>(&mut self, entity: T) -> Result<(), StorageError> {
        self.track(entity, EntryState::Deleted)
    }

    /// Flag an entity as deleted and track it as modified
    ///
    /// The row stays in storage; default reads stop returning it.
    /// Fails unless `T` was registered with `ModelBuilder::soft_deletable`.
    pub fn soft_delete<T: Entity + SoftDeletable>(&mut self, mut entity: T) -> Result<(), StorageError> {
        let registration = self
            .model
            .require::<T>()
            .map_err(|e| e.with_operation(StorageOperation::Save))?;
        if !registration.excludes_deleted() {
            return Err(StorageError::missing_soft_delete_filter(T::NAME));
        }

        let actor = self.actor.current_actor();
        entity.mark_deleted(self.clock.now(), actor.as_deref());
        self.track(entity, EntryState::Modified)
    }

    /// Whether anything is waiting to be saved
    pub fn has_changes(&self) -> bool {
        !self.tracked.is_empty()
    }

    /// Tracking state of the entity with the given key, if tracked
    pub fn entry_state<T: Entity>(&self, id: &T::Id) -> Option<EntryState> {
        let key = RowKey::new(T::NAME, id.to_string());
        self.tracked
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.state)
    }

    /// Drop every tracked change without saving
    pub fn discard_changes(&mut self) {
        self.tracked.clear();
    }

    /// Load an entity by key, honoring query filters
    pub async fn find<T: Entity>(&self, id: &T::Id) -> Result<Option<T>, StorageError> {
        self.query::<T>().find(id).await
    }

    /// Start a query over an entity set
    pub fn query<T: Entity>(&self) -> Query<'_, T> {
        Query {
            context: self,
            ignore_filters: false,
            _entity: PhantomData,
        }
    }

    /// Stamp audit fields and write every tracked change in one batch
    ///
    /// Returns the number of affected rows. The tracker is cleared on
    /// success and kept on failure.
    pub async fn save_changes(&mut self) -> Result<usize, StorageError> {
        if self.tracked.is_empty() {
            return Ok(0);
        }

        let now = self.clock.now();
        let actor = self.actor.current_actor();

        let mut changes = Vec::with_capacity(self.tracked.len());
        for entry in &mut self.tracked {
            entry.entity.stamp(entry.state, now, actor.as_deref());

            let key = entry.key.clone();
            changes.push(match entry.state {
                EntryState::Added => Change::Insert {
                    key,
                    row: entry.entity.to_row()?,
                },
                EntryState::Modified => Change::Update {
                    key,
                    row: entry.entity.to_row()?,
                },
                EntryState::Deleted => Change::Delete { key },
            });
        }

        let affected = self.store.apply(changes).await.map_err(|e| {
            tracing::warn!(error = %e, "Saving changes failed; tracked entries kept");
            e
        })?;

        self.tracked.clear();
        tracing::debug!(affected, store = self.store.name(), "Changes saved");
        Ok(affected)
    }

    fn track<T: Entity>(&mut self, entity: T, state: EntryState) -> Result<(), StorageError> {
        let registration = self
            .model
            .require::<T>()
            .map_err(|e| e.with_operation(StorageOperation::Save))?;
        // Deleted rows of an unfiltered set would leak into default reads
        if entity.as_soft_deletable().is_some() && !registration.excludes_deleted() {
            return Err(StorageError::missing_soft_delete_filter(T::NAME));
        }

        let key = RowKey::new(T::NAME, entity.id().to_string());
        let existing = self.tracked.iter().position(|entry| entry.key == key);

        let state = match (existing.map(|i| self.tracked[i].state), state) {
            // Inserting and deleting before a save cancels out
            (Some(EntryState::Added), EntryState::Deleted) => {
                if let Some(i) = existing {
                    self.tracked.remove(i);
                }
                return Ok(());
            }
            (Some(EntryState::Added), EntryState::Modified) => EntryState::Added,
            (_, state) => state,
        };

        let entry = Tracked {
            key,
            state,
            entity: Box::new(entity),
        };
        match existing {
            Some(i) => self.tracked[i] = entry,
            None => self.tracked.push(entry),
        }
        Ok(())
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContext")
            .field("store", &self.store.name())
            .field("entities", &self.model.names())
            .field("tracked", &self.tracked.len())
            .finish()
    }
}

/// Read over one entity set
#[must_use]
pub struct Query<'a, T> {
    context: &'a DataContext,
    ignore_filters: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Query<'_, T> {
    /// Include rows the model's filters would hide (e.g. soft-deleted rows)
    pub fn ignore_query_filters(mut self) -> Self {
        self.ignore_filters = true;
        self
    }

    /// Every matching row, ordered by key
    pub async fn all(self) -> Result<Vec<T>, StorageError> {
        let registration = self.context.model.require::<T>()?;
        let rows = self.context.store.load_all(T::NAME).await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let entity: T = serde_json::from_value(row).map_err(|e| {
                StorageError::serialization_error(StorageOperation::Query, e.to_string())
                    .with_entity(T::NAME, "*")
            })?;
            if self.ignore_filters || registration.admits(&entity) {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    /// One row by key
    pub async fn find(self, id: &T::Id) -> Result<Option<T>, StorageError> {
        let registration = self
            .context
            .model
            .require::<T>()
            .map_err(|e| e.with_operation(StorageOperation::Load))?;
        let key = RowKey::new(T::NAME, id.to_string());

        let Some(row) = self.context.store.load(&key).await? else {
            return Ok(None);
        };
        let entity: T = serde_json::from_value(row).map_err(|e| {
            StorageError::serialization_error(StorageOperation::Load, e.to_string())
                .with_entity(T::NAME, key.entity_id.clone())
        })?;

        Ok((self.ignore_filters || registration.admits(&entity)).then_some(entity))
    }

    /// Number of matching rows
    pub async fn count(self) -> Result<usize, StorageError> {
        Ok(self.all().await?.len())
    }
}
