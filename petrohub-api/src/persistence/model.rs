//! Entity model registry
//!
//! The model lists every persisted type and the read filters installed for
//! it. It is built once at startup from an explicit list:
//!
//! ```rust,ignore
//! let model = ModelBuilder::new()
//!     .soft_deletable::<Station>()
//!     .entity::<Pump>()
//!     .build();
//! ```

use std::collections::HashMap;

use super::entity::{Entity, SoftDeletable};
use super::error::StorageError;

/// Predicate applied to every default read of an entity set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFilter {
    /// Hide rows flagged as soft-deleted
    ExcludeDeleted,
}

impl QueryFilter {
    /// Whether a loaded record passes this filter
    pub fn admits<T: Entity>(&self, entity: &T) -> bool {
        match self {
            Self::ExcludeDeleted => !entity
                .as_soft_deletable()
                .is_some_and(|deletable| deletable.is_deleted()),
        }
    }
}

/// Registration of one entity set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    name: &'static str,
    filters: Vec<QueryFilter>,
}

impl EntityModel {
    /// Entity set name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Default read filters
    pub fn filters(&self) -> &[QueryFilter] {
        &self.filters
    }

    /// Whether default reads hide soft-deleted rows
    pub fn excludes_deleted(&self) -> bool {
        self.filters.contains(&QueryFilter::ExcludeDeleted)
    }

    /// Whether a record passes every default filter
    pub fn admits<T: Entity>(&self, entity: &T) -> bool {
        self.filters.iter().all(|filter| filter.admits(entity))
    }
}

/// The set of registered entity types
#[derive(Debug, Clone, Default)]
pub struct Model {
    entities: HashMap<&'static str, EntityModel>,
}

impl Model {
    /// Start a registry
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    /// Look up an entity set by name
    pub fn get(&self, name: &str) -> Option<&EntityModel> {
        self.entities.get(name)
    }

    /// Registration for `T`, or an error if it was never registered
    pub fn require<T: Entity>(&self) -> Result<&EntityModel, StorageError> {
        self.get(T::NAME)
            .ok_or_else(|| StorageError::unregistered(T::NAME))
    }

    /// Registered entity set names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entities.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Builder for [`Model`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    entities: HashMap<&'static str, EntityModel>,
}

impl ModelBuilder {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type without read filters
    #[must_use]
    pub fn entity<T: Entity>(self) -> Self {
        self.register::<T>(Vec::new())
    }

    /// Register a soft-deletable entity type
    ///
    /// Default reads of the set apply [`QueryFilter::ExcludeDeleted`].
    #[must_use]
    pub fn soft_deletable<T: Entity + SoftDeletable>(self) -> Self {
        self.register::<T>(vec![QueryFilter::ExcludeDeleted])
    }

    fn register<T: Entity>(mut self, filters: Vec<QueryFilter>) -> Self {
        tracing::debug!(entity = T::NAME, ?filters, "Registered entity");

        self.entities.insert(
            T::NAME,
            EntityModel {
                name: T::NAME,
                filters,
            },
        );
        self
    }

    /// Finish the registry
    pub fn build(self) -> Model {
        Model {
            entities: self.entities,
        }
    }
}
