//! Application state management

use axum::extract::FromRef;
use std::sync::Arc;

use crate::{
    config::Config,
    error::{Error, Result},
    localization::{Locale, MessageCatalog},
    persistence::{DataContext, MemoryStore, Model, Store},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    catalog: Arc<MessageCatalog>,
    store: Arc<dyn Store>,
    model: Arc<Model>,
}

impl AppState {
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<MessageCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Fresh unit of work over the shared store
    pub fn data_context(&self) -> DataContext {
        DataContext::new(self.store.clone(), self.model.clone())
    }
}

impl FromRef<AppState> for Arc<MessageCatalog> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.config.service.name)
            .field("store", &self.store.name())
            .field("entities", &self.model.names())
            .finish()
    }
}

/// Builder for AppState
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    catalog: Option<MessageCatalog>,
    store: Option<Arc<dyn Store>>,
    model: Option<Model>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use this catalog instead of loading one from the configuration
    pub fn catalog(mut self, catalog: MessageCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use this store instead of creating one from the configuration
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Registered entity types; empty by default
    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    /// Build the AppState
    ///
    /// - the catalog comes from `localization.catalog_path`, or the embedded one
    /// - the store is PostgreSQL when `database` is configured (and the
    ///   `database` feature is enabled), otherwise in-memory
    pub async fn build(self) -> Result<AppState> {
        let config = self.config.unwrap_or_default();

        let default_locale = Locale::parse(&config.localization.default_culture).map_err(|e| {
            Error::invalid_argument(format!("Invalid default culture: {}", e))
        })?;

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => match &config.localization.catalog_path {
                Some(path) => MessageCatalog::load(path, default_locale)?,
                None => MessageCatalog::embedded(default_locale)?,
            },
        };

        for culture in &config.localization.supported_cultures {
            match Locale::parse(culture) {
                Ok(locale) if !catalog.supports(&locale) => {
                    tracing::warn!(culture = %locale, "No messages for supported culture; default messages will be used");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(culture = %culture, error = %e, "Ignoring invalid supported culture"),
            }
        }

        let store = match self.store {
            Some(store) => store,
            None => Self::create_store(&config).await?,
        };
        tracing::info!(store = store.name(), "Persistence store ready");

        Ok(AppState {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            store,
            model: Arc::new(self.model.unwrap_or_default()),
        })
    }

    #[cfg(feature = "database")]
    async fn create_store(config: &Config) -> Result<Arc<dyn Store>> {
        match &config.database {
            Some(db_config) => {
                let store = crate::persistence::PgStore::connect(db_config).await?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }

    #[cfg(not(feature = "database"))]
    async fn create_store(config: &Config) -> Result<Arc<dyn Store>> {
        if config.database.is_some() {
            tracing::warn!("Database configured but the `database` feature is disabled; using the in-memory store");
        }
        Ok(Arc::new(MemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::keys;
    use crate::persistence::{Change, RowKey};
    use std::io::Write;

    #[tokio::test]
    async fn test_default_state() {
        let state = AppState::builder().build().await.unwrap();

        assert_eq!(state.config().service.name, "petrohub-api");
        assert_eq!(state.store().name(), "memory");
        assert_eq!(state.catalog().default_locale().as_str(), "en-US");
        assert!(state.model().names().is_empty());
        assert!(state.store().ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_default_culture() {
        let mut config = Config::default();
        config.localization.default_culture = "xx-INVALID".to_string();

        let err = AppState::builder().config(config).build().await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_catalog_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"en-US": {{"Success": "Done"}}}}"#).unwrap();

        let mut config = Config::default();
        config.localization.catalog_path = Some(file.path().to_path_buf());

        let state = AppState::builder().config(config).build().await.unwrap();
        let en = Locale::parse("en-US").unwrap();
        assert_eq!(state.catalog().lookup(&en, keys::SUCCESS), "Done");
    }

    #[tokio::test]
    async fn test_catalog_from_ref() {
        let state = AppState::builder().build().await.unwrap();
        let catalog = Arc::<MessageCatalog>::from_ref(&state);
        assert!(Arc::ptr_eq(&catalog, state.catalog()));
    }

    #[tokio::test]
    async fn test_data_contexts_share_the_store() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::builder()
            .store(store.clone())
            .build()
            .await
            .unwrap();

        store
            .apply(vec![Change::Insert {
                key: RowKey::new("Station", "1"),
                row: serde_json::json!({"id": 1}),
            }])
            .await
            .unwrap();

        let ctx = state.data_context();
        assert!(!ctx.has_changes());
        assert_eq!(store.len(), 1);
        assert!(state
            .store()
            .load(&RowKey::new("Station", "1"))
            .await
            .unwrap()
            .is_some());
    }
}
