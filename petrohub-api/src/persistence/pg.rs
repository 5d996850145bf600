//! PostgreSQL store
//!
//! Rows live in a single table keyed by `(entity_type, entity_id)` with the
//! entity serialized into a `JSONB` column. Each [`Store::apply`] call runs in
//! one transaction.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::time::Duration;

use super::error::{StorageError, StorageOperation};
use super::store::{Change, RowKey, Store};
use crate::config::DatabaseConfig;

/// Upper bound on the wait between connection attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    table: String,
}

impl PgStore {
    /// Connect with retries and create the row table if needed
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = create_pool_with_retries(config).await?;
        let store = Self::from_pool(pool, &config.table)?;
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool; `table` must be a plain identifier
    pub fn from_pool(pool: PgPool, table: &str) -> Result<Self, StorageError> {
        if !is_identifier(table) {
            return Err(StorageError::database_error(
                StorageOperation::Connect,
                format!("invalid table name '{}'", table),
            ));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the row table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                entity_type TEXT NOT NULL, \
                entity_id TEXT NOT NULL, \
                data JSONB NOT NULL, \
                PRIMARY KEY (entity_type, entity_id))",
            self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::from(e).with_operation(StorageOperation::Connect))?;
        tracing::debug!(table = %self.table, "Entity row table ready");
        Ok(())
    }

    async fn apply_one(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        change: Change,
    ) -> Result<u64, StorageError> {
        let (sql, key, row, inserting) = match change {
            Change::Insert { key, row } => (
                format!(
                    "INSERT INTO {} (entity_type, entity_id, data) VALUES ($1, $2, $3) \
                     ON CONFLICT DO NOTHING",
                    self.table
                ),
                key,
                Some(row),
                true,
            ),
            Change::Update { key, row } => (
                format!(
                    "UPDATE {} SET data = $3 WHERE entity_type = $1 AND entity_id = $2",
                    self.table
                ),
                key,
                Some(row),
                false,
            ),
            Change::Delete { key } => (
                format!(
                    "DELETE FROM {} WHERE entity_type = $1 AND entity_id = $2",
                    self.table
                ),
                key,
                None,
                false,
            ),
        };

        let mut query = sqlx::query(&sql).bind(&key.entity_type).bind(&key.entity_id);
        if let Some(row) = row {
            query = query.bind(row);
        }

        let affected = query
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                StorageError::from(e)
                    .with_operation(StorageOperation::Save)
                    .with_entity(key.entity_type.clone(), key.entity_id.clone())
            })?
            .rows_affected();

        match (affected, inserting) {
            (0, true) => Err(StorageError::already_exists(key.entity_type, key.entity_id)),
            (0, false) => Err(StorageError::not_found(key.entity_type, key.entity_id)),
            (n, _) => Ok(n),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn load(&self, key: &RowKey) -> Result<Option<Value>, StorageError> {
        let sql = format!(
            "SELECT data FROM {} WHERE entity_type = $1 AND entity_id = $2",
            self.table
        );
        sqlx::query_scalar::<_, Value>(&sql)
            .bind(&key.entity_type)
            .bind(&key.entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::from(e).with_operation(StorageOperation::Load))
    }

    async fn load_all(&self, entity_type: &str) -> Result<Vec<Value>, StorageError> {
        let sql = format!(
            "SELECT data FROM {} WHERE entity_type = $1 ORDER BY entity_id",
            self.table
        );
        sqlx::query_scalar::<_, Value>(&sql)
            .bind(entity_type)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::from(e).with_operation(StorageOperation::Query))
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<usize, StorageError> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::from(e).with_operation(StorageOperation::Save))?;

        let mut affected = 0u64;
        for change in changes {
            // Dropping `tx` on error rolls the batch back
            affected += self.apply_one(&mut tx, change).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::from(e).with_operation(StorageOperation::Save))?;

        Ok(affected as usize)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::from(e).with_operation(StorageOperation::Ping))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Create the pool, retrying with exponential backoff
async fn create_pool_with_retries(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Database connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Database connection pool created: max={}, min={}",
                        config.max_connections,
                        config.min_connections
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries || !e.is_retriable() {
                    tracing::error!(
                        "Failed to connect to database after {} attempt(s): {}",
                        attempt,
                        e
                    );
                    return Err(e);
                }

                let delay = retry_delay(base_delay, attempt);
                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Backoff before retry `attempt` (1-based): `base * 2^(attempt - 1)`, capped
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    2_u32
        .checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

async fn try_create_pool(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            StorageError::connection_failed(format!(
                "{} at '{}': {}",
                categorize_db_error(&e),
                sanitize_connection_url(&config.url),
                e
            ))
        })
}

/// Mask the password in a connection URL
fn sanitize_connection_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        let credentials = &url[scheme_end + 3..at_pos];
        if let Some((username, _)) = credentials.split_once(':') {
            return format!("{}{}:***{}", &url[..scheme_end + 3], username, &url[at_pos..]);
        }
    }
    url.to_string()
}

fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "Configuration error",
        Error::Database(_) => "Database error",
        Error::Io(_) => "Network I/O error",
        Error::Tls(_) => "TLS error",
        Error::PoolTimedOut => "Connection pool timeout",
        Error::PoolClosed => "Connection pool closed",
        _ => "Connection error",
    }
}

fn is_identifier(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::StorageErrorKind;

    #[test]
    fn test_retry_delay_backs_off_and_caps() {
        let base = Duration::from_secs(2);
        assert_eq!(retry_delay(base, 1), Duration::from_secs(2));
        assert_eq!(retry_delay(base, 2), Duration::from_secs(4));
        assert_eq!(retry_delay(base, 4), Duration::from_secs(16));
        assert_eq!(retry_delay(base, 6), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, 33), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(base, u32::MAX), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(Duration::ZERO, 40), Duration::ZERO);
    }

    #[test]
    fn test_sanitize_connection_url() {
        assert_eq!(
            sanitize_connection_url("postgres://app:s3cret@db:5432/petrohub"),
            "postgres://app:***@db:5432/petrohub"
        );
        assert_eq!(
            sanitize_connection_url("postgres://db:5432/petrohub"),
            "postgres://db:5432/petrohub"
        );
    }

    #[test]
    fn test_table_identifier() {
        assert!(is_identifier("entity_rows"));
        assert!(is_identifier("_rows2"));
        assert!(!is_identifier("rows; DROP TABLE x"));
        assert!(!is_identifier("2rows"));
        assert!(!is_identifier(""));
    }

    #[tokio::test]
    async fn test_connect_failure_is_connection_error() {
        let config = DatabaseConfig {
            url: "postgres://app:pw@127.0.0.1:1/petrohub".to_string(),
            max_connections: 1,
            min_connections: 0,
            connection_timeout_secs: 1,
            max_retries: 0,
            retry_delay_secs: 0,
            table: "entity_rows".to_string(),
        };

        let err = PgStore::connect(&config).await.unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::ConnectionFailed);
        assert!(!err.message.contains("pw"));
    }
}
