//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `PETROHUB_`, sections split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/petrohub/{service_name}/config.toml
//! 4. System directory: /etc/petrohub/{service_name}/config.toml
//! 5. Default values
//!
//! For example `PETROHUB_SERVICE__PORT=9000` overrides `service.port`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const ENV_PREFIX: &str = "PETROHUB_";
const ENV_SPLIT: &str = "__";
const CONFIG_DIR: &str = "petrohub";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Culture resolution and message catalog
    #[serde(default)]
    pub localization: LocalizationConfig,

    /// API version negotiation
    #[serde(default)]
    pub versioning: VersioningConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Database configuration (optional; the in-memory store is used without it)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment name reported by the health endpoint
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Application version reported by the health endpoint
    #[serde(default = "default_app_version")]
    pub version: String,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Culture resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Locale used when no culture is requested or the requested one is invalid
    #[serde(default = "default_culture")]
    pub default_culture: String,

    /// Cultures the service ships messages for
    ///
    /// Advisory: startup warns about entries the catalog lacks, but requests
    /// may still select any valid culture, which then falls back through
    /// the catalog.
    #[serde(default = "default_supported_cultures")]
    pub supported_cultures: Vec<String>,

    /// Query parameter carrying the requested culture
    #[serde(default = "default_culture_key")]
    pub query_parameter: String,

    /// Cookie carrying the requested culture
    #[serde(default = "default_culture_key")]
    pub cookie_name: String,

    /// JSON message catalog replacing the embedded one
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_culture: default_culture(),
            supported_cultures: default_supported_cultures(),
            query_parameter: default_culture_key(),
            cookie_name: default_culture_key(),
            catalog_path: None,
        }
    }
}

/// API version negotiation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Version assumed when a request names none
    #[serde(default = "default_api_version")]
    pub default_version: u8,

    /// Route requests without a version to `default_version`
    #[serde(default = "default_true")]
    pub assume_default_when_unspecified: bool,

    /// Emit the `api-supported-versions` response header
    #[serde(default = "default_true")]
    pub report_api_versions: bool,

    /// Query parameter carrying the requested version
    #[serde(default = "default_version_query")]
    pub query_parameter: String,

    /// Header carrying the requested version
    #[serde(default = "default_version_header")]
    pub header_name: String,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            default_version: default_api_version(),
            assume_default_when_unspecified: true,
            report_api_versions: true,
            query_parameter: default_version_query(),
            header_name: default_version_header(),
        }
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request tracking configuration (request IDs, header propagation)
    #[serde(default)]
    pub request_tracking: RequestTrackingConfig,

    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS mode: "permissive", "restrictive" or "disabled"
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            request_tracking: RequestTrackingConfig::default(),
            body_limit_mb: default_body_limit_mb(),
            compression: true,
            cors_mode: default_cors_mode(),
        }
    }
}

/// Request tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrackingConfig {
    /// Enable request ID generation
    #[serde(default = "default_true")]
    pub request_id_enabled: bool,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Echo the request ID on responses
    #[serde(default = "default_true")]
    pub propagate_headers: bool,

    /// Enable sensitive header masking in logs
    #[serde(default = "default_true")]
    pub mask_sensitive_headers: bool,
}

impl Default for RequestTrackingConfig {
    fn default() -> Self {
        Self {
            request_id_enabled: true,
            request_id_header: default_request_id_header(),
            propagate_headers: true,
            mask_sensitive_headers: true,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing database connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Table holding entity rows
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "Production".to_string()
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

fn default_culture() -> String {
    "en-US".to_string()
}

fn default_supported_cultures() -> Vec<String> {
    vec!["en-US".to_string(), "ar".to_string(), "hi".to_string()]
}

fn default_culture_key() -> String {
    "culture".to_string()
}

fn default_api_version() -> u8 {
    1
}

fn default_version_query() -> String {
    "version".to_string()
}

fn default_version_header() -> String {
    "X-Version".to_string()
}

fn default_true() -> bool {
    true
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn default_max_connections() -> u32 {
    50
}

fn default_min_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_table() -> String {
    "entity_rows".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is taken from the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "petrohub-api".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SPLIT));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SPLIT))
            .extract()?;

        Ok(config)
    }

    /// Candidate config files, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_DIR);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_DIR)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Get database URL
    pub fn database_url(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.url.as_str())
    }

    /// Request body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.middleware.body_limit_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "petrohub-api".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
                version: default_app_version(),
            },
            localization: LocalizationConfig::default(),
            versioning: VersioningConfig::default(),
            middleware: MiddlewareConfig::default(),
            database: None,
        }
    }
}
