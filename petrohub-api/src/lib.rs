//! # petrohub-api
//!
//! Skeleton REST API for the PetroHub platform, built on axum.
//!
//! ## Features
//!
//! - **Response envelope**: business outcomes mapped to `{success, message, errors, data}`
//! - **Exception boundary**: uncaught errors and panics become sanitized `{statusCode, message, type}` bodies
//! - **Culture resolution**: per-request locale from query string, `Accept-Language` or cookie
//! - **API versioning**: URL segment, query string or header negotiation under `/api/v{n}`
//! - **Persistence**: unit of work with audit stamping and soft-delete filtering
//! - **Health checks**: versioned liveness/culture endpoints and a dependency check
//! - **Graceful shutdown**: SIGTERM and SIGINT handling
//!
//! ## Example
//!
//! ```rust,no_run
//! use petrohub_api::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config.clone()).build().await?;
//!     let app = build_router(state)?;
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod ids;
pub mod localization;
pub mod middleware;
pub mod observability;
pub mod outcome;
pub mod persistence;
pub mod responses;
pub mod server;
pub mod state;
pub mod versioning;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorBody, ErrorClass, Result};
    pub use crate::ids::{MakeTypedRequestId, RequestId};
    pub use crate::localization::{keys, CultureResolver, Locale, MessageCatalog, RequestLocale};
    pub use crate::middleware::ExceptionBoundaryLayer;
    pub use crate::observability::init_tracing;
    pub use crate::outcome::{Failure, Outcome};
    pub use crate::persistence::{
        Auditable, AuditFields, DataContext, Entity, MemoryStore, Model, SoftDeletable,
        SoftDeleteFields, StorageError, Store,
    };
    pub use crate::responses::{ApiReply, ApiResponse, ResponseMapper};
    pub use crate::server::{build_router, Server};
    pub use crate::state::AppState;
    pub use crate::versioning::{
        ApiVersion, DeprecationInfo, RequestedVersion, VersionNegotiation, VersionedApiBuilder,
    };

    #[cfg(feature = "database")]
    pub use crate::persistence::PgStore;

    pub use axum::{
        extract::{Path, Query, State},
        routing::{delete, get, patch, post, put},
        Json, Router,
    };
}
