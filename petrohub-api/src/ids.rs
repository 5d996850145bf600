//! Request identifiers
//!
//! Every request gets a TypeID-formatted identifier (`req_<uuidv7>`) that is
//! time-sortable and safe to log. It is attached by the request-id layer and
//! read back by the trace layer for request spans.
//!
//! ```rust
//! use petrohub_api::ids::RequestId;
//!
//! let id = RequestId::new();
//! assert!(id.as_str().starts_with("req_"));
//! ```

use http::{Extensions, HeaderValue, Request};
use mti::prelude::*;
use std::fmt;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};

/// TypeID request identifier with the `req` prefix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    /// The prefix used for request IDs
    pub const PREFIX: &'static str = "req";

    /// New time-sortable request ID
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        self.0.prefix().as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates [`RequestId`]s for `tower_http::request_id::SetRequestIdLayer`
///
/// An ID already supplied by the caller is kept by the layer; this only runs
/// when the header is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let header_value = HeaderValue::from_str(RequestId::new().as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}

/// The request ID recorded in request or response extensions, as text
pub fn request_id_from(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<TowerRequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(str::to_string)
}
