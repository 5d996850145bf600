//! API versioning
//!
//! Versioned routes live under `{base}/v{n}` and are registered through
//! [`VersionedApiBuilder`]. [`VersionNegotiation`] sits in front of the router
//! and decides which version a request targets:
//!
//! 1. a `v{n}` URL segment directly after the base path
//! 2. the `version` query parameter
//! 3. the `X-Version` header
//! 4. the default version, when unversioned requests are allowed
//!
//! Requests that name their version outside the path are rewritten to
//! `{base}/v{n}/...` before routing, so `/api/health?version=1` and
//! `/api/v1/health` reach the same handler. An unparseable or unregistered
//! version is an argument error (400).
//!
//! Negotiation rewrites the URI, so it must wrap the router instead of being
//! added with `Router::layer`:
//!
//! ```rust,ignore
//! let builder = VersionedApiBuilder::new()
//!     .with_base_path("/api")
//!     .add_version(ApiVersion::V1, |router| router.route("/health", get(health)));
//! let negotiation = builder.negotiation(&config.versioning)?;
//! let app = from_fn_with_state(negotiation, VersionNegotiation::middleware)
//!     .layer(builder.build().with_state(state));
//! ```

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, uri::PathAndQuery, HeaderMap, HeaderName, HeaderValue, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::VersioningConfig;
use crate::error::{Error, Result};

/// Header listing every registered version
pub const SUPPORTED_VERSIONS_HEADER: &str = "api-supported-versions";

/// Header listing registered versions that are deprecated
pub const DEPRECATED_VERSIONS_HEADER: &str = "api-deprecated-versions";

/// API version identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApiVersion {
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl ApiVersion {
    /// Parse version from string (e.g. "v1", "V1", "1", "1.0")
    pub fn parse(s: &str) -> Option<Self> {
        let lowercase = s.trim().to_lowercase();
        let normalized = lowercase.strip_prefix('v').unwrap_or(&lowercase);
        let major = normalized.strip_suffix(".0").unwrap_or(normalized);
        match major {
            "1" => Some(Self::V1),
            "2" => Some(Self::V2),
            "3" => Some(Self::V3),
            "4" => Some(Self::V4),
            "5" => Some(Self::V5),
            _ => None,
        }
    }

    /// Version from its number
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            4 => Some(Self::V4),
            5 => Some(Self::V5),
            _ => None,
        }
    }

    pub fn as_number(&self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
            Self::V5 => 5,
        }
    }

    /// Path segment, e.g. "v1"
    pub fn as_path_segment(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
            Self::V4 => "v4",
            Self::V5 => "v5",
        }
    }

    /// Form used in the reporting headers, e.g. "1.0"
    pub fn as_header_value(&self) -> String {
        format!("{}.0", self.as_number())
    }

    pub fn is_deprecated(&self, latest: ApiVersion) -> bool {
        *self < latest
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_path_segment())
    }
}

impl From<ApiVersion> for u8 {
    fn from(version: ApiVersion) -> Self {
        version.as_number()
    }
}

/// Deprecation information for an API version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeprecationInfo {
    /// The deprecated API version
    pub version: ApiVersion,
    /// The recommended replacement version
    pub replacement: ApiVersion,
    /// Sunset date in RFC 3339 format
    pub sunset_date: Option<String>,
    pub message: Option<String>,
}

impl DeprecationInfo {
    pub fn new(version: ApiVersion, replacement: ApiVersion) -> Self {
        Self {
            version,
            replacement,
            sunset_date: None,
            message: None,
        }
    }

    /// Set the sunset date (RFC 3339 format)
    pub fn with_sunset_date(mut self, date: impl Into<String>) -> Self {
        self.sunset_date = Some(date.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn deprecation_header(&self) -> String {
        format!("version=\"{}\"", self.version)
    }

    fn link_header(&self, base_path: &str) -> String {
        format!(
            "<{}/{}/>; rel=\"successor-version\"",
            base_path,
            self.replacement.as_path_segment()
        )
    }

    fn warning_header(&self) -> Option<String> {
        self.message.as_ref().map(|message| {
            format!(
                "299 - \"API version {} is deprecated. Please migrate to version {}. {}\"",
                self.version, self.replacement, message
            )
        })
    }

    /// Add `Deprecation`, `Sunset`, `Link` and `Warning` headers
    fn apply(&self, base_path: &str, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.deprecation_header()) {
            headers.insert("Deprecation", value);
        }

        if let Some(value) = self
            .sunset_date
            .as_deref()
            .and_then(|sunset| HeaderValue::from_str(sunset).ok())
        {
            headers.insert("Sunset", value);
        }

        if let Ok(value) = HeaderValue::from_str(&self.link_header(base_path)) {
            headers.insert(header::LINK, value);
        }

        if let Some(value) = self
            .warning_header()
            .and_then(|warning| HeaderValue::from_str(&warning).ok())
        {
            headers.insert(header::WARNING, value);
        }
    }
}

fn with_deprecation<S>(router: Router<S>, base_path: String, deprecation: DeprecationInfo) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn(move |req: Request, next: Next| {
        let deprecation = deprecation.clone();
        let base_path = base_path.clone();
        async move {
            let mut response = next.run(req).await;
            deprecation.apply(&base_path, response.headers_mut());
            response
        }
    }))
}

/// Builder for routers that serve several API versions
pub struct VersionedApiBuilder<S = ()> {
    versions: Vec<(ApiVersion, Router<S>, Option<DeprecationInfo>)>,
    base_path: String,
}

impl<S> Default for VersionedApiBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> VersionedApiBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            base_path: String::new(),
        }
    }

    /// Base path for all versions; normalized to a leading `/` and no trailing `/`
    pub fn with_base_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim_matches('/');
        self.base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };
        self
    }

    pub fn add_version<F>(mut self, version: ApiVersion, routes: F) -> Self
    where
        F: FnOnce(Router<S>) -> Router<S>,
    {
        let router = routes(Router::new());
        self.versions.push((version, router, None));
        self
    }

    pub fn add_version_deprecated<F>(
        mut self,
        version: ApiVersion,
        routes: F,
        deprecation: DeprecationInfo,
    ) -> Self
    where
        F: FnOnce(Router<S>) -> Router<S>,
    {
        let router = routes(Router::new());
        self.versions.push((version, router, Some(deprecation)));
        self
    }

    /// Mark an already registered version as deprecated
    pub fn deprecate_version(mut self, version: ApiVersion, deprecation: DeprecationInfo) -> Result<Self> {
        let entry = self
            .versions
            .iter_mut()
            .find(|(v, _, _)| *v == version)
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "API version {} must be added before it is deprecated",
                    version
                ))
            })?;
        entry.2 = Some(deprecation);
        Ok(self)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn has_version(&self, version: ApiVersion) -> bool {
        self.versions.iter().any(|(v, _, _)| *v == version)
    }

    /// Negotiation for the versions registered so far
    pub fn negotiation(&self, config: &VersioningConfig) -> Result<VersionNegotiation> {
        let supported = self.versions.iter().map(|(v, _, _)| *v).collect();
        let deprecated = self
            .versions
            .iter()
            .filter(|(_, _, deprecation)| deprecation.is_some())
            .map(|(v, _, _)| *v)
            .collect();
        VersionNegotiation::new(&self.base_path, supported, deprecated, config)
    }

    /// Nest every version under `{base}/v{n}`
    pub fn build(self) -> Router<S> {
        let mut router = Router::new();

        for (version, version_router, deprecation) in self.versions {
            let versioned = match deprecation {
                Some(deprecation) => {
                    with_deprecation(version_router, self.base_path.clone(), deprecation)
                }
                None => version_router,
            };

            let full_path = format!("{}/{}", self.base_path, version.as_path_segment());
            tracing::debug!(version = %version, path = %full_path, "Registered API version");
            router = router.nest(&full_path, versioned);
        }

        router
    }
}

/// Where a request's version came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    UrlSegment,
    Query,
    Header,
    Default,
}

/// Version negotiated for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedVersion {
    pub version: ApiVersion,
    pub source: VersionSource,
}

impl<S> FromRequestParts<S> for RequestedVersion
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestedVersion>()
            .copied()
            .ok_or_else(|| Error::internal("Version negotiation is not installed"))
    }
}

/// Outcome of negotiating an API request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub requested: RequestedVersion,
    /// New URI when the version was not in the path
    pub rewritten: Option<Uri>,
}

/// Middleware state for version negotiation
#[derive(Debug, Clone)]
pub struct VersionNegotiation {
    base_path: String,
    supported: Vec<ApiVersion>,
    deprecated: Vec<ApiVersion>,
    default_version: Option<ApiVersion>,
    query_parameter: String,
    header_name: HeaderName,
    report_api_versions: bool,
}

impl VersionNegotiation {
    pub fn new(
        base_path: &str,
        mut supported: Vec<ApiVersion>,
        mut deprecated: Vec<ApiVersion>,
        config: &VersioningConfig,
    ) -> Result<Self> {
        supported.sort();
        supported.dedup();
        deprecated.sort();
        deprecated.dedup();

        let default_version = ApiVersion::from_number(config.default_version)
            .filter(|v| supported.contains(v))
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "Default API version {} is not registered",
                    config.default_version
                ))
            })?;

        let header_name = HeaderName::from_bytes(config.header_name.as_bytes()).map_err(|e| {
            Error::invalid_argument(format!(
                "Invalid version header name '{}': {}",
                config.header_name, e
            ))
        })?;

        Ok(Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            supported,
            deprecated,
            default_version: config
                .assume_default_when_unspecified
                .then_some(default_version),
            query_parameter: config.query_parameter.clone(),
            header_name,
            report_api_versions: config.report_api_versions,
        })
    }

    pub fn supported(&self) -> &[ApiVersion] {
        &self.supported
    }

    /// Negotiate the version for a request
    ///
    /// Returns `Ok(None)` for paths outside the base path.
    pub fn negotiate(&self, uri: &Uri, headers: &HeaderMap) -> Result<Option<Negotiated>> {
        let Some(rest) = self.api_remainder(uri.path()) else {
            return Ok(None);
        };

        let first_segment = rest.trim_start_matches('/').split('/').next().unwrap_or_default();
        if is_version_segment(first_segment) {
            let version = self.accept(first_segment)?;
            return Ok(Some(Negotiated {
                requested: RequestedVersion {
                    version,
                    source: VersionSource::UrlSegment,
                },
                rewritten: None,
            }));
        }

        let requested = if let Some(raw) = self.query_candidate(uri) {
            RequestedVersion {
                version: self.accept(&raw)?,
                source: VersionSource::Query,
            }
        } else if let Some(raw) = self.header_candidate(headers) {
            RequestedVersion {
                version: self.accept(&raw)?,
                source: VersionSource::Header,
            }
        } else {
            let version = self.default_version.ok_or_else(|| {
                Error::invalid_argument("An API version is required, but was not specified")
            })?;
            RequestedVersion {
                version,
                source: VersionSource::Default,
            }
        };

        let path = format!(
            "{}/{}{}",
            self.base_path,
            requested.version.as_path_segment(),
            rest
        );
        Ok(Some(Negotiated {
            requested,
            rewritten: Some(rewrite_path(uri, &path)?),
        }))
    }

    /// Middleware function for axum
    ///
    /// Wrap the router with `from_fn_with_state(negotiation, VersionNegotiation::middleware)`.
    pub async fn middleware(
        State(negotiation): State<Self>,
        mut request: Request,
        next: Next,
    ) -> Response {
        let mut response = match negotiation.negotiate(request.uri(), request.headers()) {
            Ok(None) => return next.run(request).await,
            Ok(Some(negotiated)) => {
                if let Some(uri) = negotiated.rewritten {
                    tracing::debug!(
                        from = %request.uri(),
                        to = %uri,
                        version = %negotiated.requested.version,
                        "Routing unversioned request"
                    );
                    *request.uri_mut() = uri;
                }
                request.extensions_mut().insert(negotiated.requested);
                next.run(request).await
            }
            Err(e) => e.into_response(),
        };

        if negotiation.report_api_versions {
            negotiation.report(response.headers_mut());
        }
        response
    }

    fn report(&self, headers: &mut HeaderMap) {
        let list = |versions: &[ApiVersion]| {
            versions
                .iter()
                .map(ApiVersion::as_header_value)
                .collect::<Vec<_>>()
                .join(", ")
        };

        if let Ok(value) = HeaderValue::from_str(&list(&self.supported)) {
            headers.insert(SUPPORTED_VERSIONS_HEADER, value);
        }
        if !self.deprecated.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&list(&self.deprecated)) {
                headers.insert(DEPRECATED_VERSIONS_HEADER, value);
            }
        }
    }

    fn accept(&self, raw: &str) -> Result<ApiVersion> {
        ApiVersion::parse(raw)
            .filter(|version| self.supported.contains(version))
            .ok_or_else(|| Error::UnsupportedVersion(raw.to_string()))
    }

    fn api_remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.base_path.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    fn query_candidate(&self, uri: &Uri) -> Option<String> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
        params
            .get(&self.query_parameter)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn header_candidate(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.header_name)?
            .to_str()
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// `v` followed by a version number, e.g. `v2` or `v1.0`
fn is_version_segment(segment: &str) -> bool {
    let Some(number) = segment
        .strip_prefix('v')
        .or_else(|| segment.strip_prefix('V'))
    else {
        return false;
    };
    number.starts_with(|c: char| c.is_ascii_digit())
        && number.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn rewrite_path(uri: &Uri, path: &str) -> Result<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        path_and_query
            .parse::<PathAndQuery>()
            .map_err(|e| Error::internal(format!("Failed to rewrite request path: {}", e)))?,
    );
    Uri::from_parts(parts)
        .map_err(|e| Error::internal(format!("Failed to rewrite request URI: {}", e)))
}
