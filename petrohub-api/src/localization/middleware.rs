//! Culture resolution middleware
//!
//! Picks the request locale from, in order:
//!
//! 1. the `culture` query parameter, if non-empty
//! 2. the first `Accept-Language` entry, weight stripped, if non-empty
//! 3. the `culture` cookie, if non-empty
//!
//! A candidate that is not a valid locale is logged and replaced by the
//! default locale. The result is stored in the request extensions as a
//! [`RequestLocale`] and echoed in `Content-Language`.
//!
//! ```rust,ignore
//! let resolver = CultureResolver::new(Locale::parse("en-US")?);
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(resolver, CultureResolver::middleware));
//! ```

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use super::locale::Locale;
use crate::config::LocalizationConfig;
use crate::error::Error;

/// Locale resolved for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLocale(pub Locale);

impl RequestLocale {
    pub fn locale(&self) -> &Locale {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RequestLocale
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestLocale>()
            .cloned()
            .ok_or_else(|| Error::internal("Culture resolver is not installed"))
    }
}

/// Middleware state for culture resolution
#[derive(Debug, Clone)]
pub struct CultureResolver {
    default_locale: Locale,
    query_parameter: String,
    cookie_name: String,
}

impl CultureResolver {
    /// Resolver using the `culture` query parameter and cookie
    pub fn new(default_locale: Locale) -> Self {
        Self {
            default_locale,
            query_parameter: "culture".to_string(),
            cookie_name: "culture".to_string(),
        }
    }

    /// Resolver configured from the `localization` section
    pub fn from_config(config: &LocalizationConfig, default_locale: Locale) -> Self {
        Self {
            default_locale,
            query_parameter: config.query_parameter.clone(),
            cookie_name: config.cookie_name.clone(),
        }
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// The raw culture tag requested, if any source supplies one
    pub fn candidate(&self, uri: &Uri, headers: &HeaderMap) -> Option<String> {
        self.query_candidate(uri)
            .or_else(|| accept_language_candidate(headers))
            .or_else(|| self.cookie_candidate(headers))
    }

    /// Resolve the request locale; never fails
    pub fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> Locale {
        let Some(candidate) = self.candidate(uri, headers) else {
            return self.default_locale.clone();
        };

        match Locale::parse(&candidate) {
            Ok(locale) => {
                tracing::debug!(culture = %locale, "Culture set");
                locale
            }
            Err(e) => {
                tracing::warn!(
                    culture = %candidate,
                    error = %e,
                    fallback = %self.default_locale,
                    "Invalid culture specified"
                );
                self.default_locale.clone()
            }
        }
    }

    /// Middleware function for axum
    ///
    /// Use with `axum::middleware::from_fn_with_state`.
    pub async fn middleware(
        State(resolver): State<Self>,
        mut request: Request,
        next: Next,
    ) -> Response {
        let locale = resolver.resolve(request.uri(), request.headers());
        let content_language = HeaderValue::from_str(locale.as_str()).ok();
        request.extensions_mut().insert(RequestLocale(locale));

        let mut response = next.run(request).await;

        if let Some(value) = content_language {
            response
                .headers_mut()
                .entry(header::CONTENT_LANGUAGE)
                .or_insert(value);
        }
        response
    }

    fn query_candidate(&self, uri: &Uri) -> Option<String> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
        params
            .get(&self.query_parameter)
            .filter(|value| !value.is_empty())
            .cloned()
    }

    fn cookie_candidate(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }
}

fn accept_language_candidate(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
    let first = value.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    (!tag.is_empty()).then(|| tag.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn resolver() -> CultureResolver {
        CultureResolver::new(Locale::parse("en-US").unwrap())
    }

    fn request(uri: &str, headers: &[(&str, &str)]) -> (Uri, HeaderMap) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(
                header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        (uri.parse().unwrap(), map)
    }

    #[test]
    fn test_query_wins_over_header_and_cookie() {
        let (uri, headers) = request(
            "/health?culture=ar",
            &[("accept-language", "fr;q=0.9"), ("cookie", "culture=hi")],
        );
        assert_eq!(resolver().resolve(&uri, &headers).as_str(), "ar");
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let (uri, headers) = request(
            "/health",
            &[("accept-language", " hi-IN ;q=0.8, en"), ("cookie", "culture=ar")],
        );
        assert_eq!(resolver().resolve(&uri, &headers).as_str(), "hi-IN");
    }

    #[test]
    fn test_cookie_used_last() {
        let (uri, headers) = request("/health", &[("cookie", "session=abc; culture=ar-SA")]);
        assert_eq!(resolver().resolve(&uri, &headers).as_str(), "ar-SA");
    }

    #[test]
    fn test_empty_query_falls_through() {
        let (uri, headers) = request("/health?culture=", &[("accept-language", "hi")]);
        assert_eq!(resolver().resolve(&uri, &headers).as_str(), "hi");
    }

    #[test]
    fn test_invalid_culture_falls_back_to_default() {
        let (uri, headers) = request("/health", &[("accept-language", "xx-INVALID,en;q=0.8")]);
        assert_eq!(
            resolver().candidate(&uri, &headers).as_deref(),
            Some("xx-INVALID")
        );
        assert_eq!(resolver().resolve(&uri, &headers).as_str(), "en-US");
    }

    #[test]
    fn test_no_source_keeps_default() {
        let (uri, headers) = request("/health", &[]);
        assert!(resolver().candidate(&uri, &headers).is_none());
        assert_eq!(resolver().resolve(&uri, &headers), *resolver().default_locale());
    }

    #[test]
    fn test_percent_encoded_query() {
        let (uri, headers) = request("/health?culture=zh-Hant%2DTW", &[]);
        assert_eq!(resolver().resolve(&uri, &headers).as_str(), "zh-Hant-TW");
    }

    #[tokio::test]
    async fn test_middleware_sets_extension_and_header() {
        let app = Router::new()
            .route(
                "/",
                get(|RequestLocale(locale): RequestLocale| async move { locale.to_string() }),
            )
            .layer(axum::middleware::from_fn_with_state(
                resolver(),
                CultureResolver::middleware,
            ));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/?culture=ar")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::CONTENT_LANGUAGE], "ar");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ar");
    }

    #[tokio::test]
    async fn test_concurrent_requests_keep_their_own_locale() {
        let app = Router::new()
            .route(
                "/",
                get(|RequestLocale(locale): RequestLocale| async move {
                    tokio::task::yield_now().await;
                    locale.to_string()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                resolver(),
                CultureResolver::middleware,
            ));

        let tags = ["ar", "hi", "en-GB", "fr", "ar", "hi"];
        let calls = tags.iter().map(|tag| {
            let app = app.clone();
            async move {
                let response = app
                    .oneshot(
                        axum::http::Request::builder()
                            .uri(format!("/?culture={tag}"))
                            .body(Body::empty())
                            .unwrap(),
                    )
                    .await
                    .unwrap();
                let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                    .await
                    .unwrap();
                (tag.to_string(), String::from_utf8(body.to_vec()).unwrap())
            }
        });

        for (requested, served) in futures::future::join_all(calls).await {
            assert_eq!(requested, served);
        }
    }

    #[tokio::test]
    async fn test_missing_resolver_is_internal_error() {
        let app = Router::new().route(
            "/",
            get(|RequestLocale(locale): RequestLocale| async move { locale.to_string() }),
        );
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
