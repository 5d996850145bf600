//! HTTP server with graceful shutdown
//!
//! Request pipeline, outermost first:
//!
//! request id → exception boundary (with panic catching) → sensitive
//! headers → trace → CORS → compression → timeout → body limit → culture
//! resolver → version negotiation → router → handler

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower::Layer;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    api,
    config::Config,
    error::Result,
    health,
    ids::request_id_from,
    localization::{CultureResolver, Locale},
    middleware::{
        exception::ExceptionBoundaryLayer,
        request_tracking::{
            request_id_header, request_id_layer, request_id_propagation_layer,
            sensitive_headers_layer,
        },
    },
    state::AppState,
    versioning::VersionNegotiation,
};

/// Assemble the full application: routes plus the middleware pipeline
pub fn build_router(state: AppState) -> Result<Router> {
    let config = state.config().clone();
    let default_locale = state.catalog().default_locale().clone();

    let api = api::versioned_api();
    let negotiation = api.negotiation(&config.versioning)?;
    let api_router: Router = api.build().with_state(state.clone());
    let versioned = middleware::from_fn_with_state(negotiation, VersionNegotiation::middleware)
        .layer(api_router);

    let router = Router::new()
        .route("/health", get(health::dependencies))
        .fallback_service(versioned)
        .with_state(state);

    Ok(apply_middleware(router, &config, default_locale))
}

/// Wrap a router in the request pipeline
fn apply_middleware(router: Router, config: &Config, default_locale: Locale) -> Router {
    let tracking = &config.middleware.request_tracking;
    let request_id_header = request_id_header(tracking);
    let resolver = CultureResolver::from_config(&config.localization, default_locale);

    // Each `layer` call wraps everything added before it
    let mut app = router
        .layer(middleware::from_fn_with_state(
            resolver,
            CultureResolver::middleware,
        ))
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.service.timeout(),
        ));

    if config.middleware.compression {
        app = app.layer(CompressionLayer::new());
    }

    if let Some(cors) = build_cors_layer(&config.middleware.cors_mode) {
        app = app.layer(cors);
    }

    app = app.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                let request_id = request_id_from(request.extensions());
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request_id.as_deref().unwrap_or("unknown"),
                )
            })
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    if tracking.mask_sensitive_headers {
        app = app.layer(sensitive_headers_layer());
    }

    // Request ids are assigned outside the boundary so its log lines and
    // error bodies carry them
    app = app.layer(ExceptionBoundaryLayer::new(request_id_header));

    if tracking.request_id_enabled {
        if tracking.propagate_headers {
            app = app.layer(request_id_propagation_layer(tracking));
        }
        app = app.layer(request_id_layer(tracking));
    }

    app
}

/// Build CORS layer based on configuration; `None` when disabled
fn build_cors_layer(mode: &str) -> Option<CorsLayer> {
    match mode {
        "permissive" => {
            tracing::debug!("Enabling permissive CORS");
            Some(CorsLayer::permissive())
        }
        "restrictive" => {
            tracing::debug!("Enabling restrictive CORS (default deny)");
            Some(CorsLayer::new())
        }
        "disabled" => {
            tracing::debug!("CORS disabled");
            None
        }
        _ => {
            tracing::warn!("Unknown CORS mode: {}, defaulting to permissive", mode);
            Some(CorsLayer::permissive())
        }
    }
}

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the server with the given router until SIGINT or SIGTERM
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }

    fn log_middleware_config(&self) {
        let middleware = &self.config.middleware;
        let tracking = &middleware.request_tracking;

        tracing::info!("Middleware configuration:");
        tracing::info!("  - Exception boundary and panic recovery: enabled");
        tracing::info!(
            "  - Request ID tracking: {} ({})",
            tracking.request_id_enabled,
            tracking.request_id_header
        );
        tracing::info!(
            "  - Sensitive header masking: {}",
            tracking.mask_sensitive_headers
        );
        tracing::info!("  - Request body limit: {} MB", middleware.body_limit_mb);
        tracing::info!("  - Compression: {}", middleware.compression);
        tracing::info!("  - CORS mode: {}", middleware.cors_mode);
        tracing::info!(
            "  - Request timeout: {} seconds",
            self.config.service.timeout_secs
        );
        tracing::info!(
            "  - Default culture: {}",
            self.config.localization.default_culture
        );
        tracing::info!(
            "  - Default API version: {}",
            self.config.versioning.default_version
        );
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::{keys, MessageCatalog};
    use crate::versioning::SUPPORTED_VERSIONS_HEADER;
    use axum::http::{header, HeaderMap};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let state = AppState::builder().build().await.unwrap();
        build_router(state).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (
            status,
            headers,
            serde_json::from_slice(&body).unwrap_or(Value::Null),
        )
    }

    async fn get(uri: &str, headers: &[(&str, &str)]) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        send(app().await, request.body(Body::empty()).unwrap()).await
    }

    fn message(tag: &str, key: &str) -> String {
        MessageCatalog::embedded(Locale::parse("en-US").unwrap())
            .unwrap()
            .lookup(&Locale::parse(tag).unwrap(), key)
    }

    #[test]
    fn test_server_creation() {
        let config = Config::default();
        let server = Server::new(config.clone());
        assert_eq!(server.config().service.port, config.service.port);
    }

    #[test]
    fn test_cors_modes() {
        assert!(build_cors_layer("permissive").is_some());
        assert!(build_cors_layer("restrictive").is_some());
        assert!(build_cors_layer("disabled").is_none());
        assert!(build_cors_layer("bogus").is_some());
    }

    #[tokio::test]
    async fn test_versioned_health() {
        let (status, headers, body) = get("/api/v1/health", &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Healthy");
        assert_eq!(body["environment"], "Production");
        assert_eq!(body["version"], "1.0.0");
        assert_eq!(headers[SUPPORTED_VERSIONS_HEADER], "1.0");
        assert_eq!(headers[header::CONTENT_LANGUAGE], "en-US");
        assert!(headers["x-request-id"]
            .to_str()
            .unwrap()
            .starts_with("req_"));
    }

    #[tokio::test]
    async fn test_unversioned_api_request_uses_negotiated_version() {
        for (uri, headers) in [
            ("/api/health", vec![]),
            ("/api/health?version=1", vec![]),
            ("/api/health", vec![("x-version", "1.0")]),
        ] {
            let (status, _, body) = get(uri, &headers).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["status"], "Healthy");
        }
    }

    #[tokio::test]
    async fn test_unsupported_version_is_validation_error() {
        for (uri, headers) in [
            ("/api/v2/health", vec![]),
            ("/api/health?version=abc", vec![]),
            ("/api/health", vec![("x-version", "3")]),
        ] {
            let (status, _, body) = get(uri, &headers).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["statusCode"], 400);
            assert_eq!(body["type"], "Validation Error");
        }
    }

    #[tokio::test]
    async fn test_culture_endpoint_precedence() {
        let (_, headers, body) = get(
            "/api/v1/health/culture?culture=hi",
            &[("accept-language", "ar"), ("cookie", "culture=en-US")],
        )
        .await;
        assert_eq!(body["currentCulture"], "hi");
        assert_eq!(body["currentUICulture"], "hi");
        assert_eq!(body["localizedMessage"], message("hi", keys::SUCCESS));
        assert_eq!(headers[header::CONTENT_LANGUAGE], "hi");

        let (_, _, body) = get(
            "/api/v1/health/culture",
            &[("accept-language", "ar-SA,en;q=0.5"), ("cookie", "culture=hi")],
        )
        .await;
        assert_eq!(body["currentCulture"], "ar-SA");
        assert_eq!(body["localizedMessage"], message("ar", keys::SUCCESS));

        let (_, _, body) = get("/api/v1/health/culture", &[("cookie", "culture=hi")]).await;
        assert_eq!(body["currentCulture"], "hi");
    }

    #[tokio::test]
    async fn test_invalid_culture_falls_back() {
        let (status, _, body) = get("/api/v1/health/culture?culture=xx-INVALID", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentCulture"], "en-US");
        assert_eq!(body["localizedMessage"], message("en-US", keys::SUCCESS));
    }

    #[tokio::test]
    async fn test_culture_outside_supported_list_is_still_resolved() {
        let mut config = Config::default();
        config.localization.supported_cultures = vec!["en-US".to_string()];
        let state = AppState::builder().config(config).build().await.unwrap();

        let (status, headers, body) = send(
            build_router(state).unwrap(),
            Request::builder()
                .uri("/api/v1/health/culture?culture=ar")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentCulture"], "ar");
        assert_eq!(body["localizedMessage"], message("ar", keys::SUCCESS));
        assert_eq!(headers[header::CONTENT_LANGUAGE], "ar");
    }

    #[tokio::test]
    async fn test_dependency_health() {
        let (status, headers, body) = get("/health", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Healthy");
        assert_eq!(body["checks"]["memory"]["status"], "Healthy");
        assert!(!headers.contains_key(SUPPORTED_VERSIONS_HEADER));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let (_, headers, _) = get("/health", &[("x-request-id", "req_from_gateway")]).await;
        assert_eq!(headers["x-request-id"], "req_from_gateway");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _, _) = get("/api/v1/stations", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_permissive_cors() {
        let (_, headers, _) = get("/health", &[("origin", "https://portal.example")]).await;
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_handler_panic_is_sanitized_500() {
        let router = Router::new().route(
            "/boom",
            axum::routing::get(|| async {
                if true {
                    panic!("tank sensor returned NaN");
                }
                "unreachable"
            }),
        );
        let app = apply_middleware(router, &Config::default(), Locale::parse("en-US").unwrap());

        let (status, headers, body) = send(
            app,
            Request::builder().uri("/boom").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(headers["x-request-id"]
            .to_str()
            .unwrap()
            .starts_with("req_"));
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["type"], "Server Error");
        assert_eq!(body["message"], "An internal server error occurred");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut config = Config::default();
        config.middleware.body_limit_mb = 1;
        let router = Router::new().route(
            "/upload",
            axum::routing::post(|body: axum::body::Bytes| async move { body.len().to_string() }),
        );
        let app = apply_middleware(router, &config, Locale::parse("en-US").unwrap());

        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(header::CONTENT_LENGTH, 2 * 1024 * 1024)
            .body(Body::from(vec![0u8; 2 * 1024 * 1024]))
            .unwrap();
        let (status, _, _) = send(app, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
