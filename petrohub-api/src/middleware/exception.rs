//! Global error boundary
//!
//! [`ExceptionBoundaryLayer`] wraps the pipeline below request-id assignment.
//! It turns every failure that escapes a later stage into an [`ErrorBody`]
//! and logs the full detail server-side:
//!
//! - handler errors rendered through `IntoResponse for Error`, which leave an
//!   [`ErrorReport`] in the response extensions;
//! - errors returned by inner tower services;
//! - panics anywhere below the boundary, caught by tower-http's
//!   [`CatchPanicLayer`] installed directly inside it.
//!
//! Clients only ever see the sanitized body.

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{HeaderName, Method, Request},
    response::{IntoResponse, Response},
    BoxError,
};
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tower_http::catch_panic::{CatchPanic, CatchPanicLayer};

use crate::error::{ErrorBody, ErrorClass};

/// Detail of an error already rendered into a response
///
/// Attached by `IntoResponse for Error`; removed by the boundary after logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    class: ErrorClass,
    detail: Arc<str>,
}

impl ErrorReport {
    pub fn new(class: ErrorClass, detail: impl Into<String>) -> Self {
        Self {
            class,
            detail: Arc::from(detail.into()),
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    /// Full error text; never sent to clients
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Outermost layer converting escaped failures into error bodies
#[derive(Debug, Clone)]
pub struct ExceptionBoundaryLayer {
    request_id_header: HeaderName,
}

impl ExceptionBoundaryLayer {
    /// Boundary that correlates log lines using the given request-id header
    pub fn new(request_id_header: HeaderName) -> Self {
        Self { request_id_header }
    }
}

impl Default for ExceptionBoundaryLayer {
    fn default() -> Self {
        Self::new(HeaderName::from_static("x-request-id"))
    }
}

/// Converts a caught panic into a 500 body carrying an [`ErrorReport`]
pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

impl<S> Layer<S> for ExceptionBoundaryLayer {
    type Service = ExceptionBoundary<CatchPanic<S, PanicHandler>>;

    fn layer(&self, inner: S) -> Self::Service {
        let catch_panic = CatchPanicLayer::custom(panic_response as PanicHandler);
        ExceptionBoundary {
            inner: catch_panic.layer(inner),
            request_id_header: self.request_id_header.clone(),
        }
    }
}

/// Service produced by [`ExceptionBoundaryLayer`]
#[derive(Debug, Clone)]
pub struct ExceptionBoundary<S> {
    inner: S,
    request_id_header: HeaderName,
}

struct RequestInfo {
    method: Method,
    path: String,
    request_id: Option<String>,
}

impl RequestInfo {
    fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("unknown")
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ExceptionBoundary<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: fmt::Display + Send,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness failures of the inner service are reported per request
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let header = self.request_id_header.clone();

        let mut info = RequestInfo {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            request_id: header_text(req.headers(), &header),
        };

        Box::pin(async move {
            let response = match inner.oneshot(req).await {
                Ok(mut response) => {
                    if let Some(id) = header_text(response.headers(), &header) {
                        info.request_id = Some(id);
                    }
                    if let Some(report) = response.extensions_mut().remove::<ErrorReport>() {
                        log_report(&info, &report);
                    }
                    response.map(Body::new)
                }
                Err(err) => {
                    tracing::error!(
                        method = %info.method,
                        path = %info.path,
                        request_id = %info.request_id(),
                        class = %ErrorClass::Other,
                        error = %err,
                        "Unhandled service error"
                    );
                    ErrorBody::internal().into_response()
                }
            };

            Ok(response)
        })
    }
}

fn header_text(headers: &axum::http::HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn log_report(info: &RequestInfo, report: &ErrorReport) {
    match report.class() {
        ErrorClass::Other => tracing::error!(
            method = %info.method,
            path = %info.path,
            request_id = %info.request_id(),
            class = %report.class(),
            error = %report.detail(),
            "Unhandled error"
        ),
        class => tracing::warn!(
            method = %info.method,
            path = %info.path,
            request_id = %info.request_id(),
            class = %class,
            error = %report.detail(),
            "Request rejected"
        ),
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    let mut response = ErrorBody::internal().into_response();
    response.extensions_mut().insert(ErrorReport::new(
        ErrorClass::Other,
        format!("handler panicked: {}", message),
    ));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, INTERNAL_ERROR_MESSAGE, UNAUTHORIZED_MESSAGE};
    use axum::{body::Body, routing::get, Router};
    use http::StatusCode;
    use serde_json::Value;

    async fn call(router: Router, uri: &str) -> (StatusCode, Value, Response) {
        let app = ExceptionBoundaryLayer::default().layer(router);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json, Response::from_parts(parts, Body::empty()))
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/argument",
                get(|| async { Err::<(), _>(Error::invalid_argument("id must be positive")) }),
            )
            .route(
                "/unauthorized",
                get(|| async { Err::<(), _>(Error::unauthorized("token expired")) }),
            )
            .route(
                "/internal",
                get(|| async { Err::<(), _>(Error::internal("pool exhausted on db-2")) }),
            )
            .route(
                "/panic",
                get(|| async {
                    if true {
                        panic!("invariant broken");
                    }
                    "unreachable"
                }),
            )
            .route("/ok", get(|| async { "fine" }))
    }

    #[tokio::test]
    async fn test_argument_error_is_400() {
        let (status, body, _) = call(router(), "/argument").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["type"], "Validation Error");
        assert_eq!(body["message"], "id must be positive");
    }

    #[tokio::test]
    async fn test_unauthorized_error_is_401() {
        let (status, body, _) = call(router(), "/unauthorized").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["type"], "Authorization Error");
        assert_eq!(body["message"], UNAUTHORIZED_MESSAGE);
    }

    #[tokio::test]
    async fn test_other_error_is_sanitized_500() {
        let (status, body, response) = call(router(), "/internal").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["type"], "Server Error");
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
        assert!(!body.to_string().contains("db-2"));
        assert!(response.extensions().get::<ErrorReport>().is_none());
    }

    #[tokio::test]
    async fn test_panic_is_sanitized_500() {
        let (status, body, response) = call(router(), "/panic").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["type"], "Server Error");
        assert_eq!(body["message"], INTERNAL_ERROR_MESSAGE);
        assert!(!body.to_string().contains("invariant"));
        assert!(response.extensions().get::<ErrorReport>().is_none());
    }

    #[tokio::test]
    async fn test_inner_service_error_is_500() {
        let failing = tower::service_fn(|_req: Request<Body>| async {
            Err::<Response, _>(std::io::Error::other("socket closed"))
        });
        let response = ExceptionBoundaryLayer::default()
            .layer(failing)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let (status, _, _) = call(router(), "/ok").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_panic_response_reports_payload() {
        let response = panic_response(Box::new("static"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.class(), ErrorClass::Other);
        assert_eq!(report.detail(), "handler panicked: static");

        let response = panic_response(Box::new(String::from("owned")));
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.detail(), "handler panicked: owned");

        let response = panic_response(Box::new(7_u8));
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.detail(), "handler panicked: non-string panic payload");
    }
}
