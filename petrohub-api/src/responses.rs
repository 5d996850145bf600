//! Response envelope and the outcome-to-HTTP mapper
//!
//! Business results travel as an [`Outcome`] and are turned into an
//! [`ApiResponse`] by the [`ResponseMapper`] extractor:
//!
//! - success → **200 OK** with the payload and the localized `Success` message
//! - failure → **400 Bad Request** with the failure's message (or the
//!   localized `Error` message) and its error list
//! - [`ResponseMapper::not_found`] → **404 Not Found**
//! - [`ResponseMapper::unauthorized`] → **401 Unauthorized**
//!
//! ```rust,ignore
//! async fn reserve(mapper: ResponseMapper, Json(req): Json<Reservation>) -> ApiReply<Receipt> {
//!     mapper.handle_result(inventory::reserve(req))
//! }
//! ```

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::localization::{keys, Locale, MessageCatalog, RequestLocale};
use crate::outcome::Outcome;

// ============================================================================
// Envelope
// ============================================================================

/// Body of every business response
///
/// `errors` is always present (possibly empty); `data` is omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T = ()> {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn success(message: String, data: Option<T>) -> Self {
        Self {
            success: true,
            message,
            errors: Vec::new(),
            data,
        }
    }

    fn failure(message: String, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message,
            errors,
            data: None,
        }
    }
}

/// Envelope paired with its status code
#[derive(Debug, Clone)]
#[must_use]
pub struct ApiReply<T = ()> {
    status: StatusCode,
    body: ApiResponse<T>,
}

impl<T> ApiReply<T> {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ApiResponse<T> {
        &self.body
    }

    pub fn into_body(self) -> ApiResponse<T> {
        self.body
    }
}

impl<T: Serialize> IntoResponse for ApiReply<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Mapper
// ============================================================================

/// Maps outcomes to HTTP responses in the request's locale
///
/// Extracted from any state that exposes the shared [`MessageCatalog`]. The
/// locale comes from the culture resolver; without one the catalog default
/// is used.
#[derive(Debug, Clone)]
pub struct ResponseMapper {
    catalog: Arc<MessageCatalog>,
    locale: Locale,
}

impl ResponseMapper {
    pub fn new(catalog: Arc<MessageCatalog>, locale: Locale) -> Self {
        Self { catalog, locale }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Localized message for `key` in the request locale
    pub fn localize(&self, key: &str) -> String {
        self.catalog.lookup(&self.locale, key)
    }

    /// 200 with the payload on success, 400 with the failure otherwise
    pub fn handle_result<T: Serialize>(&self, outcome: Outcome<T>) -> ApiReply<T> {
        match outcome {
            Outcome::Success(data) => ApiReply {
                status: StatusCode::OK,
                body: ApiResponse::success(self.localize(keys::SUCCESS), Some(data)),
            },
            Outcome::Failure(failure) => self.bad_request(failure.into_parts()),
        }
    }

    /// Same as [`handle_result`](Self::handle_result) without a `data` field
    pub fn handle_unit_result(&self, outcome: Outcome) -> ApiReply {
        match outcome {
            Outcome::Success(()) => ApiReply {
                status: StatusCode::OK,
                body: ApiResponse::success(self.localize(keys::SUCCESS), None),
            },
            Outcome::Failure(failure) => self.bad_request(failure.into_parts()),
        }
    }

    /// 404 with `message`, or the localized `NotFound` message
    pub fn not_found(&self, message: Option<String>) -> ApiReply {
        ApiReply {
            status: StatusCode::NOT_FOUND,
            body: ApiResponse::failure(
                message.unwrap_or_else(|| self.localize(keys::NOT_FOUND)),
                Vec::new(),
            ),
        }
    }

    /// 401 with `message`, or the localized `Unauthorized` message
    pub fn unauthorized(&self, message: Option<String>) -> ApiReply {
        ApiReply {
            status: StatusCode::UNAUTHORIZED,
            body: ApiResponse::failure(
                message.unwrap_or_else(|| self.localize(keys::UNAUTHORIZED)),
                Vec::new(),
            ),
        }
    }

    fn bad_request<T>(&self, (message, errors): (Option<String>, Vec<String>)) -> ApiReply<T> {
        ApiReply {
            status: StatusCode::BAD_REQUEST,
            body: ApiResponse::failure(
                message.unwrap_or_else(|| self.localize(keys::ERROR)),
                errors,
            ),
        }
    }
}

impl<S> FromRequestParts<S> for ResponseMapper
where
    Arc<MessageCatalog>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let catalog = Arc::<MessageCatalog>::from_ref(state);
        let locale = parts
            .extensions
            .get::<RequestLocale>()
            .map(|RequestLocale(locale)| locale.clone())
            .unwrap_or_else(|| catalog.default_locale().clone());
        Ok(Self::new(catalog, locale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::CultureResolver;
    use crate::outcome::Failure;
    use axum::{body::Body, http::Request, routing::get, Router};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pump {
        id: u32,
        grade: String,
    }

    fn catalog() -> Arc<MessageCatalog> {
        Arc::new(MessageCatalog::embedded(Locale::parse("en-US").unwrap()).unwrap())
    }

    fn mapper(tag: &str) -> ResponseMapper {
        ResponseMapper::new(catalog(), Locale::parse(tag).unwrap())
    }

    fn json_of<T: Serialize>(reply: &ApiReply<T>) -> Value {
        serde_json::to_value(reply.body()).unwrap()
    }

    #[test]
    fn test_success_with_data() {
        let pump = Pump {
            id: 7,
            grade: "diesel".to_string(),
        };
        let reply = mapper("en-US").handle_result(Outcome::success(pump));

        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(
            json_of(&reply),
            json!({
                "success": true,
                "message": "Operation completed successfully",
                "errors": [],
                "data": {"id": 7, "grade": "diesel"}
            })
        );
    }

    #[test]
    fn test_failure_with_message_and_errors() {
        let outcome: Outcome<Pump> = Outcome::Failure(
            Failure::new("Pump is offline").with_errors(["nozzle jammed", "no power"]),
        );
        let reply = mapper("en-US").handle_result(outcome);

        assert_eq!(reply.status(), StatusCode::BAD_REQUEST);
        let body = json_of(&reply);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Pump is offline");
        assert_eq!(body["errors"], json!(["nozzle jammed", "no power"]));
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_failure_without_message_uses_localized_error() {
        let failure = Failure::from_errors(["quantity required"]).unwrap();
        let reply = mapper("ar").handle_unit_result(Outcome::Failure(failure));

        assert_eq!(reply.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            reply.body().message,
            catalog().lookup(&Locale::parse("ar").unwrap(), keys::ERROR)
        );
        assert_eq!(reply.body().errors, vec!["quantity required".to_string()]);
    }

    #[test]
    fn test_unit_success_has_no_data_field() {
        let reply = mapper("hi").handle_unit_result(Outcome::ok());

        assert_eq!(reply.status(), StatusCode::OK);
        let body = json_of(&reply);
        assert_eq!(body["errors"], json!([]));
        assert!(body.get("data").is_none());
        assert_eq!(
            body["message"],
            catalog().lookup(&Locale::parse("hi").unwrap(), keys::SUCCESS)
        );
    }

    #[test]
    fn test_not_found_and_unauthorized() {
        let mapper = mapper("en-US");

        let reply = mapper.not_found(None);
        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
        assert!(!reply.body().success);
        assert_eq!(reply.body().message, mapper.localize(keys::NOT_FOUND));

        let reply = mapper.not_found(Some("Station 12 does not exist".to_string()));
        assert_eq!(reply.body().message, "Station 12 does not exist");

        let reply = mapper.unauthorized(None);
        assert_eq!(reply.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body().message, mapper.localize(keys::UNAUTHORIZED));
        assert!(reply.body().errors.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_uses_request_locale() {
        async fn handler(mapper: ResponseMapper) -> ApiReply {
            mapper.not_found(None)
        }

        let app = Router::new()
            .route("/", get(handler))
            .layer(axum::middleware::from_fn_with_state(
                CultureResolver::new(Locale::parse("en-US").unwrap()),
                CultureResolver::middleware,
            ))
            .with_state(catalog());

        for (tag, expected) in [("ar", "ar"), ("xx-INVALID", "en-US")] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/?culture={tag}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: ApiResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(
                body.message,
                catalog().lookup(&Locale::parse(expected).unwrap(), keys::NOT_FOUND)
            );
        }
    }

    #[tokio::test]
    async fn test_extractor_without_resolver_uses_default_locale() {
        async fn handler(mapper: ResponseMapper) -> String {
            mapper.locale().to_string()
        }

        let app = Router::new().route("/", get(handler)).with_state(catalog());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"en-US");
    }
}
