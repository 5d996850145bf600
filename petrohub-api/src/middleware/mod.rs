//! Error boundary and request tracking middleware

pub mod exception;
pub mod request_tracking;

pub use exception::{ErrorReport, ExceptionBoundary, ExceptionBoundaryLayer};
pub use request_tracking::{
    request_id_header, request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    SENSITIVE_HEADERS,
};
