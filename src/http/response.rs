//! Response construction.
//!
//! # Responsibilities
//! - Synthesize the locally generated error responses
//!
//! # Contract
//! - No backend available: `503` with body `Service Unavailable`
//! - Forwarding failed: `500` with body `Internal Server Error: <error>`

use std::fmt::Display;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

pub const SERVICE_UNAVAILABLE_BODY: &str = "Service Unavailable";
pub const INTERNAL_ERROR_PREFIX: &str = "Internal Server Error: ";

fn plain_text(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// All candidate backends were unhealthy (or intake is closed).
pub fn service_unavailable() -> Response {
    plain_text(
        StatusCode::SERVICE_UNAVAILABLE,
        SERVICE_UNAVAILABLE_BODY.to_string(),
    )
}

/// Building or executing the upstream call failed.
pub fn internal_error(err: impl Display) -> Response {
    plain_text(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("{}{}", INTERNAL_ERROR_PREFIX, err),
    )
}
