//! Request handling and transformation.
//!
//! # Responsibilities
//! - Assign a request ID (UUID v4) unless the client sent one
//! - Prepare the upstream copy of an inbound request
//!
//! # Design Decisions
//! - Method, path, query and every header value are kept as-is
//! - `Host` is dropped so the client derives it from the backend address
//! - The body is moved, not buffered

use axum::body::Body;
use axum::http::{header, HeaderName, Request, Uri};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns `x-request-id` to requests missing one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Build the request sent to the backend at `base` (e.g. `http://10.0.0.1:8080`).
pub fn upstream_request(base: &str, request: Request<Body>) -> Result<Request<Body>, axum::http::Error> {
    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = Uri::try_from(format!("{}{}", base, path_and_query))?;

    let mut builder = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if name == header::HOST {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
    }

    builder.body(body)
}
