//! HTTP-forwarding backend.
//!
//! # Responsibilities
//! - Forward a request to one upstream with a bounded timeout that covers
//!   the response body as well as the headers
//! - Turn every failure into a `500` so the caller always gets a response
//! - Own the upstream's HTTP client and health flag (shared with its monitor)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::BoxError;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::health::state::HealthFlag;
use crate::http::{request, response};
use crate::load_balancer::backend::Backend;
use crate::load_balancer::context::RequestContext;
use crate::observability::metrics;

/// Client type shared by forwarding and health probing.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build a plain-HTTP client.
pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Errors raised while forwarding one request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream request could not be built.
    #[error("{0}")]
    Request(#[from] axum::http::Error),

    /// Connecting to or talking to the upstream failed.
    #[error("{}", error_chain(.0))]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream did not answer in time.
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Render an error with its sources, `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A backend reached over HTTP.
#[derive(Debug)]
pub struct HttpBackend {
    /// Normalized base URL without trailing slash, e.g. `http://127.0.0.1:8081`.
    address: Arc<str>,
    client: HttpClient,
    health: Arc<HealthFlag>,
    forward_timeout: Duration,
}

impl HttpBackend {
    /// Create a backend with its own client. Health starts optimistic.
    pub fn new(address: &str, forward_timeout: Duration) -> Self {
        Self {
            address: Arc::from(address.trim_end_matches('/')),
            client: build_client(),
            health: Arc::new(HealthFlag::new()),
            forward_timeout,
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn health(&self) -> &HealthFlag {
        &self.health
    }
}

impl Backend for HttpBackend {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    fn forward(&self, ctx: RequestContext) -> BoxFuture<'static, ()> {
        let client = self.client.clone();
        let address = self.address.clone();
        let timeout = self.forward_timeout;

        async move {
            let (request, responder) = ctx.into_parts();
            let start_time = Instant::now();
            let deadline = time::Instant::now() + timeout;

            let response = match send(&client, &address, request, deadline, timeout).await {
                Ok(upstream) => {
                    tracing::debug!(
                        request_id = %responder.request_id(),
                        backend = %address,
                        status = %upstream.status(),
                        elapsed = ?start_time.elapsed(),
                        "Upstream responded"
                    );
                    let address = address.clone();
                    upstream.map(|body| deadline_body(body, address, deadline, timeout))
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %responder.request_id(),
                        backend = %address,
                        error = %e,
                        "Forwarding failed"
                    );
                    metrics::record_forward_error(&address);
                    response::internal_error(e)
                }
            };

            responder.send(response);
        }
        .boxed()
    }
}

async fn send(
    client: &HttpClient,
    address: &str,
    request: axum::http::Request<Body>,
    deadline: time::Instant,
    timeout: Duration,
) -> Result<hyper::Response<Incoming>, ForwardError> {
    let upstream = request::upstream_request(address, request)?;
    match time::timeout_at(deadline, client.request(upstream)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ForwardError::Timeout(timeout)),
    }
}

/// Stream an upstream body to the client, failing it once `deadline` passes.
///
/// The status line has already gone out by then, so the client sees a
/// truncated body rather than a `500`. Trailers are not forwarded.
fn deadline_body(
    body: Incoming,
    address: Arc<str>,
    deadline: time::Instant,
    timeout: Duration,
) -> Body {
    let chunks = Body::new(body).into_data_stream();
    Body::from_stream(stream::unfold(Some(chunks), move |state| {
        let address = address.clone();
        async move {
            let mut chunks = state?;
            match time::timeout_at(deadline, chunks.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok::<Bytes, BoxError>(chunk), Some(chunks))),
                Ok(Some(Err(e))) => Some((Err(e.into()), None)),
                Ok(None) => None,
                Err(_) => {
                    tracing::warn!(backend = %address, timeout = ?timeout, "Upstream body exceeded forward timeout");
                    metrics::record_forward_error(&address);
                    Some((Err(ForwardError::Timeout(timeout).into()), None))
                }
            }
        }
    }))
}
