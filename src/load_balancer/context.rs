//! Request context: one inbound request plus its one-shot response slot.

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Receiving half of a request's response slot, held by `resolve`.
pub type ResponseSlot = oneshot::Receiver<Response>;

/// The unit of work passed from `resolve` to the dispatcher.
///
/// Sending consumes the context, so at most one response can ever be
/// delivered. Dropping the context without responding closes the slot and
/// the waiting caller observes the closure instead of hanging.
#[derive(Debug)]
pub struct RequestContext {
    request: Request<Body>,
    request_id: String,
    responder: oneshot::Sender<Response>,
}

impl RequestContext {
    /// Wrap a request with a fresh response slot. Requests arriving without
    /// an `x-request-id` get a new UUID for log correlation.
    pub fn new(request: Request<Body>) -> (Self, ResponseSlot) {
        let request_id = request
            .headers()
            .get(crate::http::X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let (responder, slot) = oneshot::channel();
        (
            Self {
                request,
                request_id,
                responder,
            },
            slot,
        )
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Split into the request and a responder that can only be used once.
    pub fn into_parts(self) -> (Request<Body>, Responder) {
        (
            self.request,
            Responder {
                request_id: self.request_id,
                tx: self.responder,
            },
        )
    }

    /// Deliver a response without forwarding the request.
    pub fn respond(self, response: Response) {
        self.into_parts().1.send(response);
    }
}

/// Sending half of a response slot.
#[derive(Debug)]
pub struct Responder {
    request_id: String,
    tx: oneshot::Sender<Response>,
}

impl Responder {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Deliver the response. A caller that already went away is not an error
    /// for the sender; the response is dropped.
    pub fn send(self, response: Response) {
        if self.tx.send(response).is_err() {
            tracing::debug!(request_id = %self.request_id, "Caller gone before response was delivered");
        }
    }
}
