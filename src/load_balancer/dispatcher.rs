//! Dispatcher: the single serialized scheduling decision point.
//!
//! # Algorithm (round-robin with failover)
//! ```text
//! n = backends.len()
//! for offset in 0..n:
//!     i = (cursor + offset) % n
//!     if backends[i] healthy:
//!         spawn backends[i].forward(ctx)
//!         cursor = (i + 1) % n
//!         return
//! respond 503, cursor unchanged
//! ```
//!
//! Only the decision is serialized. The forwarding call runs on its own task,
//! so a slow upstream never holds up the next request. The cursor has a single
//! owner (this struct, moved into the dispatcher task) and needs no lock.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::http::response;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::context::RequestContext;
use crate::load_balancer::in_flight::InFlight;
use crate::observability::metrics;

/// Round-robin-with-failover scheduler.
#[derive(Debug)]
pub struct Dispatcher {
    backends: Vec<Arc<dyn Backend>>,
    cursor: usize,
    in_flight: InFlight,
}

impl Dispatcher {
    pub fn new(backends: Vec<Arc<dyn Backend>>, in_flight: InFlight) -> Self {
        Self {
            backends,
            cursor: 0,
            in_flight,
        }
    }

    /// Position the next scan starts from.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Choose the backend for the next request.
    ///
    /// Returns the chosen index and advances the cursor past it, or returns
    /// `None` and leaves the cursor alone when every backend is unhealthy.
    pub fn select(&mut self) -> Option<usize> {
        let n = self.backends.len();
        for offset in 0..n {
            let index = (self.cursor + offset) % n;
            if self.backends[index].is_healthy() {
                self.cursor = (index + 1) % n;
                return Some(index);
            }
        }
        None
    }

    /// Decide for one request and hand it off. Never awaits backend I/O.
    pub fn dispatch(&mut self, ctx: RequestContext) {
        let Some(index) = self.select() else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                backend_count = self.backends.len(),
                "No healthy backends"
            );
            metrics::record_unavailable();
            ctx.respond(response::service_unavailable());
            return;
        };

        let backend = &self.backends[index];
        tracing::debug!(
            request_id = %ctx.request_id(),
            backend = %backend.address(),
            index,
            "Dispatching request"
        );
        metrics::record_dispatch(backend.address());

        let guard = self.in_flight.track();
        let work = backend.forward(ctx);
        tokio::spawn(async move {
            work.await;
            drop(guard);
        });
    }

    /// Consume the intake channel until it is closed or `stop` fires.
    ///
    /// On `stop` the intake is closed, already queued contexts are still
    /// dispatched, then the loop exits.
    pub async fn run(
        mut self,
        mut intake: mpsc::Receiver<RequestContext>,
        mut stop: broadcast::Receiver<()>,
    ) {
        tracing::info!(backends = self.backends.len(), "Dispatcher started");

        loop {
            tokio::select! {
                ctx = intake.recv() => match ctx {
                    Some(ctx) => self.dispatch(ctx),
                    None => break,
                },
                _ = stop.recv() => {
                    intake.close();
                    while let Some(ctx) = intake.recv().await {
                        self.dispatch(ctx);
                    }
                    break;
                }
            }
        }

        tracing::info!("Dispatcher stopped, intake closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct StubBackend {
        idx: usize,
        address: String,
        healthy: AtomicBool,
        order: Arc<Mutex<Vec<usize>>>,
    }

    impl Backend for StubBackend {
        fn address(&self) -> &str {
            &self.address
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }

        fn forward(&self, ctx: RequestContext) -> BoxFuture<'static, ()> {
            self.order.lock().unwrap().push(self.idx);
            async move { ctx.respond(Response::new(Body::from("OK"))) }.boxed()
        }
    }

    fn stubs(health: &[bool]) -> (Vec<Arc<StubBackend>>, Arc<Mutex<Vec<usize>>>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let backends = health
            .iter()
            .enumerate()
            .map(|(idx, healthy)| {
                Arc::new(StubBackend {
                    idx,
                    address: format!("stub-{}", idx),
                    healthy: AtomicBool::new(*healthy),
                    order: order.clone(),
                })
            })
            .collect();
        (backends, order)
    }

    fn dispatcher(backends: &[Arc<StubBackend>]) -> Dispatcher {
        let dyn_backends = backends
            .iter()
            .map(|b| b.clone() as Arc<dyn Backend>)
            .collect();
        Dispatcher::new(dyn_backends, InFlight::new())
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/test").body(Body::empty()).unwrap()
    }

    #[test]
    fn all_healthy_rotates_in_order() {
        let (backends, _) = stubs(&[true, true, true]);
        let mut d = dispatcher(&backends);

        let picks: Vec<_> = (0..7).map(|_| d.select().unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(d.cursor(), 1);
    }

    #[test]
    fn unhealthy_backend_skipped_once_per_cycle() {
        let (backends, _) = stubs(&[true, true, true, true]);
        backends[2].healthy.store(false, Ordering::SeqCst);
        let mut d = dispatcher(&backends);

        let picks: Vec<_> = (0..6).map(|_| d.select().unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 3, 0, 1, 3]);
    }

    #[test]
    fn failover_continues_after_chosen_backend() {
        let (backends, _) = stubs(&[true, false, true]);
        let mut d = dispatcher(&backends);

        assert_eq!(d.select(), Some(0));
        assert_eq!(d.select(), Some(2));
        assert_eq!(d.cursor(), 0);
        assert_eq!(d.select(), Some(0));

        backends[1].healthy.store(true, Ordering::SeqCst);
        assert_eq!(d.select(), Some(1));
    }

    #[test]
    fn all_unhealthy_leaves_cursor() {
        let (backends, _) = stubs(&[true, false, false]);
        let mut d = dispatcher(&backends);
        assert_eq!(d.select(), Some(0));
        assert_eq!(d.cursor(), 1);

        backends[0].healthy.store(false, Ordering::SeqCst);
        assert_eq!(d.select(), None);
        assert_eq!(d.select(), None);
        assert_eq!(d.cursor(), 1);
    }

    #[test]
    fn empty_backend_list_selects_nothing() {
        let mut d = Dispatcher::new(Vec::new(), InFlight::new());
        assert_eq!(d.select(), None);
    }

    #[tokio::test]
    async fn dispatch_forwards_to_healthy_backends() {
        let (backends, order) = stubs(&[true, false, true]);
        let mut d = dispatcher(&backends);

        for _ in 0..3 {
            let (ctx, slot) = RequestContext::new(request());
            d.dispatch(ctx);
            assert_eq!(slot.await.unwrap().status(), StatusCode::OK);
        }
        backends[1].healthy.store(true, Ordering::SeqCst);
        let (ctx, slot) = RequestContext::new(request());
        d.dispatch(ctx);
        slot.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec![0, 2, 0, 1]);
    }

    #[tokio::test]
    async fn dispatch_answers_503_without_forwarding() {
        let (backends, order) = stubs(&[false, false]);
        let in_flight = InFlight::new();
        let dyn_backends = backends
            .iter()
            .map(|b| b.clone() as Arc<dyn Backend>)
            .collect();
        let mut d = Dispatcher::new(dyn_backends, in_flight.clone());

        let (ctx, slot) = RequestContext::new(request());
        d.dispatch(ctx);

        let response = slot.await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(order.lock().unwrap().is_empty());
        assert_eq!(in_flight.active_count(), 0);
    }

    #[tokio::test]
    async fn run_drains_queue_on_stop() {
        let (backends, order) = stubs(&[true, true]);
        let d = dispatcher(&backends);
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = broadcast::channel(1);

        let mut slots = Vec::new();
        for _ in 0..3 {
            let (ctx, slot) = RequestContext::new(request());
            tx.send(ctx).await.unwrap();
            slots.push(slot);
        }
        stop_tx.send(()).unwrap();

        d.run(rx, stop_rx).await;

        for slot in slots {
            assert_eq!(slot.await.unwrap().status(), StatusCode::OK);
        }
        assert_eq!(order.lock().unwrap().len(), 3);
        assert!(tx.send(RequestContext::new(request()).0).await.is_err());
    }
}
