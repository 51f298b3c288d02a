//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use failover_lb::config::LbConfig;
use failover_lb::lifecycle::Shutdown;
use failover_lb::{Backend, HttpServer, RequestContext};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Backend double that records the order in which the dispatcher picked it.
#[derive(Debug)]
pub struct StubBackend {
    pub idx: usize,
    address: String,
    healthy: AtomicBool,
    delay: Duration,
    order: Arc<Mutex<Vec<usize>>>,
}

impl StubBackend {
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Backend for StubBackend {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn forward(&self, ctx: RequestContext) -> BoxFuture<'static, ()> {
        // Recorded at decision time, on the dispatcher task.
        self.order.lock().unwrap().push(self.idx);
        let delay = self.delay;
        let body = format!("backend-{}", self.idx);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            ctx.respond(Response::new(Body::from(body)));
        }
        .boxed()
    }
}

/// Build stub backends with the given initial health.
pub fn stub_backends(health: &[bool], delay: Duration) -> (Vec<Arc<StubBackend>>, Arc<Mutex<Vec<usize>>>) {
    let order = Arc::new(Mutex::new(Vec::new()));
    let backends = health
        .iter()
        .enumerate()
        .map(|(idx, healthy)| {
            Arc::new(StubBackend {
                idx,
                address: format!("stub-{}", idx),
                healthy: AtomicBool::new(*healthy),
                delay,
                order: order.clone(),
            })
        })
        .collect();
    (backends, order)
}

pub fn as_dyn(backends: &[Arc<StubBackend>]) -> Vec<Arc<dyn Backend>> {
    backends
        .iter()
        .map(|b| b.clone() as Arc<dyn Backend>)
        .collect()
}

pub fn request(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Start a raw-TCP mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable raw-TCP mock backend.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response_str = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a raw-TCP backend that sends headers and part of the body, then stalls.
pub async fn start_stalling_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhello")
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    addr
}

/// An axum upstream that echoes the request it received as JSON and serves
/// `/health` according to a switch.
pub struct EchoBackend {
    pub addr: SocketAddr,
    pub healthy: Arc<AtomicBool>,
}

#[derive(Clone)]
struct EchoState {
    name: String,
    healthy: Arc<AtomicBool>,
    delay: Duration,
}

pub async fn start_echo_backend(name: &str) -> EchoBackend {
    start_echo_backend_with_delay(name, Duration::ZERO).await
}

pub async fn start_echo_backend_with_delay(name: &str, delay: Duration) -> EchoBackend {
    let healthy = Arc::new(AtomicBool::new(true));
    let state = EchoState {
        name: name.to_string(),
        healthy: healthy.clone(),
        delay,
    };
    let app = Router::new()
        .route("/health", get(echo_health))
        .fallback(echo)
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    EchoBackend { addr, healthy }
}

async fn echo_health(State(state): State<EchoState>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn echo(State(state): State<EchoState>, request: Request<Body>) -> impl IntoResponse {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    Json(json!({
        "backend": state.name,
        "method": parts.method.to_string(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Config pointing at `backends` with fast probes and a short grace period.
pub fn lb_config(backends: &[SocketAddr]) -> LbConfig {
    let mut config = LbConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backends = backends.iter().map(|a| a.to_string()).collect();
    config.health_check.interval_ms = 200;
    config.health_check.timeout_ms = 200;
    config.timeouts.shutdown_grace_secs = 2;
    config
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
    pub backends: Vec<Arc<dyn Backend>>,
}

/// Start the load balancer's HTTP server on an ephemeral port.
pub async fn start_proxy(config: LbConfig) -> RunningProxy {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config);
    let backends = server.load_balancer().backends().to_vec();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, server_shutdown));

    RunningProxy {
        addr,
        shutdown,
        handle,
        backends,
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
