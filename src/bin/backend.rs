//! Demo upstream for manual testing.
//!
//! - `GET /health` → 200 `{"status":"healthy"}` (other methods → 405)
//! - anything else → 200 `Hello, "<path>"`

use std::net::SocketAddr;

use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use clap::Parser;
use serde_json::json;

use failover_lb::lifecycle::signals::shutdown_signal;
use failover_lb::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "backend", about = "Demo upstream with a /health endpoint")]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "BACKEND_PORT", default_value_t = 8081)]
    port: u16,
}

fn app() -> Router {
    Router::new()
        .route("/health", any(health))
        .fallback(hello)
}

// Checked here rather than with `get`, which would also answer HEAD.
async fn health(method: Method) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    Json(json!({ "status": "healthy" })).into_response()
}

async fn hello(uri: Uri) -> String {
    tracing::debug!(path = %uri.path(), "Request received");
    format!("Hello, {}", quote(&escape_html(uri.path())))
}

/// Double-quote `s`, escaping quotes, backslashes and non-printable
/// characters as `\xNN`, `\uNNNN` or `\UNNNNNNNN`.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            ' ' => out.push(' '),
            c if c.is_control() || c.is_whitespace() => {
                let code = c as u32;
                if code < 0x80 {
                    out.push_str(&format!("\\x{:02x}", code));
                } else if code < 0x10000 {
                    out.push_str(&format!("\\u{:04x}", code));
                } else {
                    out.push_str(&format!("\\U{:08x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            _ => out.push(c),
        }
    }
    out
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    logging::init("info");

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Backend listening");

    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown_signal())
        .await
}
