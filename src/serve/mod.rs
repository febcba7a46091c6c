//! Development HTTP server.
//!
//! Serves the output directory as static files, injects the live-reload
//! client into HTML responses, and streams [`ReloadEvent`]s to browsers
//! over Server-Sent Events. The server runs on its own thread with a
//! private tokio runtime so the rest of the tool stays synchronous.

mod livereload;

pub use livereload::{LiveReload, ReloadEvent};

use std::convert::Infallible;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread::JoinHandle;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::oneshot;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{Result, SiteError};

/// SSE endpoint the client script connects to.
pub const EVENTS_PATH: &str = "/__sitekit/events";

/// Route serving the client script.
pub const CLIENT_PATH: &str = "/__sitekit/client.js";

const CLIENT_JS: &str = include_str!("client.js");

/// HTML larger than this is passed through without injection.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

/// Tag inserted into every served HTML page.
pub fn client_tag() -> String {
    format!("<script src=\"{}\"></script>", CLIENT_PATH)
}

/// Insert the client tag before the last `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = client_tag();
    match html.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(&tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Router for the dev server, exposed for in-process testing.
pub fn router(root: PathBuf, reload: LiveReload) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(events))
        .route(CLIENT_PATH, get(client_script))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject_into_html))
        .layer(TraceLayer::new_for_http())
        .with_state(reload)
}

async fn events(
    State(reload): State<LiveReload>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::debug!("live reload session connected");

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(reload.subscribe()).filter_map(|message| {
        message.ok().map(|event| {
            Ok::<_, Infallible>(Event::default().event(event.name()).data(event.data()))
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS)
}

async fn inject_into_html(request: Request, next: Next) -> Response {
    let is_get = request.method() == Method::GET;
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));
    if !is_get || !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "could not buffer HTML for injection");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// A running dev server. Dropping the handle stops it.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address actually bound (resolves port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop serving and wait for the server thread.
    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

fn server_error(message: String) -> SiteError {
    SiteError::Server {
        message,
        help: None,
    }
}

/// Bind `host:port` and serve `root` until the handle is dropped.
///
/// Binding happens before this returns, so an occupied port is reported
/// to the caller rather than logged from the server thread.
pub fn start(root: PathBuf, host: &str, port: u16, reload: LiveReload) -> Result<ServerHandle> {
    let listener = std::net::TcpListener::bind((host, port)).map_err(|e| SiteError::Server {
        message: format!("Failed to bind {}:{}: {}", host, port, e),
        help: Some("Set server.port in sitekit.yaml to a free port".to_string()),
    })?;
    listener
        .set_nonblocking(true)
        .map_err(|e| server_error(format!("Failed to configure listener: {}", e)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| server_error(format!("Failed to read bound address: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("sitekit-http")
        .enable_all()
        .build()
        .map_err(|e| server_error(format!("Failed to start server runtime: {}", e)))?;

    let app = router(root, reload);
    let (shutdown, stopped) = oneshot::channel::<()>();

    let thread = std::thread::Builder::new()
        .name("sitekit-server".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(error = %e, "dev server listener rejected");
                        return;
                    }
                };

                // Open SSE streams never finish, so stop without draining them
                tokio::select! {
                    result = axum::serve(listener, app).into_future() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "dev server stopped");
                        }
                    }
                    _ = stopped => {}
                }
            });
            runtime.shutdown_background();
        })
        .map_err(|e| server_error(format!("Failed to spawn server thread: {}", e)))?;

    tracing::info!(%addr, "dev server listening");

    Ok(ServerHandle {
        addr,
        shutdown: Some(shutdown),
        thread: Some(thread),
    })
}
