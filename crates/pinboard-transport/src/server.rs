//! WebSocket transport server using Axum.
//!
//! Handles HTTP upgrade to WebSocket, heartbeat pings, and frame
//! routing between clients and the board server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tower_http::cors::CorsLayer;

/// Errors from bringing the transport up.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Trait implemented by the board server to receive connection events.
/// The transport calls this for every client lifecycle step; everything
/// above the socket (room membership, parsing, persistence) lives
/// behind it.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// A client connected. Frames pushed into `tx` are delivered to
    /// this client's socket; the transport drains the channel until the
    /// connection closes.
    fn on_connect(&self, client_id: &str, tx: mpsc::Sender<String>);

    /// A text frame arrived from the client.
    fn on_message(
        &self,
        client_id: &str,
        text: &str,
    ) -> impl std::future::Future<Output = ()> + Send;

    /// The client's socket closed.
    fn on_disconnect(&self, client_id: &str);
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Mount point for the `ws` and `health` routes
    pub base_path: String,
    /// Enable permissive CORS on the HTTP routes
    pub enable_cors: bool,
    /// Maximum concurrent connections (`None` for unlimited)
    pub max_connections: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "127.0.0.1".into(),
            base_path: "/".into(),
            enable_cors: false,
            max_connections: None,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: ConnectionHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    /// Connected client count (for health check)
    client_count: Arc<std::sync::atomic::AtomicUsize>,
}

/// The transport server — accepts WebSocket connections and shuttles
/// frames between sockets and the connection handler.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start the transport server with the given connection handler.
    pub async fn start<H: ConnectionHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, TransportError> {
        Self::start_shared(config, Arc::new(handler)).await
    }

    /// Start the transport server with a shared handler. Accepts
    /// `Arc<H>` so the handler can also be driven from outside the
    /// transport (e.g. a seeding step at boot).
    pub async fn start_shared<H: ConnectionHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let client_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let state = Arc::new(AppState {
            handler,
            config: config.clone(),
            client_count: client_count.clone(),
        });

        let app = Router::new()
            .route(&join_path(&config.base_path, "ws"), get(ws_upgrade_handler::<H>))
            .route(&join_path(&config.base_path, "health"), get(health_handler::<H>))
            .with_state(state);
        let app = if config.enable_cors {
            app.layer(CorsLayer::permissive())
        } else {
            app
        };

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!(
            "pinboard transport listening on ws://{}:{}{}",
            config.hostname,
            actual_port,
            join_path(&config.base_path, "ws"),
        );

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("pinboard transport server stopped");
    }
}

/// Joins the configured base path with a route suffix, normalizing
/// slashes so Axum always sees an absolute route.
fn join_path(base: &str, suffix: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        format!("/{suffix}")
    } else {
        format!("/{base}/{suffix}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler<H: ConnectionHandler>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    // Check connection limit
    if let Some(max) = state.config.max_connections {
        let current = state.client_count.load(std::sync::atomic::Ordering::Relaxed);
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
        .into_response()
}

async fn health_handler<H: ConnectionHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(std::sync::atomic::Ordering::Relaxed),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection<H: ConnectionHandler>(socket: WebSocket, state: Arc<AppState<H>>) {
    state.client_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let client_id = uuid::Uuid::new_v4().to_string();
    info!("Client connected: {client_id}");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Outbound frames for this client flow through the handler-side
    // sender registered here.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(256);
    state.handler.on_connect(&client_id, outbound_tx);

    loop {
        tokio::select! {
            // Incoming WebSocket message
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        state.handler.on_message(&client_id, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client disconnected: {client_id}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {client_id}: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            // Outbound frames queued for this client
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                            error!("Failed to send to {client_id}: {e}");
                            break;
                        }
                    }
                    // Handler dropped our sender: close the socket.
                    None => break,
                }
            }
        }
    }

    state.handler.on_disconnect(&client_id);

    state.client_count.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    info!(
        "Client disconnected: {client_id} (total: {})",
        state.client_count.load(std::sync::atomic::Ordering::Relaxed)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_normalizes_slashes() {
        assert_eq!(join_path("/", "ws"), "/ws");
        assert_eq!(join_path("", "ws"), "/ws");
        assert_eq!(join_path("/pinboard", "ws"), "/pinboard/ws");
        assert_eq!(join_path("pinboard/", "health"), "/pinboard/health");
        assert_eq!(join_path("/a/b/", "ws"), "/a/b/ws");
    }
}
