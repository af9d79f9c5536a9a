//! WebSocket transport server using Axum.
//!
//! Handles HTTP upgrade to WebSocket, frame decoding, outbound delivery,
//! and connection lifecycle signals to the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use relay_protocol::{Envelope, InboundEvent, ProtocolError};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelHandle, ChannelId};
use crate::error::TransportError;

/// Paths served by the transport itself.
const RESERVED_PATHS: &[&str] = &["/", "/health"];

const LANDING_PAGE: &str =
    "<h1>Remote Control Server is Running</h1><p>Connect via WebSocket</p>";

/// Trait implemented by the hub to receive connection events.
/// The transport calls these from many connection tasks concurrently, so
/// implementations should only enqueue.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// A decoded application event arrived on `channel`.
    fn on_event(&self, channel: &ChannelHandle, event: InboundEvent);

    /// The socket reported an error. The connection closes right after.
    fn on_error(&self, id: &ChannelId, reason: String);

    /// The connection closed. May be signalled more than once.
    fn on_disconnect(&self, id: &ChannelId);

    /// Extra fields for the `/health` response.
    fn health(&self) -> impl std::future::Future<Output = Value> + Send {
        async { Value::Null }
    }
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Path of the WebSocket endpoint
    pub ws_path: String,
    /// Allow cross-origin requests from any origin
    pub enable_cors: bool,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
    /// Log every inbound frame
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "0.0.0.0".into(),
            ws_path: "/ws".into(),
            enable_cors: false,
            max_connections: Some(256),
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: ConnectionHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    /// Open connection count (for health check and the connection limit)
    connection_count: AtomicUsize,
}

/// Accepts WebSocket connections and shuttles frames to and from the hub.
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
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        validate_ws_path(&config.ws_path)?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port)
            .parse()
            .map_err(|source| TransportError::InvalidAddress {
                address: format!("{}:{}", config.hostname, config.port),
                source,
            })?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let actual_port = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?
            .port();

        let ws_path = config.ws_path.clone();
        let enable_cors = config.enable_cors;
        let state = Arc::new(AppState {
            handler,
            config,
            connection_count: AtomicUsize::new(0),
        });

        let mut app = Router::new()
            .route("/", get(landing_handler))
            .route("/health", get(health_handler::<H>))
            .route(&ws_path, get(ws_upgrade_handler::<H>))
            .with_state(state.clone());
        if enable_cors {
            app = app.layer(CorsLayer::permissive());
        }

        info!(
            "Relay transport listening on ws://{}:{}{}",
            state.config.hostname, actual_port, ws_path
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
        info!("Relay transport stopped");
    }
}

/// Reject endpoint paths the router would refuse or that shadow a built-in route.
fn validate_ws_path(path: &str) -> Result<(), TransportError> {
    let invalid = |reason: &'static str| TransportError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if !path.starts_with('/') {
        return Err(invalid("must start with `/`"));
    }
    if RESERVED_PATHS.contains(&path) {
        return Err(invalid("already served by the transport"));
    }
    if path.contains(['{', '}']) {
        return Err(invalid("must not contain captures"));
    }
    if path.split('/').any(|segment| segment.starts_with([':', '*'])) {
        return Err(invalid("segments must not start with `:` or `*`"));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn landing_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn ws_upgrade_handler<H: ConnectionHandler>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    if let Some(max) = state.config.max_connections {
        let current = state.connection_count.load(Ordering::Relaxed);
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
    let mut body = json!({
        "status": "ok",
        "connections": state.connection_count.load(Ordering::Relaxed),
    });
    if let (Value::Object(body), Value::Object(extra)) = (&mut body, state.handler.health().await) {
        body.extend(extra);
    }
    Json(body)
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_ws_connection<H: ConnectionHandler>(socket: WebSocket, state: Arc<AppState<H>>) {
    let total = state.connection_count.fetch_add(1, Ordering::Relaxed) + 1;

    let (channel, mut outbox) = ChannelHandle::open();
    let id = channel.id().clone();
    info!("Client connected: {id} (total: {total})");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming WebSocket frame
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if state.config.verbose_logging {
                            debug!("Frame from {id}: {}", text.as_str());
                        }
                        match Envelope::parse(text.as_str()).and_then(InboundEvent::from_envelope) {
                            Ok(event) => state.handler.on_event(&channel, event),
                            Err(e @ ProtocolError::InvalidPayload { .. }) => {
                                warn!("Ignoring frame from {id}: {e}")
                            }
                            Err(e) => debug!("Ignoring frame from {id}: {e}"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client closed: {id}");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {id}: {e}");
                        state.handler.on_error(&id, e.to_string());
                        break;
                    }
                    _ => {}
                }
            }

            // Messages routed to this connection by the hub
            outbound = outbox.recv() => {
                let Some(envelope) = outbound else { break };
                match envelope.to_json() {
                    Ok(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                            error!("Failed to send `{}` to {id}: {e}", envelope.event);
                            break;
                        }
                    }
                    Err(e) => error!("Failed to encode `{}` for {id}: {e}", envelope.event),
                }
            }
        }
    }

    state.handler.on_disconnect(&id);
    let total = state.connection_count.fetch_sub(1, Ordering::Relaxed) - 1;
    info!(
        "Client disconnected: {id} after {:.1}s (total: {total})",
        channel.connected_at().elapsed().as_secs_f64()
    );
}
