use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashmap::DashSet;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::sync::protocol::{SettingsBus, SyncMessage};

pub const DEFAULT_PORT: u16 = 3000;

/// Origins accepted at handshake time in the default deployment. Requests
/// that present no Origin header (same-process tooling, tests) are always
/// accepted.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] =
    &["http://localhost:8080", "http://localhost:5173"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RelayConfig {
    /// Read a JSON config file; missing keys fall back to the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Stateless fan-out hub. Holds the live connection set and the broadcast
/// bus, and nothing else: no settings snapshot is kept, so a freshly
/// connecting client starts from its own local defaults.
#[derive(Clone)]
pub struct Relay {
    bus: SettingsBus,
    peers: Arc<DashSet<Uuid>>,
    config: Arc<RelayConfig>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            bus: SettingsBus::new(),
            peers: Arc::new(DashSet::new()),
            config: Arc::new(config),
        }
    }

    /// Number of connections currently in the live set.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(|| async { "Habit Sync Relay" }))
            .route("/health", get(|| async { Json("OK") }))
            .route("/ws", get(ws_handler))
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured port and serve until shutdown. A port conflict is
    /// fatal: the error names the port and the process must not keep running
    /// half-started.
    pub async fn serve(&self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::AddrInUse {
                anyhow!(
                    "port {} is already in use, free it or pick another with --port",
                    self.config.port
                )
            } else {
                anyhow!(err).context(format!("failed to bind {addr}"))
            }
        })?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener (tests bind an ephemeral port).
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "relay listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.config.allowed_origins.iter().any(|a| a == origin)
    }
}

async fn ws_handler(
    State(relay): State<Relay>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| relay.origin_allowed(o))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(?origin, "handshake refused, origin not on allow-list");
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    ws.on_upgrade(move |socket| handle_ws(relay, socket))
}

async fn handle_ws(relay: Relay, socket: WebSocket) {
    let id = Uuid::new_v4();
    relay.peers.insert(id);
    tracing::info!(%id, peers = relay.peer_count(), "client connected");

    let (mut sender, mut receiver) = socket.split();

    // Forward every patch on the bus to this socket, our own included.
    let mut rx = relay.bus.subscribe();
    let mut send_task = tokio::spawn(async move {
        while let Ok(patch) = rx.recv().await {
            let msg = SyncMessage::SettingsUpdate((*patch).clone());
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Publish every update event received from this socket to the bus.
    let bus = relay.bus.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let text: String = text.to_string();
                    match serde_json::from_str::<SyncMessage>(&text) {
                        Ok(SyncMessage::UpdateSettings(patch)) => {
                            if patch.is_empty() {
                                continue;
                            }
                            tracing::debug!(?patch, "rebroadcasting settings update");
                            bus.publish(Arc::new(patch));
                        }
                        Ok(other) => tracing::debug!(?other, "unexpected event from client"),
                        Err(err) => tracing::debug!(%err, "ignoring malformed frame"),
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {} // ping/pong/binary: transport-level, ignored
                Err(_) => break,
            }
        }
    });

    // Either side ending tears the connection down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.peers.remove(&id);
    tracing::info!(%id, peers = relay.peer_count(), "client disconnected");
}
