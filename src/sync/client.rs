use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::settings::{SettingsPatch, SettingsStore};
use crate::sync::protocol::SyncMessage;

/// Liveness of the channel to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Bounded reconnection: a fixed delay between attempts and a hard attempt
/// count, no wall-clock timeout. Defaults mirror the original deployment
/// (5 attempts, 1s apart).
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Give up after the first failed attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Handle a [`SettingsStore`] uses to push update events onto the channel.
#[derive(Clone)]
pub struct SyncHandle {
    outbound: mpsc::UnboundedSender<SettingsPatch>,
    state: watch::Receiver<ChannelState>,
}

impl SyncHandle {
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Fire-and-forget emit. Returns false when the channel is offline; the
    /// patch is then dropped from the sync perspective.
    pub(crate) fn emit(&self, patch: SettingsPatch) -> bool {
        self.is_connected() && self.outbound.send(patch).is_ok()
    }
}

/// Persistent bidirectional link between one client session and the relay.
///
/// Owns a background task that connects to the endpoint, forwards local
/// update events, and applies every received fan-out event to the attached
/// store in transport order.
pub struct ChannelClient {
    handle: SyncHandle,
    task: JoinHandle<()>,
}

impl ChannelClient {
    /// Spawn the connection task and attach the store. The first connection
    /// attempt starts immediately and follows the same bounded retry loop
    /// as reconnection after a drop.
    pub fn connect(url: &str, policy: ReconnectPolicy, store: SettingsStore) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| anyhow!("invalid ws url: {e}"))?;
        let (outbound, out_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);

        let handle = SyncHandle {
            outbound,
            state: state_rx,
        };
        store.attach(handle.clone());

        let task = tokio::spawn(run(url, policy, store, out_rx, state_tx));
        Ok(Self { handle, task })
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ChannelState {
        self.handle.state()
    }

    /// Wait until the channel settles: resolves `Connected` after a
    /// successful handshake, or `Disconnected` once the retry budget is
    /// exhausted.
    pub async fn wait_settled(&self) -> ChannelState {
        let mut rx = self.handle.state.clone();
        loop {
            let state = *rx.borrow_and_update();
            if matches!(state, ChannelState::Connected | ChannelState::Disconnected) {
                return state;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// Tear the channel down. In-flight connection attempts are abandoned
    /// without callback.
    pub fn close(self) {
        self.task.abort();
    }
}

async fn run(
    url: Url,
    policy: ReconnectPolicy,
    store: SettingsStore,
    mut out_rx: mpsc::UnboundedReceiver<SettingsPatch>,
    state_tx: watch::Sender<ChannelState>,
) {
    let mut attempts = 0u32;
    loop {
        let _ = state_tx.send(ChannelState::Connecting);
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                attempts = 0;
                let _ = state_tx.send(ChannelState::Connected);
                tracing::info!(%url, "channel connected");
                let (ws_tx, ws_rx) = ws.split();
                if !session(ws_tx, ws_rx, &store, &mut out_rx).await {
                    // Store side dropped, session is over.
                    let _ = state_tx.send(ChannelState::Disconnected);
                    return;
                }
                tracing::warn!("channel lost");
            }
            Err(err) => {
                tracing::warn!(%err, attempt = attempts + 1, "connection attempt failed");
            }
        }

        attempts += 1;
        if attempts >= policy.max_attempts {
            let _ = state_tx.send(ChannelState::Disconnected);
            tracing::warn!(
                attempts,
                "retry budget exhausted, updates will stay local-only"
            );
            return;
        }
        let _ = state_tx.send(ChannelState::Reconnecting);
        tokio::time::sleep(policy.delay).await;
    }
}

/// Bridge one live socket. Returns true when the socket dropped (caller may
/// reconnect) and false when the outbound side was closed for good.
async fn session(
    mut ws_tx: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
    mut ws_rx: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    store: &SettingsStore,
    out_rx: &mut mpsc::UnboundedReceiver<SettingsPatch>,
) -> bool {
    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(patch) = outbound else { return false };
                let msg = SyncMessage::UpdateSettings(patch);
                match serde_json::to_string(&msg) {
                    Ok(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            return true;
                        }
                    }
                    Err(err) => tracing::error!(%err, "failed to encode update event"),
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let text: String = text.to_string();
                        match serde_json::from_str::<SyncMessage>(&text) {
                            Ok(SyncMessage::SettingsUpdate(patch)) => store.apply_remote(&patch),
                            Ok(other) => tracing::debug!(?other, "unexpected event from relay"),
                            Err(err) => tracing::debug!(%err, "ignoring malformed frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return true,
                    Some(Ok(_)) => {} // ping/pong/binary: transport-level, ignored
                    Some(Err(_)) => return true,
                }
            }
        }
    }
}
