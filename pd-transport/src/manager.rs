//! Connection manager for the session channel.
//!
//! Owns the single active WebSocket channel to the backend, its state
//! machine, and the single pending reconnect timer. Inbound frames are
//! parsed into typed events and published on the event bus.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use pd_core::error::{PdError, PdResult};

use crate::endpoint::EndpointConfig;
use crate::events::{EventBus, TransportEvent};
use crate::protocol::{self, OutboundFrame};
use crate::session::SessionIdentity;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection state of the session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Attempting to establish the channel.
    Connecting,
    /// Channel open, join frame delivered, receiving events.
    Connected,
    /// Channel lost while an identity is set; a reconnect timer is pending.
    Reconnecting,
}

impl ConnectionState {
    /// The three-valued user-facing indicator.
    pub fn indicator(self) -> StatusIndicator {
        match self {
            Self::Connected => StatusIndicator::Connected,
            Self::Connecting | Self::Reconnecting => StatusIndicator::Connecting,
            Self::Disconnected => StatusIndicator::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// User-facing connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Connected,
    Connecting,
    Disconnected,
}

impl std::fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

struct Inner {
    /// Endpoint the next connect dials. Swapped by the join coordinator.
    endpoint: Mutex<EndpointConfig>,
    /// Identity of the current session. Cleared by explicit disconnect so
    /// no further automatic reconnection occurs.
    identity: Mutex<Option<SessionIdentity>>,
    bus: EventBus,
    state: Mutex<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    /// Write half of the active channel, present only while connected.
    writer: Mutex<Option<WsSink>>,
    /// Handle to the channel reader task.
    reader_task: Mutex<Option<JoinHandle<()>>>,
    /// Handle to the single pending reconnect timer.
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    /// Signals a pending reconnect timer to give up.
    disconnect_notify: Notify,
    reconnect_delay: Duration,
}

/// Manager for the single active session channel.
///
/// Cheap to clone; all clones share the same channel and state. At most
/// one live channel and one pending reconnect timer exist at any time:
/// starting a new connect always first tears down the previous one.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager dialing the given endpoint.
    pub fn new(endpoint: EndpointConfig, bus: EventBus, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                endpoint: Mutex::new(endpoint),
                identity: Mutex::new(None),
                bus,
                state: Mutex::new(ConnectionState::Disconnected),
                state_tx,
                writer: Mutex::new(None),
                reader_task: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                disconnect_notify: Notify::new(),
                reconnect_delay,
            }),
        }
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.lock().await
    }

    /// Get the three-valued user-facing status.
    pub async fn indicator(&self) -> StatusIndicator {
        self.state().await.indicator()
    }

    /// The event bus this manager publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// The endpoint the next connect will dial.
    pub async fn endpoint(&self) -> EndpointConfig {
        self.inner.endpoint.lock().await.clone()
    }

    /// Replace the endpoint for subsequent connects.
    pub async fn update_endpoint(&self, endpoint: EndpointConfig) {
        let mut current = self.inner.endpoint.lock().await;
        if current.resolved_url != endpoint.resolved_url {
            info!(
                "endpoint updated: {} -> {}",
                current.resolved_url, endpoint.resolved_url
            );
        }
        *current = endpoint;
    }

    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.inner.state.lock().await;
        if *state != new_state {
            info!("channel state: {} -> {}", *state, new_state);
            *state = new_state;
            let _ = self.inner.state_tx.send(new_state);
        }
    }

    /// Open the channel and join as the given identity.
    ///
    /// Tears down any previous channel and pending timer first, dials the
    /// endpoint, delivers the join frame, then publishes `Connected`. On
    /// failure the identity stays set and a reconnect attempt is
    /// scheduled, so an initial connect failure is not final.
    pub async fn connect(&self, identity: SessionIdentity) -> PdResult<()> {
        self.teardown().await;
        *self.inner.identity.lock().await = Some(identity.clone());
        self.set_state(ConnectionState::Connecting).await;

        let url = self.inner.endpoint.lock().await.resolved_url.clone();
        info!("connecting to {url} as {}", identity.user_id);

        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!("connect to {url} failed: {e}");
                self.set_state(ConnectionState::Disconnected).await;
                self.schedule_reconnect().await;
                return Err(PdError::Connect(e.to_string()));
            }
        };

        let (mut sink, source) = stream.split();
        let join = serde_json::to_string(&OutboundFrame::join(&identity))?;
        if let Err(e) = sink.send(Message::Text(join.into())).await {
            warn!("join frame delivery failed: {e}");
            self.set_state(ConnectionState::Disconnected).await;
            self.schedule_reconnect().await;
            return Err(PdError::Connect(e.to_string()));
        }

        *self.inner.writer.lock().await = Some(sink);
        self.set_state(ConnectionState::Connected).await;
        self.inner.bus.publish(&TransportEvent::Connected);
        self.spawn_reader(source).await;
        Ok(())
    }

    /// Close the channel and stop all automatic reconnection.
    ///
    /// Callable from any state and idempotent: when already disconnected
    /// this changes nothing and performs no side effects.
    pub async fn disconnect(&self) {
        *self.inner.identity.lock().await = None;
        self.teardown().await;

        let was_connected = self.state().await == ConnectionState::Connected;
        self.set_state(ConnectionState::Disconnected).await;
        if was_connected {
            self.inner.bus.publish(&TransportEvent::Disconnected);
        }
    }

    /// Send a frame over the channel.
    ///
    /// Fails unless connected; undelivered frames are never buffered, the
    /// application layer retries after reconnection.
    pub async fn send(&self, frame: OutboundFrame) -> PdResult<()> {
        if self.state().await != ConnectionState::Connected {
            return Err(PdError::NotConnected);
        }
        let text = serde_json::to_string(&frame)?;
        let mut writer = self.inner.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => sink
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| PdError::Channel(e.to_string())),
            None => Err(PdError::NotConnected),
        }
    }

    /// Send a chat message frame.
    pub async fn send_chat(&self, text: &str) -> PdResult<()> {
        self.send(OutboundFrame::message(text)).await
    }

    /// Cancel the pending reconnect timer, stop the reader, and close the
    /// channel if open.
    async fn teardown(&self) {
        self.inner.disconnect_notify.notify_waiters();
        if let Some(handle) = self.inner.reconnect_task.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.reader_task.lock().await.take() {
            handle.abort();
        }
        if let Some(mut sink) = self.inner.writer.lock().await.take() {
            let _ = sink.close().await;
        }
    }

    async fn spawn_reader(&self, mut source: WsSource) {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = protocol::parse_inbound(&text) {
                            manager.inner.bus.publish(&event);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("close frame received");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("channel read error: {e}");
                        break;
                    }
                }
            }
            manager.on_channel_closed().await;
        });
        *self.inner.reader_task.lock().await = Some(handle);
    }

    /// The channel closed from the backend side or errored.
    async fn on_channel_closed(&self) {
        *self.inner.writer.lock().await = None;
        let was_connected = self.state().await == ConnectionState::Connected;
        self.set_state(ConnectionState::Disconnected).await;
        if was_connected {
            self.inner.bus.publish(&TransportEvent::Disconnected);
        }
        self.schedule_reconnect().await;
    }

    /// Arm the single reconnect timer, replacing any previous one.
    ///
    /// Does nothing when no identity is set (explicit disconnect).
    async fn schedule_reconnect(&self) {
        if self.inner.identity.lock().await.is_none() {
            debug!("no identity set, not scheduling a reconnect");
            return;
        }

        let mut slot = self.inner.reconnect_task.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        self.set_state(ConnectionState::Reconnecting).await;

        let delay = self.inner.reconnect_delay;
        info!("reconnecting in {:.1}s", delay.as_secs_f64());

        let manager = self.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {}
                _ = manager.inner.disconnect_notify.notified() => {
                    debug!("reconnect cancelled");
                    return;
                }
            }

            // Drop our own handle so the fresh connect's teardown does not
            // abort the task performing it.
            manager.inner.reconnect_task.lock().await.take();

            let identity = manager.inner.identity.lock().await.clone();
            if let Some(identity) = identity {
                // Route the recursive connect through a boxed-future helper
                // so its opaque type is erased outside its defining scope,
                // breaking the connect <-> schedule_reconnect inference cycle.
                if let Err(e) = connect_boxed(manager.clone(), identity).await {
                    warn!("reconnect attempt failed: {e}");
                }
            }
        }));
    }
}

/// Drive a reconnect's `connect` call through an erased boxed future.
///
/// Returning a concrete `Pin<Box<dyn Future + Send>>` from a free function
/// erases `connect`'s opaque return type outside its defining scope, which
/// breaks the `connect` <-> `schedule_reconnect` async inference cycle that
/// otherwise makes the spawned reconnect task fail its `Send` bound.
fn connect_boxed(
    manager: ConnectionManager,
    identity: SessionIdentity,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = PdResult<()>> + Send>> {
    Box::pin(async move { manager.connect(identity).await })
}
