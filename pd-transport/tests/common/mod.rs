//! Shared test utilities: an in-process WebSocket server driving the
//! channel from the backend side.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use pd_transport::{EndpointConfig, EventBus, EventKind, SessionIdentity, TransportEvent};

/// Generous upper bound for anything the tests wait on.
pub const WAIT: Duration = Duration::from_secs(2);

/// A loopback backend accepting any number of channel connections.
pub struct TestServer {
    pub addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<serde_json::Value>,
    connects: mpsc::UnboundedReceiver<()>,
    outbound: broadcast::Sender<String>,
    close: broadcast::Sender<()>,
    active: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");

        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (conn_tx, connects) = mpsc::unbounded_channel();
        let (outbound, _) = broadcast::channel(64);
        let (close, _) = broadcast::channel(4);
        let active = Arc::new(AtomicUsize::new(0));

        let out: broadcast::Sender<String> = outbound.clone();
        let close_all = close.clone();
        let active_count = active.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let _ = conn_tx.send(());
                active_count.fetch_add(1, Ordering::SeqCst);

                let (mut sink, mut source) = ws.split();
                let mut out_rx = out.subscribe();
                let mut close_rx = close_all.subscribe();
                let frame_tx = frame_tx.clone();
                let active_count = active_count.clone();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            inbound = source.next() => match inbound {
                                Some(Ok(Message::Text(text))) => {
                                    if let Ok(value) = serde_json::from_str(&text) {
                                        let _ = frame_tx.send(value);
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(_)) => break,
                            },
                            pushed = out_rx.recv() => {
                                if let Ok(text) = pushed {
                                    if sink.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            _ = close_rx.recv() => {
                                let _ = sink.send(Message::Close(None)).await;
                                let _ = sink.close().await;
                                break;
                            }
                        }
                    }
                    active_count.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            frames,
            connects,
            outbound,
            close,
            active,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            resolved_url: self.url(),
            is_relay_environment: false,
            custom_override_url: None,
        }
    }

    /// Push a raw frame to every connected client.
    pub fn push(&self, frame: &str) {
        let _ = self.outbound.send(frame.to_string());
    }

    /// Close every connected client from the backend side.
    pub fn close_clients(&self) {
        let _ = self.close.send(());
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Next frame any client sent to the backend.
    pub async fn recv_frame(&mut self) -> serde_json::Value {
        timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("test server stopped")
    }

    /// Wait until a client connects.
    pub async fn wait_for_connection(&mut self) {
        timeout(WAIT, self.connects.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("test server stopped");
    }

    /// Assert that no client connects within the window.
    pub async fn expect_no_connection(&mut self, window: Duration) {
        assert!(
            timeout(window, self.connects.recv()).await.is_err(),
            "unexpected connection"
        );
    }
}

pub fn identity(user: &str, instance: &str) -> SessionIdentity {
    SessionIdentity::new(user, "Tester", instance, None)
}

/// Funnel events of the given kinds into a channel the test can await.
pub fn collect_events(
    bus: &EventBus,
    kinds: &[EventKind],
) -> mpsc::UnboundedReceiver<TransportEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for &kind in kinds {
        let tx = tx.clone();
        bus.subscribe(kind, move |event| {
            let _ = tx.send(event.clone());
            Ok(())
        });
    }
    rx
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}
