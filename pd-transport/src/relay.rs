//! Pub/sub relay transport and its health-probe supervisor.
//!
//! In the sandboxed hosting environment the session rides a third-party
//! pub/sub relay instead of the direct channel. When the relay never
//! reaches a connected status, the supervisor substitutes a local
//! loopback implementation of the same surface so dependent features keep
//! running in a degraded, non-networked mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, warn};

use pd_core::error::PdResult;

/// One message delivered through a relay topic.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    pub topic: String,
    pub payload: Value,
}

/// Publish/subscribe surface shared by the real relay and the local
/// substitute.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> PdResult<()>;
    async fn subscribe(&self, topic: &str) -> PdResult<broadcast::Receiver<RelayMessage>>;
    async fn close(&self) -> PdResult<()>;
    /// Whether the relay currently reports a connected status.
    async fn is_connected(&self) -> bool;
}

/// In-process relay with loopback delivery.
///
/// Every operation succeeds trivially and locally, so a session that was
/// degraded onto this relay keeps operating without throwing.
#[derive(Default)]
pub struct LocalRelay {
    topics: Mutex<HashMap<String, broadcast::Sender<RelayMessage>>>,
    closed: AtomicBool,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<RelayMessage> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }
}

#[async_trait]
impl RelayTransport for LocalRelay {
    async fn publish(&self, topic: &str, payload: Value) -> PdResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let sender = self.sender_for(topic).await;
        // No receivers is fine; delivery is best-effort loopback
        let _ = sender.send(RelayMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> PdResult<broadcast::Receiver<RelayMessage>> {
        Ok(self.sender_for(topic).await.subscribe())
    }

    async fn close(&self) -> PdResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// Health-probe state machine guarding the active relay.
///
/// Probes the relay on a fixed interval; after more than `max_failures`
/// consecutive probes without a connected status it swaps in a
/// [`LocalRelay`] and sets the `degraded` flag. The degradation is
/// one-way and one-time per process lifetime: the supervisor never
/// reverts to the real relay.
pub struct RelaySupervisor {
    active: RwLock<Arc<dyn RelayTransport>>,
    probe_interval: Duration,
    max_failures: u32,
    consecutive_failures: Mutex<u32>,
    degraded: AtomicBool,
}

impl RelaySupervisor {
    pub fn new(relay: Arc<dyn RelayTransport>, probe_interval: Duration, max_failures: u32) -> Self {
        Self {
            active: RwLock::new(relay),
            probe_interval,
            max_failures,
            consecutive_failures: Mutex::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    /// The relay dependent features should use right now.
    pub async fn relay(&self) -> Arc<dyn RelayTransport> {
        self.active.read().await.clone()
    }

    /// Whether the supervisor has substituted the local relay.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Run one probe step and return the degraded flag.
    ///
    /// Callable directly so tests drive the transition deterministically
    /// without wall-clock timers.
    pub async fn tick(&self) -> bool {
        if self.is_degraded() {
            return true;
        }

        let connected = self.relay().await.is_connected().await;
        let mut failures = self.consecutive_failures.lock().await;
        if connected {
            if *failures > 0 {
                debug!("relay probe recovered after {} failure(s)", *failures);
            }
            *failures = 0;
            return false;
        }

        *failures += 1;
        debug!("relay probe failed ({}/{})", *failures, self.max_failures);
        if *failures > self.max_failures {
            warn!(
                "relay unreachable after {} consecutive probes, degrading to local relay",
                *failures
            );
            *self.active.write().await = Arc::new(LocalRelay::new());
            self.degraded.store(true, Ordering::SeqCst);
        }
        self.is_degraded()
    }

    /// Spawn the interval probe loop. The loop ends once degraded.
    pub fn spawn_probe(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            loop {
                sleep(supervisor.probe_interval).await;
                if supervisor.tick().await {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A relay stub whose connected status never comes up.
    struct UnreachableRelay;

    #[async_trait]
    impl RelayTransport for UnreachableRelay {
        async fn publish(&self, _topic: &str, _payload: Value) -> PdResult<()> {
            Err(pd_core::error::PdError::Relay("unreachable".into()))
        }

        async fn subscribe(&self, _topic: &str) -> PdResult<broadcast::Receiver<RelayMessage>> {
            Err(pd_core::error::PdError::Relay("unreachable".into()))
        }

        async fn close(&self) -> PdResult<()> {
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            false
        }
    }

    fn supervisor(max_failures: u32) -> RelaySupervisor {
        RelaySupervisor::new(
            Arc::new(UnreachableRelay),
            Duration::from_secs(5),
            max_failures,
        )
    }

    #[tokio::test]
    async fn test_local_relay_loopback() {
        let relay = LocalRelay::new();
        let mut rx = relay.subscribe("moves").await.unwrap();
        relay.publish("moves", json!({"x": 1})).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "moves");
        assert_eq!(msg.payload["x"], 1);
    }

    #[tokio::test]
    async fn test_local_relay_topics_are_isolated() {
        let relay = LocalRelay::new();
        let mut moves = relay.subscribe("moves").await.unwrap();
        relay.publish("chat", json!("hello")).await.unwrap();
        relay.publish("moves", json!("e2e4")).await.unwrap();

        let msg = moves.recv().await.unwrap();
        assert_eq!(msg.payload, json!("e2e4"));
    }

    #[tokio::test]
    async fn test_local_relay_close_is_trivial() {
        let relay = LocalRelay::new();
        assert!(relay.is_connected().await);
        relay.close().await.unwrap();
        assert!(!relay.is_connected().await);
        // Operations after close still succeed
        relay.publish("moves", json!(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_degrades_after_max_failures_exceeded() {
        let supervisor = supervisor(3);

        // Three failed probes are tolerated
        assert!(!supervisor.tick().await);
        assert!(!supervisor.tick().await);
        assert!(!supervisor.tick().await);
        assert!(!supervisor.is_degraded());

        // The fourth consecutive failure degrades
        assert!(supervisor.tick().await);
        assert!(supervisor.is_degraded());
        assert!(supervisor.relay().await.is_connected().await);
    }

    #[tokio::test]
    async fn test_degraded_relay_keeps_working() {
        let supervisor = supervisor(0);
        assert!(supervisor.tick().await);

        let relay = supervisor.relay().await;
        let mut rx = relay.subscribe("state").await.unwrap();
        relay.publish("state", json!({"turn": "u1"})).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().payload["turn"], "u1");
    }

    #[tokio::test]
    async fn test_degradation_is_one_way() {
        let supervisor = supervisor(0);
        assert!(supervisor.tick().await);

        // Further ticks stay degraded even though the local relay reports
        // connected
        assert!(supervisor.tick().await);
        assert!(supervisor.is_degraded());
    }

    #[tokio::test]
    async fn test_connected_probe_resets_counter() {
        struct FlakyRelay {
            up: AtomicBool,
        }

        #[async_trait]
        impl RelayTransport for FlakyRelay {
            async fn publish(&self, _topic: &str, _payload: Value) -> PdResult<()> {
                Ok(())
            }
            async fn subscribe(
                &self,
                _topic: &str,
            ) -> PdResult<broadcast::Receiver<RelayMessage>> {
                Ok(broadcast::channel(1).0.subscribe())
            }
            async fn close(&self) -> PdResult<()> {
                Ok(())
            }
            async fn is_connected(&self) -> bool {
                self.up.load(Ordering::SeqCst)
            }
        }

        let relay = Arc::new(FlakyRelay {
            up: AtomicBool::new(false),
        });
        let supervisor =
            RelaySupervisor::new(relay.clone(), Duration::from_secs(5), 3);

        supervisor.tick().await;
        supervisor.tick().await;
        supervisor.tick().await;

        // A successful probe wipes the failure streak
        relay.up.store(true, Ordering::SeqCst);
        assert!(!supervisor.tick().await);

        relay.up.store(false, Ordering::SeqCst);
        supervisor.tick().await;
        supervisor.tick().await;
        supervisor.tick().await;
        assert!(!supervisor.is_degraded());
        assert!(supervisor.tick().await);
    }
}
