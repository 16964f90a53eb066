//! Session identity and instance join coordination.
//!
//! `SessionClient` is the application-facing entry point: it owns the
//! event bus, the connection manager, and the presence tracker, and it
//! coordinates leaving one instance and joining another with all
//! connection parameters replaced atomically.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tracing::info;

use pd_core::config::{AppConfig, TransportConfig};
use pd_core::error::PdResult;

use crate::endpoint::{self, EndpointConfig, Origin};
use crate::events::{EventBus, EventKind, TransportEvent};
use crate::manager::{ConnectionManager, StatusIndicator};
use crate::presence::PresenceTracker;
use crate::relay::{RelaySupervisor, RelayTransport};

/// Who this client is inside an activity instance.
///
/// Immutable once a connection attempt starts; joining a new instance
/// replaces the identity wholesale, never field-by-field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub username: String,
    pub instance_id: String,
    pub activity_id: Option<String>,
}

impl SessionIdentity {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        instance_id: impl Into<String>,
        activity_id: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            instance_id: instance_id.into(),
            activity_id,
        }
    }
}

/// Application-facing session transport client.
pub struct SessionClient {
    origin: Origin,
    config: TransportConfig,
    manager: ConnectionManager,
    presence: Arc<StdMutex<PresenceTracker>>,
    /// Operator override currently installed in the resolver context.
    override_url: StdMutex<Option<String>>,
}

impl SessionClient {
    /// Create a client for the given origin. The initial endpoint is
    /// resolved from the configured override, if any.
    pub fn new(origin: Origin, config: TransportConfig) -> Self {
        let bus = EventBus::new();
        let initial_override = Some(AppConfig::sanitize_override_url(&config.override_url))
            .filter(|s| !s.is_empty());
        let dev_host = dev_host(&config);
        let endpoint = endpoint::resolve(&origin, initial_override.as_deref(), dev_host.as_deref());

        let manager = ConnectionManager::new(
            endpoint,
            bus.clone(),
            Duration::from_secs(config.reconnect_delay_secs),
        );

        let presence = Arc::new(StdMutex::new(PresenceTracker::new()));
        wire_presence(&bus, &presence);

        Self {
            origin,
            config,
            manager,
            presence,
            override_url: StdMutex::new(initial_override),
        }
    }

    /// Leave the currently addressed instance and join a different one,
    /// possibly on a different backend.
    ///
    /// Always performs, in order: explicit disconnect (clearing any
    /// pending reconnect from the previous instance), install of the new
    /// override (or its absence) into the resolver context, construction
    /// of a fresh identity, and a fresh connect. No stale timer can fire
    /// against the newly joined instance.
    pub async fn join_instance(
        &self,
        instance_id: &str,
        activity_id: Option<&str>,
        user_id: &str,
        username: &str,
        override_url: Option<&str>,
    ) -> PdResult<()> {
        self.manager.disconnect().await;

        let installed = override_url
            .map(AppConfig::sanitize_override_url)
            .filter(|s| !s.is_empty());
        {
            let mut slot = self
                .override_url
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *slot = installed.clone();
        }
        let endpoint = endpoint::resolve(
            &self.origin,
            installed.as_deref(),
            dev_host(&self.config).as_deref(),
        );
        self.manager.update_endpoint(endpoint).await;

        let identity = SessionIdentity::new(
            user_id,
            username,
            instance_id,
            activity_id.map(str::to_string),
        );
        info!(
            "joining instance {} as {} ({})",
            identity.instance_id, identity.username, identity.user_id
        );
        self.manager.connect(identity).await
    }

    /// Leave the current instance and stop all reconnection.
    pub async fn leave(&self) {
        self.manager.disconnect().await;
    }

    /// Send a chat message to the instance.
    pub async fn send_chat(&self, text: &str) -> PdResult<()> {
        self.manager.send_chat(text).await
    }

    /// The event bus carrying transport events.
    pub fn bus(&self) -> &EventBus {
        self.manager.bus()
    }

    /// The underlying connection manager.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// The currently resolved endpoint.
    pub async fn endpoint(&self) -> EndpointConfig {
        self.manager.endpoint().await
    }

    /// The three-valued user-facing connection status.
    pub async fn status(&self) -> StatusIndicator {
        self.manager.indicator().await
    }

    /// Sorted snapshot of the current participant set.
    pub fn participants(&self) -> Vec<String> {
        let tracker = self
            .presence
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = tracker.participants().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Apply a full participant-list snapshot from the listing API.
    pub fn apply_presence_snapshot(&self, raw: &serde_json::Value) -> bool {
        self.presence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_snapshot(raw)
    }

    /// Apply an incremental participant-list update.
    pub fn apply_presence_update(&self, raw: &serde_json::Value) -> bool {
        self.presence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_update(raw)
    }

    /// Build a health-probe supervisor for a sandboxed relay transport,
    /// using the configured probe interval and failure budget. Only
    /// meaningful when the resolved endpoint marks a relay environment.
    pub fn relay_supervisor(&self, relay: Arc<dyn RelayTransport>) -> Arc<RelaySupervisor> {
        Arc::new(RelaySupervisor::new(
            relay,
            Duration::from_secs(self.config.relay_probe_interval_secs),
            self.config.relay_probe_max_failures,
        ))
    }
}

fn dev_host(config: &TransportConfig) -> Option<String> {
    Some(config.dev_host.trim().to_string()).filter(|s| !s.is_empty())
}

/// Keep the presence tracker in sync with join/leave events on the bus.
fn wire_presence(bus: &EventBus, presence: &Arc<StdMutex<PresenceTracker>>) {
    let tracker = presence.clone();
    bus.subscribe(EventKind::UserJoined, move |event| {
        if let TransportEvent::UserJoined { user_id } = event {
            tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .add(user_id);
        }
        Ok(())
    });

    let tracker = presence.clone();
    bus.subscribe(EventKind::UserLeft, move |event| {
        if let TransportEvent::UserLeft { user_id } = event {
            tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(user_id);
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::OriginScheme;
    use serde_json::json;

    fn test_client() -> SessionClient {
        SessionClient::new(
            Origin::new(OriginScheme::Https, "play.example.com"),
            TransportConfig::default(),
        )
    }

    #[test]
    fn test_identity_replaced_wholesale() {
        let first = SessionIdentity::new("u1", "Alice", "inst-1", None);
        let second = SessionIdentity::new("u1", "Alice", "inst-2", Some("act-9".into()));
        assert_ne!(first, second);
        assert_eq!(second.activity_id.as_deref(), Some("act-9"));
    }

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let client = test_client();
        assert_eq!(client.status().await, StatusIndicator::Disconnected);
        assert!(client.participants().is_empty());
        assert_eq!(
            client.endpoint().await.resolved_url,
            "wss://play.example.com/ws"
        );
    }

    #[tokio::test]
    async fn test_configured_override_seeds_endpoint() {
        let config = TransportConfig {
            override_url: "custom.example.com".into(),
            ..TransportConfig::default()
        };
        let client = SessionClient::new(
            Origin::new(OriginScheme::Https, "abc.playdeck.run"),
            config,
        );
        let endpoint = client.endpoint().await;
        assert_eq!(endpoint.resolved_url, "wss://custom.example.com/ws");
        assert!(!endpoint.is_relay_environment);
    }

    #[tokio::test]
    async fn test_presence_follows_bus_events() {
        let client = test_client();
        client.bus().publish(&TransportEvent::UserJoined {
            user_id: "u2".into(),
        });
        client.bus().publish(&TransportEvent::UserJoined {
            user_id: "u3".into(),
        });
        client.bus().publish(&TransportEvent::UserLeft {
            user_id: "u2".into(),
        });
        assert_eq!(client.participants(), vec!["u3".to_string()]);
    }

    #[tokio::test]
    async fn test_presence_snapshot_and_update() {
        let client = test_client();
        assert!(client.apply_presence_snapshot(&json!({"users": ["a", "b"]})));
        assert_eq!(client.participants(), vec!["a".to_string(), "b".to_string()]);

        // Unrecognized update keeps the set intact
        assert!(!client.apply_presence_update(&json!({"nope": 1})));
        assert_eq!(client.participants().len(), 2);
    }

    #[tokio::test]
    async fn test_send_chat_while_disconnected_fails_cleanly() {
        let client = test_client();
        client.apply_presence_snapshot(&json!(["a"]));

        assert!(client.send_chat("hello").await.is_err());
        // Neither the participant set nor the state changed
        assert_eq!(client.participants(), vec!["a".to_string()]);
        assert_eq!(client.status().await, StatusIndicator::Disconnected);
    }
}
