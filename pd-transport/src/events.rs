//! Typed publish/subscribe registry for transport events.
//!
//! Handlers are keyed by event kind and invoked synchronously in
//! subscription order. A failing handler is logged and isolated so the
//! remaining handlers still run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

/// Events published by the transport layer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The channel opened and the join frame was delivered.
    Connected,
    /// The channel closed, either explicitly or from the backend side.
    Disconnected,
    /// A chat message relayed from another participant.
    ChatMessage { sender_id: String, text: String },
    /// A participant joined the instance.
    UserJoined { user_id: String },
    /// A participant left the instance.
    UserLeft { user_id: String },
    /// The backend reported an error; the connection stays alive.
    ServerError { text: String },
}

impl TransportEvent {
    /// The subscription key this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::ChatMessage { .. } => EventKind::ChatMessage,
            Self::UserJoined { .. } => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::ServerError { .. } => EventKind::ServerError,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::ChatMessage { .. } => "ChatMessage",
            Self::UserJoined { .. } => "UserJoined",
            Self::UserLeft { .. } => "UserLeft",
            Self::ServerError { .. } => "ServerError",
        }
    }
}

/// Event kinds used as subscription keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    ChatMessage,
    UserJoined,
    UserLeft,
    ServerError,
}

impl EventKind {
    /// All event kinds, in a stable order.
    pub fn all() -> &'static [EventKind] {
        &[
            Self::Connected,
            Self::Disconnected,
            Self::ChatMessage,
            Self::UserJoined,
            Self::UserLeft,
            Self::ServerError,
        ]
    }
}

/// Identifier returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&TransportEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

/// Publish/subscribe registry keyed by event kind.
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TransportEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a previously registered handler. Unknown ids are a no-op.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        let mut registry = self.lock();
        if let Some(handlers) = registry.handlers.get_mut(&kind) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Deliver an event to all handlers subscribed to its kind, in
    /// subscription order. A handler error is logged and does not prevent
    /// the remaining handlers from running.
    pub fn publish(&self, event: &TransportEvent) {
        let handlers: Vec<Handler> = {
            let registry = self.lock();
            registry
                .handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        debug!(
            "event_bus: publishing {} to {} handler(s)",
            event.label(),
            handlers.len()
        );
        for handler in handlers {
            if let Err(e) = handler(event) {
                warn!("event_bus: handler failed for {}: {e:#}", event.label());
            }
        }
    }

    /// Number of handlers currently subscribed to a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().handlers.get(&kind).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
