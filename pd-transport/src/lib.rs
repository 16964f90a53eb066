//! Playdeck Transport - real-time session transport for shared activity instances.
//!
//! This crate keeps the participants of an activity instance synchronized:
//! - Endpoint resolution across the three supported network topologies
//!   (direct, sandboxed reverse-proxy tunnel, operator override)
//! - A single WebSocket channel with automatic reconnection
//! - Typed publish/subscribe event delivery
//! - Shape-tolerant participant presence reconciliation
//! - Instance join coordination with atomic parameter replacement
//! - Degradation to a local relay when the sandboxed pub/sub backend
//!   is unreachable

pub mod endpoint;
pub mod events;
pub mod manager;
pub mod presence;
pub mod protocol;
pub mod relay;
pub mod session;

// Re-export key types
pub use endpoint::{resolve, EndpointConfig, Origin, OriginScheme};
pub use events::{EventBus, EventKind, SubscriptionId, TransportEvent};
pub use manager::{ConnectionManager, ConnectionState, StatusIndicator};
pub use presence::PresenceTracker;
pub use protocol::OutboundFrame;
pub use relay::{LocalRelay, RelayMessage, RelaySupervisor, RelayTransport};
pub use session::{SessionClient, SessionIdentity};
