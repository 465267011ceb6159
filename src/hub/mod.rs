/// Realtime fan-out hub
///
/// Architecture (leaves first):
/// - `connection`: subscriber abstraction + bounded queue implementation
/// - `registry`: per-application, sharded channel membership
/// - `router`: comma-delimited channel list resolution
/// - `encoder`: `{event, data}` frame encoding and payload limits
/// - `publish`: single-channel fan-out
/// - `broadcast`: multi-channel fan-out with per-channel outcomes
/// - `reporter`: dead-connection cleanup, counters, channel lifecycle
/// - `webhook`: signed channel lifecycle notifications
/// - `engine`: the facade everything else talks to
pub mod broadcast;
pub mod connection;
pub mod encoder;
pub mod engine;
pub mod protocol;
pub mod publish;
pub mod registry;
pub mod reporter;
pub mod router;
pub mod webhook;

pub use broadcast::{BroadcastCoordinator, BroadcastOutcome, ChannelOutcome};
pub use connection::{next_connection_id, Connection, ConnectionId, QueueConnection};
pub use encoder::{encode_control, EventEncoder, Frame, PayloadLimits};
pub use engine::FanoutEngine;
pub use publish::{PublishEngine, PublishOutcome};
pub use registry::{ConnectionRegistry, Registration, RemovedConnection, Unregistration};
pub use reporter::{FailureReporter, HubMetrics, HubMetricsSnapshot};
pub use router::ChannelRouter;
pub use webhook::{LifecycleEvent, WebhookNotifier};
