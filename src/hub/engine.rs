/// Fan-out engine
///
/// Owns the registry and wires router, encoder, publisher, coordinator and
/// reporter together. Construct one per process, share it behind an `Arc`,
/// call `shutdown()` on the way out.
///
/// `publish` and `broadcast_multi` are the boolean entry points. The
/// `try_*` variants return the full outcome for callers that want to know
/// what happened.
use std::sync::Arc;
use tokio::sync::mpsc;

use super::broadcast::{BroadcastCoordinator, BroadcastOutcome};
use super::connection::{Connection, ConnectionId, QueueConnection};
use super::encoder::{EventEncoder, Frame, PayloadLimits};
use super::protocol::{self, ChannelKind};
use super::publish::{PublishEngine, PublishOutcome};
use super::registry::{ConnectionRegistry, Registration};
use super::reporter::{FailureReporter, HubMetrics, HubMetricsSnapshot};
use super::router::ChannelRouter;
use super::webhook::WebhookNotifier;
use crate::config::HubConfig;
use crate::errors::FanoutError;
use crate::logger::{self, LogTag};

pub struct FanoutEngine {
    config: HubConfig,
    registry: Arc<ConnectionRegistry>,
    reporter: Arc<FailureReporter>,
    encoder: EventEncoder,
    publisher: Arc<PublishEngine>,
    coordinator: BroadcastCoordinator,
}

impl FanoutEngine {
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.effective_shards()));
        let reporter = Arc::new(
            FailureReporter::new(Arc::clone(&registry), HubMetrics::new())
                .with_webhook(WebhookNotifier::from_config(&config)),
        );
        let encoder = EventEncoder::new(PayloadLimits::from(&config));
        let publisher = Arc::new(PublishEngine::new(
            Arc::clone(&registry),
            Arc::clone(&reporter),
        ));
        let coordinator = BroadcastCoordinator::new(
            ChannelRouter::new(config.duplicate_channels),
            encoder.clone(),
            Arc::clone(&publisher),
            Arc::clone(&reporter),
        );

        logger::info(
            LogTag::Hub,
            &format!(
                "fan-out engine ready: {} shards, queue {} frames, max {} connections, duplicates {:?}",
                registry.num_shards(),
                config.connection_queue_size,
                config.max_connections,
                config.duplicate_channels
            ),
        );

        Self {
            config,
            registry,
            reporter,
            encoder,
            publisher,
            coordinator,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> HubMetricsSnapshot {
        self.reporter.metrics().snapshot()
    }

    /// Non-empty and on the allow-list (an empty list admits every app)
    pub fn accepts_app(&self, app_id: &str) -> bool {
        !app_id.is_empty()
            && (self.config.allowed_apps.is_empty()
                || self.config.allowed_apps.iter().any(|a| a == app_id))
    }

    fn check_app(&self, app_id: &str) -> Result<(), FanoutError> {
        if !self.accepts_app(app_id) {
            return Err(FanoutError::UnknownApplication {
                app_id: app_id.to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------------

    /// Publish one event to one channel
    pub fn try_publish(
        &self,
        app_id: &str,
        channel: &str,
        event: &str,
        data: &str,
    ) -> Result<PublishOutcome, FanoutError> {
        let frame = self.prepare(app_id, channel, event, data)?;
        self.publisher.publish(app_id, channel, &frame)
    }

    fn prepare(
        &self,
        app_id: &str,
        channel: &str,
        event: &str,
        data: &str,
    ) -> Result<Frame, FanoutError> {
        self.check_app(app_id)?;
        self.encoder.validate_channel(channel)?;
        self.encoder.validate_event(event, data)?;
        self.encoder.encode(event, data)
    }

    /// Publish one event to one channel; false only on a rejected request or
    /// structural failure
    pub fn publish(&self, app_id: &str, channel: &str, event: &str, data: &str) -> bool {
        let ok = match self.try_publish(app_id, channel, event, data) {
            Ok(_) => true,
            Err(e) => {
                self.reporter.report_rejection(app_id, &e);
                false
            }
        };
        self.reporter.metrics().publish_finished(ok);
        ok
    }

    /// Publish one event to every channel of a comma-delimited list
    pub fn try_broadcast(
        &self,
        app_id: &str,
        channel_list: &str,
        event: &str,
        data: &str,
    ) -> Result<BroadcastOutcome, FanoutError> {
        self.check_app(app_id)?;
        self.coordinator.broadcast(app_id, channel_list, event, data)
    }

    pub fn broadcast_multi(
        &self,
        app_id: &str,
        channel_list: &str,
        event: &str,
        data: &str,
    ) -> bool {
        let ok = match self.check_app(app_id) {
            Ok(()) => self
                .coordinator
                .broadcast_multi(app_id, channel_list, event, data),
            Err(e) => {
                self.reporter.report_rejection(app_id, &e);
                false
            }
        };
        self.reporter.metrics().broadcast_finished(ok);
        ok
    }

    // ------------------------------------------------------------------------
    // Connections and subscriptions
    // ------------------------------------------------------------------------

    /// Open a queue-backed connection, subject to `max_connections`
    ///
    /// Every successful open must be paired with `disconnect`.
    pub fn open_connection(
        &self,
    ) -> Result<(Arc<QueueConnection>, mpsc::Receiver<Frame>), FanoutError> {
        if self.registry.is_shut_down() {
            return Err(FanoutError::StructuralFailure(
                "engine is shut down".to_string(),
            ));
        }
        if !self
            .reporter
            .metrics()
            .try_open_connection(self.config.max_connections)
        {
            logger::warning(
                LogTag::Hub,
                &format!(
                    "connection refused: limit of {} reached",
                    self.config.max_connections
                ),
            );
            return Err(FanoutError::OverCapacity {
                limit: self.config.max_connections,
            });
        }

        Ok(QueueConnection::new(self.config.connection_queue_size))
    }

    /// Subscribe a connection to a client-named channel
    ///
    /// Channel names must match the protocol character set. Private and
    /// presence channels are refused since subscription auth is not
    /// supported.
    pub fn subscribe(
        &self,
        app_id: &str,
        channel: &str,
        connection: Arc<dyn Connection>,
    ) -> Result<Registration, FanoutError> {
        self.check_app(app_id)?;

        if !protocol::is_valid_channel_name(channel, self.config.max_channel_length) {
            return Err(FanoutError::ChannelRejected {
                channel: channel.chars().take(64).collect(),
                reason: "invalid channel name".to_string(),
            });
        }
        if ChannelKind::of(channel).requires_auth() {
            return Err(FanoutError::ChannelRejected {
                channel: channel.to_string(),
                reason: "authenticated channels are not supported".to_string(),
            });
        }

        let id = connection.id();
        let registration = self.registry.register(app_id, channel, connection)?;
        if registration.channel_created {
            self.reporter.channel_occupied(app_id, channel);
        }
        logger::debug(
            LogTag::Registry,
            &format!("connection {} subscribed to {}/{}", id, app_id, channel),
        );
        Ok(registration)
    }

    /// Returns whether the connection was subscribed
    pub fn unsubscribe(&self, app_id: &str, channel: &str, id: ConnectionId) -> bool {
        let result = self.registry.unregister(app_id, channel, id);
        if result.channel_pruned {
            self.reporter.channel_vacated(app_id, channel);
        }
        result.removed
    }

    /// Drop a connection from every channel and release its slot
    pub fn disconnect(&self, app_id: &str, connection: &dyn Connection) {
        let removed = self.registry.remove_connection(app_id, connection.id());
        for channel in &removed.pruned {
            self.reporter.channel_vacated(app_id, channel);
        }
        connection.close();
        self.reporter.metrics().connection_closed();

        logger::debug(
            LogTag::Registry,
            &format!(
                "connection {} disconnected from {} ({} channel(s))",
                connection.id(),
                app_id,
                removed.channels.len()
            ),
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.registry.is_shut_down()
    }

    /// Close every connection; later publishes fail
    pub fn shutdown(&self) {
        if self.registry.is_shut_down() {
            return;
        }
        let closed = self.registry.shutdown();
        logger::info(
            LogTag::Hub,
            &format!("fan-out engine stopped ({} subscribed connections closed)", closed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn engine() -> FanoutEngine {
        FanoutEngine::new(HubConfig::default())
    }

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame.as_str().to_string());
        }
        frames
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let engine = engine();
        let (c1, mut rx1) = engine.open_connection().unwrap();
        let (c2, mut rx2) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c1).unwrap();
        engine.subscribe("app1", "room1", c2).unwrap();

        assert!(engine.publish("app1", "room1", "msg", "hello"));

        let expected = vec![r#"{"event":"msg","data":"hello"}"#.to_string()];
        assert_eq!(drain(&mut rx1), expected);
        assert_eq!(drain(&mut rx2), expected);
    }

    #[test]
    fn test_publish_to_empty_channel_is_true() {
        let engine = engine();
        assert!(engine.publish("app1", "ghost", "msg", "x"));
        assert_eq!(engine.registry().channel_count("app1"), 0);
    }

    #[test]
    fn test_broadcast_multi_scenarios() {
        let engine = engine();
        let (c, mut rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c).unwrap();

        assert!(engine.broadcast_multi("app1", "room1,room2", "msg", "hi"));
        assert_eq!(drain(&mut rx).len(), 1);

        assert!(!engine.broadcast_multi("app1", "", "msg", "hi"));
        assert!(drain(&mut rx).is_empty());

        let snapshot = engine.metrics();
        assert_eq!(snapshot.broadcasts, 2);
        assert_eq!(snapshot.broadcast_failures, 1);
    }

    #[test]
    fn test_try_broadcast_reports_per_channel() {
        let engine = engine();
        let (c, mut rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c).unwrap();

        let list = format!("room1,{}", "c".repeat(257));
        let outcome = engine.try_broadcast("app1", &list, "msg", "x").unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.delivered(), 1);
        assert_eq!(outcome.failures().count(), 1);
        assert_eq!(drain(&mut rx).len(), 1);

        assert!(matches!(
            engine.try_broadcast("app1", "a,,b", "msg", "x"),
            Err(FanoutError::InvalidChannelList { .. })
        ));
    }

    #[test]
    fn test_dead_subscriber_not_written_again() {
        let engine = engine();
        let (dead, dead_rx) = engine.open_connection().unwrap();
        let (alive, mut alive_rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", dead.clone()).unwrap();
        engine.subscribe("app1", "room1", alive).unwrap();
        drop(dead_rx);

        let first = engine.try_publish("app1", "room1", "msg", "1").unwrap();
        assert_eq!(first.failed, 1);
        assert!(dead.is_closed());

        let second = engine.try_publish("app1", "room1", "msg", "2").unwrap();
        assert_eq!(second.subscribers, 1);
        assert_eq!(second.failed, 0);
        assert_eq!(drain(&mut alive_rx).len(), 2);
    }

    #[test]
    fn test_payload_limits_reject_publish() {
        let engine = engine();
        assert!(!engine.publish("app1", &"c".repeat(257), "msg", "x"));
        assert!(!engine.publish("app1", "room1", &"e".repeat(65), "x"));
        assert!(!engine.publish("app1", "room1", "msg", &"d".repeat(256 * 1024 + 1)));

        let snapshot = engine.metrics();
        assert_eq!(snapshot.publish_failures, 3);
        assert_eq!(snapshot.rejected_channels, 1);
        assert_eq!(snapshot.rejected_events, 2);
    }

    #[test]
    fn test_empty_event_name_is_delivered() {
        let engine = engine();
        let (c, mut rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c).unwrap();

        assert!(engine.publish("app1", "room1", "", "x"));
        assert_eq!(drain(&mut rx), vec![r#"{"event":"","data":"x"}"#.to_string()]);
        assert_eq!(engine.metrics().rejected_events, 0);
    }

    #[test]
    fn test_publish_to_empty_channel_name() {
        let engine = engine();
        let (c, mut rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c).unwrap();

        let outcome = engine.try_publish("app1", "", "msg", "x").unwrap();
        assert_eq!(outcome.subscribers, 0);
        assert!(engine.publish("app1", "", "msg", "x"));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(engine.metrics().rejected_channels, 0);
    }

    #[test]
    fn test_allow_list() {
        let engine = FanoutEngine::new(HubConfig {
            allowed_apps: vec!["app1".to_string()],
            ..HubConfig::default()
        });
        let (c, _rx) = engine.open_connection().unwrap();

        assert!(engine.publish("app1", "room1", "msg", "x"));
        assert!(!engine.publish("app2", "room1", "msg", "x"));
        assert!(!engine.broadcast_multi("app2", "room1", "msg", "x"));
        assert!(matches!(
            engine.subscribe("app2", "room1", c),
            Err(FanoutError::UnknownApplication { .. })
        ));
        assert_eq!(engine.metrics().unknown_applications, 2);
    }

    #[test]
    fn test_subscribe_validation() {
        let engine = engine();
        let (c, _rx) = engine.open_connection().unwrap();

        assert!(engine.subscribe("app1", "room 1", c.clone()).is_err());
        assert!(engine.subscribe("app1", "private-user.1", c.clone()).is_err());
        assert!(engine.subscribe("app1", "presence-lobby", c.clone()).is_err());

        let first = engine.subscribe("app1", "room-1", c.clone()).unwrap();
        assert!(first.added);
        let again = engine.subscribe("app1", "room-1", c).unwrap();
        assert!(!again.added);
        assert_eq!(engine.metrics().channels_occupied, 1);
    }

    #[test]
    fn test_unsubscribe_and_disconnect() {
        let engine = engine();
        let (c, _rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "a", c.clone()).unwrap();
        engine.subscribe("app1", "b", c.clone()).unwrap();

        assert!(engine.unsubscribe("app1", "a", c.id()));
        assert!(!engine.unsubscribe("app1", "a", c.id()));

        engine.disconnect("app1", c.as_ref());
        assert_eq!(engine.registry().channel_count("app1"), 0);

        let snapshot = engine.metrics();
        assert_eq!(snapshot.channels_vacated, 2);
        assert_eq!(snapshot.active_connections, 0);
    }

    #[test]
    fn test_connection_limit() {
        let engine = FanoutEngine::new(HubConfig {
            max_connections: 1,
            ..HubConfig::default()
        });
        let (c, _rx) = engine.open_connection().unwrap();
        assert!(matches!(
            engine.open_connection(),
            Err(FanoutError::OverCapacity { limit: 1 })
        ));

        engine.disconnect("app1", c.as_ref());
        assert!(engine.open_connection().is_ok());
    }

    #[test]
    fn test_shutdown_fails_publishes() {
        let engine = engine();
        let (c, _rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c.clone()).unwrap();

        engine.shutdown();

        assert!(c.is_closed());
        assert!(!engine.publish("app1", "room1", "msg", "x"));
        assert!(!engine.broadcast_multi("app1", "room1", "msg", "x"));
        assert!(engine.open_connection().is_err());
        assert_eq!(engine.metrics().structural_failures, 2);
    }

    #[cfg(feature = "web")]
    #[tokio::test]
    async fn test_lifecycle_webhooks_sent() {
        use axum::{body::Bytes, routing::post, Router};
        use std::time::Duration;

        let (tx, mut hooks) = mpsc::channel::<Bytes>(4);
        let app = Router::new().route(
            "/hook",
            post(move |body: Bytes| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body).await;
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let engine = FanoutEngine::new(HubConfig {
            webhook_url: format!("http://{}/hook", addr),
            ..HubConfig::default()
        });
        let (c, _rx) = engine.open_connection().unwrap();
        engine.subscribe("app1", "room1", c.clone()).unwrap();
        engine.disconnect("app1", c.as_ref());

        let mut names = Vec::new();
        for _ in 0..2 {
            let body = tokio::time::timeout(Duration::from_secs(5), hooks.recv())
                .await
                .unwrap()
                .unwrap();
            let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(payload["events"][0]["channel"], "room1");
            names.push(payload["events"][0]["name"].as_str().unwrap().to_string());
        }
        names.sort();
        assert_eq!(names, vec!["channel_occupied", "channel_vacated"]);
    }

    #[test]
    fn test_concurrent_publish_and_subscribe() {
        let engine = Arc::new(engine());
        let mut handles = Vec::new();

        for t in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let channel = format!("room{}", t);
                let mut receivers = Vec::new();
                for _ in 0..50 {
                    let (c, rx) = engine.open_connection().unwrap();
                    engine.subscribe("app1", &channel, c).unwrap();
                    receivers.push(rx);
                    assert!(engine.publish("app1", &channel, "tick", "x"));
                }
                (channel, receivers)
            }));
        }

        for handle in handles {
            let (channel, receivers) = handle.join().unwrap();
            assert_eq!(engine.registry().subscriber_count("app1", &channel), 50);
            // The i-th subscriber saw the publishes from its own onwards
            for (i, mut rx) in receivers.into_iter().enumerate() {
                assert_eq!(drain(&mut rx).len(), 50 - i);
            }
        }
    }
}
