/// Failure and metrics reporter
///
/// Everything the hub wants to observe ends up here: dead subscribers,
/// rejected publishes, channel lifecycle, connection counts. Reporting
/// never fails. Beyond counters it prunes dead connections from the
/// registry and, when configured, posts lifecycle webhooks.
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::connection::Connection;
use super::publish::PublishOutcome;
use super::registry::ConnectionRegistry;
use super::webhook::{LifecycleEvent, WebhookNotifier};
use crate::errors::{DeliveryError, FanoutError};
use crate::logger::{self, LogTag};

// ============================================================================
// HUB METRICS
// ============================================================================

/// Hub-level counters (lifetime totals unless noted)
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Connections accepted
    total_connections: AtomicU64,

    /// Currently open connections
    active_connections: AtomicUsize,

    /// Connections refused at capacity
    rejected_connections: AtomicU64,

    /// Connections pruned after a failed write
    dead_connections: AtomicU64,

    publishes: AtomicU64,
    publish_failures: AtomicU64,
    broadcasts: AtomicU64,
    broadcast_failures: AtomicU64,

    /// Per-channel fan-outs (one per publish, one per broadcast target)
    fanouts: AtomicU64,

    frames_delivered: AtomicU64,
    delivery_failures: AtomicU64,

    channel_resolution_failures: AtomicU64,
    rejected_events: AtomicU64,
    rejected_channels: AtomicU64,
    unknown_applications: AtomicU64,
    structural_failures: AtomicU64,

    channels_occupied: AtomicU64,
    channels_vacated: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve a connection slot, failing when `limit` are already open
    pub fn try_open_connection(&self, limit: usize) -> bool {
        let reserved = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < limit).then_some(active + 1)
            })
            .is_ok();

        if reserved {
            self.total_connections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_connections.fetch_add(1, Ordering::Relaxed);
        }
        reserved
    }

    pub fn connection_closed(&self) {
        // Saturate instead of wrapping if a close is ever reported twice
        let _ = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                active.checked_sub(1)
            });
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn publish_finished(&self, ok: bool) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn broadcast_finished(&self, ok: bool) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.broadcast_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            dead_connections: self.dead_connections.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            broadcast_failures: self.broadcast_failures.load(Ordering::Relaxed),
            fanouts: self.fanouts.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            channel_resolution_failures: self.channel_resolution_failures.load(Ordering::Relaxed),
            rejected_events: self.rejected_events.load(Ordering::Relaxed),
            rejected_channels: self.rejected_channels.load(Ordering::Relaxed),
            unknown_applications: self.unknown_applications.load(Ordering::Relaxed),
            structural_failures: self.structural_failures.load(Ordering::Relaxed),
            channels_occupied: self.channels_occupied.load(Ordering::Relaxed),
            channels_vacated: self.channels_vacated.load(Ordering::Relaxed),
        }
    }
}

/// Hub metrics snapshot (serializable)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: usize,
    pub rejected_connections: u64,
    pub dead_connections: u64,
    pub publishes: u64,
    pub publish_failures: u64,
    pub broadcasts: u64,
    pub broadcast_failures: u64,
    pub fanouts: u64,
    pub frames_delivered: u64,
    pub delivery_failures: u64,
    pub channel_resolution_failures: u64,
    pub rejected_events: u64,
    pub rejected_channels: u64,
    pub unknown_applications: u64,
    pub structural_failures: u64,
    pub channels_occupied: u64,
    pub channels_vacated: u64,
}

// ============================================================================
// FAILURE REPORTER
// ============================================================================

pub struct FailureReporter {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<HubMetrics>,
    webhook: Option<WebhookNotifier>,
}

impl FailureReporter {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<HubMetrics>) -> Self {
        Self {
            registry,
            metrics,
            webhook: None,
        }
    }

    /// Forward channel lifecycle events to a webhook endpoint
    pub fn with_webhook(mut self, webhook: Option<WebhookNotifier>) -> Self {
        self.webhook = webhook;
        self
    }

    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    /// A write to `connection` failed while publishing on `channel`
    ///
    /// The connection is dropped from `channel` and from every other channel
    /// of the application, then closed. Concurrent reports for the same
    /// connection count it as dead once.
    pub fn report_dead_connection(
        &self,
        app_id: &str,
        channel: &str,
        connection: &Arc<dyn Connection>,
        cause: DeliveryError,
    ) {
        self.metrics.delivery_failures.fetch_add(1, Ordering::Relaxed);

        let id = connection.id();
        let unregistered = self.registry.unregister(app_id, channel, id);
        let removed = self.registry.remove_connection(app_id, id);
        connection.close();

        if unregistered.channel_pruned {
            self.channel_vacated(app_id, channel);
        }
        for pruned in &removed.pruned {
            self.channel_vacated(app_id, pruned);
        }

        if unregistered.removed || !removed.channels.is_empty() {
            self.metrics.dead_connections.fetch_add(1, Ordering::Relaxed);
            logger::warning(
                LogTag::Reporter,
                &format!(
                    "dead subscriber {} on {}/{} ({}), removed from {} channel(s)",
                    id,
                    app_id,
                    channel,
                    cause,
                    removed.channels.len() + usize::from(unregistered.removed)
                ),
            );
        }
    }

    /// A broadcast channel list could not be split; no registry change
    pub fn report_channel_resolution_failure(&self, app_id: &str, raw_channel_list: &str) {
        self.metrics
            .channel_resolution_failures
            .fetch_add(1, Ordering::Relaxed);
        logger::warning(
            LogTag::Reporter,
            &format!(
                "invalid channel list for {}: {:?}",
                app_id, raw_channel_list
            ),
        );
    }

    /// A publish target, event or application was refused
    pub fn report_rejection(&self, app_id: &str, error: &FanoutError) {
        let counter = match error {
            FanoutError::InvalidChannelList { .. } => &self.metrics.channel_resolution_failures,
            FanoutError::ChannelRejected { .. } => &self.metrics.rejected_channels,
            FanoutError::EventRejected { .. } => &self.metrics.rejected_events,
            FanoutError::UnknownApplication { .. } => &self.metrics.unknown_applications,
            FanoutError::OverCapacity { .. } => &self.metrics.rejected_connections,
            FanoutError::StructuralFailure(_) => &self.metrics.structural_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let message = format!("[{}] {} ({})", app_id, error, error.kind());
        match error {
            FanoutError::StructuralFailure(_) => logger::error(LogTag::Reporter, &message),
            _ => logger::warning(LogTag::Reporter, &message),
        }
    }

    /// Record the per-subscriber results of one channel fan-out
    pub fn record_fanout(&self, app_id: &str, channel: &str, outcome: &PublishOutcome) {
        self.metrics.fanouts.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .frames_delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);

        if logger::is_debug_enabled(&LogTag::Publish) {
            logger::debug(
                LogTag::Publish,
                &format!(
                    "{}/{}: {} subscriber(s), {} delivered, {} failed",
                    app_id, channel, outcome.subscribers, outcome.delivered, outcome.failed
                ),
            );
        }
    }

    /// First subscriber joined a channel
    pub fn channel_occupied(&self, app_id: &str, channel: &str) {
        self.metrics.channels_occupied.fetch_add(1, Ordering::Relaxed);
        logger::debug(
            LogTag::Reporter,
            &format!("channel_occupied {}/{}", app_id, channel),
        );
        if let Some(webhook) = &self.webhook {
            webhook.notify(app_id, LifecycleEvent::ChannelOccupied, channel);
        }
    }

    /// Last subscriber left a channel
    pub fn channel_vacated(&self, app_id: &str, channel: &str) {
        self.metrics.channels_vacated.fetch_add(1, Ordering::Relaxed);
        logger::debug(
            LogTag::Reporter,
            &format!("channel_vacated {}/{}", app_id, channel),
        );
        if let Some(webhook) = &self.webhook {
            webhook.notify(app_id, LifecycleEvent::ChannelVacated, channel);
        }
    }
}
