/// Broadcast coordinator: one event, many channels
///
/// Resolve the list, encode once, publish per channel. Channels are
/// independent units: a rejected or failed channel does not stop the others
/// and nothing already published is rolled back. The aggregate is true only
/// when every channel succeeded.
use std::sync::Arc;

use super::encoder::EventEncoder;
use super::publish::{PublishEngine, PublishOutcome};
use super::reporter::FailureReporter;
use super::router::ChannelRouter;
use crate::errors::FanoutError;
use crate::logger::{self, LogTag};

/// Result of publishing to one resolved channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: String,
    pub result: Result<PublishOutcome, FanoutError>,
}

/// Per-channel results of one broadcast, in list order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub channels: Vec<ChannelOutcome>,
}

impl BroadcastOutcome {
    /// Every channel published without a channel-level error
    pub fn is_success(&self) -> bool {
        !self.channels.is_empty() && self.channels.iter().all(|c| c.result.is_ok())
    }

    pub fn delivered(&self) -> usize {
        self.channels
            .iter()
            .filter_map(|c| c.result.as_ref().ok())
            .map(|o| o.delivered)
            .sum()
    }

    /// Subscriber writes that failed across all channels
    pub fn failed_deliveries(&self) -> usize {
        self.channels
            .iter()
            .filter_map(|c| c.result.as_ref().ok())
            .map(|o| o.failed)
            .sum()
    }

    /// Channels that did not publish, with the reason
    pub fn failures(&self) -> impl Iterator<Item = (&str, &FanoutError)> {
        self.channels
            .iter()
            .filter_map(|c| c.result.as_ref().err().map(|e| (c.channel.as_str(), e)))
    }
}

pub struct BroadcastCoordinator {
    router: ChannelRouter,
    encoder: EventEncoder,
    publisher: Arc<PublishEngine>,
    reporter: Arc<FailureReporter>,
}

impl BroadcastCoordinator {
    pub fn new(
        router: ChannelRouter,
        encoder: EventEncoder,
        publisher: Arc<PublishEngine>,
        reporter: Arc<FailureReporter>,
    ) -> Self {
        Self {
            router,
            encoder,
            publisher,
            reporter,
        }
    }

    /// Broadcast and return the per-channel breakdown
    ///
    /// List-level problems (bad list, bad event) return `Err` before anything
    /// is published. Channel-level problems are recorded in the outcome.
    pub fn broadcast(
        &self,
        app_id: &str,
        channel_list: &str,
        event: &str,
        data: &str,
    ) -> Result<BroadcastOutcome, FanoutError> {
        let channels = match self.router.resolve(app_id, channel_list) {
            Ok(channels) => channels,
            Err(e) => {
                self.reporter
                    .report_channel_resolution_failure(app_id, channel_list);
                return Err(e);
            }
        };

        let frame = self
            .encoder
            .validate_event(event, data)
            .and_then(|_| self.encoder.encode(event, data))
            .inspect_err(|e| self.reporter.report_rejection(app_id, e))?;

        let mut outcome = BroadcastOutcome {
            channels: Vec::with_capacity(channels.len()),
        };

        for channel in channels {
            let result = self
                .encoder
                .validate_channel(&channel)
                .and_then(|_| self.publisher.publish(app_id, &channel, &frame));

            if let Err(e) = &result {
                self.reporter.report_rejection(app_id, e);
            }
            outcome.channels.push(ChannelOutcome { channel, result });
        }

        logger::debug(
            LogTag::Broadcast,
            &format!(
                "{} '{}' -> {} channel(s), {} delivered, {} failed write(s), {} channel failure(s)",
                app_id,
                event,
                outcome.channels.len(),
                outcome.delivered(),
                outcome.failed_deliveries(),
                outcome.failures().count()
            ),
        );

        Ok(outcome)
    }

    /// Boolean form: true only if the list was valid and every channel published
    pub fn broadcast_multi(&self, app_id: &str, channel_list: &str, event: &str, data: &str) -> bool {
        self.broadcast(app_id, channel_list, event, data)
            .map(|outcome| outcome.is_success())
            .unwrap_or(false)
    }
}
