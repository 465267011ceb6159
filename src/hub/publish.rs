/// Publish engine: single-channel fan-out
///
/// One frame, every current subscriber of one channel. Subscribers are
/// snapshotted from the registry and written to outside any lock; a failed
/// write is handed to the reporter and the loop moves on.
use std::sync::Arc;

use super::encoder::Frame;
use super::registry::ConnectionRegistry;
use super::reporter::FailureReporter;
use crate::errors::FanoutError;

/// Per-subscriber results of one channel fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers present when the fan-out started
    pub subscribers: usize,
    pub delivered: usize,
    /// Writes that failed; those connections have been pruned
    pub failed: usize,
}

impl PublishOutcome {
    pub fn is_fully_delivered(&self) -> bool {
        self.failed == 0
    }
}

pub struct PublishEngine {
    registry: Arc<ConnectionRegistry>,
    reporter: Arc<FailureReporter>,
}

impl PublishEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, reporter: Arc<FailureReporter>) -> Self {
        Self { registry, reporter }
    }

    /// Write `frame` to every subscriber of `channel`
    ///
    /// An empty or unknown channel is a successful publish to nobody.
    /// Individual write failures never fail the call; only a shut-down
    /// registry does.
    pub fn publish(
        &self,
        app_id: &str,
        channel: &str,
        frame: &Frame,
    ) -> Result<PublishOutcome, FanoutError> {
        if self.registry.is_shut_down() {
            return Err(FanoutError::StructuralFailure(format!(
                "publish to {}/{} after registry shutdown",
                app_id, channel
            )));
        }

        let subscribers = self.registry.subscribers_of(app_id, channel);
        let mut outcome = PublishOutcome {
            subscribers: subscribers.len(),
            ..PublishOutcome::default()
        };

        for connection in &subscribers {
            match connection.deliver(frame) {
                Ok(()) => outcome.delivered += 1,
                Err(cause) => {
                    outcome.failed += 1;
                    self.reporter
                        .report_dead_connection(app_id, channel, connection, cause);
                }
            }
        }

        self.reporter.record_fanout(app_id, channel, &outcome);
        Ok(outcome)
    }
}
