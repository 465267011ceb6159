/// Channel router
///
/// Splits a comma-delimited channel list into the ordered publish targets of
/// a broadcast. Names are opaque: no whitespace trimming, no case folding.
/// Any empty segment (`""`, `"a,,b"`, `"a,"`) invalidates the whole list, so
/// nothing is published for a malformed request.
use crate::config::DuplicatePolicy;
use crate::errors::FanoutError;
use crate::logger::{self, LogTag};

use super::protocol::CHANNEL_LIST_DELIMITER;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelRouter {
    policy: DuplicatePolicy,
}

impl ChannelRouter {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    /// Resolve `channel_list` into channel names, in list order
    ///
    /// Splitting does not depend on the application; the id is only carried
    /// so rejections can be attributed.
    pub fn resolve(&self, app_id: &str, channel_list: &str) -> Result<Vec<String>, FanoutError> {
        if channel_list.is_empty() {
            logger::debug(LogTag::Broadcast, &format!("empty channel list for {}", app_id));
            return Err(FanoutError::InvalidChannelList {
                raw: channel_list.to_string(),
            });
        }

        let mut channels: Vec<String> = Vec::new();
        for segment in channel_list.split(CHANNEL_LIST_DELIMITER) {
            if segment.is_empty() {
                logger::debug(
                    LogTag::Broadcast,
                    &format!("empty segment in channel list for {}: {:?}", app_id, channel_list),
                );
                return Err(FanoutError::InvalidChannelList {
                    raw: channel_list.to_string(),
                });
            }

            if self.policy == DuplicatePolicy::Deduplicate
                && channels.iter().any(|existing| existing == segment)
            {
                continue;
            }
            channels.push(segment.to_string());
        }

        Ok(channels)
    }
}
