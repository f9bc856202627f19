use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("channel {channel_id} not found: {reason}")]
    ChannelNotFound { channel_id: u64, reason: String },
    #[error("message to channel {channel_id} rejected: {reason}")]
    Rejected { channel_id: u64, reason: String },
}

/// The one thing the notifier needs from Discord.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_to_channel(&self, channel_id: u64, content: &str) -> Result<(), GatewayError>;
}

#[async_trait]
impl MessageGateway for Arc<serenity::Http> {
    async fn send_to_channel(&self, channel_id: u64, content: &str) -> Result<(), GatewayError> {
        let http: &serenity::Http = self;
        let channel = http
            .get_channel(serenity::ChannelId::new(channel_id))
            .await
            .map_err(|e| GatewayError::ChannelNotFound {
                channel_id,
                reason: e.to_string(),
            })?;

        channel
            .id()
            .say(http, content)
            .await
            .map_err(|e| GatewayError::Rejected {
                channel_id,
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

pub fn format_live_message(twitch_channel: &str) -> String {
    format!(
        "{twitch_channel} is now live on Twitch! Watch at {}",
        models::channel_url(twitch_channel)
    )
}

#[derive(Debug, Clone)]
pub struct Notifier<G> {
    gateway: G,
}

impl<G: MessageGateway> Notifier<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Send the go-live message. Failures are logged, never returned.
    pub async fn notify(&self, twitch_channel: &str, notify_channel_id: u64) -> bool {
        let message = format_live_message(twitch_channel);
        match self.gateway.send_to_channel(notify_channel_id, &message).await {
            Ok(()) => {
                info!("Sent live notification for {twitch_channel} to channel {notify_channel_id}");
                true
            }
            Err(e) => {
                warn!("Failed to send live notification: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message; optionally fails every send.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingGateway {
        pub sent: Mutex<Vec<(u64, String)>>,
        pub fail: bool,
    }

    impl RecordingGateway {
        pub(crate) fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub(crate) fn messages(&self) -> Vec<(u64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageGateway for Arc<RecordingGateway> {
        async fn send_to_channel(
            &self,
            channel_id: u64,
            content: &str,
        ) -> Result<(), GatewayError> {
            if self.fail {
                return Err(GatewayError::ChannelNotFound {
                    channel_id,
                    reason: "Unknown Channel".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel_id, content.to_string()));
            Ok(())
        }
    }
}
