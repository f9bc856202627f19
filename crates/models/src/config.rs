use std::fmt;

use crate::LiveState;

/// Everything the live notifier persists. Empty strings count as unset.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MonitorConfig {
    pub twitch_channel: Option<String>,
    pub notify_channel_id: Option<u64>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub is_live: bool,
}

/// A `MonitorConfig` with every value polling needs.
#[derive(Clone, PartialEq, Eq)]
pub struct ReadyConfig {
    pub twitch_channel: String,
    pub notify_channel_id: u64,
    pub client_id: String,
    pub access_token: String,
    pub client_secret: Option<String>,
    pub live_state: LiveState,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing settings: {}", .missing.join(", "))]
pub struct ConfigIncomplete {
    pub missing: Vec<&'static str>,
}

impl MonitorConfig {
    pub fn live_state(&self) -> LiveState {
        LiveState::from_flag(self.is_live)
    }

    pub fn ready(&self) -> Result<ReadyConfig, ConfigIncomplete> {
        let twitch_channel = non_empty(&self.twitch_channel);
        let client_id = non_empty(&self.client_id);
        let access_token = non_empty(&self.access_token);

        let mut missing = Vec::new();
        if twitch_channel.is_none() {
            missing.push("twitch channel");
        }
        if self.notify_channel_id.is_none() {
            missing.push("notification channel");
        }
        if client_id.is_none() {
            missing.push("client id");
        }
        if access_token.is_none() {
            missing.push("access token");
        }

        match (twitch_channel, self.notify_channel_id, client_id, access_token) {
            (Some(twitch_channel), Some(notify_channel_id), Some(client_id), Some(access_token)) => {
                Ok(ReadyConfig {
                    twitch_channel,
                    notify_channel_id,
                    client_id,
                    access_token,
                    client_secret: non_empty(&self.client_secret),
                    live_state: self.live_state(),
                })
            }
            _ => Err(ConfigIncomplete { missing }),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn redact(value: &Option<String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("twitch_channel", &self.twitch_channel)
            .field("notify_channel_id", &self.notify_channel_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("access_token", &redact(&self.access_token))
            .field("is_live", &self.is_live)
            .finish()
    }
}

impl fmt::Debug for ReadyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyConfig")
            .field("twitch_channel", &self.twitch_channel)
            .field("notify_channel_id", &self.notify_channel_id)
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .field("client_secret", &redact(&self.client_secret))
            .field("live_state", &self.live_state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> MonitorConfig {
        MonitorConfig {
            twitch_channel: Some("foo".to_string()),
            notify_channel_id: Some(42),
            client_id: Some("cid".to_string()),
            client_secret: None,
            access_token: Some("tok".to_string()),
            is_live: true,
        }
    }

    #[test]
    fn ready_when_required_values_present() {
        let ready = complete().ready().unwrap();
        assert_eq!(ready.twitch_channel, "foo");
        assert_eq!(ready.notify_channel_id, 42);
        assert_eq!(ready.live_state, LiveState::Live);
        assert_eq!(ready.client_secret, None);
    }

    #[test]
    fn client_secret_is_not_required() {
        let mut config = complete();
        config.client_secret = Some("secret".to_string());
        assert_eq!(config.ready().unwrap().client_secret.as_deref(), Some("secret"));
    }

    #[test]
    fn incomplete_lists_every_missing_value() {
        let err = MonitorConfig::default().ready().unwrap_err();
        assert_eq!(
            err.missing,
            vec!["twitch channel", "notification channel", "client id", "access token"]
        );
        assert_eq!(
            err.to_string(),
            "missing settings: twitch channel, notification channel, client id, access token"
        );
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let mut config = complete();
        config.access_token = Some("   ".to_string());
        assert_eq!(config.ready().unwrap_err().missing, vec!["access token"]);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = complete();
        config.client_secret = Some("hunter2".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("tok\""));
        assert!(debug.contains("<redacted>"));

        let ready = format!("{:?}", config.ready().unwrap());
        assert!(!ready.contains("hunter2"));
    }
}
