use std::fmt;
use std::time::Duration;

use eyre::WrapErr;

#[derive(Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub database_url: String,
    pub twitch_id_base_url: String,
    pub twitch_api_base_url: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl DiscordConfig {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let bot_token = lookup("DISCORD_BOT_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| eyre::eyre!("missing env var: DISCORD_BOT_TOKEN"))?;
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://data/twitch-notify.sqlite3".to_string());
        let twitch_id_base_url = lookup("TWITCH_ID_BASE_URL")
            .unwrap_or_else(|| twitch_http_client::DEFAULT_ID_BASE_URL.to_string());
        let twitch_api_base_url = lookup("TWITCH_API_BASE_URL")
            .unwrap_or_else(|| twitch_http_client::DEFAULT_API_BASE_URL.to_string());
        let poll_interval = secs_var(
            &lookup,
            "POLL_INTERVAL_SECS",
            crate::poller::DEFAULT_POLL_INTERVAL.as_secs(),
        )?;
        let http_timeout = secs_var(
            &lookup,
            "HTTP_TIMEOUT_SECS",
            twitch_http_client::DEFAULT_TIMEOUT.as_secs(),
        )?;

        Ok(Self {
            bot_token,
            database_url,
            twitch_id_base_url,
            twitch_api_base_url,
            poll_interval,
            http_timeout,
        })
    }
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("twitch_id_base_url", &self.twitch_id_base_url)
            .field("twitch_api_base_url", &self.twitch_api_base_url)
            .field("poll_interval", &self.poll_interval)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

fn secs_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> eyre::Result<Duration> {
    let secs = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .wrap_err_with(|| format!("{key} must be a whole number of seconds"))?,
        None => default,
    };
    if secs == 0 {
        return Err(eyre::eyre!("{key} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
