use std::time::Duration;

use eyre::WrapErr;
use reqwest::header::{HeaderMap, HeaderValue};

mod streams;
mod token;

pub use streams::{FetchError, HelixStream, StreamsResponse};
pub use token::{AuthError, TokenResponse};

pub const DEFAULT_ID_BASE_URL: &str = "https://id.twitch.tv";
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitch.tv/helix";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the Twitch identity endpoint and the Helix API.
///
/// Cheap to clone; every clone shares one connection pool.
#[derive(Debug, Clone)]
pub struct TwitchClient {
    client: reqwest::Client,
    id_base_url: String,
    api_base_url: String,
}

impl TwitchClient {
    pub fn new(timeout: Duration) -> eyre::Result<Self> {
        Self::with_base_urls(DEFAULT_ID_BASE_URL, DEFAULT_API_BASE_URL, timeout)
    }

    pub fn with_base_urls(
        id_base_url: impl Into<String>,
        api_base_url: impl Into<String>,
        timeout: Duration,
    ) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers())
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .wrap_err("build reqwest client")?;

        Ok(Self {
            client,
            id_base_url: trim_base(id_base_url.into()),
            api_base_url: trim_base(api_base_url.into()),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.id_base_url)
    }

    fn streams_url(&self) -> String {
        format!("{}/streams", self.api_base_url)
    }
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(concat!("twitch-notify/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_lose_trailing_slashes() {
        let client =
            TwitchClient::with_base_urls("http://id.local//", "http://api.local/helix/", DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(client.token_url(), "http://id.local/oauth2/token");
        assert_eq!(client.streams_url(), "http://api.local/helix/streams");
    }
}
