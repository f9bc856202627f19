use models::StreamStatus;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::TwitchClient;

/// `GET /helix/streams` body. `data` is required; a body without it is a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamsResponse {
    pub data: Vec<HelixStream>,
}

/// One entry of `data`. Only the stream type decides liveness.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelixStream {
    #[serde(rename = "type", default)]
    pub stream_type: String,
}

impl StreamsResponse {
    pub fn status(&self) -> StreamStatus {
        StreamStatus::from_first_stream_type(self.data.first().map(|s| s.stream_type.as_str()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("streams request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("streams request unauthorized (token expired or revoked)")]
    Unauthorized,
    #[error("streams endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("streams response is malformed: {0}")]
    Decode(#[source] serde_json::Error),
}

impl TwitchClient {
    /// Query Helix for `login`. Errors are returned as-is; the poller decides
    /// how to treat them.
    pub async fn fetch_stream_status(
        &self,
        login: &str,
        client_id: &str,
        access_token: &str,
    ) -> Result<StreamStatus, FetchError> {
        let resp = self
            .client
            .get(self.streams_url())
            .query(&[("user_login", login)])
            .header("Client-ID", client_id)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(FetchError::Request)?;
        let parsed: StreamsResponse = serde_json::from_slice(&body).map_err(FetchError::Decode)?;
        Ok(parsed.status())
    }
}
