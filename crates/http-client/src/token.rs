use serde::Deserialize;

use crate::TwitchClient;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("token endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("token response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("token response has no access_token")]
    MissingToken,
}

impl AuthError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

impl TwitchClient {
    /// OAuth client-credentials grant. Does not persist or retry; callers do.
    pub async fn acquire_access_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, AuthError> {
        let resp = self
            .client
            .post(self.token_url())
            .query(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(AuthError::Request)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(AuthError::Request)?;
        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(AuthError::Decode)?;
        parsed
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::MissingToken)
    }
}
