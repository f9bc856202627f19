use eyre::WrapErr;
use poise::serenity_prelude as serenity;
use poise::CreateReply;
use tracing::{info, warn};

use twitch_http_client::{AuthError, TwitchClient};
use twitch_notify_db::ConfigStore;

use crate::poller::StartOutcome;
use crate::types::{Context, Error};

/// Twitch live notification settings
#[poise::command(
    slash_command,
    rename = "twitch-notify",
    guild_only,
    subcommands("set_channel", "set_discord_channel", "set_credentials", "start"),
    subcommand_required
)]
pub(crate) async fn twitch_notify(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set the Twitch channel to monitor
#[poise::command(
    slash_command,
    rename = "set-channel",
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub(crate) async fn set_channel(
    ctx: Context<'_>,
    #[description = "Twitch channel name or URL"] twitch_channel: String,
) -> Result<(), Error> {
    let Some(login) = models::normalize_login(&twitch_channel) else {
        ctx.send(
            CreateReply::default()
                .content(format!(
                    "`{}` is not a valid Twitch channel name",
                    twitch_channel.trim()
                ))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    let reset = apply_twitch_channel(&ctx.data().store, &login).await?;
    if reset {
        info!("Live state reset for new channel {login}");
    }

    info!("Twitch channel set to {login}");
    ctx.say(format!("Twitch channel set to {login}")).await?;
    Ok(())
}

/// Set the Discord channel for notifications
#[poise::command(
    slash_command,
    rename = "set-discord-channel",
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub(crate) async fn set_discord_channel(
    ctx: Context<'_>,
    #[description = "Channel that receives go-live messages"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    ctx.data()
        .store
        .set_notify_channel_id(channel.id.get())
        .await
        .wrap_err("store notification channel")?;

    info!("Notification channel set to {} ({})", channel.name, channel.id);
    ctx.say(format!("Discord channel set to <#{}>", channel.id))
        .await?;
    Ok(())
}

/// Set the Twitch API credentials
#[poise::command(
    slash_command,
    rename = "set-credentials",
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub(crate) async fn set_credentials(
    ctx: Context<'_>,
    #[description = "Twitch application client id"] client_id: String,
    #[description = "Twitch application client secret"] client_secret: String,
    #[description = "App access token (requested from Twitch when omitted)"]
    access_token: Option<String>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let client_id = client_id.trim();
    let client_secret = client_secret.trim();
    if client_id.is_empty() || client_secret.is_empty() {
        ctx.say("Client id and client secret must not be empty.")
            .await?;
        return Ok(());
    }

    let data = ctx.data();
    let reply = match apply_credentials(
        &data.store,
        &data.twitch,
        client_id,
        client_secret,
        access_token.as_deref(),
    )
    .await?
    {
        CredentialsOutcome::TokenProvided => "Twitch API credentials set.".to_string(),
        CredentialsOutcome::TokenObtained => {
            "Twitch API credentials set and access token obtained.".to_string()
        }
        CredentialsOutcome::TokenFailed(e) if e.is_timeout() => {
            "Twitch credentials saved, but Twitch did not answer the token request in time."
                .to_string()
        }
        CredentialsOutcome::TokenFailed(e) => {
            format!("Twitch credentials saved, but no access token could be obtained: {e}")
        }
    };

    ctx.say(reply).await?;
    Ok(())
}

/// Start Twitch live notifications
#[poise::command(
    slash_command,
    rename = "start-notifications",
    guild_only,
    owners_only
)]
pub(crate) async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let reply = match ctx.data().start_notifications().await? {
        StartOutcome::Started => {
            info!("Live notifications started by {}", ctx.author().name);
            "Twitch live notifications started.".to_string()
        }
        StartOutcome::AlreadyRunning => "Twitch live notifications are already running.".to_string(),
        StartOutcome::Incomplete(incomplete) => format!(
            "All configuration options must be set before starting notifications ({incomplete})."
        ),
    };

    ctx.say(reply).await?;
    Ok(())
}

/// Store `login` as the monitored channel. Returns true when the live flag was
/// reset because the channel changed.
pub(crate) async fn apply_twitch_channel(store: &ConfigStore, login: &str) -> eyre::Result<bool> {
    let previous = store
        .twitch_channel()
        .await
        .wrap_err("read twitch channel")?;
    store
        .set_twitch_channel(login)
        .await
        .wrap_err("store twitch channel")?;

    // The live flag belongs to the old channel.
    if previous.as_deref() == Some(login) {
        return Ok(false);
    }
    store.set_is_live(false).await.wrap_err("reset live state")?;
    Ok(true)
}

#[derive(Debug)]
pub(crate) enum CredentialsOutcome {
    TokenProvided,
    TokenObtained,
    /// The stale token was cleared.
    TokenFailed(AuthError),
}

/// Store the app credentials, then the given token or a freshly requested one.
pub(crate) async fn apply_credentials(
    store: &ConfigStore,
    twitch: &TwitchClient,
    client_id: &str,
    client_secret: &str,
    access_token: Option<&str>,
) -> eyre::Result<CredentialsOutcome> {
    store
        .set_credentials(client_id, client_secret)
        .await
        .wrap_err("store twitch credentials")?;

    if let Some(token) = access_token.map(str::trim).filter(|t| !t.is_empty()) {
        store
            .set_access_token(Some(token))
            .await
            .wrap_err("store access token")?;
        return Ok(CredentialsOutcome::TokenProvided);
    }

    match twitch.acquire_access_token(client_id, client_secret).await {
        Ok(token) => {
            store
                .set_access_token(Some(&token))
                .await
                .wrap_err("store access token")?;
            info!("Obtained a new Twitch access token");
            Ok(CredentialsOutcome::TokenObtained)
        }
        Err(e) => {
            warn!("Twitch access token request failed: {e}");
            store
                .set_access_token(None)
                .await
                .wrap_err("clear access token")?;
            Ok(CredentialsOutcome::TokenFailed(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn open_store(dir: &tempfile::TempDir) -> ConfigStore {
        let db_path = dir.path().join("commands.sqlite3");
        ConfigStore::open(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap()
    }

    fn client_for(server: &MockServer) -> TwitchClient {
        TwitchClient::with_base_urls(server.uri(), server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn changing_channel_resets_live_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(apply_twitch_channel(&store, "foo").await.unwrap());
        store.set_is_live(true).await.unwrap();

        assert!(!apply_twitch_channel(&store, "foo").await.unwrap());
        assert!(store.is_live().await.unwrap());

        assert!(apply_twitch_channel(&store, "bar").await.unwrap());
        assert!(!store.is_live().await.unwrap());
        assert_eq!(store.twitch_channel().await.unwrap().as_deref(), Some("bar"));
    }

    #[tokio::test]
    async fn given_token_is_stored_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = apply_credentials(&store, &client_for(&server), "cid", "secret", Some(" tok "))
            .await
            .unwrap();

        assert!(matches!(outcome, CredentialsOutcome::TokenProvided));
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("tok"));
        server.verify().await;
    }

    #[tokio::test]
    async fn missing_token_is_requested_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(query_param("client_id", "cid"))
            .and(query_param("client_secret", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "fresh" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = apply_credentials(&store, &client_for(&server), "cid", "secret", None)
            .await
            .unwrap();

        assert!(matches!(outcome, CredentialsOutcome::TokenObtained));
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("fresh"));
        assert_eq!(store.load().await.unwrap().client_id.as_deref(), Some("cid"));
        server.verify().await;
    }

    #[tokio::test]
    async fn failed_token_request_clears_stale_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.set_access_token(Some("stale")).await.unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let outcome = apply_credentials(&store, &client_for(&server), "cid", "wrong", Some("  "))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            CredentialsOutcome::TokenFailed(AuthError::Status { status: 403 })
        ));
        assert_eq!(store.access_token().await.unwrap(), None);
        assert_eq!(store.load().await.unwrap().client_secret.as_deref(), Some("wrong"));
    }
}
