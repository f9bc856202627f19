use std::path::Path;
use std::sync::Arc;

use eyre::WrapErr;
use poise::serenity_prelude as serenity;
use poise::{CreateReply, FrameworkOptions};
use tokio::sync::watch;
use tracing::{error, info, warn};

use twitch_http_client::TwitchClient;
use twitch_notify_db::ConfigStore;

mod commands;
mod config;
mod notify;
mod poller;
mod types;

use config::DiscordConfig;
use poller::{PollerSlot, StartOutcome};
use types::BotData;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DiscordConfig::from_env().wrap_err("load config")?;

    ensure_sqlite_dir(&config.database_url).wrap_err("create database directory")?;
    let store = ConfigStore::open(&config.database_url)
        .await
        .wrap_err("open config store")?;
    info!("Config store ready");

    let twitch = TwitchClient::with_base_urls(
        config.twitch_id_base_url.as_str(),
        config.twitch_api_base_url.as_str(),
        config.http_timeout,
    )
    .wrap_err("create Twitch client")?;

    let discord_token = config.bot_token.clone();
    let discord_http = Arc::new(serenity::Http::new(&discord_token));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_slot = PollerSlot::default();

    let bot_data = BotData {
        config,
        store,
        twitch,
        discord_http,
        poller: poller_slot.clone(),
        shutdown: shutdown_rx,
    };

    let framework = poise::Framework::builder()
        .options(FrameworkOptions {
            prefix_options: Default::default(),
            commands: vec![commands::twitch_notify()],
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Command '{}' failed: {:?}",
                                ctx.command().qualified_name,
                                error
                            );
                            let _ = ctx
                                .send(
                                    CreateReply::default()
                                        .content("Error executing command")
                                        .ephemeral(true),
                                )
                                .await;
                        }
                        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
                            error!("Argument parse error: {:?}", error);
                            let _ = ctx
                                .send(
                                    CreateReply::default()
                                        .content("Invalid arguments")
                                        .ephemeral(true),
                                )
                                .await;
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                error!("Error while handling framework error: {e}");
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot started as {}", ctx.cache.current_user().name);

                poise::builtins::register_globally(ctx, &framework.options().commands)
                    .await
                    .wrap_err("register commands globally")?;

                resume_if_configured(&bot_data)
                    .await
                    .wrap_err("resume live notifications")?;

                Ok(bot_data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS;

    let mut client = serenity::Client::builder(&discord_token, intents)
        .framework(framework)
        .await
        .wrap_err("create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord bot...");
    let result = client.start().await;

    signal_task.abort();
    let _ = shutdown_tx.send(true);
    if poller_slot.is_running().await {
        info!("Waiting for live poller to stop");
    }
    poller_slot.join().await;
    info!("Shut down");

    result.wrap_err("client error")?;
    Ok(())
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// The continuously running mode: a restart picks monitoring back up.
async fn resume_if_configured(bot_data: &BotData) -> eyre::Result<()> {
    match bot_data.start_notifications().await? {
        StartOutcome::Started => info!("Resumed live notifications from stored configuration"),
        StartOutcome::AlreadyRunning => {}
        StartOutcome::Incomplete(incomplete) => {
            info!("Live notifications not started yet ({incomplete}); configure with /twitch-notify")
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = tokio::signal::ctrl_c() => {},
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {e}");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    }
}

/// SQLite creates the file but not its directory.
fn ensure_sqlite_dir(database_url: &str) -> eyre::Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).wrap_err("create parent dir")?;
    Ok(())
}

fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(path)
}
