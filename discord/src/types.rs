use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tokio::sync::watch;

use twitch_http_client::TwitchClient;
use twitch_notify_db::ConfigStore;

use crate::config::DiscordConfig;
use crate::notify::Notifier;
use crate::poller::{start_notifications, Poller, PollerSlot, StartOutcome};

pub(crate) type Error = eyre::Report;
pub(crate) type Context<'a> = poise::Context<'a, BotData, Error>;

#[derive(Clone)]
pub struct BotData {
    pub config: DiscordConfig,
    pub store: ConfigStore,
    pub twitch: TwitchClient,
    pub discord_http: Arc<serenity::Http>,
    pub poller: PollerSlot,
    pub shutdown: watch::Receiver<bool>,
}

impl BotData {
    pub fn new_poller(&self) -> Poller<Arc<serenity::Http>> {
        Poller::new(
            self.store.clone(),
            self.twitch.clone(),
            Notifier::new(self.discord_http.clone()),
            self.config.poll_interval,
        )
    }

    pub async fn start_notifications(&self) -> eyre::Result<StartOutcome> {
        start_notifications(&self.poller, self.new_poller(), self.shutdown.clone()).await
    }
}
