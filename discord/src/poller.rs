use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use models::{ConfigIncomplete, ReadyConfig, StreamStatus, Transition};
use twitch_http_client::{FetchError, TwitchClient};
use twitch_notify_db::ConfigStore;

use crate::notify::{MessageGateway, Notifier};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Configuration incomplete; no request was made.
    Skipped,
    Checked(Transition),
}

/// Watches one Twitch channel and announces the not-live -> live edge.
///
/// All state lives in the `ConfigStore` and is re-read every cycle, so
/// admin commands apply on the next poll.
#[derive(Debug)]
pub struct Poller<G> {
    store: ConfigStore,
    twitch: TwitchClient,
    notifier: Notifier<G>,
    interval: Duration,
}

impl<G: MessageGateway> Poller<G> {
    pub fn new(
        store: ConfigStore,
        twitch: TwitchClient,
        notifier: Notifier<G>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            twitch,
            notifier,
            interval,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let config = self.store.load().await.wrap_err("load monitor config")?;
        let ready = match config.ready() {
            Ok(ready) => ready,
            Err(incomplete) => {
                debug!("Skipping live poll: {incomplete}");
                return Ok(PollOutcome::Skipped);
            }
        };

        let Some(status) = self.fetch_status(&ready).await else {
            return Ok(PollOutcome::Checked(Transition::Unchanged));
        };
        let (state, transition) = ready.live_state.advance(status.is_live);

        if transition != Transition::Unchanged && !self.still_monitoring(&ready).await? {
            debug!(
                "Monitored channel changed during poll; dropping result for {}",
                ready.twitch_channel
            );
            return Ok(PollOutcome::Checked(Transition::Unchanged));
        }

        match transition {
            Transition::WentLive => {
                self.store
                    .set_is_live(true)
                    .await
                    .wrap_err("persist live state")?;
                info!("{} went live", ready.twitch_channel);
                self.notifier
                    .notify(&ready.twitch_channel, ready.notify_channel_id)
                    .await;
            }
            Transition::WentOffline => {
                self.store
                    .set_is_live(false)
                    .await
                    .wrap_err("persist live state")?;
                info!("{} went offline", ready.twitch_channel);
            }
            Transition::Unchanged => {
                debug!("{} still {state}", ready.twitch_channel);
            }
        }

        Ok(PollOutcome::Checked(transition))
    }

    /// `set-channel` may have run while this cycle was in flight.
    async fn still_monitoring(&self, ready: &ReadyConfig) -> Result<bool> {
        let current = self
            .store
            .twitch_channel()
            .await
            .wrap_err("reload twitch channel")?;
        Ok(current.as_deref() == Some(ready.twitch_channel.as_str()))
    }

    /// `None` when Twitch gave no usable answer; the stored state is left alone.
    async fn fetch_status(&self, ready: &ReadyConfig) -> Option<StreamStatus> {
        let result = self
            .twitch
            .fetch_stream_status(&ready.twitch_channel, &ready.client_id, &ready.access_token)
            .await;

        match result {
            Ok(status) => Some(status),
            Err(FetchError::Unauthorized) => self.refresh_and_refetch(ready).await,
            Err(e) => {
                warn!("Stream status check failed, keeping {}: {e}", ready.live_state);
                None
            }
        }
    }

    async fn refresh_and_refetch(&self, ready: &ReadyConfig) -> Option<StreamStatus> {
        let Some(client_secret) = ready.client_secret.as_deref() else {
            warn!("Access token rejected and no client secret stored; skipping this cycle");
            return None;
        };

        info!("Access token rejected; requesting a new one");
        let token = match self
            .twitch
            .acquire_access_token(&ready.client_id, client_secret)
            .await
        {
            Ok(token) => token,
            Err(e) if e.is_timeout() => {
                warn!("Access token refresh timed out; skipping this cycle");
                return None;
            }
            Err(e) => {
                warn!("Access token refresh failed; skipping this cycle: {e}");
                return None;
            }
        };

        if let Err(e) = self.store.set_access_token(Some(&token)).await {
            warn!("Failed to persist refreshed access token: {e:#}");
        }

        match self
            .twitch
            .fetch_stream_status(&ready.twitch_channel, &ready.client_id, &token)
            .await
        {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Stream status check failed after token refresh: {e}");
                None
            }
        }
    }

    /// Poll, sleep, repeat until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Live poller started (every {} seconds)",
            self.interval.as_secs()
        );

        while !*shutdown.borrow() {
            if let Err(e) = self.poll_once().await {
                error!("Live poll failed: {e:#}");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Live poller stopped");
    }
}

/// Holds the single poller task.
#[derive(Debug, Clone, Default)]
pub struct PollerSlot {
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PollerSlot {
    /// Spawn `poller` unless one is already running. Returns whether it spawned.
    pub async fn start<G>(&self, poller: Poller<G>, shutdown: watch::Receiver<bool>) -> bool
    where
        G: MessageGateway + 'static,
    {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        *handle = Some(tokio::spawn(poller.run(shutdown)));
        true
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Wait for the poller task to exit. Call after signalling shutdown.
    pub async fn join(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Live poller task panicked: {e}");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Incomplete(ConfigIncomplete),
}

/// Start monitoring if every required setting is stored. Makes no network
/// call when the configuration is incomplete.
pub async fn start_notifications<G>(
    slot: &PollerSlot,
    poller: Poller<G>,
    shutdown: watch::Receiver<bool>,
) -> Result<StartOutcome>
where
    G: MessageGateway + 'static,
{
    let config = poller
        .store()
        .load()
        .await
        .wrap_err("load monitor config")?;
    if let Err(incomplete) = config.ready() {
        return Ok(StartOutcome::Incomplete(incomplete));
    }

    if slot.start(poller, shutdown).await {
        Ok(StartOutcome::Started)
    } else {
        Ok(StartOutcome::AlreadyRunning)
    }
}
