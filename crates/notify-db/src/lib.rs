use std::str::FromStr;

use eyre::WrapErr;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use time::OffsetDateTime;

use models::MonitorConfig;

pub type SqlitePool = Pool<Sqlite>;

const KEY_TWITCH_CHANNEL: &str = "twitch.channel";
const KEY_NOTIFY_CHANNEL_ID: &str = "discord.notify_channel_id";
const KEY_CLIENT_ID: &str = "twitch.client_id";
const KEY_CLIENT_SECRET: &str = "twitch.client_secret";
const KEY_ACCESS_TOKEN: &str = "twitch.access_token";
const KEY_IS_LIVE: &str = "stream.is_live";

const UPSERT_APP_STATE: &str = r#"
INSERT INTO app_state (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#;

pub async fn connect(database_url: &str) -> eyre::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .wrap_err("parse database url")?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .wrap_err("connect sqlite")
}

pub async fn migrate(pool: &SqlitePool) -> eyre::Result<()> {
    sqlx::migrate!()
        .run(pool)
        .await
        .wrap_err("run migrations")?;
    Ok(())
}

pub async fn get_app_state(pool: &SqlitePool, key: &str) -> eyre::Result<Option<String>> {
    let value = sqlx::query_scalar::<_, Option<String>>("SELECT value FROM app_state WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .wrap_err("get app_state value")?;
    Ok(value.flatten().filter(|v| !v.is_empty()))
}

pub async fn set_app_state(
    pool: &SqlitePool,
    key: &str,
    value: Option<&str>,
    updated_at: i64,
) -> eyre::Result<()> {
    sqlx::query(UPSERT_APP_STATE)
        .bind(key)
        .bind(value)
        .bind(updated_at)
        .execute(pool)
        .await
        .wrap_err("set app_state value")?;
    Ok(())
}

/// Durable home of the `MonitorConfig`, one `app_state` row per field.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(database_url: &str) -> eyre::Result<Self> {
        let pool = connect(database_url).await?;
        migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn load(&self) -> eyre::Result<MonitorConfig> {
        Ok(MonitorConfig {
            twitch_channel: self.twitch_channel().await?,
            notify_channel_id: self.notify_channel_id().await?,
            client_id: self.client_id().await?,
            client_secret: self.client_secret().await?,
            access_token: self.access_token().await?,
            is_live: self.is_live().await?,
        })
    }

    pub async fn twitch_channel(&self) -> eyre::Result<Option<String>> {
        get_app_state(&self.pool, KEY_TWITCH_CHANNEL).await
    }

    pub async fn set_twitch_channel(&self, login: &str) -> eyre::Result<()> {
        self.put(KEY_TWITCH_CHANNEL, Some(login)).await
    }

    pub async fn notify_channel_id(&self) -> eyre::Result<Option<u64>> {
        let Some(value) = get_app_state(&self.pool, KEY_NOTIFY_CHANNEL_ID).await? else {
            return Ok(None);
        };
        let id = value
            .parse::<u64>()
            .wrap_err("parse notify channel id as u64")?;
        Ok(Some(id))
    }

    pub async fn set_notify_channel_id(&self, channel_id: u64) -> eyre::Result<()> {
        self.put(KEY_NOTIFY_CHANNEL_ID, Some(&channel_id.to_string()))
            .await
    }

    pub async fn client_id(&self) -> eyre::Result<Option<String>> {
        get_app_state(&self.pool, KEY_CLIENT_ID).await
    }

    pub async fn client_secret(&self) -> eyre::Result<Option<String>> {
        get_app_state(&self.pool, KEY_CLIENT_SECRET).await
    }

    /// Stores id and secret together so they never drift apart.
    pub async fn set_credentials(&self, client_id: &str, client_secret: &str) -> eyre::Result<()> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await.wrap_err("begin transaction")?;
        for (key, value) in [(KEY_CLIENT_ID, client_id), (KEY_CLIENT_SECRET, client_secret)] {
            sqlx::query(UPSERT_APP_STATE)
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await
                .wrap_err("store credentials")?;
        }
        tx.commit().await.wrap_err("commit transaction")?;
        Ok(())
    }

    pub async fn access_token(&self) -> eyre::Result<Option<String>> {
        get_app_state(&self.pool, KEY_ACCESS_TOKEN).await
    }

    /// `None` clears the stored token.
    pub async fn set_access_token(&self, token: Option<&str>) -> eyre::Result<()> {
        self.put(KEY_ACCESS_TOKEN, token).await
    }

    pub async fn is_live(&self) -> eyre::Result<bool> {
        match get_app_state(&self.pool, KEY_IS_LIVE).await?.as_deref() {
            None => Ok(false),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(eyre::eyre!("unexpected is_live value: {other}")),
        }
    }

    pub async fn set_is_live(&self, is_live: bool) -> eyre::Result<()> {
        self.put(KEY_IS_LIVE, Some(if is_live { "true" } else { "false" }))
            .await
    }

    async fn put(&self, key: &str, value: Option<&str>) -> eyre::Result<()> {
        set_app_state(&self.pool, key, value, unix_timestamp()).await
    }
}

fn unix_timestamp() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
