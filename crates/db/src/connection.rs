use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use shopmate_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Pool sizing plus the sqlite pragmas applied to every fresh connection.
/// WAL and foreign-key enforcement are fixed; the busy timeout is a knob,
/// since the CLI may contend with a running server on the same file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_ms: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_connections: 5, acquire_timeout_secs: 30, busy_timeout_ms: 5_000 }
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            acquire_timeout_secs: config.timeout_secs,
            ..Self::default()
        }
    }
}

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_pool(database_url, PoolSettings::default()).await
}

/// Preferred entry point for binaries: the `[database]` config section maps
/// straight onto the pool settings.
pub async fn connect_from_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_pool(&config.url, PoolSettings::from(config)).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    connect_pool(
        database_url,
        PoolSettings {
            max_connections,
            acquire_timeout_secs: timeout_secs,
            ..PoolSettings::default()
        },
    )
    .await
}

pub async fn connect_pool(
    database_url: &str,
    settings: PoolSettings,
) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = settings.busy_timeout_ms;
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
