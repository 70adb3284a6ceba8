use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tracing::info;

use shopmate_agent::{Advisor, CandidateStore, HttpVectorIndex, OpenAiChatModel};
use shopmate_core::config::{AppConfig, ConfigError, LoadOptions};
use shopmate_db::repositories::{
    ConversationRepository, ProductRepository, SqlConversationRepository, SqlProductRepository,
};
use shopmate_db::{connect_from_config, migrations, DbPool};

use crate::{advice, health, messages, products};

/// Everything a running server needs; handlers receive it as axum state.
#[derive(Clone)]
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub advisor: Arc<Advisor>,
    pub conversation: Arc<dyn ConversationRepository>,
    pub products: Arc<dyn ProductRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let products: Arc<dyn ProductRepository> =
        Arc::new(SqlProductRepository::new(db_pool.clone()));
    let conversation: Arc<dyn ConversationRepository> =
        Arc::new(SqlConversationRepository::new(db_pool.clone()));

    let model = Arc::new(OpenAiChatModel::from_config(&config.llm));
    let index = Arc::new(HttpVectorIndex::from_config(&config.search));
    let store = CandidateStore::new(index, Arc::clone(&products));
    let advisor =
        Arc::new(Advisor::new(model, store, Arc::clone(&conversation), &config.advisor));
    info!(model = %config.llm.model, "advisor constructed");

    Ok(Application { config, db_pool, advisor, conversation, products })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/advice", post(advice::advise))
            .route("/api/messages", get(messages::list).delete(messages::clear))
            .route("/api/products/{id}", get(products::find))
            .route("/health", get(health::health))
            .with_state(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use shopmate_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn in_memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_connects_migrates_and_wires_the_advisor() {
        let app = bootstrap(in_memory_options()).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('products', 'messages')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 2, "bootstrap should apply both migrations");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_an_unreachable_database() {
        let result = bootstrap(LoadOptions {
            overrides: shopmate_core::config::ConfigOverrides {
                database_url: Some("sqlite:///nonexistent-dir/shopmate.db".to_string()),
                ..Default::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
    }
}
