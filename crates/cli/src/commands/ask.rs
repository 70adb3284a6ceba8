use std::io::Write;
use std::sync::Arc;

use shopmate_agent::{Advisor, CandidateStore, HttpVectorIndex, OpenAiChatModel};
use shopmate_core::config::{AppConfig, LoadOptions};
use shopmate_core::domain::advice::AdviceEvent;
use shopmate_db::repositories::{SqlConversationRepository, SqlProductRepository};
use shopmate_db::{connect_from_config, migrations};

use crate::commands::CommandResult;

/// One advise pass against the configured backends, streaming the reply to
/// stdout as tokens arrive.
pub fn run(query: &str) -> CommandResult {
    let query = query.trim();
    if query.chars().count() < 3 {
        return CommandResult::failure(
            "ask",
            "invalid_query",
            "query must be at least 3 characters",
            2,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let products = Arc::new(SqlProductRepository::new(pool.clone()));
        let conversation = Arc::new(SqlConversationRepository::new(pool.clone()));
        let model = Arc::new(OpenAiChatModel::from_config(&config.llm));
        let index = Arc::new(HttpVectorIndex::from_config(&config.search));
        let advisor = Arc::new(Advisor::new(
            model,
            CandidateStore::new(index, products),
            conversation,
            &config.advisor,
        ));

        let outcome = stream_to_stdout(advisor, query).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(summary) => CommandResult::success("ask", summary),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    // Repeated calls (tests) make the init a no-op.
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

async fn stream_to_stdout(
    advisor: Arc<Advisor>,
    query: &str,
) -> Result<String, (&'static str, String, u8)> {
    let mut rx = advisor.advise_stream(query.to_owned());
    let mut summary = "advice complete".to_string();
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            AdviceEvent::Progress { stage, .. } => {
                eprintln!("[{stage:?}]");
            }
            AdviceEvent::Token { token } => {
                print!("{token}");
                let _ = stdout.flush();
            }
            AdviceEvent::Final { product, candidates, .. } => {
                println!();
                if let Some(product) = product {
                    println!("recommended: {} {} ({})", product.brand, product.name, product.price);
                    summary = format!("recommended product {}", product.id.0);
                } else if let Some(candidates) = candidates {
                    let ids: Vec<&str> =
                        candidates.iter().map(|candidate| candidate.id.0.as_str()).collect();
                    summary = format!("offered alternatives: {}", ids.join(", "));
                }
            }
            AdviceEvent::Error { message } => {
                return Err(("advice", message, 6u8));
            }
        }
    }
    Ok(summary)
}
