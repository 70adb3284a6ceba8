use crate::commands::CommandResult;
use shopmate_core::config::{AppConfig, LoadOptions};
use shopmate_db::{connect_from_config, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
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

        let before = migrations::applied_count(&pool).await;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let after = migrations::applied_count(&pool).await;

        pool.close().await;
        Ok::<(i64, i64), (&'static str, String, u8)>((after - before, after))
    });

    match result {
        Ok((0, total)) => CommandResult::success(
            "migrate",
            format!("{} already up to date ({total} migrations applied)", config.database.url),
        ),
        Ok((applied, total)) => CommandResult::success(
            "migrate",
            format!(
                "applied {applied} pending migrations to {} ({total} total)",
                config.database.url
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
