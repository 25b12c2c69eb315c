use crate::commands::{block_on, CommandResult};
use gemification_core::config::{AppConfig, LoadOptions};
use gemification_db::{connect_with_settings, migrations};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
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

    let result = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let before = migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let after = migrations::applied_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(after.len().saturating_sub(before.len()))
    });

    match result {
        Ok(Ok(0)) => CommandResult::success("migrate", "schema already up to date"),
        Ok(Ok(applied)) => {
            CommandResult::success("migrate", format!("applied {applied} pending migration(s)"))
        }
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
        Err(error) => CommandResult::failure(
            "migrate",
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        ),
    }
}
