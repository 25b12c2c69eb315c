use std::{sync::Arc, time::Duration};

use gemification_core::config::{AppConfig, ConfigError, LoadOptions};
use gemification_db::{connect_with_settings, migrations, DbPool, Repositories};
use gemification_slack::api::WebClientFactory;
use gemification_slack::configurator::Configurator;
use gemification_slack::context::BotError;
use gemification_slack::directory::DirectoryCache;
use gemification_slack::service::{EasterEgg, GemBot};
use gemification_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};
use gemification_slack::tracker::{gemification_dispatcher, BotRuntime};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<BotRuntime>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("restoring installed teams failed: {0}")]
    Restore(#[source] BotError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let bot = GemBot::new(Arc::new(Configurator::new()), EasterEgg::from_config(&config.reactions));
    let runtime = Arc::new(BotRuntime::new(
        Arc::new(WebClientFactory::new(config.slack.api_base_url.clone())),
        Repositories::sql(db_pool.clone()),
        Arc::new(DirectoryCache::new(Duration::from_secs(config.directory.roster_ttl_secs))),
        bot,
    ));
    let restored = runtime.restore_installed_teams().await.map_err(BootstrapError::Restore)?;
    info!(
        event_name = "system.bootstrap.teams_restored",
        correlation_id = "bootstrap",
        restored,
        "installed teams reconnected"
    );

    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        gemification_dispatcher(runtime.clone()),
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, runtime, slack_runner })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gemification_core::config::{ConfigOverrides, LoadOptions};
    use gemification_core::domain::team::{Installation, SlackTeamId};
    use gemification_core::domain::user::SlackUserId;
    use gemification_db::{connect_with_settings, migrations, Repositories};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str, app_token: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_app_token: Some(app_token.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_socket_mode_token() {
        let result = bootstrap(overrides("sqlite::memory:", "invalid-token")).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_schema_and_wires_both_handlers() {
        let app = bootstrap(overrides("sqlite::memory:", "xapp-test")).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('team', 'team_installation', 'gem_group', 'user_gem', 'gem_transaction', 'gem_period')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema");
        assert_eq!(table_count, 6);
        assert_eq!(app.slack_runner.handler_count(), 2);
        assert_eq!(app.runtime.tracker().len().await, 0);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_reconnects_persisted_installations() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("gems.db").display());

        let pool = connect_with_settings(&url, 1, 30).await.expect("seed pool");
        migrations::run_pending(&pool).await.expect("migrations");
        Repositories::sql(pool.clone())
            .teams
            .save_installation(&Installation {
                slack_team_id: SlackTeamId("T1".to_owned()),
                bot_token: "xoxb-restored".to_owned().into(),
                installer: SlackUserId::new("U1"),
                installed_at: Utc::now(),
            })
            .await
            .expect("installation");
        pool.close().await;

        let app = bootstrap(overrides(&url, "xapp-test")).await.expect("bootstrap");
        assert_eq!(app.runtime.tracker().len().await, 1);
        app.db_pool.close().await;
    }
}
