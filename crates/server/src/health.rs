use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use gemification_db::{migrations, DbPool};
use gemification_slack::tracker::BotRuntime;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    runtime: Arc<BotRuntime>,
}

/// Readiness of the gem ledger plus the number of teams with a live bot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub schema_version: Option<i64>,
    pub expected_schema_version: Option<i64>,
    pub connected_teams: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, runtime: Arc<BotRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, runtime })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    runtime: Arc<BotRuntime>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool, runtime)).await {
            error!(event_name = "system.health.error", error = %error, "health endpoint stopped");
        }
    });
    Ok(())
}

fn expected_schema_version() -> Option<i64> {
    migrations::MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .map(|migration| migration.version)
        .max()
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let expected = expected_schema_version();
    let (schema_version, problem) = match migrations::applied_versions(&state.db_pool).await {
        Ok(applied) => {
            let current = applied.last().copied();
            let problem = (current < expected)
                .then(|| "schema is behind; run `gemification migrate`".to_owned());
            (current, problem)
        }
        Err(error) => (None, Some(format!("ledger database unreachable: {error}"))),
    };

    let report = HealthReport {
        status: if problem.is_none() { "ready" } else { "degraded" },
        schema_version,
        expected_schema_version: expected,
        connected_teams: state.runtime.tracker().len().await,
        problem,
        checked_at: Utc::now().to_rfc3339(),
    };
    let code = if report.problem.is_none() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}
