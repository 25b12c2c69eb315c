use crate::commands::{block_on, CommandResult};
use gemification_core::config::{AppConfig, LoadOptions};
use gemification_db::{connect_with_settings, migrations, ping, Repositories};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 0 only when every check passes.
pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(DoctorCheck::pass(
                "slack_app_token",
                format!("socket mode token present; web api at `{}`", config.slack.api_base_url),
            ));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["slack_app_token", "database_connectivity", "schema_migrations", "installed_teams"]
            {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let result = block_on(async {
        let mut checks = Vec::new();
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                checks.push(DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to connect to database: {error}"),
                ));
                checks.push(DoctorCheck::skipped("schema_migrations", "the database is unreachable"));
                checks.push(DoctorCheck::skipped("installed_teams", "the database is unreachable"));
                return checks;
            }
        };

        checks.push(match ping(&pool).await {
            Ok(()) => DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            Err(error) => DoctorCheck::fail("database_connectivity", error.to_string()),
        });

        let expected = migrations::MIGRATOR
            .iter()
            .filter(|migration| migration.migration_type.is_up_migration())
            .count();
        let schema_ready = match migrations::applied_versions(&pool).await {
            Ok(applied) if applied.len() >= expected => {
                checks.push(DoctorCheck::pass(
                    "schema_migrations",
                    format!("{} of {expected} migration(s) applied", applied.len()),
                ));
                true
            }
            Ok(applied) => {
                checks.push(DoctorCheck::fail(
                    "schema_migrations",
                    format!(
                        "{} of {expected} migration(s) applied; run `gemification migrate`",
                        applied.len()
                    ),
                ));
                false
            }
            Err(error) => {
                checks.push(DoctorCheck::fail("schema_migrations", error.to_string()));
                false
            }
        };

        if schema_ready {
            checks.push(match Repositories::sql(pool.clone()).teams.list_installations().await {
                Ok(installations) => DoctorCheck::pass(
                    "installed_teams",
                    format!("{} team installation(s) will be restored", installations.len()),
                ),
                Err(error) => DoctorCheck::fail("installed_teams", error.to_string()),
            });
        } else {
            checks.push(DoctorCheck::skipped("installed_teams", "the schema is not current"));
        }

        pool.close().await;
        checks
    });

    result.unwrap_or_else(|error| {
        vec![DoctorCheck::fail(
            "database_connectivity",
            format!("failed to initialize async runtime: {error}"),
        )]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
