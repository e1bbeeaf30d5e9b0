use std::time::Instant;

use crate::commands::{escape_json, CommandResult, EXIT_CHECKS_FAILED};
use medvoice_agent::AiService;
use medvoice_core::config::{AppConfig, LoadOptions};
use medvoice_db::{connect_with_config, migrations};
use serde::Serialize;

const CHECK_ORDER: [&str; 4] =
    ["config_validation", "ai_service", "db_connectivity", "migration_visibility"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

impl SmokeCheck {
    fn timed(name: &'static str, started: Instant, outcome: Result<String, String>) -> Self {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(message) => Self { name, status: SmokeStatus::Pass, elapsed_ms, message },
            Err(message) => Self { name, status: SmokeStatus::Fail, elapsed_ms, message },
        }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: SmokeStatus::Skipped,
            elapsed_ms: 0,
            message: "skipped due to previous failure".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let checks = run_checks();
    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// Runs the checks in order; the first failure skips everything after it.
fn run_checks() -> Vec<SmokeCheck> {
    let mut checks = Vec::new();

    let check_started = Instant::now();
    let loaded = AppConfig::load(LoadOptions::default());
    let config = match loaded {
        Ok(config) => {
            checks.push(SmokeCheck::timed(
                "config_validation",
                check_started,
                Ok("configuration loaded and validated".to_string()),
            ));
            config
        }
        Err(error) => {
            checks.push(SmokeCheck::timed("config_validation", check_started, Err(error.to_string())));
            return skip_remaining(checks);
        }
    };

    let check_started = Instant::now();
    checks.push(SmokeCheck::timed("ai_service", check_started, ai_service_summary(&config)));
    if checks.iter().any(|check| check.status == SmokeStatus::Fail) {
        return skip_remaining(checks);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck::timed(
                "db_connectivity",
                Instant::now(),
                Err(format!("failed to initialize async runtime: {error}")),
            ));
            return skip_remaining(checks);
        }
    };

    let check_started = Instant::now();
    let pool = match runtime.block_on(connect_with_config(&config.database)) {
        Ok(pool) => {
            checks.push(SmokeCheck::timed(
                "db_connectivity",
                check_started,
                Ok(format!("connected using `{}`", config.database.url)),
            ));
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck::timed(
                "db_connectivity",
                check_started,
                Err(format!("failed to connect: {error}")),
            ));
            return skip_remaining(checks);
        }
    };

    let check_started = Instant::now();
    let migrated = runtime.block_on(async {
        let result = migrations::run_pending(&pool).await;
        pool.close().await;
        result
    });
    checks.push(SmokeCheck::timed(
        "migration_visibility",
        check_started,
        migrated
            .map(|()| "migrations are visible and executable".to_string())
            .map_err(|error| format!("migration execution failed: {error}")),
    ));

    checks
}

fn ai_service_summary(config: &AppConfig) -> Result<String, String> {
    let service = AiService::from_config(&config.ai)
        .map_err(|error| format!("failed to build AI clients: {error}"))?;
    let providers = service.available_providers();

    Ok(if service.mock_mode() {
        "mock responses enabled".to_string()
    } else if providers.is_empty() {
        "no AI provider configured; replies will report configuration errors".to_string()
    } else {
        format!("providers: {}", providers.join(", "))
    })
}

fn skip_remaining(mut checks: Vec<SmokeCheck>) -> Vec<SmokeCheck> {
    for name in CHECK_ORDER.into_iter().skip(checks.len()) {
        checks.push(SmokeCheck::skipped(name));
    }
    checks
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{} checks passed in {total_elapsed_ms}ms", checks.len()),
        total_elapsed_ms,
        checks,
    };

    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult {
        exit_code: if failed { EXIT_CHECKS_FAILED } else { 0 },
        output: format!("{}\n{machine}", report.summary),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::{finalize_report, skip_remaining, SmokeCheck, SmokeStatus};
    use crate::commands::EXIT_CHECKS_FAILED;

    #[test]
    fn config_failure_skips_every_later_check() {
        let checks = skip_remaining(vec![SmokeCheck::timed(
            "config_validation",
            Instant::now(),
            Err("bad url".to_string()),
        )]);

        let names: Vec<&str> = checks.iter().map(|check| check.name).collect();
        assert_eq!(
            names,
            vec!["config_validation", "ai_service", "db_connectivity", "migration_visibility"]
        );
        assert!(checks[1..].iter().all(|check| check.status == SmokeStatus::Skipped));

        let result = finalize_report(checks, 1);
        assert_eq!(result.exit_code, EXIT_CHECKS_FAILED);
        assert!(result.output.starts_with("smoke: 0/4 checks passed"));
    }

    #[test]
    fn skipped_checks_do_not_fail_the_run() {
        let checks = vec![
            SmokeCheck::timed("config_validation", Instant::now(), Ok(String::new())),
            SmokeCheck::skipped("migration_visibility"),
        ];

        assert_eq!(finalize_report(checks, 0).exit_code, 0);
    }
}
