use medvoice_agent::AiService;
use medvoice_core::config::{AppConfig, LoadOptions};
use medvoice_db::{connect_with_config, ping};
use serde::Serialize;

use crate::commands::{escape_json, CommandResult, EXIT_CHECKS_FAILED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_CHECKS_FAILED } else { 0 };

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

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_ai_providers(&config));
            checks.push(check_tts(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["ai_provider_readiness", "tts_readiness", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);

    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_ai_providers(config: &AppConfig) -> DoctorCheck {
    let service = match AiService::from_config(&config.ai) {
        Ok(service) => service,
        Err(error) => {
            return DoctorCheck {
                name: "ai_provider_readiness",
                status: CheckStatus::Fail,
                details: format!("failed to build AI clients: {error}"),
            };
        }
    };

    let providers = service.available_providers();
    if service.mock_mode() {
        DoctorCheck {
            name: "ai_provider_readiness",
            status: CheckStatus::Warn,
            details: "mock responses enabled; provider calls are bypassed".to_string(),
        }
    } else if providers.is_empty() {
        DoctorCheck {
            name: "ai_provider_readiness",
            status: CheckStatus::Warn,
            details: "no AI provider configured; set OPENAI_API_KEY or ANTHROPIC_API_KEY"
                .to_string(),
        }
    } else {
        DoctorCheck {
            name: "ai_provider_readiness",
            status: CheckStatus::Pass,
            details: format!("providers: {}", providers.join(", ")),
        }
    }
}

fn check_tts(config: &AppConfig) -> DoctorCheck {
    if config.tts.has_elevenlabs_key() {
        DoctorCheck {
            name: "tts_readiness",
            status: CheckStatus::Pass,
            details: format!("ElevenLabs configured, default voice `{}`", config.tts.default_voice_id),
        }
    } else {
        DoctorCheck {
            name: "tts_readiness",
            status: CheckStatus::Warn,
            details: "ElevenLabs API key not set; speech synthesis will be skipped".to_string(),
        }
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let reachable = ping(&pool).await.map_err(|error| format!("ping failed: {error}"));
        pool.close().await;
        reachable
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
