use std::env;
use std::sync::{Mutex, OnceLock};

use medvoice_cli::commands::{config, doctor, migrate, seed, smoke};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("MEDVOICE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("MEDVOICE_DATABASE_URL", "postgres://localhost/medvoice")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("medvoice.db").display());

    with_env(&[("MEDVOICE_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");
        let first_message = first_payload["message"].as_str().unwrap_or_default();
        assert!(first_message.contains("organization `org-default` created"));
        assert!(first_message.ends_with("3 agents created, 0 already present"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        let second_message = second_payload["message"].as_str().unwrap_or_default();
        assert!(second_message.contains("organization `org-default` already present"));
        assert!(second_message.ends_with("0 agents created, 3 already present"));
    });
}

#[test]
fn smoke_returns_success_report_with_valid_env() {
    with_env(&[("MEDVOICE_DATABASE_URL", "sqlite::memory:")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().filter_map(|check| check["name"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(
            names,
            vec!["config_validation", "ai_service", "db_connectivity", "migration_visibility"]
        );
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("MEDVOICE_DATABASE_URL", "mysql://localhost/medvoice")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
    });
}

#[test]
fn doctor_json_reports_provider_warnings_without_failing() {
    with_env(&[("MEDVOICE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "warnings should not fail doctor");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "warn");

        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("ai_provider_readiness"), "warn");
        assert_eq!(status_of("tts_readiness"), "warn");
        assert_eq!(status_of("database_connectivity"), "pass");
    });
}

#[test]
fn doctor_passes_when_providers_are_configured() {
    with_env(
        &[
            ("MEDVOICE_DATABASE_URL", "sqlite::memory:"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ELEVENLABS_API_KEY", "xi-test"),
        ],
        || {
            let result = doctor::run(false);
            assert_eq!(result.exit_code, 0);
            assert!(result.output.starts_with("doctor: all readiness checks passed"));
            assert!(result.output.contains("- [ok] ai_provider_readiness: providers: openai"));
        },
    );
}

#[test]
fn config_attributes_env_sources_and_redacts_secrets() {
    with_env(
        &[
            ("MEDVOICE_DATABASE_URL", "sqlite::memory:"),
            ("ANTHROPIC_API_KEY", "sk-ant-secret"),
            ("PORT", "4100"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(result
                .output
                .contains("- database.url = sqlite::memory: (source: env (MEDVOICE_DATABASE_URL))"));
            assert!(result
                .output
                .contains("- ai.anthropic_api_key = <redacted> (source: env (ANTHROPIC_API_KEY))"));
            assert!(result.output.contains("- server.port = 4100 (source: env (PORT))"));
            assert!(result.output.contains("- ai.openai_api_key = <unset> (source: default)"));
            assert!(!result.output.contains("sk-ant-secret"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poison| poison.into_inner());

    let keys = [
        "MEDVOICE_DATABASE_URL",
        "MEDVOICE_DATABASE_MAX_CONNECTIONS",
        "MEDVOICE_DATABASE_TIMEOUT_SECS",
        "MEDVOICE_OPENAI_API_KEY",
        "OPENAI_API_KEY",
        "MEDVOICE_OPENAI_ORGANIZATION_ID",
        "OPENAI_ORGANIZATION_ID",
        "MEDVOICE_OPENAI_BASE_URL",
        "MEDVOICE_ANTHROPIC_API_KEY",
        "ANTHROPIC_API_KEY",
        "MEDVOICE_ANTHROPIC_BASE_URL",
        "MEDVOICE_MOCK_AI_RESPONSES",
        "MOCK_AI_RESPONSES",
        "MEDVOICE_AI_TIMEOUT_SECS",
        "MEDVOICE_ELEVENLABS_API_KEY",
        "ELEVENLABS_API_KEY",
        "MEDVOICE_ELEVENLABS_BASE_URL",
        "MEDVOICE_ELEVENLABS_VOICE_ID",
        "ELEVENLABS_VOICE_ID",
        "MEDVOICE_TTS_TIMEOUT_SECS",
        "MEDVOICE_SERVER_BIND_ADDRESS",
        "MEDVOICE_SERVER_PORT",
        "PORT",
        "MEDVOICE_SERVER_CORS_ORIGIN",
        "CORS_ORIGIN",
        "MEDVOICE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "MEDVOICE_LOGGING_LEVEL",
        "MEDVOICE_LOGGING_FORMAT",
        "MEDVOICE_LOG_LEVEL",
        "MEDVOICE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
