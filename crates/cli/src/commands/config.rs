use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use medvoice_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

const REDACTED: &str = "<redacted>";
const UNSET: &str = "<unset>";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = Sources { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    CommandResult { exit_code: 0, output: render(&config, &sources) }
}

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    Field { key, value, env_keys }
}

struct Sources<'a> {
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

fn render(config: &AppConfig, sources: &Sources<'_>) -> String {
    let secret = |present: bool| if present { REDACTED } else { UNSET };
    let fields = vec![
        field("database.url", config.database.url.clone(), &["MEDVOICE_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["MEDVOICE_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["MEDVOICE_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "ai.openai_api_key",
            secret(config.ai.has_openai_key()).to_string(),
            &["MEDVOICE_OPENAI_API_KEY", "OPENAI_API_KEY"],
        ),
        field(
            "ai.openai_organization_id",
            config.ai.openai_organization_id.clone().unwrap_or_else(|| UNSET.to_string()),
            &["MEDVOICE_OPENAI_ORGANIZATION_ID", "OPENAI_ORGANIZATION_ID"],
        ),
        field(
            "ai.openai_base_url",
            config.ai.openai_base_url.clone(),
            &["MEDVOICE_OPENAI_BASE_URL"],
        ),
        field(
            "ai.anthropic_api_key",
            secret(config.ai.has_anthropic_key()).to_string(),
            &["MEDVOICE_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"],
        ),
        field(
            "ai.anthropic_base_url",
            config.ai.anthropic_base_url.clone(),
            &["MEDVOICE_ANTHROPIC_BASE_URL"],
        ),
        field(
            "ai.mock_responses",
            config.ai.mock_responses.to_string(),
            &["MEDVOICE_MOCK_AI_RESPONSES", "MOCK_AI_RESPONSES"],
        ),
        field("ai.timeout_secs", config.ai.timeout_secs.to_string(), &["MEDVOICE_AI_TIMEOUT_SECS"]),
        field(
            "tts.elevenlabs_api_key",
            secret(config.tts.has_elevenlabs_key()).to_string(),
            &["MEDVOICE_ELEVENLABS_API_KEY", "ELEVENLABS_API_KEY"],
        ),
        field(
            "tts.elevenlabs_base_url",
            config.tts.elevenlabs_base_url.clone(),
            &["MEDVOICE_ELEVENLABS_BASE_URL"],
        ),
        field(
            "tts.default_voice_id",
            config.tts.default_voice_id.clone(),
            &["MEDVOICE_ELEVENLABS_VOICE_ID", "ELEVENLABS_VOICE_ID"],
        ),
        field("tts.timeout_secs", config.tts.timeout_secs.to_string(), &["MEDVOICE_TTS_TIMEOUT_SECS"]),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["MEDVOICE_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["MEDVOICE_SERVER_PORT", "PORT"]),
        field(
            "server.cors_origin",
            config.server.cors_origin.clone(),
            &["MEDVOICE_SERVER_CORS_ORIGIN", "CORS_ORIGIN"],
        ),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["MEDVOICE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["MEDVOICE_LOGGING_LEVEL", "MEDVOICE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["MEDVOICE_LOGGING_FORMAT", "MEDVOICE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.into_iter().map(|entry| {
        render_line(entry.key, &entry.value, field_source(entry.key, entry.env_keys, sources))
    }));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("medvoice.toml"), PathBuf::from("config/medvoice.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], sources: &Sources<'_>) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = sources.file_doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
