use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ELEVENLABS_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub tts: TtsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Credentials and endpoints for the chat-completion providers.
///
/// Keys are optional: a provider without a key is simply reported as
/// unconfigured. `mock_responses` answers every request with canned replies.
#[derive(Clone, Debug)]
pub struct AiConfig {
    pub openai_api_key: Option<SecretString>,
    pub openai_organization_id: Option<String>,
    pub openai_base_url: String,
    pub anthropic_api_key: Option<SecretString>,
    pub anthropic_base_url: String,
    pub mock_responses: bool,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TtsConfig {
    pub elevenlabs_api_key: Option<SecretString>,
    pub elevenlabs_base_url: String,
    pub default_voice_id: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_origin: String,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub mock_responses: Option<bool>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://medvoice.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            ai: AiConfig {
                openai_api_key: None,
                openai_organization_id: None,
                openai_base_url: "https://api.openai.com".to_string(),
                anthropic_api_key: None,
                anthropic_base_url: "https://api.anthropic.com".to_string(),
                mock_responses: false,
                timeout_secs: 60,
            },
            tts: TtsConfig {
                elevenlabs_api_key: None,
                elevenlabs_base_url: "https://api.elevenlabs.io".to_string(),
                default_voice_id: DEFAULT_ELEVENLABS_VOICE_ID.to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                cors_origin: "http://localhost:3000".to_string(),
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Trimmed secret; blank values count as "not configured".
fn secret_value(value: String) -> Option<SecretString> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string().into())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("medvoice.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(ai) = patch.ai {
            if let Some(key) = ai.openai_api_key {
                self.ai.openai_api_key = secret_value(key);
            }
            if let Some(organization_id) = ai.openai_organization_id {
                self.ai.openai_organization_id = non_blank(organization_id);
            }
            if let Some(base_url) = ai.openai_base_url {
                self.ai.openai_base_url = base_url;
            }
            if let Some(key) = ai.anthropic_api_key {
                self.ai.anthropic_api_key = secret_value(key);
            }
            if let Some(base_url) = ai.anthropic_base_url {
                self.ai.anthropic_base_url = base_url;
            }
            if let Some(mock_responses) = ai.mock_responses {
                self.ai.mock_responses = mock_responses;
            }
            if let Some(timeout_secs) = ai.timeout_secs {
                self.ai.timeout_secs = timeout_secs;
            }
        }

        if let Some(tts) = patch.tts {
            if let Some(key) = tts.elevenlabs_api_key {
                self.tts.elevenlabs_api_key = secret_value(key);
            }
            if let Some(base_url) = tts.elevenlabs_base_url {
                self.tts.elevenlabs_base_url = base_url;
            }
            if let Some(voice_id) = tts.default_voice_id {
                self.tts.default_voice_id = voice_id;
            }
            if let Some(timeout_secs) = tts.timeout_secs {
                self.tts.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(cors_origin) = server.cors_origin {
                self.server.cors_origin = cors_origin;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MEDVOICE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MEDVOICE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("MEDVOICE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MEDVOICE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MEDVOICE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = env_with_alias("MEDVOICE_OPENAI_API_KEY", "OPENAI_API_KEY") {
            self.ai.openai_api_key = secret_value(value);
        }
        if let Some(value) =
            env_with_alias("MEDVOICE_OPENAI_ORGANIZATION_ID", "OPENAI_ORGANIZATION_ID")
        {
            self.ai.openai_organization_id = non_blank(value);
        }
        if let Some(value) = read_env("MEDVOICE_OPENAI_BASE_URL") {
            self.ai.openai_base_url = value;
        }
        if let Some(value) = env_with_alias("MEDVOICE_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = secret_value(value);
        }
        if let Some(value) = read_env("MEDVOICE_ANTHROPIC_BASE_URL") {
            self.ai.anthropic_base_url = value;
        }
        if let Some(value) = env_with_alias("MEDVOICE_MOCK_AI_RESPONSES", "MOCK_AI_RESPONSES") {
            self.ai.mock_responses = parse_bool("MEDVOICE_MOCK_AI_RESPONSES", &value)?;
        }
        if let Some(value) = read_env("MEDVOICE_AI_TIMEOUT_SECS") {
            self.ai.timeout_secs = parse_u64("MEDVOICE_AI_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = env_with_alias("MEDVOICE_ELEVENLABS_API_KEY", "ELEVENLABS_API_KEY") {
            self.tts.elevenlabs_api_key = secret_value(value);
        }
        if let Some(value) = read_env("MEDVOICE_ELEVENLABS_BASE_URL") {
            self.tts.elevenlabs_base_url = value;
        }
        if let Some(value) = env_with_alias("MEDVOICE_ELEVENLABS_VOICE_ID", "ELEVENLABS_VOICE_ID")
        {
            self.tts.default_voice_id = value;
        }
        if let Some(value) = read_env("MEDVOICE_TTS_TIMEOUT_SECS") {
            self.tts.timeout_secs = parse_u64("MEDVOICE_TTS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MEDVOICE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = env_with_alias("MEDVOICE_SERVER_PORT", "PORT") {
            self.server.port = parse_u16("MEDVOICE_SERVER_PORT", &value)?;
        }
        if let Some(value) = env_with_alias("MEDVOICE_SERVER_CORS_ORIGIN", "CORS_ORIGIN") {
            self.server.cors_origin = value;
        }
        if let Some(value) = read_env("MEDVOICE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("MEDVOICE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = env_with_alias("MEDVOICE_LOGGING_LEVEL", "MEDVOICE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = env_with_alias("MEDVOICE_LOGGING_FORMAT", "MEDVOICE_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(mock_responses) = overrides.mock_responses {
            self.ai.mock_responses = mock_responses;
        }
        if let Some(key) = overrides.openai_api_key {
            self.ai.openai_api_key = secret_value(key);
        }
        if let Some(key) = overrides.anthropic_api_key {
            self.ai.anthropic_api_key = secret_value(key);
        }
        if let Some(key) = overrides.elevenlabs_api_key {
            self.tts.elevenlabs_api_key = secret_value(key);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_ai(&self.ai)?;
        validate_tts(&self.tts)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl AiConfig {
    pub fn has_openai_key(&self) -> bool {
        has_secret(self.openai_api_key.as_ref())
    }

    pub fn has_anthropic_key(&self) -> bool {
        has_secret(self.anthropic_api_key.as_ref())
    }
}

impl TtsConfig {
    pub fn has_elevenlabs_key(&self) -> bool {
        has_secret(self.elevenlabs_api_key.as_ref())
    }
}

fn has_secret(secret: Option<&SecretString>) -> bool {
    secret.map(|value| !value.expose_secret().trim().is_empty()).unwrap_or(false)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("medvoice.toml"), PathBuf::from("config/medvoice.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_ai(ai: &AiConfig) -> Result<(), ConfigError> {
    if ai.timeout_secs == 0 || ai.timeout_secs > 300 {
        return Err(ConfigError::Validation("ai.timeout_secs must be in range 1..=300".to_string()));
    }

    validate_http_url("ai.openai_base_url", &ai.openai_base_url)?;
    validate_http_url("ai.anthropic_base_url", &ai.anthropic_base_url)?;

    Ok(())
}

fn validate_tts(tts: &TtsConfig) -> Result<(), ConfigError> {
    if tts.timeout_secs == 0 || tts.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "tts.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if tts.default_voice_id.trim().is_empty() {
        return Err(ConfigError::Validation("tts.default_voice_id must not be empty".to_string()));
    }

    validate_http_url("tts.elevenlabs_base_url", &tts.elevenlabs_base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    validate_http_url("server.cors_origin", &server.cors_origin)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_with_alias(primary: &str, alias: &str) -> Option<String> {
    read_env(primary).or_else(|| read_env(alias))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    ai: Option<AiPatch>,
    tts: Option<TtsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AiPatch {
    openai_api_key: Option<String>,
    openai_organization_id: Option<String>,
    openai_base_url: Option<String>,
    anthropic_api_key: Option<String>,
    anthropic_base_url: Option<String>,
    mock_responses: Option<bool>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TtsPatch {
    elevenlabs_api_key: Option<String>,
    elevenlabs_base_url: Option<String>,
    default_voice_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    cors_origin: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
