use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Chat-completions backends the agent can talk to. All of them speak the
/// OpenAI wire format; the provider only picks the default base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Groq,
    Gemini,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub provider: Provider,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub chat_model: String,
    pub stt_api_key: String,
    pub stt_base_url: String,
    pub stt_model: String,
    pub stt_language: String,
    pub tts_api_key: String,
    pub tts_base_url: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_format: String,
    pub tts_speed: f32,
    pub tts_chunk_size: usize,
    pub openweather_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub stt_timeout: Duration,
    pub agent_timeout: Duration,
    pub tts_timeout: Duration,
    pub tool_timeout: Duration,
    pub history_limit: usize,
    pub max_queued_turns: usize,
    pub ws_ping_interval: Duration,
    pub ws_idle_timeout: Duration,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn positive(name: &str, default: usize) -> Result<usize, ConfigError> {
    let value = parsed(name, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn seconds(name: &str, default: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(positive(name, default as usize)? as u64))
}

/// Uses `DATABASE_URL` when set, otherwise assembles a DSN from the `PG_*` parts.
fn database_url() -> Result<String, ConfigError> {
    if let Some(url) = optional("DATABASE_URL") {
        return Ok(url);
    }
    match (
        optional("PG_USER"),
        optional("PG_PASSWORD"),
        optional("PG_HOST"),
        optional("PG_DBNAME"),
    ) {
        (Some(user), Some(password), Some(host), Some(dbname)) => {
            let port = var_or("PG_PORT", "5432");
            Ok(format!(
                "postgres://{}:{}@{}:{}/{}",
                user, password, host, port, dbname
            ))
        }
        _ => Err(ConfigError::MissingVar(
            "DATABASE_URL (or PG_USER, PG_PASSWORD, PG_HOST and PG_DBNAME)".to_string(),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = database_url()?;

        let provider_str = var_or("LLM_PROVIDER", "openai");
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "groq" => Provider::Groq,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of openai, groq, gemini", other),
                ));
            }
        };
        let llm_base_url = var_or("LLM_BASE_URL", provider.default_base_url());

        let tts_speed: f32 = parsed("TTS_SPEED", 1.0)?;
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(ConfigError::InvalidValue(
                "TTS_SPEED".to_string(),
                format!("{} is outside 0.25..=4.0", tts_speed),
            ));
        }

        let ws_ping_interval = seconds("WS_PING_INTERVAL_SECS", 20)?;
        let ws_idle_timeout = seconds("WS_IDLE_TIMEOUT_SECS", 40)?;
        if ws_idle_timeout <= ws_ping_interval {
            return Err(ConfigError::InvalidValue(
                "WS_IDLE_TIMEOUT_SECS".to_string(),
                "must be longer than WS_PING_INTERVAL_SECS".to_string(),
            ));
        }

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            database_url,
            provider,
            llm_api_key: required("LLM_API_KEY")?,
            llm_base_url,
            chat_model: var_or("CHAT_MODEL", "gpt-4o"),
            stt_api_key: required("STT_API_KEY")?,
            stt_base_url: var_or("STT_BASE_URL", "https://api.groq.com/openai/v1"),
            stt_model: var_or("STT_MODEL", "whisper-large-v3-turbo"),
            stt_language: var_or("STT_LANGUAGE", "en"),
            tts_api_key: required("TTS_API_KEY")?,
            tts_base_url: var_or("TTS_BASE_URL", "https://api.openai.com/v1"),
            tts_model: var_or("TTS_MODEL", "tts-1"),
            tts_voice: var_or("TTS_VOICE", "alloy"),
            tts_format: var_or("TTS_FORMAT", "aac"),
            tts_speed,
            tts_chunk_size: positive("TTS_CHUNK_SIZE", 6144)?,
            openweather_api_key: optional("OPENWEATHER_API_KEY"),
            news_api_key: optional("NEWS_API_KEY"),
            stt_timeout: seconds("STT_TIMEOUT_SECS", 30)?,
            agent_timeout: seconds("AGENT_TIMEOUT_SECS", 60)?,
            tts_timeout: seconds("TTS_TIMEOUT_SECS", 30)?,
            tool_timeout: seconds("TOOL_TIMEOUT_SECS", 10)?,
            history_limit: parsed("HISTORY_LIMIT", 20)?,
            max_queued_turns: positive("MAX_QUEUED_TURNS", 1)?,
            ws_ping_interval,
            ws_idle_timeout,
            log_level,
            prompts_path: std::env::var("PROMPTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./prompts")),
        })
    }
}
