use chrono_tz::Tz;
use cron::Schedule;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

/// Which completion backend answers chat-mode messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAi,
    /// Any OpenAI-compatible endpoint at `ai.base_url`.
    Custom,
    Disabled,
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "custom" => Ok(Self::Custom),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(format!("unknown AI provider '{other}' (expected openai, custom or disabled)")),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct AiSection {
    enabled: bool,
    provider: AiProvider,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: AiProvider::OpenAi,
            api_key: String::new(),
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Limit and window for one role tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateTier {
    pub limit: u32,
    pub window_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Everyone who is not an admin, moderators included.
    pub default: RateTier,
    pub admin: RateTier,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default: RateTier { limit: 10, window_seconds: 60 },
            admin: RateTier { limit: 30, window_seconds: 60 },
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
    telegram_bot_token: String,
    admin_ids: Vec<i64>,
    moderator_ids: Vec<i64>,
    ai: AiSection,
    /// Directory for users.json, feedback.json, logs and transcripts.
    data_dir: String,
    rate_limit: RateLimitConfig,
    default_language: String,
    /// IANA timezone used for "at HH:MM" reminders and the daily digest.
    timezone: String,
    /// 7-field cron expression (sec min hour day month dow year).
    daily_digest_cron: String,
    broadcast_delay_ms: u64,
    contact_text: String,
    log_chat_id: Option<i64>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            admin_ids: Vec::new(),
            moderator_ids: Vec::new(),
            ai: AiSection::default(),
            data_dir: "data".to_string(),
            rate_limit: RateLimitConfig::default(),
            default_language: "en".to_string(),
            timezone: "UTC".to_string(),
            daily_digest_cron: DEFAULT_DIGEST_CRON.to_string(),
            broadcast_delay_ms: 100,
            contact_text: DEFAULT_CONTACT_TEXT.to_string(),
            log_chat_id: None,
        }
    }
}

const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_DIGEST_CRON: &str = "0 0 0 * * * *";
const DEFAULT_CONTACT_TEXT: &str =
    "For support or questions, reply to this bot with /feedback and an administrator will get back to you.";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider: AiProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub struct Config {
    pub telegram_bot_token: String,
    /// Static admin allow-list. Overrides whatever role is stored for the user.
    pub admin_ids: HashSet<i64>,
    /// Static moderator allow-list.
    pub moderator_ids: HashSet<i64>,
    pub ai: AiConfig,
    pub data_dir: PathBuf,
    pub rate_limit: RateLimitConfig,
    pub default_language: String,
    pub timezone: Tz,
    pub daily_digest: Schedule,
    /// Pause between two broadcast sends.
    pub broadcast_delay: Duration,
    pub contact_text: String,
    pub log_chat_id: Option<i64>,
}

impl Config {
    /// Load from a JSON file, then apply environment overrides.
    ///
    /// A missing file is not an error: every setting has a default except the
    /// bot token, which may come from `TELEGRAM_BOT_TOKEN`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = if config_path.exists() {
            Some(
                std::fs::read_to_string(&config_path)
                    .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?,
            )
        } else {
            None
        };
        Self::from_sources(&config_path, content.as_deref(), |key| std::env::var(key).ok())
    }

    fn from_sources<F>(path: &Path, content: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file: ConfigFile = match content {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })?,
            None => ConfigFile::default(),
        };
        apply_env(&mut file, env)?;
        Self::validate(file)
    }

    fn validate(file: ConfigFile) -> Result<Self, ConfigError> {
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token is required (set it in the config file or TELEGRAM_BOT_TOKEN)".into(),
            ));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let timezone: Tz = file
            .timezone
            .parse()
            .map_err(|_| ConfigError::Validation(format!("unknown timezone '{}'", file.timezone)))?;

        let daily_digest = Schedule::from_str(&file.daily_digest_cron).map_err(|e| {
            ConfigError::Validation(format!("invalid daily_digest_cron '{}': {}", file.daily_digest_cron, e))
        })?;

        if !(0.0..=2.0).contains(&file.ai.temperature) {
            return Err(ConfigError::Validation(format!(
                "ai.temperature must be between 0 and 2, got {}",
                file.ai.temperature
            )));
        }
        if file.ai.provider == AiProvider::Custom && file.ai.base_url == DEFAULT_AI_BASE_URL {
            return Err(ConfigError::Validation(
                "ai.base_url must point at the custom endpoint when ai.provider is 'custom'".into(),
            ));
        }
        for (name, tier) in [("default", file.rate_limit.default), ("admin", file.rate_limit.admin)] {
            if tier.window_seconds <= 0 {
                return Err(ConfigError::Validation(format!(
                    "rate_limit.{name}.window_seconds must be positive"
                )));
            }
        }

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            admin_ids: file.admin_ids.into_iter().collect(),
            moderator_ids: file.moderator_ids.into_iter().collect(),
            ai: AiConfig {
                enabled: file.ai.enabled,
                provider: file.ai.provider,
                api_key: file.ai.api_key,
                base_url: file.ai.base_url.trim_end_matches('/').to_string(),
                model: file.ai.model,
                temperature: file.ai.temperature,
                max_tokens: file.ai.max_tokens,
            },
            data_dir: PathBuf::from(file.data_dir),
            rate_limit: file.rate_limit,
            default_language: file.default_language,
            timezone,
            daily_digest,
            broadcast_delay: Duration::from_millis(file.broadcast_delay_ms),
            contact_text: file.contact_text,
            log_chat_id: file.log_chat_id,
        })
    }

    /// True if the ID is on the static admin allow-list.
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn is_listed_moderator(&self, user_id: i64) -> bool {
        self.moderator_ids.contains(&user_id)
    }
}

impl Default for Config {
    /// Defaults with an empty token; only useful for tests and tooling.
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            telegram_bot_token: String::new(),
            admin_ids: HashSet::new(),
            moderator_ids: HashSet::new(),
            ai: AiConfig {
                enabled: file.ai.enabled,
                provider: file.ai.provider,
                api_key: file.ai.api_key,
                base_url: file.ai.base_url,
                model: file.ai.model,
                temperature: file.ai.temperature,
                max_tokens: file.ai.max_tokens,
            },
            data_dir: PathBuf::from(file.data_dir),
            rate_limit: file.rate_limit,
            default_language: file.default_language,
            timezone: chrono_tz::UTC,
            daily_digest: Schedule::from_str(DEFAULT_DIGEST_CRON).expect("default digest cron is valid"),
            broadcast_delay: Duration::from_millis(file.broadcast_delay_ms),
            contact_text: file.contact_text,
            log_chat_id: None,
        }
    }
}

fn apply_env<F>(file: &mut ConfigFile, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
        file.telegram_bot_token = token.trim().to_string();
    }
    if let Some(ids) = non_empty("ADMIN_IDS") {
        file.admin_ids = parse_id_list("ADMIN_IDS", &ids)?;
    }
    if let Some(ids) = non_empty("MODERATOR_IDS") {
        file.moderator_ids = parse_id_list("MODERATOR_IDS", &ids)?;
    }
    if let Some(key) = non_empty("OPENAI_API_KEY") {
        file.ai.api_key = key;
    }
    if let Some(enabled) = non_empty("AI_ENABLED") {
        file.ai.enabled = enabled.trim().eq_ignore_ascii_case("true");
    }
    if let Some(provider) = non_empty("AI_PROVIDER") {
        file.ai.provider = provider.parse().map_err(ConfigError::Validation)?;
    }
    if let Some(model) = non_empty("AI_MODEL") {
        file.ai.model = model;
    }
    if let Some(dir) = non_empty("DATA_DIR") {
        file.data_dir = dir;
    }
    if let Some(lang) = non_empty("DEFAULT_LANGUAGE") {
        file.default_language = lang;
    }
    Ok(())
}

fn parse_id_list(key: &str, raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ConfigError::Validation(format!("{key} contains a non-numeric ID: '{s}'")))
        })
        .collect()
}
