use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use turboclip_types::zone::ViewerZone;

/// Placeholder tokens that MUST NOT be used.
const PLACEHOLDER_TOKENS: &[&str] = &["change-me", "your-bot-token"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do when a handler fails on the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageErrorPolicy {
    /// Stop the bot; a supervisor is expected to restart it.
    #[default]
    Halt,
    /// Log the failure, drop the request and keep serving.
    Continue,
}

impl FromStr for StorageErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "continue" => Ok(Self::Continue),
            _ => Err("expected `halt` or `continue`".into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub owner_id: i64,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub messages_path: PathBuf,
    pub api_url: String,
    /// Zone used to group highlights into days and months.
    pub tz: ViewerZone,
    pub on_storage_error: StorageErrorPolicy,
    pub max_backoff: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("TURBOCLIP_BOT_TOKEN").ok_or(ConfigError::Missing("TURBOCLIP_BOT_TOKEN"))?;
        if PLACEHOLDER_TOKENS.contains(&bot_token.as_str()) {
            return Err(ConfigError::Invalid {
                key: "TURBOCLIP_BOT_TOKEN",
                value: bot_token,
                reason: "still a placeholder".into(),
            });
        }

        let owner_id = parse(
            "TURBOCLIP_OWNER_ID",
            get("TURBOCLIP_OWNER_ID").ok_or(ConfigError::Missing("TURBOCLIP_OWNER_ID"))?,
        )?;

        let tz = match get("TURBOCLIP_TZ_OFFSET") {
            Some(v) => parse("TURBOCLIP_TZ_OFFSET", v)?,
            None => ViewerZone::Local,
        };

        let on_storage_error = match get("TURBOCLIP_ON_STORAGE_ERROR") {
            Some(v) => parse("TURBOCLIP_ON_STORAGE_ERROR", v)?,
            None => StorageErrorPolicy::default(),
        };

        let max_backoff = get("TURBOCLIP_MAX_BACKOFF_MS")
            .map(|v| parse::<u64>("TURBOCLIP_MAX_BACKOFF_MS", v))
            .transpose()?
            .map(Duration::from_millis);

        Ok(Self {
            bot_token,
            owner_id,
            db_path: get("TURBOCLIP_DB_PATH").unwrap_or_else(|| "bot.db".into()).into(),
            log_path: get("TURBOCLIP_LOG_PATH").unwrap_or_else(|| "log.txt".into()).into(),
            messages_path: get("TURBOCLIP_MESSAGES_PATH")
                .unwrap_or_else(|| "messages.json".into())
                .into(),
            api_url: get("TURBOCLIP_API_URL").unwrap_or_else(|| "https://api.telegram.org".into()),
            tz,
            on_storage_error,
            max_backoff,
        })
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
