//! Bot configuration, read once from the environment at startup

use oracle_core::{OracleError, Result, ServiceConfig, UserId};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub service: ServiceConfig,
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub poll_timeout_secs: u64,
    pub default_locale: String,
    pub admin_ids: Vec<UserId>,
    pub permission_timeout: Duration,
    pub deep_navigation_threshold: usize,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| OracleError::Config("TELEGRAM_BOT_TOKEN is required".to_string()))?;

        Ok(Self {
            service: ServiceConfig::from_lookup(&lookup)?,
            telegram_token,
            telegram_api_url: lookup("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string())
                .trim_end_matches('/')
                .to_string(),
            poll_timeout_secs: parse_number(&lookup, "POLL_TIMEOUT_SECS", 10)?,
            default_locale: lookup("DEFAULT_LOCALE").unwrap_or_else(|| "en".to_string()),
            admin_ids: parse_admin_ids(lookup("ADMIN_IDS").as_deref().unwrap_or(""))?,
            permission_timeout: Duration::from_millis(parse_number(
                &lookup,
                "PERMISSION_TIMEOUT_MS",
                3000,
            )?),
            deep_navigation_threshold: parse_number(&lookup, "DEEP_NAVIGATION_THRESHOLD", 8)?,
        })
    }
}

fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| OracleError::Config(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<UserId>()
                .map_err(|e| OracleError::Config(format!("Invalid ADMIN_IDS entry {:?}: {}", id, e)))
        })
        .collect()
}
