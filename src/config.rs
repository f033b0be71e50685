use std::path::Path;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;

pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TICK_INTERVAL_ENV: &str = "ALERT_TICK_SECS";

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_price_base_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}

fn default_vs_currency() -> String {
    "usd".into()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Upper bound for a single price lookup.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            tick_interval_secs: default_tick_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl GeneralConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceConfig {
    #[serde(default = "default_price_base_url")]
    pub base_url: String,
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            base_url: default_price_base_url(),
            vs_currency: default_vs_currency(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// Long-poll duration passed to `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub bot_token: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
            bot_token: String::new(),
        }
    }
}

/// Load configuration from the optional TOML file at `path`, then apply
/// environment overrides and validate.
///
/// A `.env` file in the working directory is loaded first when present.
pub fn load(path: Option<&Path>) -> Result<AppConfig, Report<ConfigError>> {
    dotenvy::dotenv().ok();

    let mut config = match path {
        Some(path) => read_file(path)?,
        None => AppConfig::default(),
    };

    apply_env(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })
}

fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<(), Report<ConfigError>>
where
    F: Fn(&str) -> Option<String>,
{
    config.telegram.bot_token = lookup(BOT_TOKEN_ENV)
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            Report::new(ConfigError::MissingEnv {
                name: BOT_TOKEN_ENV.into(),
            })
        })?;

    if let Some(raw) = lookup(TICK_INTERVAL_ENV) {
        config.general.tick_interval_secs =
            raw.trim()
                .parse::<u64>()
                .change_context(ConfigError::Parse {
                    reason: format!("{TICK_INTERVAL_ENV} must be a whole number of seconds"),
                })
                .attach_with(|| format!("value: {raw}"))?;
    }

    Ok(())
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn invalid(field: &str) -> Result<(), Report<ConfigError>> {
    Err(Report::new(ConfigError::Validation {
        field: field.into(),
    }))
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.general.tick_interval_secs == 0 {
        return invalid("general.tick_interval_secs must be greater than zero");
    }
    if config.general.fetch_timeout_secs == 0 {
        return invalid("general.fetch_timeout_secs must be greater than zero");
    }
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return invalid("general.log_format must be \"text\" or \"json\"");
    }
    if config.price.base_url.trim().is_empty() {
        return invalid("price.base_url must not be empty");
    }
    if config.price.vs_currency.trim().is_empty() {
        return invalid("price.vs_currency must not be empty");
    }
    if config.telegram.api_url.trim().is_empty() {
        return invalid("telegram.api_url must not be empty");
    }
    if config.telegram.poll_timeout_secs == 0 {
        return invalid("telegram.poll_timeout_secs must be greater than zero");
    }
    Ok(())
}
