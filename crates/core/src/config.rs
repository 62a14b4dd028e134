use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_center_id")]
    pub center_id: String,
    /// Primary account used for the daily schedule check.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn default_base_url() -> String {
    "https://app.heitzfit.com".to_string()
}

fn default_center_id() -> String {
    "4831".to_string()
}

impl SiteConfig {
    pub fn login_url(&self) -> String {
        format!("{}/?center={}", self.base_url, self.center_id)
    }

    pub fn planning_url(&self) -> String {
        format!("{}/#/planning/browse", self.base_url)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            center_id: default_center_id(),
            email: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    /// How many days ahead the target date lies (booking horizon).
    #[serde(default = "default_target_day_offset")]
    pub target_day_offset: i64,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    #[serde(default = "default_degraded_retry_interval_secs")]
    pub degraded_retry_interval_secs: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// Daily operating window, local time, "HH:MM".
    #[serde(default = "default_window_start")]
    pub window_start: String,
    #[serde(default = "default_window_end")]
    pub window_end: String,
}

fn default_target_day_offset() -> i64 {
    6
}

fn default_retry_interval_secs() -> u64 {
    30
}

fn default_degraded_retry_interval_secs() -> u64 {
    300
}

fn default_max_consecutive_errors() -> u32 {
    2
}

fn default_window_start() -> String {
    "07:00".to_string()
}

fn default_window_end() -> String {
    "21:00".to_string()
}

impl CheckConfig {
    pub fn window(&self) -> Result<(NaiveTime, NaiveTime)> {
        let start = parse_time(&self.window_start)?;
        let end = parse_time(&self.window_end)?;
        Ok((start, end))
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| Error::Config(format!("invalid time '{}': {}", s, e)))
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            target_day_offset: default_target_day_offset(),
            retry_interval_secs: default_retry_interval_secs(),
            degraded_retry_interval_secs: default_degraded_retry_interval_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
            window_start: default_window_start(),
            window_end: default_window_end(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Upper bound for a single page action (wait, click, fill), in ms.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: i32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: i32,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_headless() -> bool {
    true
}

fn default_action_timeout_ms() -> u64 {
    60_000
}

fn default_viewport_width() -> i32 {
    1920
}

fn default_viewport_height() -> i32 {
    1080
}

fn default_locale() -> String {
    "fr-FR".to_string()
}

fn default_timezone() -> String {
    "Europe/Paris".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            action_timeout_ms: default_action_timeout_ms(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            locale: default_locale(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_webhook_username")]
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
}

fn default_webhook_username() -> String {
    "BiscoteGirl".to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            username: default_webhook_username(),
            avatar_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_weather_city")]
    pub city: String,
}

fn default_weather_city() -> String {
    "Valenciennes".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            city: default_weather_city(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Required settings for the check loop; a clear message beats a
    /// cryptic selector timeout later on.
    pub fn validate(&self) -> Result<()> {
        if self.site.email.is_empty() || self.site.password.is_empty() {
            return Err(Error::Config(
                "site.email and site.password must be set".to_string(),
            ));
        }
        if self.discord.enabled && self.discord.webhook_url.is_empty() {
            return Err(Error::Config(
                "discord.enabled is true but discord.webhookUrl is empty".to_string(),
            ));
        }
        self.check.window()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.check.target_day_offset, 6);
        assert_eq!(config.check.max_consecutive_errors, 2);
        assert_eq!(config.check.window_start, "07:00");
        assert!(config.browser.headless);
        assert_eq!(config.browser.locale, "fr-FR");
        assert_eq!(config.site.login_url(), "https://app.heitzfit.com/?center=4831");
    }

    #[test]
    fn test_window_parse() {
        let config = Config::default();
        let (start, end) = config.check.window().unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.site.email = "a@b.fr".to_string();
        config.site.password = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"site": {"email": "a@b.fr", "password": "x"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.site.email, "a@b.fr");
        assert_eq!(config.check.retry_interval_secs, 30);
        assert_eq!(config.weather.city, "Valenciennes");
    }
}
