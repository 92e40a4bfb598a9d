use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::platform::ChannelType;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bot: BotConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub roles: RolesConfig,
    /// username → `MM-DD`
    #[serde(default)]
    pub birthdays: HashMap<String, String>,
    #[serde(default)]
    pub censor: CensorConfig,
    #[serde(default = "default_scheduler_config")]
    pub scheduler: SchedulerConfig,
    /// Free-form values read through [`ConfigSource`]
    #[serde(default)]
    pub settings: toml::Table,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Canonical name used for mentions, without the leading `@`
    pub name: String,
    #[serde(default = "default_mention_probability")]
    pub mention_probability: f64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default)]
    pub system_log_marker: Option<String>,
    /// Phrases the mention command answers with
    #[serde(default = "default_replies")]
    pub replies: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_telegram_max_length")]
    pub max_message_length: usize,
    /// chat id → classification; unknown chats are `general`
    #[serde(default)]
    pub channels: HashMap<String, ChannelType>,
    #[serde(default)]
    pub shortener_url: Option<String>,
}

impl TelegramConfig {
    pub fn channel_type(&self, chat_id: i64) -> ChannelType {
        self.channels
            .get(&chat_id.to_string())
            .copied()
            .unwrap_or_default()
    }

    /// Chats with the given classification, skipping keys that are not chat ids.
    pub fn chats_of_type(&self, channel_type: ChannelType) -> Vec<i64> {
        let mut chats: Vec<i64> = self
            .channels
            .iter()
            .filter(|(_, t)| **t == channel_type)
            .filter_map(|(id, _)| id.parse().ok())
            .collect();
        chats.sort_unstable();
        chats
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RolesConfig {
    #[serde(default)]
    pub administrators: Vec<String>,
    #[serde(default)]
    pub moderators: Vec<String>,
    #[serde(default)]
    pub ignored: Vec<String>,
    #[serde(default)]
    pub bots: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CensorConfig {
    #[serde(default)]
    pub words: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_birthday_hour")]
    pub birthday_hour: u32,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default)]
    pub announcements: Vec<AnnouncementConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnouncementConfig {
    pub chat_id: i64,
    pub text: String,
    pub interval_secs: u64,
}

fn default_mention_probability() -> f64 {
    0.005
}

fn default_history_capacity() -> usize {
    10
}

fn default_replies() -> Vec<String> {
    vec![
        "Я здесь!".to_string(),
        "Слушаю.".to_string(),
        "Интересно, продолжай.".to_string(),
    ]
}

fn default_enabled() -> bool {
    true
}

fn default_telegram_max_length() -> usize {
    4096
}

fn default_birthday_hour() -> u32 {
    9
}

fn default_heartbeat_secs() -> u64 {
    3600
}

fn default_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        birthday_hour: default_birthday_hour(),
        heartbeat_secs: default_heartbeat_secs(),
        announcements: Vec::new(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        if config.scheduler.birthday_hour > 23 {
            anyhow::bail!(
                "scheduler.birthday_hour must be between 0 and 23, got {}",
                config.scheduler.birthday_hour
            );
        }
        if !(0.0..=1.0).contains(&config.bot.mention_probability) {
            anyhow::bail!(
                "bot.mention_probability must be between 0 and 1, got {}",
                config.bot.mention_probability
            );
        }

        Ok(config)
    }

    pub fn telegram_enabled(&self) -> Option<&TelegramConfig> {
        self.telegram.as_ref().filter(|t| t.enabled)
    }
}

/// Typed lookup of free-form configuration values.
pub trait ConfigSource {
    fn raw_value(&self, key: &str) -> Option<toml::Value>;

    fn get_config_value<T: DeserializeOwned>(&self, key: &str) -> Result<T>
    where
        Self: Sized,
    {
        let value = self
            .raw_value(key)
            .with_context(|| format!("Missing config value: {}", key))?;
        value
            .try_into()
            .with_context(|| format!("Invalid config value: {}", key))
    }
}

impl ConfigSource for Config {
    /// Dotted keys walk nested tables: `birthday.template`.
    fn raw_value(&self, key: &str) -> Option<toml::Value> {
        let mut parts = key.split('.');
        let mut current = self.settings.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [bot]
        name = "PolyBot"

        [telegram]
        bot_token = "123:abc"
        channels = { "-100" = "administrative", "-200" = "announce", "-300" = "announce", "oops" = "announce" }

        [roles]
        administrators = ["boss"]

        [birthdays]
        alice = "10-16"

        [settings]
        greeting = "Привет"
        limits = { reminders = 5 }
    "#;

    #[test]
    fn parses_with_defaults() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.bot.name, "PolyBot");
        assert_eq!(config.bot.history_capacity, 10);
        assert!((config.bot.mention_probability - 0.005).abs() < f64::EPSILON);
        assert_eq!(config.scheduler.birthday_hour, 9);

        let telegram = config.telegram_enabled().unwrap();
        assert_eq!(telegram.max_message_length, 4096);
        assert_eq!(telegram.channel_type(-100), ChannelType::Administrative);
        assert_eq!(telegram.channel_type(-999), ChannelType::General);
        assert_eq!(telegram.chats_of_type(ChannelType::Announce), vec![-300, -200]);
    }

    #[test]
    fn config_values_are_typed() {
        let config = Config::parse(SAMPLE).unwrap();
        let greeting: String = config.get_config_value("greeting").unwrap();
        assert_eq!(greeting, "Привет");
        let reminders: u32 = config.get_config_value("limits.reminders").unwrap();
        assert_eq!(reminders, 5);
        assert!(config.get_config_value::<u32>("greeting").is_err());
        assert!(config.get_config_value::<String>("missing").is_err());
    }

    #[test]
    fn rejects_out_of_range_hour() {
        let content = format!("{}\n[scheduler]\nbirthday_hour = 24\n", SAMPLE);
        assert!(Config::parse(&content).is_err());
    }
}
