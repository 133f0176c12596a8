//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::application::errors::ConfigError;
use crate::plugins::PluginDefaults;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub server: ServerConfig,
    pub bot: BotConfig,
    pub plugins: PluginConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Sent as the websocket `Origin` header
    pub origin: String,
    pub login_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub nick: String,
    /// Empty means log in as an unregistered name
    pub password: String,
    pub avatar: Option<u32>,
    /// Rooms to join after login
    pub rooms: Vec<String>,
    pub messages_per_second: f64,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PluginConfig {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub case_insensitive: bool,
    pub ignore_chat: bool,
    pub ignore_private: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "sim.smogon.com".to_string(),
            port: 8000,
            path: "/showdown/websocket".to_string(),
            origin: "https://play.pokemonshowdown.com".to_string(),
            login_url: "https://play.pokemonshowdown.com/action.php".to_string(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nick: String::new(),
            password: String::new(),
            avatar: None,
            rooms: vec!["lobby".to_string()],
            messages_per_second: 3.0,
            queue_capacity: 128,
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".to_string()],
            suffixes: Vec::new(),
            case_insensitive: false,
            ignore_chat: false,
            ignore_private: false,
        }
    }
}

impl Config {
    /// Read a YAML file and overlay the environment. Callers validate once
    /// every override is applied.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::Parse(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Ok(Self::parse_yaml(&content)?.with_env())
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse_yaml(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overlay values from environment variables
    pub fn with_env(mut self) -> Self {
        if let Ok(nick) = std::env::var("BOT_NICK") {
            self.bot.nick = nick;
        }

        if let Ok(password) = std::env::var("BOT_PASSWORD") {
            self.bot.password = password;
        }

        if let Ok(host) = std::env::var("BOT_SERVER") {
            self.server.host = host;
        }

        self
    }

    pub fn load_env() -> Self {
        Config::default().with_env()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.nick.trim().is_empty() {
            return Err(ConfigError::MissingField("bot.nick".to_string()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::MissingField("server.host".to_string()));
        }
        let mps = self.bot.messages_per_second;
        if mps.is_nan() || mps.is_infinite() || mps <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "bot.messages-per-second must be positive, got {}",
                self.bot.messages_per_second
            )));
        }
        if self.bot.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "bot.queue-capacity must be positive".to_string(),
            ));
        }
        if let Some(avatar) = self.bot.avatar {
            if !(1..=294).contains(&avatar) {
                return Err(ConfigError::InvalidValue(format!(
                    "bot.avatar out of range: {}",
                    avatar
                )));
            }
        }
        Ok(())
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}:{}{}", self.server.host, self.server.port, self.server.path)
    }

    /// Pause between two outbound messages: `ceil(1000 / messages-per-second)` ms
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis((1000.0 / self.bot.messages_per_second).ceil() as u64)
    }

    pub fn plugin_defaults(&self) -> PluginDefaults {
        PluginDefaults {
            prefixes: self.plugins.prefixes.clone(),
            suffixes: self.plugins.suffixes.clone(),
            case_insensitive: self.plugins.case_insensitive,
        }
    }

    /// Whether `room` is one of the configured auto-join rooms
    pub fn is_configured_room(&self, room: &str) -> bool {
        let id = crate::domain::entities::sanitize(room);
        self.bot.rooms.iter().any(|r| crate::domain::entities::sanitize(r) == id)
    }
}
