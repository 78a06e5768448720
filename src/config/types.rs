//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub signal: SignalConfig,
    pub game: GameConfig,
    pub bridge: BridgeConfig,
    pub server: ServerConfig,
}

/// signal-cli-rest-api connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SignalConfig {
    pub api_url: String,
    /// Account the bridge runs as, e.g. `+15551234567`.
    pub phone_number: String,
    /// Bridged group. Without it only direct-message commands work.
    pub group_id: Option<String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            phone_number: String::new(),
            group_id: None,
        }
    }
}

/// Ficsit Remote Monitoring endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GameConfig {
    pub api_url: String,
    pub access_token: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8082".to_string(),
            access_token: String::new(),
        }
    }
}

/// Bridge behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// Name the bridge posts under in game chat.
    pub bot_name: String,
    pub command_prefix: String,
    /// Long-poll timeout for Signal receive.
    pub poll_interval_secs: u64,
    pub game_poll_interval_secs: u64,
    pub presence_interval_secs: u64,
    pub debounce_secs: u64,
    pub seen_capacity: usize,
    pub sent_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bot_name: "SignalBot".to_string(),
            command_prefix: "/".to_string(),
            poll_interval_secs: 2,
            game_poll_interval_secs: 1,
            presence_interval_secs: 5,
            debounce_secs: 60,
            seen_capacity: 1000,
            sent_capacity: 100,
        }
    }
}

impl BridgeConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn game_poll_interval(&self) -> Duration {
        Duration::from_secs(self.game_poll_interval_secs)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_secs(self.presence_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }
}

/// The dedicated server itself: public connection details handed out by the
/// `connect` command, and the HTTPS API behind the admin commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// e.g. `https://factory.example:7777`. Empty disables the admin commands.
    pub api_url: String,
    /// Bearer token from `server.GenerateAPIToken`.
    pub api_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 7777,
            password: String::new(),
            api_url: String::new(),
            api_token: String::new(),
        }
    }
}

impl ServerConfig {
    /// Whether the dedicated server API is configured.
    pub fn api_enabled(&self) -> bool {
        !self.api_url.is_empty() && !self.api_token.is_empty()
    }
}
