//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `FICSIT_RELAY_SIGNAL_API_URL` - signal-cli-rest-api base URL
//! - `FICSIT_RELAY_SIGNAL_PHONE_NUMBER` - account the bridge runs as
//! - `FICSIT_RELAY_SIGNAL_GROUP_ID` - bridged group (empty disables bridging)
//! - `FICSIT_RELAY_GAME_API_URL` - Ficsit Remote Monitoring base URL
//! - `FICSIT_RELAY_GAME_ACCESS_TOKEN` - FRM authorization token
//! - `FICSIT_RELAY_BOT_NAME` - sender name used in game chat
//! - `FICSIT_RELAY_POLL_INTERVAL` - Signal long-poll timeout in seconds
//! - `FICSIT_RELAY_SERVER_HOST` / `_PORT` / `_PASSWORD` - `connect` details
//! - `FICSIT_RELAY_SERVER_API_URL` / `_API_TOKEN` - dedicated server API

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "FICSIT_RELAY";

/// Apply environment variable overrides to a config.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides_with(config, |key| {
        env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
    })
}

fn apply_overrides_with(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    // Signal
    if let Some(url) = lookup("SIGNAL_API_URL") {
        config.signal.api_url = url;
    }
    if let Some(number) = lookup("SIGNAL_PHONE_NUMBER") {
        config.signal.phone_number = number;
    }
    if let Some(group_id) = lookup("SIGNAL_GROUP_ID") {
        let group_id = group_id.trim();
        config.signal.group_id = (!group_id.is_empty()).then(|| group_id.to_string());
    }

    // Game
    if let Some(url) = lookup("GAME_API_URL") {
        config.game.api_url = url;
    }
    if let Some(token) = lookup("GAME_ACCESS_TOKEN") {
        config.game.access_token = token;
    }

    // Bridge
    if let Some(name) = lookup("BOT_NAME") {
        config.bridge.bot_name = name;
    }
    if let Some(interval) = lookup("POLL_INTERVAL") {
        if let Ok(secs) = interval.parse() {
            config.bridge.poll_interval_secs = secs;
        }
    }

    // Connect details
    if let Some(host) = lookup("SERVER_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("SERVER_PORT") {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }
    if let Some(password) = lookup("SERVER_PASSWORD") {
        config.server.password = password;
    }
    if let Some(url) = lookup("SERVER_API_URL") {
        config.server.api_url = url;
    }
    if let Some(token) = lookup("SERVER_API_TOKEN") {
        config.server.api_token = token;
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `FICSIT_RELAY_CONFIG`, otherwise returns "ficsit-relay.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "ficsit-relay.conf".to_string())
}
