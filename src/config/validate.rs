//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

const PLACEHOLDER_PHONE: &str = "+1234567890";
const PLACEHOLDER_TOKEN: &str = "YOUR_FRM_TOKEN_HERE";

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Signal
    if config.signal.phone_number.is_empty() {
        errors.push("signal.phone-number is required".to_string());
    }
    if config.signal.phone_number == PLACEHOLDER_PHONE {
        errors.push(
            "signal.phone-number has not been configured (still using placeholder)".to_string(),
        );
    }
    if config.signal.api_url.is_empty() {
        errors.push("signal.api-url is required".to_string());
    }

    // Game; the token only matters once group bridging is on
    if config.signal.group_id.is_some() && config.game.access_token.is_empty() {
        errors.push("game.access-token is required for group chat bridging".to_string());
    }
    if config.game.access_token == PLACEHOLDER_TOKEN {
        errors.push(
            "game.access-token has not been configured (still using placeholder)".to_string(),
        );
    }
    if config.game.api_url.is_empty() {
        errors.push("game.api-url is required".to_string());
    }

    // Dedicated server API; both halves or neither
    let server = &config.server;
    if !server.api_url.is_empty() && server.api_token.is_empty() {
        errors.push("server.api-token is required when server.api-url is set".to_string());
    }
    if server.api_url.is_empty() && !server.api_token.is_empty() {
        errors.push("server.api-url is required when server.api-token is set".to_string());
    }

    // Bridge
    let bridge = &config.bridge;
    if bridge.bot_name.trim().is_empty() {
        errors.push("bridge.bot-name must not be empty".to_string());
    }
    if bridge.command_prefix.is_empty() {
        errors.push("bridge.command-prefix must not be empty".to_string());
    }
    for (name, value) in [
        ("poll-interval-secs", bridge.poll_interval_secs),
        ("game-poll-interval-secs", bridge.game_poll_interval_secs),
        ("presence-interval-secs", bridge.presence_interval_secs),
        ("debounce-secs", bridge.debounce_secs),
    ] {
        if value == 0 {
            errors.push(format!("bridge.{} must be positive", name));
        }
    }
    for (name, value) in [
        ("seen-capacity", bridge.seen_capacity),
        ("sent-capacity", bridge.sent_capacity),
    ] {
        if value < 2 {
            errors.push(format!("bridge.{} must be at least 2 (got {})", name, value));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
