//! Configuration file parsing (HOCON format).

use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use hocon::HoconLoader;

/// Load configuration from a HOCON file.
///
/// A missing file yields the default configuration so the bridge can be
/// driven entirely from environment variables.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    load_config_str(&content)
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_load_config_str_full() {
        let config = assert_ok!(load_config_str(
            r#"
            signal {
              api-url = "http://signal:8080"
              phone-number = "+15550001111"
              group-id = "group.YWJj"
            }
            game {
              api-url = "http://frm:8082"
              access-token = "secret"
            }
            bridge {
              bot-name = "Relay"
              debounce-secs = 30
              sent-capacity = 50
            }
            server {
              host = "play.example.com"
              port = 15777
              api-url = "https://play.example.com:7777"
              api-token = "ey.token"
            }
            "#,
        ));

        assert_eq!(config.signal.api_url, "http://signal:8080");
        assert_eq!(config.signal.phone_number, "+15550001111");
        assert_eq!(config.signal.group_id.as_deref(), Some("group.YWJj"));
        assert_eq!(config.game.access_token, "secret");
        assert_eq!(config.bridge.bot_name, "Relay");
        assert_eq!(config.bridge.debounce_secs, 30);
        assert_eq!(config.bridge.sent_capacity, 50);
        assert_eq!(config.server.port, 15777);
        assert_eq!(config.server.api_url, "https://play.example.com:7777");
        assert_eq!(config.server.api_token, "ey.token");
    }

    #[test]
    fn test_load_config_str_defaults() {
        let config = load_config_str(r#"signal { phone-number = "+15550001111" }"#).unwrap();

        assert_eq!(config.signal.api_url, "http://localhost:8080");
        assert_eq!(config.signal.group_id, None);
        assert_eq!(config.game.api_url, "http://localhost:8082");
        assert_eq!(config.bridge.bot_name, "SignalBot");
        assert_eq!(config.bridge.command_prefix, "/");
        assert_eq!(config.bridge.seen_capacity, 1000);
        assert_eq!(config.bridge.debounce_secs, 60);
        assert_eq!(config.server.port, 7777);
        assert!(!config.server.api_enabled());
    }

    #[test]
    fn test_load_config_missing_file() {
        let config = assert_ok!(load_config("/nonexistent/ficsit-relay.conf"));
        assert_eq!(config.bridge.bot_name, "SignalBot");
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("ficsit-relay-{}.conf", std::process::id()));
        std::fs::write(&path, "game { api-url = \"http://frm:8082\" }").unwrap();

        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap();

        let config = assert_ok!(result);
        assert_eq!(config.game.api_url, "http://frm:8082");
    }

    #[test]
    fn test_load_config_str_invalid() {
        let error = assert_err!(load_config_str("signal { phone-number = "));
        assert!(matches!(error, ConfigError::ParseError { .. }));
    }
}
