//! Configuration parsing and types.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

pub use env::{apply_env_overrides, get_config_path};
pub use parser::load_config;
pub use types::*;
pub use validate::validate_config;

use crate::common::error::ConfigError;

/// Load the config file, apply environment overrides and validate the result.
pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    let config = apply_env_overrides(load_config(path)?);
    validate_config(&config)?;
    Ok(config)
}
