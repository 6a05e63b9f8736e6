//! Environment variable helpers shared by every config loader.

use std::env;
use std::str::FromStr;

use quota_core::ConfigError;

/// Parse an optional variable; a present but malformed value is an error.
pub fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(format!("{name} has invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

/// Parse an optional boolean flag (`true`/`1`/`yes`, `false`/`0`/`no`).
pub fn parse_flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::invalid(format!("{name} has invalid value '{raw}'"))),
        },
        Err(_) => Ok(default),
    }
}
