//! Process configuration read from environment variables.

use std::fmt;
use std::path::PathBuf;

/// Admin used for /stats when ADMIN_ID is not set.
const DEFAULT_ADMIN_ID: u64 = 6368916881;

/// Errors that can occur when reading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    Missing(&'static str),
    /// A variable is present but malformed.
    Invalid { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => {
                write!(f, "required environment variable {name} is not set")
            }
            Self::Invalid { name, reason } => {
                write!(f, "environment variable {name} is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub bot_token: String,
    pub gemini_api_key: String,
    /// The only user allowed to run /stats.
    pub admin_id: u64,
    /// Directory for the record store and log file.
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = get("BOT_TOKEN")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Invalid {
                name: "BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let gemini_api_key = get("GEMINI_API_KEY")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let admin_id = match get("ADMIN_ID") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "ADMIN_ID",
                reason: format!("not a numeric user id: '{v}'"),
            })?,
            None => DEFAULT_ADMIN_ID,
        };

        let data_dir = get("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            bot_token,
            gemini_api_key,
            admin_id,
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|name| map.get(name).map(|v| v.to_string()))
    }

    fn assert_err(result: Result<Config, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = load(&[
            ("BOT_TOKEN", "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"),
            ("GEMINI_API_KEY", "AIzaSyTest"),
        ])
        .expect("should load valid config");
        assert_eq!(config.admin_id, DEFAULT_ADMIN_ID);
        assert_eq!(config.data_dir, PathBuf::from("."));
    }

    #[test]
    fn test_missing_bot_token() {
        let err = assert_err(load(&[("GEMINI_API_KEY", "AIzaSyTest")]));
        assert!(matches!(err, ConfigError::Missing("BOT_TOKEN")));
    }

    #[test]
    fn test_empty_gemini_key() {
        let err = assert_err(load(&[
            ("BOT_TOKEN", "123456789:ABCdef"),
            ("GEMINI_API_KEY", ""),
        ]));
        assert!(matches!(err, ConfigError::Missing("GEMINI_API_KEY")));
    }

    #[test]
    fn test_invalid_token_no_colon() {
        let err = assert_err(load(&[
            ("BOT_TOKEN", "invalid_token_no_colon"),
            ("GEMINI_API_KEY", "AIzaSyTest"),
        ]));
        assert!(matches!(err, ConfigError::Invalid { name: "BOT_TOKEN", .. }));
    }

    #[test]
    fn test_invalid_token_non_numeric_id() {
        let err = assert_err(load(&[
            ("BOT_TOKEN", "notanumber:ABCdef"),
            ("GEMINI_API_KEY", "AIzaSyTest"),
        ]));
        assert!(matches!(err, ConfigError::Invalid { name: "BOT_TOKEN", .. }));
    }

    #[test]
    fn test_admin_id_override() {
        let config = load(&[
            ("BOT_TOKEN", "123456789:ABCdef"),
            ("GEMINI_API_KEY", "AIzaSyTest"),
            ("ADMIN_ID", "42"),
        ])
        .unwrap();
        assert_eq!(config.admin_id, 42);
    }

    #[test]
    fn test_admin_id_not_numeric() {
        let err = assert_err(load(&[
            ("BOT_TOKEN", "123456789:ABCdef"),
            ("GEMINI_API_KEY", "AIzaSyTest"),
            ("ADMIN_ID", "admin"),
        ]));
        assert!(matches!(err, ConfigError::Invalid { name: "ADMIN_ID", .. }));
    }

    #[test]
    fn test_data_dir_override() {
        let config = load(&[
            ("BOT_TOKEN", "123456789:ABCdef"),
            ("GEMINI_API_KEY", "AIzaSyTest"),
            ("DATA_DIR", "/var/lib/stlnbot"),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/stlnbot"));
    }
}
