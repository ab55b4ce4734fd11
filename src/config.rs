//! Configuration loader and validator for the chat notification core.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub notifications: Notifications,
}

/// Delayed-notification settings. The send delay seeds the runtime settings
/// store; operators can retune it live afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notifications {
    /// Debounce window in seconds: a sender's burst into one room collapses
    /// into a single notification once they stay quiet this long.
    pub send_delay_secs: u64,
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.notifications.send_delay_secs == 0 {
        return Err(ConfigError::Invalid(
            "notifications.send_delay_secs must be > 0",
        ));
    }
    Ok(())
}

/// Example YAML document matching the schema above.
pub fn example() -> &'static str {
    r#"notifications:
  send_delay_secs: 5
"#
}
