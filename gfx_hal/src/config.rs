use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(io::Error),
    #[error(transparent)]
    Toml(toml::de::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub queues: Queues,
}

impl Config {
    pub fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).map_err(ConfigError::Io)?;

        let mut buf = String::new();
        file.read_to_string(&mut buf).map_err(ConfigError::Io)?;

        Self::from_toml(&buf)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Engine {
    /// Name of the engine thread.
    ///
    /// Defaults to `gfx-engine`.
    pub thread_name: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            thread_name: String::from("gfx-engine"),
        }
    }
}

/// Number of queues requested at startup per class.
///
/// Counts are validated against the backend and invalid ones are reported. Every class accepts
/// tasks regardless of the configured count.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Queues {
    pub compute: usize,
    pub transfer: usize,
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};

    #[test]
    fn empty_config_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.engine.thread_name, "gfx-engine");
    }

    #[test]
    fn parse_config() {
        let config = Config::from_toml(
            r#"
            [engine]
            thread_name = "render"

            [queues]
            compute = 1
            transfer = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.thread_name, "render");
        assert_eq!(config.queues.compute, 1);
        assert_eq!(config.queues.transfer, 0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::from_toml("[queues]\ngeneral = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
