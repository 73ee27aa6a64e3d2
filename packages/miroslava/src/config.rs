use std::{collections::BTreeMap, path::Path};

use miroslava_env_utils::{ParseBoolError, option_env_bool};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEBUG_ENV: &str = "MIROSLAVA_DEBUG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Env(#[from] ParseBoolError),
    #[error("Config value for '{key}' is invalid: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Application configuration.
///
/// Known keys have typed fields. Any other key lands in `extra`, so a TOML
/// file like
///
/// ```toml
/// DEBUG = true
/// SERVER_NAME = "localhost:8080"
/// GREETING = "hello"
/// ```
///
/// fills `debug`, `server_name` and `extra["GREETING"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Config {
    pub debug: bool,
    pub application_root: String,
    pub server_name: Option<String>,
    pub json_compact: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            application_root: "/".to_string(),
            server_name: None,
            json_compact: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Defaults, with `DEBUG` taken from `MIROSLAVA_DEBUG` when it's set.
    ///
    /// # Errors
    ///
    /// * If `MIROSLAVA_DEBUG` isn't a recognizable boolean
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(debug) = option_env_bool(DEBUG_ENV)? {
            config.debug = debug;
        }
        Ok(config)
    }

    /// # Errors
    ///
    /// * If the input is not valid TOML or a known key has the wrong type
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// # Errors
    ///
    /// * If the file can't be read
    /// * If the file is not valid TOML or a known key has the wrong type
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    /// Override the keys present in the TOML file, keep the others.
    ///
    /// # Errors
    ///
    /// * If the file can't be read or parsed
    /// * If a known key has the wrong type
    pub fn merge_toml_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let input = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&input)?;
        for (key, value) in table {
            self.set(key, serde_json::to_value(value)?)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "DEBUG" => Some(Value::Bool(self.debug)),
            "APPLICATION_ROOT" => Some(Value::String(self.application_root.clone())),
            "SERVER_NAME" => self.server_name.clone().map(Value::String),
            "JSON_COMPACT" => self.json_compact.map(Value::Bool),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Set a key, checking the type of the known ones.
    ///
    /// # Errors
    ///
    /// * If a known key is given a value of the wrong type
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ConfigError> {
        let key = key.into();
        let value = value.into();

        let invalid = |key: &str, source| ConfigError::InvalidValue {
            key: key.to_string(),
            source,
        };

        match key.as_str() {
            "DEBUG" => self.debug = serde_json::from_value(value).map_err(|e| invalid(&key, e))?,
            "APPLICATION_ROOT" => {
                self.application_root = serde_json::from_value(value).map_err(|e| invalid(&key, e))?;
            }
            "SERVER_NAME" => {
                self.server_name = serde_json::from_value(value).map_err(|e| invalid(&key, e))?;
            }
            "JSON_COMPACT" => {
                self.json_compact = serde_json::from_value(value).map_err(|e| invalid(&key, e))?;
            }
            _ => {
                self.extra.insert(key, value);
            }
        }

        Ok(())
    }

    /// `SERVER_NAME` split into host and port.
    #[must_use]
    pub fn server_name_parts(&self) -> Option<(Option<&str>, Option<u16>)> {
        let server_name = self.server_name.as_deref().filter(|x| !x.is_empty())?;
        let (host, port) = server_name
            .split_once(':')
            .map_or((server_name, None), |(host, port)| (host, port.parse().ok()));
        Some((Some(host).filter(|x| !x.is_empty()), port))
    }
}
