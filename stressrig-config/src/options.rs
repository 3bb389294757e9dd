//! Action option bags
//!
//! Each entry of a test suite is an untyped JSON object such as
//! `{"Action": "scale", "Pod": "receiver", "Units": 3}`. [`ActionOptions`]
//! gives typed access to its keys; action construction turns every access
//! failure into a build error before anything runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Option access errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("key {key:?} not found")]
    Missing { key: String },

    #[error("key {key:?} has value '{value}' which is not a string")]
    NotAString { key: String, value: String },

    #[error("key {key:?} has value '{value}' which is not a duration string")]
    NotADurationString { key: String, value: String },

    #[error("key {key:?} has value '{value}' which is not a duration: {reason}")]
    InvalidDuration {
        key: String,
        value: String,
        reason: String,
    },

    #[error("key {key:?} has value '{value}' which is not an integer")]
    NotAnInteger { key: String, value: String },

    #[error("key {key:?} has value '{value}' which is out of range")]
    OutOfRange { key: String, value: String },
}

/// Untyped options of one action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionOptions(Map<String, Value>);

impl ActionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful for tests
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    fn get(&self, key: &str) -> Result<&Value, OptionError> {
        self.0.get(key).ok_or_else(|| OptionError::Missing {
            key: key.to_string(),
        })
    }

    pub fn get_string(&self, key: &str) -> Result<&str, OptionError> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| OptionError::NotAString {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Read a human duration such as `"50ms"` or `"1m30s"`
    pub fn get_duration(&self, key: &str) -> Result<Duration, OptionError> {
        let value = self.get(key)?;
        let s = value
            .as_str()
            .ok_or_else(|| OptionError::NotADurationString {
                key: key.to_string(),
                value: value.to_string(),
            })?;
        humantime::parse_duration(s.trim()).map_err(|e| OptionError::InvalidDuration {
            key: key.to_string(),
            value: s.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read an integer given either as a JSON number or a decimal string
    pub fn get_int(&self, key: &str) -> Result<i64, OptionError> {
        let value = self.get(key)?;
        let not_an_integer = || OptionError::NotAnInteger {
            key: key.to_string(),
            value: value.to_string(),
        };
        match value {
            Value::Number(n) => n.as_i64().ok_or_else(not_an_integer),
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_an_integer()),
            _ => Err(not_an_integer()),
        }
    }

    /// Read a non-negative count
    pub fn get_count(&self, key: &str) -> Result<u32, OptionError> {
        let n = self.get_int(key)?;
        u32::try_from(n).map_err(|_| OptionError::OutOfRange {
            key: key.to_string(),
            value: n.to_string(),
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl From<Map<String, Value>> for ActionOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
