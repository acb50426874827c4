//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable for [`QueueOptions::delay_between_items`], in milliseconds.
pub const DELAY_BETWEEN_ITEMS_ENV: &str = "TABQUEUE_DELAY_BETWEEN_ITEMS_MS";

/// Environment variable for [`QueueOptions::action_timeout`], in milliseconds.
pub const ACTION_TIMEOUT_ENV: &str = "TABQUEUE_ACTION_TIMEOUT_MS";

/// Pacing and timeout settings for a [`TaskQueue`](super::TaskQueue).
///
/// Serialized with millisecond fields:
/// `{"delay_between_items_ms": 1000, "action_timeout_ms": 30000}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    /// Baseline delay between two consecutive tasks. Not applied to the first
    /// task, nor after a task that was rejected.
    #[serde(rename = "delay_between_items_ms", with = "millis", default)]
    pub delay_between_items: Duration,

    /// Upper bound on a single action's run time. `None` means an action may
    /// run forever and stall the queue.
    #[serde(rename = "action_timeout_ms", with = "opt_millis", default)]
    pub action_timeout: Option<Duration>,
}

impl QueueOptions {
    pub fn new(delay_between_items: Duration) -> Self {
        Self {
            delay_between_items,
            action_timeout: None,
        }
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = Some(timeout);
        self
    }

    /// Load options from the process environment.
    ///
    /// Environment variables:
    /// - `TABQUEUE_DELAY_BETWEEN_ITEMS_MS`: inter-item delay (default: 0)
    /// - `TABQUEUE_ACTION_TIMEOUT_MS`: per-action timeout (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = lookup(DELAY_BETWEEN_ITEMS_ENV) {
            options.delay_between_items = parse_millis(DELAY_BETWEEN_ITEMS_ENV, &value)?;
        }

        if let Some(value) = lookup(ACTION_TIMEOUT_ENV)
            && !value.trim().is_empty()
        {
            let timeout = parse_millis(ACTION_TIMEOUT_ENV, &value)?;
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    var: ACTION_TIMEOUT_ENV.to_string(),
                    value,
                    reason: "timeout must be greater than zero".to_string(),
                });
            }
            options.action_timeout = Some(timeout);
        }

        Ok(options)
    }
}

fn parse_millis(var: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// `Duration` as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
