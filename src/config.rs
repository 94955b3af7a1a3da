// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch platform configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};
use crate::event::DEFAULT_CHANNEL_CAPACITY;

/// Default wait after turning on a prerequisite before writing the target.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Default interval between polls of polled switches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for a [`SwitchPlatform`](crate::platform::SwitchPlatform).
///
/// Every field is optional when deserializing; missing fields take their
/// defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use echonet_switch::config::PlatformConfig;
///
/// let config = PlatformConfig::from_json(r#"{ "poll_interval_secs": 60 }"#).unwrap();
/// assert_eq!(config.poll_interval(), Duration::from_secs(60));
/// assert_eq!(config.settle_delay(), Duration::from_secs(3));
///
/// let config = PlatformConfig::new().with_settle_delay(Duration::from_millis(500));
/// assert_eq!(config.settle_delay_ms, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Wait after turning on a prerequisite, in milliseconds.
    pub settle_delay_ms: u64,
    /// Interval between polls, in seconds.
    pub poll_interval_secs: u64,
    /// Capacity of the event bus.
    pub event_capacity: usize,
}

impl PlatformConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) wrapping
    /// [`ParseError::Json`] if the document is malformed, or
    /// [`ParseError::InvalidValue`] if a value is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(ParseError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] for a zero poll interval or a
    /// zero event capacity.
    pub fn validate(&self) -> std::result::Result<(), ParseError> {
        if self.poll_interval_secs == 0 {
            return Err(ParseError::InvalidValue {
                field: "poll_interval_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ParseError::InvalidValue {
                field: "event_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Sets the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the poll interval. Sub-second parts are dropped and the result
    /// is clamped to at least one second.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs().max(1);
        self
    }

    /// Sets the event bus capacity (at least 1).
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Returns the settle delay.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: u64::try_from(DEFAULT_SETTLE_DELAY.as_millis()).unwrap_or(u64::MAX),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
