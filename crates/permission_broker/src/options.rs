//! Configuration options and builder for a broker instance
//!
//! # Example
//!
//! ```
//! use permission_broker::options::BrokerOptions;
//! use std::time::Duration;
//!
//! let options = BrokerOptions::builder()
//!     .grant_timeout(Duration::from_secs(5))
//!     .event_capacity(128)
//!     .build();
//!
//! assert_eq!(options.grant_timeout(), Duration::from_secs(5));
//! ```
//!
//! # Loading from JSON
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes:
//!
//! ```
//! use permission_broker::options::BrokerOptions;
//!
//! let options = BrokerOptions::from_json(r#"{ "grant_timeout_ms": 2000 }"#).unwrap();
//! assert_eq!(options.grant_timeout_ms, 2000);
//! assert_eq!(options.event_capacity, 64);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::BrokerError;

const DEFAULT_GRANT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Tunables for a [`Broker`](crate::broker::Broker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerOptions {
    /// Upper bound on a single session-grant call, in milliseconds
    ///
    /// A call that exceeds it is reported as a grant failure; the caller's
    /// decision is delivered regardless.
    ///
    /// The next queued request is not displayed until the grant call returns
    /// or times out, so a slow authority holds the queue for up to this long.
    pub grant_timeout_ms: u64,

    /// Buffer size of the broker event channel
    ///
    /// Slow subscribers that fall further behind than this miss events.
    pub event_capacity: usize,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            grant_timeout_ms: DEFAULT_GRANT_TIMEOUT_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl BrokerOptions {
    /// Create a new builder
    pub fn builder() -> BrokerOptionsBuilder {
        BrokerOptionsBuilder::default()
    }

    /// Grant timeout as a `Duration`
    pub fn grant_timeout(&self) -> Duration {
        Duration::from_millis(self.grant_timeout_ms)
    }

    /// Parse and validate options from a JSON document
    pub fn from_json(json: &str) -> Result<Self, BrokerError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Reject values the broker cannot run with
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.grant_timeout_ms == 0 {
            return Err(BrokerError::InvalidOptions(
                "grant_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(BrokerError::InvalidOptions(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`BrokerOptions`]
#[derive(Debug, Default)]
pub struct BrokerOptionsBuilder {
    grant_timeout_ms: Option<u64>,
    event_capacity: Option<usize>,
}

impl BrokerOptionsBuilder {
    /// Set the grant timeout
    pub fn grant_timeout(mut self, timeout: Duration) -> Self {
        self.grant_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build the options
    ///
    /// Out-of-range values are not rejected here; the broker builder validates
    /// them.
    pub fn build(self) -> BrokerOptions {
        BrokerOptions {
            grant_timeout_ms: self.grant_timeout_ms.unwrap_or(DEFAULT_GRANT_TIMEOUT_MS),
            event_capacity: self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
        }
    }
}
