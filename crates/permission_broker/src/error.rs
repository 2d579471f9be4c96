//! Error types for the permission broker
//!
//! This module defines the error hierarchy for the permission_broker crate using `thiserror`.
//! Broker operations that can fail return `Result<T, BrokerError>`.
//!
//! Most failures inside the broker are recovered locally and never reach a caller:
//! a grant authority that errors or times out is logged and published as a
//! [`BrokerEvent::GrantFailed`](crate::broker::BrokerEvent::GrantFailed), and a
//! resolution against a stale or missing entry is a silent no-op.
//!
//! # Error Variants
//!
//! - [`BrokerError::Closed`]: the completion handle vanished without a decision
//! - [`BrokerError::GrantFailed`]: the grant authority rejected a session grant
//! - [`BrokerError::GrantTimeout`]: the grant authority did not answer in time
//! - [`BrokerError::InvalidOptions`]: configuration failed validation
//! - [`BrokerError::Json`]: JSON (de)serialization errors (auto-converts from `serde_json::Error`)
//! - [`BrokerError::Io`]: I/O errors (auto-converts from `std::io::Error`)
//!
//! # Example
//!
//! ```rust
//! use permission_broker::error::BrokerError;
//!
//! fn example() -> Result<(), BrokerError> {
//!     // Auto-conversion from serde_json::Error
//!     let _value: serde_json::Value = serde_json::from_str("{ nope }")?;
//!     Ok(())
//! }
//!
//! assert!(matches!(example(), Err(BrokerError::Json(_))));
//! ```

use thiserror::Error;

/// The main error type for all permission_broker operations
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The pending decision was dropped without ever being resolved
    ///
    /// The broker resolves every entry it creates (outstanding entries are
    /// denied when the last broker handle goes away), so this only surfaces if
    /// the completion handle is lost outside the broker's control.
    #[error("Permission broker closed before a decision was made")]
    Closed,

    /// The grant authority failed to persist a session grant
    #[error("Session grant failed: {0}")]
    GrantFailed(String),

    /// The grant authority did not respond within the configured timeout
    #[error("Session grant timed out after {timeout_ms}ms")]
    GrantTimeout {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Broker configuration is invalid
    #[error("Invalid broker options: {0}")]
    InvalidOptions(String),

    /// Failed to encode or decode JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
