//! Permission Broker - one human, many agents, one question at a time
//!
//! This crate arbitrates authorization decisions between autonomous,
//! concurrently running operations (agents that want to read, write, delete,
//! list, create directories or execute) and a single human decision-maker.
//!
//! # Overview
//!
//! - Concurrent asks are serialized into a single visible prompt, in FIFO order
//! - Each decision is routed back to the exact caller that asked
//! - Decisions carry a scope: `once`, or `session` (reported to a grant authority)
//! - No caller is ever left hanging: closing the prompt without a choice denies
//!
//! The broker decides and reports; it does not enforce permissions and never
//! applies policy of its own.
//!
//! # Architecture
//!
//! - `broker`: the queue, the displayed request, and resolution bookkeeping
//! - `surface`: the decision surface that renders a request and emits one decision
//! - `grants`: the session-grant authority seam
//! - `request`: request and decision types
//! - `options`: broker configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use permission_broker::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BrokerError> {
//!     let grants = MemoryGrantAuthority::new();
//!     let broker = Broker::builder().grant_authority(grants.clone()).build()?;
//!     let surface = DecisionSurface::new(broker.clone());
//!
//!     // Two agents ask at once; only the first is displayed.
//!     let first = broker.request(PermissionRequest::new("agent-1", OperationKind::Read, "/etc/hosts"));
//!     let second = broker.request(PermissionRequest::new("agent-2", OperationKind::Delete, "/tmp/x"));
//!     assert_eq!(broker.queue_len(), 1);
//!
//!     surface.allow_session().await;
//!     surface.close().await;
//!
//!     assert_eq!(first.await?, Decision::allow_session());
//!     assert_eq!(second.await?, Decision::deny());
//!     assert!(grants.is_granted("agent-1", &OperationKind::Read).await);
//!     Ok(())
//! }
//! ```
//!
//! # License
//!
//! Licensed under MIT. See LICENSE file for details.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Broker that serializes concurrent requests into one decision surface
///
/// `Broker` owns the FIFO queue of pending requests, the single displayed
/// request, and one oneshot completion channel per request. Callers get a
/// `PendingDecision` future; the decision surface resolves it.
pub mod broker;

/// Decision surface
///
/// `DecisionSurface` follows the broker's displayed request, renders it into a
/// serializable `SurfaceView`, and turns one user action into one decision.
pub mod surface;

/// Session-grant authority
///
/// The `GrantAuthority` trait is the outbound seam the broker calls when a
/// request is approved for the whole session. `MemoryGrantAuthority` is the
/// in-process implementation.
pub mod grants;

/// Request and decision types
///
/// - `PermissionRequest` - one ask from an agent
/// - `OperationKind` - the operation being asked for
/// - `Decision` / `Scope` - what the human answered
pub mod request;

/// Configuration options and builder
///
/// `BrokerOptions` carries the grant timeout and event channel capacity, and
/// can be loaded from JSON.
pub mod options;

/// Error types
///
/// This module defines the `BrokerError` enum:
///
/// - `Closed` - a pending decision lost its completion handle
/// - `GrantFailed` - the grant authority rejected a session grant
/// - `GrantTimeout` - the grant authority did not answer in time
/// - `InvalidOptions` - configuration failed validation
/// - `Json` - JSON errors (auto-converts from `serde_json::Error`)
/// - `Io` - I/O errors (auto-converts from `std::io::Error`)
pub mod error;

// Prelude module for common imports
pub mod prelude {
    //! Common imports for permission_broker users
    //!
    //! Use `use permission_broker::prelude::*;` to import commonly used types.

    pub use crate::broker::{Broker, BrokerBuilder, BrokerEvent, PendingDecision, Ticket};
    pub use crate::error::BrokerError;
    pub use crate::grants::{GrantAuthority, MemoryGrantAuthority};
    pub use crate::options::BrokerOptions;
    pub use crate::request::{Decision, OperationKind, PermissionRequest, Scope};
    pub use crate::surface::{
        DecisionSurface, Emission, RiskTier, SurfaceAction, SurfaceView, classify,
    };
}
