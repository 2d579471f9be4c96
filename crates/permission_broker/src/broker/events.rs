//! Broker lifecycle events.
//!
//! Events are published on a `tokio::sync::broadcast` channel. They exist for
//! observers (notification toasts, audit logs, tests); nothing in the broker
//! depends on anyone listening.

use serde::Serialize;

use crate::broker::pending::Ticket;
use crate::request::Decision;

/// Something that happened to a pending entry
///
/// # Examples
///
/// ```
/// use permission_broker::broker::BrokerEvent;
///
/// let event = BrokerEvent::Idle;
/// assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"type":"idle"}"#);
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrokerEvent {
    /// Request was queued behind the displayed one
    Queued {
        /// The queued request
        ticket: Ticket,
        /// 1-based position in the queue
        position: usize,
    },
    /// Request became the one shown on the decision surface
    Displayed {
        /// The displayed request
        ticket: Ticket,
    },
    /// Request's caller received its decision
    Resolved {
        /// The resolved request
        ticket: Ticket,
        /// What the caller received
        decision: Decision,
    },
    /// Queued request was withdrawn before it was shown
    Withdrawn {
        /// The withdrawn request
        ticket: Ticket,
    },
    /// Queued request was dropped by its caller and skipped
    Abandoned {
        /// The abandoned request
        ticket: Ticket,
    },
    /// Session grant could not be persisted; the approval was still delivered
    GrantFailed {
        /// The request whose grant failed
        ticket: Ticket,
        /// Error reported by the grant authority
        reason: String,
    },
    /// Nothing displayed and nothing queued
    Idle,
}

impl BrokerEvent {
    /// Ticket the event refers to, if any
    pub fn ticket(&self) -> Option<&Ticket> {
        match self {
            BrokerEvent::Queued { ticket, .. }
            | BrokerEvent::Displayed { ticket }
            | BrokerEvent::Resolved { ticket, .. }
            | BrokerEvent::Withdrawn { ticket }
            | BrokerEvent::Abandoned { ticket }
            | BrokerEvent::GrantFailed { ticket, .. } => Some(ticket),
            BrokerEvent::Idle => None,
        }
    }
}
