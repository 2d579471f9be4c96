//! Pending entry bookkeeping for the broker
//!
//! Every call to [`Broker::request`](crate::broker::Broker::request) creates one
//! [`PendingEntry`] binding the request record to a oneshot sender, and hands the
//! matching receiver back to the caller wrapped in a [`PendingDecision`].
//!
//! ```text
//! ┌─────────────┐  oneshot::Sender   ┌──────────────────┐
//! │ PendingEntry│ ─────────────────→ │ PendingDecision  │ (caller awaits)
//! │  ticket     │                    │  ticket          │
//! │  responder  │                    │  receiver        │
//! └─────────────┘                    └──────────────────┘
//! ```
//!
//! The responder is taken exactly once. Whatever takes it is responsible for
//! sending the decision; every later attempt finds `None` and does nothing.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::BrokerError;
use crate::request::{Decision, PermissionRequest};

/// Identity of one ask
///
/// A ticket is a handle to the request record the broker queued. Two tickets
/// are equal only if they point at the same record, so identical requests
/// issued twice never match each other.
#[derive(Clone)]
pub struct Ticket {
    record: Arc<PermissionRequest>,
}

impl Ticket {
    fn new(request: PermissionRequest) -> Self {
        Self {
            record: Arc::new(request),
        }
    }

    /// The request this ticket was issued for
    pub fn request(&self) -> &PermissionRequest {
        &self.record
    }
}

impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for Ticket {}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("record", &Arc::as_ptr(&self.record))
            .field("requester_id", &self.record.requester_id)
            .field("operation", &self.record.operation)
            .field("path", &self.record.path)
            .finish()
    }
}

impl Serialize for Ticket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

/// Broker-owned binding of a request to its waiting caller
pub(crate) struct PendingEntry {
    pub(crate) ticket: Ticket,
    responder: Option<oneshot::Sender<Decision>>,
}

impl PendingEntry {
    /// Create an entry and the future its caller will await
    pub(crate) fn new(request: PermissionRequest) -> (Self, PendingDecision) {
        let (tx, rx) = oneshot::channel();
        let ticket = Ticket::new(request);
        let entry = Self {
            ticket: ticket.clone(),
            responder: Some(tx),
        };
        let pending = PendingDecision {
            ticket,
            receiver: rx,
        };
        (entry, pending)
    }

    /// Take the responder, leaving the entry unresolvable
    pub(crate) fn take_responder(&mut self) -> Option<oneshot::Sender<Decision>> {
        self.responder.take()
    }

    /// Whether nobody is waiting for this entry's decision any more
    pub(crate) fn is_abandoned(&self) -> bool {
        self.responder.as_ref().is_none_or(|tx| tx.is_closed())
    }

    /// Deliver `decision` if the responder is still here
    ///
    /// Returns `true` if the caller received it.
    pub(crate) fn resolve(&mut self, decision: Decision) -> bool {
        match self.responder.take() {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }
}

/// Broker queue state, guarded by a single mutex
#[derive(Default)]
pub(crate) struct BrokerState {
    /// Entry currently shown on the decision surface
    pub(crate) current: Option<PendingEntry>,
    /// Entries that have never been shown, in arrival order
    pub(crate) queue: VecDeque<PendingEntry>,
}

impl BrokerState {
    /// Drop queued entries whose callers stopped waiting
    pub(crate) fn prune_abandoned(&mut self) -> Vec<Ticket> {
        let mut pruned = Vec::new();
        self.queue.retain(|entry| {
            if entry.is_abandoned() {
                pruned.push(entry.ticket.clone());
                false
            } else {
                true
            }
        });
        pruned
    }

    /// Queued entries someone is still waiting on
    pub(crate) fn live_queue(&self) -> impl Iterator<Item = &PendingEntry> {
        self.queue.iter().filter(|entry| !entry.is_abandoned())
    }
}

impl Drop for BrokerState {
    // Nobody is left to decide; outstanding callers are denied rather than
    // left waiting forever.
    fn drop(&mut self) {
        for entry in self.current.iter_mut().chain(self.queue.iter_mut()) {
            entry.resolve(Decision::deny());
        }
    }
}

/// Future returned by [`Broker::request`](crate::broker::Broker::request)
///
/// Resolves with the human's [`Decision`] once the request has been displayed
/// and answered, dismissed, or withdrawn. Dropping it before resolution
/// abandons the ask: if it is still queued it will never be shown.
#[must_use = "a permission request does nothing unless its decision is awaited"]
pub struct PendingDecision {
    ticket: Ticket,
    receiver: oneshot::Receiver<Decision>,
}

impl PendingDecision {
    /// Ticket identifying this ask, usable with
    /// [`Broker::withdraw`](crate::broker::Broker::withdraw)
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }
}

impl fmt::Debug for PendingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDecision")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

impl Future for PendingDecision {
    type Output = Result<Decision, BrokerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| BrokerError::Closed))
    }
}
