//! Broker that serializes permission requests into one decision surface
//!
//! The broker owns:
//! - **The current entry** - the single request shown to the human
//! - **The queue** - requests waiting for their turn, in arrival order
//! - **The pending callers** - one oneshot channel per request
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Broker                            │
//! │                                                              │
//! │  request() ──→ ┌─────────────────────────────────────────┐   │
//! │                │  BrokerState (std::sync::Mutex)          │   │
//! │                │   current: Option<PendingEntry>          │   │
//! │                │   queue:   VecDeque<PendingEntry>        │   │
//! │                └─────────────────────────────────────────┘   │
//! │                     │ watch::Sender<Option<Ticket>>           │
//! │                     ↓                                        │
//! │              DecisionSurface ── resolve()/dismiss() ──┐      │
//! │                                                       ↓      │
//! │               GrantAuthority (allow-session only) ← settle   │
//! │                                                       │      │
//! │               oneshot::Sender<Decision> ← ────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state mutex is only ever held for synchronous bookkeeping and is never
//! held across an `.await`.
//!
//! # Example
//!
//! ```
//! use permission_broker::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), BrokerError> {
//! let broker = Broker::new(std::sync::Arc::new(MemoryGrantAuthority::new()));
//!
//! let pending = broker.request(
//!     PermissionRequest::new("agent-1", OperationKind::Write, "/src/lib.rs")
//!         .with_reason("Apply the refactor"),
//! );
//! assert_eq!(broker.current().as_ref(), Some(pending.ticket()));
//!
//! // Normally driven by the decision surface
//! broker.resolve_current(Decision::allow_once()).await;
//!
//! assert_eq!(pending.await?, Decision::allow_once());
//! assert!(broker.is_idle());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, oneshot, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info, warn};

use crate::error::BrokerError;
use crate::grants::{GrantAuthority, MemoryGrantAuthority};
use crate::options::BrokerOptions;
use crate::request::{Decision, PermissionRequest};

pub mod events;
pub mod pending;

pub use events::BrokerEvent;
pub use pending::{PendingDecision, Ticket};

use pending::{BrokerState, PendingEntry};

/// Arbiter between concurrent requesters and a single human decision-maker
///
/// `Broker` is a cheap handle: clones share the same queue. Hand one clone to
/// every requester and one to the [`DecisionSurface`](crate::surface::DecisionSurface).
/// When the last handle is dropped every outstanding request is denied.
///
/// # Thread Safety
///
/// `Broker` is `Send + Sync`. All queue mutations happen under a single
/// mutex, one operation at a time.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    state: Mutex<BrokerState>,
    authority: Arc<dyn GrantAuthority>,
    options: BrokerOptions,
    display: watch::Sender<Option<Ticket>>,
    events: broadcast::Sender<BrokerEvent>,
}

impl Broker {
    /// Create a broker with default options
    pub fn new(authority: Arc<dyn GrantAuthority>) -> Self {
        Self::with_options(authority, BrokerOptions::default())
    }

    /// Create a new builder
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::default()
    }

    fn with_options(authority: Arc<dyn GrantAuthority>, options: BrokerOptions) -> Self {
        let (display, _) = watch::channel(None);
        let (events, _) = broadcast::channel(options.event_capacity);
        Self {
            inner: Arc::new(BrokerInner {
                state: Mutex::new(BrokerState::default()),
                authority,
                options,
                display,
                events,
            }),
        }
    }

    /// Ask the human for permission
    ///
    /// The ask is registered before this returns: it is displayed immediately
    /// if nothing else is, otherwise it joins the tail of the queue. Await the
    /// returned [`PendingDecision`] to suspend until the human has answered.
    ///
    /// No validation is performed on the request's contents.
    pub fn request(&self, request: PermissionRequest) -> PendingDecision {
        let (entry, pending) = PendingEntry::new(request);
        let ticket = entry.ticket.clone();
        let mut state = self.lock_state();

        if state.current.is_none() {
            state.current = Some(entry);
            info!(
                requester = %ticket.request().requester_id,
                operation = %ticket.request().operation,
                path = %ticket.request().path,
                "Displaying permission request"
            );
            self.emit(BrokerEvent::Displayed {
                ticket: ticket.clone(),
            });
            self.inner.display.send_replace(Some(ticket));
        } else {
            for abandoned in state.prune_abandoned() {
                debug!(
                    requester = %abandoned.request().requester_id,
                    "Dropping abandoned permission request"
                );
                self.emit(BrokerEvent::Abandoned { ticket: abandoned });
            }
            state.queue.push_back(entry);
            let position = state.queue.len();
            debug!(
                requester = %ticket.request().requester_id,
                operation = %ticket.request().operation,
                queue_len = position,
                "Queued permission request"
            );
            self.emit(BrokerEvent::Queued { ticket, position });
        }

        pending
    }

    /// Resolve whatever request is currently displayed
    ///
    /// Returns `false` (and does nothing) when nothing is displayed or the
    /// displayed request is already being resolved.
    pub async fn resolve_current(&self, decision: Decision) -> bool {
        self.settle(None, decision).await
    }

    /// Resolve the displayed request only if it is still `ticket`
    ///
    /// A decision made against a ticket the broker has already moved past is
    /// ignored and never reaches the next displayed request.
    pub async fn resolve(&self, ticket: &Ticket, decision: Decision) -> bool {
        self.settle(Some(ticket), decision).await
    }

    /// The surface was closed without a choice; deny the displayed request
    pub async fn dismiss(&self) -> bool {
        self.settle(None, Decision::deny()).await
    }

    /// Withdraw a request that is still waiting in the queue
    ///
    /// The request's caller is resolved as denied and the request is never
    /// shown. Returns `false` if the ticket is the displayed request (only the
    /// human can answer it) or is not queued.
    pub fn withdraw(&self, ticket: &Ticket) -> bool {
        let mut state = self.lock_state();

        if state.current.as_ref().is_some_and(|entry| entry.ticket == *ticket) {
            debug!(
                requester = %ticket.request().requester_id,
                "Refusing to withdraw the displayed request"
            );
            return false;
        }

        let Some(index) = state.queue.iter().position(|entry| entry.ticket == *ticket) else {
            return false;
        };
        let Some(mut entry) = state.queue.remove(index) else {
            return false;
        };

        entry.resolve(Decision::deny());
        debug!(
            requester = %ticket.request().requester_id,
            operation = %ticket.request().operation,
            queue_len = state.queue.len(),
            "Withdrew queued permission request"
        );
        self.emit(BrokerEvent::Withdrawn {
            ticket: ticket.clone(),
        });
        true
    }

    /// The request currently displayed, if any
    pub fn current(&self) -> Option<Ticket> {
        self.lock_state()
            .current
            .as_ref()
            .map(|entry| entry.ticket.clone())
    }

    /// Requests waiting behind the displayed one, in display order
    ///
    /// Requests whose callers stopped waiting are left out.
    pub fn queued(&self) -> Vec<Ticket> {
        self.lock_state()
            .live_queue()
            .map(|entry| entry.ticket.clone())
            .collect()
    }

    /// Number of requests waiting behind the displayed one
    pub fn queue_len(&self) -> usize {
        self.lock_state().live_queue().count()
    }

    /// True when nothing is displayed
    pub fn is_idle(&self) -> bool {
        self.lock_state().current.is_none()
    }

    /// Options this broker was built with
    pub fn options(&self) -> &BrokerOptions {
        &self.inner.options
    }

    /// Watch the displayed request
    ///
    /// The value is `None` while idle and changes every time a different
    /// request is displayed.
    pub fn subscribe_display(&self) -> watch::Receiver<Option<Ticket>> {
        self.inner.display.subscribe()
    }

    /// Stream of displayed-request changes, starting with the current value
    pub fn display_stream(&self) -> WatchStream<Option<Ticket>> {
        WatchStream::new(self.subscribe_display())
    }

    /// Subscribe to broker lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.inner.events.subscribe()
    }

    /// Stream of broker lifecycle events
    pub fn event_stream(&self) -> BroadcastStream<BrokerEvent> {
        BroadcastStream::new(self.subscribe_events())
    }

    async fn settle(&self, expected: Option<&Ticket>, decision: Decision) -> bool {
        let decision = Decision::new(decision.allowed, decision.scope);

        let (ticket, responder) = {
            let mut state = self.lock_state();
            let Some(current) = state.current.as_mut() else {
                debug!("No permission request displayed; ignoring decision");
                return false;
            };
            if expected.is_some_and(|ticket| *ticket != current.ticket) {
                debug!("Decision targets a request that is no longer displayed; ignoring");
                return false;
            }
            let Some(responder) = current.take_responder() else {
                debug!("Displayed permission request is already being resolved; ignoring");
                return false;
            };
            (current.ticket.clone(), responder)
        };

        // The settlement runs on its own task so that dropping this future
        // (an aborted UI task, a lost `select!` branch) cannot strand the
        // entry. The grant is recorded before the caller hears back, so a
        // follow-up ask from the same caller can already see it.
        let settlement = Settlement {
            broker: self.clone(),
            ticket,
            decision,
            responder: Some(responder),
        };
        if let Err(e) = tokio::spawn(settlement.run()).await {
            warn!(
                error = %e,
                "Settling task did not finish; decision delivered without waiting for the grant"
            );
        }
        true
    }

    async fn record_session_grant(&self, ticket: &Ticket) {
        let request = ticket.request();
        let call = self
            .inner
            .authority
            .grant_session(&request.requester_id, &request.operation);

        let outcome = match tokio::time::timeout(self.inner.options.grant_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::GrantTimeout {
                timeout_ms: self.inner.options.grant_timeout_ms,
            }),
        };

        match outcome {
            Ok(()) => debug!(
                requester = %request.requester_id,
                operation = %request.operation,
                "Recorded session grant"
            ),
            Err(e) => {
                warn!(
                    requester = %request.requester_id,
                    operation = %request.operation,
                    error = %e,
                    "Session grant failed; approval delivered for this request only"
                );
                self.emit(BrokerEvent::GrantFailed {
                    ticket: ticket.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Retire `resolved` and display the next live queued request
    fn advance(&self, resolved: &Ticket) {
        let mut state = self.lock_state();
        if !state
            .current
            .as_ref()
            .is_some_and(|entry| entry.ticket == *resolved)
        {
            return;
        }
        state.current = None;

        while let Some(mut next) = state.queue.pop_front() {
            if next.is_abandoned() {
                next.resolve(Decision::deny());
                debug!(
                    requester = %next.ticket.request().requester_id,
                    "Skipping abandoned permission request"
                );
                self.emit(BrokerEvent::Abandoned {
                    ticket: next.ticket.clone(),
                });
                continue;
            }
            state.current = Some(next);
            break;
        }

        let displayed = state.current.as_ref().map(|entry| entry.ticket.clone());
        match &displayed {
            Some(ticket) => {
                info!(
                    requester = %ticket.request().requester_id,
                    operation = %ticket.request().operation,
                    path = %ticket.request().path,
                    queue_len = state.queue.len(),
                    "Displaying permission request"
                );
                self.emit(BrokerEvent::Displayed {
                    ticket: ticket.clone(),
                });
            }
            None => {
                debug!("Permission broker idle");
                self.emit(BrokerEvent::Idle);
            }
        }
        self.inner.display.send_replace(displayed);
    }

    fn emit(&self, event: BrokerEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, BrokerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A decision taken from the displayed entry, on its way to the caller
///
/// Dropping an unfinished settlement (cancelled task, panicking authority)
/// still delivers the decision and advances the queue.
struct Settlement {
    broker: Broker,
    ticket: Ticket,
    decision: Decision,
    responder: Option<oneshot::Sender<Decision>>,
}

impl Settlement {
    async fn run(mut self) {
        if self.decision.is_session_grant() {
            self.broker.record_session_grant(&self.ticket).await;
        }
        self.complete();
    }

    fn complete(&mut self) {
        let Some(responder) = self.responder.take() else {
            return;
        };
        let request = self.ticket.request();

        if responder.send(self.decision).is_err() {
            debug!(
                requester = %request.requester_id,
                "Requester stopped waiting before the decision arrived"
            );
        }
        info!(
            requester = %request.requester_id,
            operation = %request.operation,
            allowed = self.decision.allowed,
            scope = %self.decision.scope,
            "Resolved permission request"
        );
        self.broker.emit(BrokerEvent::Resolved {
            ticket: self.ticket.clone(),
            decision: self.decision,
        });

        self.broker.advance(&self.ticket);
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        self.complete();
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Broker")
            .field("current", &state.current.as_ref().map(|entry| &entry.ticket))
            .field("queue_len", &state.queue.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Builder for [`Broker`]
///
/// # Examples
///
/// ```
/// use permission_broker::prelude::*;
/// use std::time::Duration;
///
/// let broker = Broker::builder()
///     .grant_authority(MemoryGrantAuthority::new())
///     .options(BrokerOptions::builder().grant_timeout(Duration::from_secs(2)).build())
///     .build()
///     .unwrap();
///
/// assert_eq!(broker.options().grant_timeout_ms, 2000);
/// ```
#[derive(Default)]
pub struct BrokerBuilder {
    authority: Option<Arc<dyn GrantAuthority>>,
    options: Option<BrokerOptions>,
}

impl BrokerBuilder {
    /// Set the grant authority told about session grants
    pub fn grant_authority(mut self, authority: impl GrantAuthority + 'static) -> Self {
        let authority: Arc<dyn GrantAuthority> = Arc::new(authority);
        self.authority = Some(authority);
        self
    }

    /// Set an already shared grant authority
    pub fn shared_grant_authority(mut self, authority: Arc<dyn GrantAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Set broker options
    pub fn options(mut self, options: BrokerOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Build the broker
    ///
    /// Falls back to an in-memory grant authority when none was set.
    ///
    /// # Errors
    ///
    /// * `BrokerError::InvalidOptions` - options failed validation
    pub fn build(self) -> Result<Broker, BrokerError> {
        let options = self.options.unwrap_or_default();
        options.validate()?;
        let authority = match self.authority {
            Some(authority) => authority,
            None => Arc::new(MemoryGrantAuthority::new()),
        };
        Ok(Broker::with_options(authority, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{OperationKind, Scope};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex as TokioMutex;

    fn ask(requester: &str, op: OperationKind) -> PermissionRequest {
        PermissionRequest::new(requester, op, format!("/work/{}", requester))
    }

    fn broker() -> Broker {
        Broker::new(Arc::new(MemoryGrantAuthority::new()))
    }

    /// Records every grant call, optionally failing them
    struct RecordingAuthority {
        calls: Arc<TokioMutex<Vec<(String, OperationKind)>>>,
        fail: bool,
    }

    #[async_trait]
    impl GrantAuthority for RecordingAuthority {
        async fn grant_session(
            &self,
            requester_id: &str,
            operation: &OperationKind,
        ) -> Result<(), BrokerError> {
            self.calls
                .lock()
                .await
                .push((requester_id.to_string(), operation.clone()));
            if self.fail {
                Err(BrokerError::GrantFailed("store offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct StalledAuthority;

    #[async_trait]
    impl GrantAuthority for StalledAuthority {
        async fn grant_session(
            &self,
            _requester_id: &str,
            _operation: &OperationKind,
        ) -> Result<(), BrokerError> {
            std::future::pending().await
        }
    }

    struct PanickingAuthority;

    #[async_trait]
    impl GrantAuthority for PanickingAuthority {
        async fn grant_session(
            &self,
            _requester_id: &str,
            _operation: &OperationKind,
        ) -> Result<(), BrokerError> {
            panic!("grant store corrupted")
        }
    }

    #[tokio::test]
    async fn test_first_request_is_displayed_immediately() {
        let broker = broker();
        assert!(broker.is_idle());

        let pending = broker.request(ask("a", OperationKind::Read));
        assert_eq!(broker.current().as_ref(), Some(pending.ticket()));
        assert_eq!(broker.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_later_requests_queue_in_order() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        let r2 = broker.request(ask("b", OperationKind::Write));
        let r3 = broker.request(ask("c", OperationKind::Delete));

        assert_eq!(broker.current().as_ref(), Some(r1.ticket()));
        assert_eq!(
            broker.queued(),
            vec![r2.ticket().clone(), r3.ticket().clone()]
        );
    }

    #[tokio::test]
    async fn test_allow_once_resolves_and_advances() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        let r2 = broker.request(ask("b", OperationKind::Write));
        let r2_ticket = r2.ticket().clone();

        assert!(broker.resolve_current(Decision::allow_once()).await);

        assert_eq!(r1.await.unwrap(), Decision::allow_once());
        assert_eq!(broker.current(), Some(r2_ticket));
        assert_eq!(broker.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_dismiss_denies_and_idles() {
        let broker = broker();
        let pending = broker.request(ask("a", OperationKind::Execute));

        assert!(broker.dismiss().await);

        assert_eq!(
            pending.await.unwrap(),
            Decision {
                allowed: false,
                scope: Scope::Once
            }
        );
        assert!(broker.is_idle());
    }

    #[tokio::test]
    async fn test_resolve_with_nothing_displayed_is_noop() {
        let broker = broker();
        assert!(!broker.resolve_current(Decision::allow_once()).await);
        assert!(!broker.dismiss().await);
        assert!(broker.is_idle());
    }

    #[tokio::test]
    async fn test_stale_ticket_does_not_touch_next_request() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        let mut r2 = broker.request(ask("b", OperationKind::Write));
        let stale = r1.ticket().clone();

        assert!(broker.resolve(&stale, Decision::allow_once()).await);
        assert!(!broker.resolve(&stale, Decision::deny()).await);

        assert_eq!(broker.current().as_ref(), Some(r2.ticket()));
        assert!(poll_once(&mut r2).is_none());
        assert_eq!(r1.await.unwrap(), Decision::allow_once());
    }

    #[tokio::test]
    async fn test_session_grant_calls_authority() {
        let calls = Arc::new(TokioMutex::new(Vec::new()));
        let broker = Broker::builder()
            .grant_authority(RecordingAuthority {
                calls: calls.clone(),
                fail: false,
            })
            .build()
            .unwrap();

        let pending = broker.request(ask("agent-7", OperationKind::Delete));
        assert!(broker.resolve_current(Decision::allow_session()).await);

        assert_eq!(
            *calls.lock().await,
            vec![("agent-7".to_string(), OperationKind::Delete)]
        );
        assert_eq!(pending.await.unwrap(), Decision::allow_session());
    }

    #[tokio::test]
    async fn test_grant_failure_still_delivers_approval() {
        let calls = Arc::new(TokioMutex::new(Vec::new()));
        let broker = Broker::builder()
            .grant_authority(RecordingAuthority {
                calls: calls.clone(),
                fail: true,
            })
            .build()
            .unwrap();
        let mut events = broker.subscribe_events();

        let pending = broker.request(ask("a", OperationKind::Write));
        broker.resolve_current(Decision::allow_session()).await;

        assert_eq!(pending.await.unwrap(), Decision::allow_session());

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let BrokerEvent::GrantFailed { reason, .. } = event {
                assert!(reason.contains("store offline"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_timeout_still_delivers_approval() {
        let broker = Broker::builder()
            .grant_authority(StalledAuthority)
            .options(
                BrokerOptions::builder()
                    .grant_timeout(Duration::from_millis(100))
                    .build(),
            )
            .build()
            .unwrap();
        let mut events = broker.subscribe_events();

        let pending = broker.request(ask("a", OperationKind::Write));
        assert!(broker.resolve_current(Decision::allow_session()).await);
        assert_eq!(pending.await.unwrap(), Decision::allow_session());

        let failure = std::iter::from_fn(|| events.try_recv().ok())
            .find(|event| matches!(event, BrokerEvent::GrantFailed { .. }));
        match failure {
            Some(BrokerEvent::GrantFailed { reason, .. }) => assert!(reason.contains("100ms")),
            other => panic!("expected GrantFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_denial_never_calls_authority() {
        let calls = Arc::new(TokioMutex::new(Vec::new()));
        let broker = Broker::builder()
            .grant_authority(RecordingAuthority {
                calls: calls.clone(),
                fail: false,
            })
            .build()
            .unwrap();

        let r1 = broker.request(ask("a", OperationKind::Write));
        broker
            .resolve_current(Decision {
                allowed: false,
                scope: Scope::Session,
            })
            .await;
        let r2 = broker.request(ask("a", OperationKind::Write));
        broker.resolve_current(Decision::allow_once()).await;

        assert_eq!(r1.await.unwrap(), Decision::deny());
        assert_eq!(r2.await.unwrap(), Decision::allow_once());
        assert!(calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_queued_request() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        let r2 = broker.request(ask("b", OperationKind::Read));
        let r3 = broker.request(ask("c", OperationKind::Read));
        let r3_ticket = r3.ticket().clone();

        assert!(broker.withdraw(r2.ticket()));
        assert!(!broker.withdraw(r2.ticket()));
        assert_eq!(r2.await.unwrap(), Decision::deny());

        broker.resolve_current(Decision::allow_once()).await;
        assert_eq!(r1.await.unwrap(), Decision::allow_once());
        assert_eq!(broker.current(), Some(r3_ticket));
    }

    #[tokio::test]
    async fn test_withdraw_displayed_request_is_refused() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        assert!(!broker.withdraw(r1.ticket()));
        assert_eq!(broker.current().as_ref(), Some(r1.ticket()));
    }

    #[tokio::test]
    async fn test_abandoned_request_is_skipped() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        let r2 = broker.request(ask("b", OperationKind::Read));
        let r3 = broker.request(ask("c", OperationKind::Read));
        let r3_ticket = r3.ticket().clone();
        drop(r2);

        broker.resolve_current(Decision::allow_once()).await;
        assert_eq!(r1.await.unwrap(), Decision::allow_once());
        assert_eq!(broker.current(), Some(r3_ticket));
    }

    #[tokio::test]
    async fn test_dropping_broker_denies_outstanding() {
        let broker = broker();
        let r1 = broker.request(ask("a", OperationKind::Read));
        let r2 = broker.request(ask("b", OperationKind::Read));
        drop(broker);

        assert_eq!(r1.await.unwrap(), Decision::deny());
        assert_eq!(r2.await.unwrap(), Decision::deny());
    }

    #[tokio::test]
    async fn test_display_watch_tracks_current() {
        let broker = broker();
        let display = broker.subscribe_display();
        assert!(display.borrow().is_none());

        let r1 = broker.request(ask("a", OperationKind::Read));
        assert_eq!(display.borrow().as_ref(), Some(r1.ticket()));

        broker.dismiss().await;
        assert!(display.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_resolution_still_settles() {
        let broker = Broker::builder()
            .grant_authority(StalledAuthority)
            .options(
                BrokerOptions::builder()
                    .grant_timeout(Duration::from_millis(100))
                    .build(),
            )
            .build()
            .unwrap();

        let r1 = broker.request(ask("a", OperationKind::Write));
        let r2 = broker.request(ask("b", OperationKind::Read));
        let r2_ticket = r2.ticket().clone();

        // Give up on the decision while the grant call is in flight
        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            broker.resolve_current(Decision::allow_session()),
        )
        .await;
        assert!(cancelled.is_err());

        assert_eq!(r1.await.unwrap(), Decision::allow_session());
        assert_eq!(broker.current(), Some(r2_ticket));

        assert!(broker.dismiss().await);
        assert_eq!(r2.await.unwrap(), Decision::deny());
        assert!(broker.is_idle());
    }

    #[tokio::test]
    async fn test_panicking_authority_still_delivers_approval() {
        let broker = Broker::builder()
            .grant_authority(PanickingAuthority)
            .build()
            .unwrap();

        let r1 = broker.request(ask("a", OperationKind::Delete));
        let r2 = broker.request(ask("b", OperationKind::Read));
        let r2_ticket = r2.ticket().clone();

        assert!(broker.resolve_current(Decision::allow_session()).await);
        assert_eq!(r1.await.unwrap(), Decision::allow_session());
        assert_eq!(broker.current(), Some(r2_ticket));
    }

    #[tokio::test]
    async fn test_abandoned_requests_not_counted_as_waiting() {
        let broker = broker();
        let mut events = broker.subscribe_events();

        let _r1 = broker.request(ask("a", OperationKind::Read));
        let r2 = broker.request(ask("b", OperationKind::Read));
        let r3 = broker.request(ask("c", OperationKind::Read));
        let r2_ticket = r2.ticket().clone();
        drop(r2);

        assert_eq!(broker.queue_len(), 1);
        assert_eq!(broker.queued(), vec![r3.ticket().clone()]);

        let r4 = broker.request(ask("d", OperationKind::Read));
        assert_eq!(
            broker.queued(),
            vec![r3.ticket().clone(), r4.ticket().clone()]
        );

        let mut abandoned = Vec::new();
        let mut last_position = None;
        while let Ok(event) = events.try_recv() {
            match event {
                BrokerEvent::Abandoned { ticket } => abandoned.push(ticket),
                BrokerEvent::Queued { ticket, position } if ticket == *r4.ticket() => {
                    last_position = Some(position)
                }
                _ => {}
            }
        }
        assert_eq!(abandoned, vec![r2_ticket]);
        assert_eq!(last_position, Some(2));
    }

    #[test]
    fn test_builder_rejects_invalid_options() {
        let result = Broker::builder()
            .options(BrokerOptions::builder().event_capacity(0).build())
            .build();
        assert!(matches!(result, Err(BrokerError::InvalidOptions(_))));
    }

    /// Poll a pending decision once without waiting
    fn poll_once(pending: &mut PendingDecision) -> Option<Result<Decision, BrokerError>> {
        use std::future::Future;
        use std::pin::Pin;
        use std::task::{Context, Poll, Waker};

        let mut cx = Context::from_waker(Waker::noop());
        match Pin::new(pending).poll(&mut cx) {
            Poll::Ready(result) => Some(result),
            Poll::Pending => None,
        }
    }
}
