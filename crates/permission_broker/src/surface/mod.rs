//! Decision surface: the one place a human answers permission requests.
//!
//! The surface is a passive presentation unit. It follows the broker's
//! displayed request, renders it into a [`SurfaceView`] that a front-end can
//! draw, and turns exactly one user action into a decision for it.
//!
//! # Example
//!
//! ```
//! use permission_broker::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), BrokerError> {
//! let broker = Broker::builder().build()?;
//! let surface = DecisionSurface::new(broker.clone());
//! assert!(!surface.is_visible());
//!
//! let pending = broker.request(
//!     PermissionRequest::new("agent-1", OperationKind::Delete, "/tmp/cache")
//!         .with_requester_name("Cleanup Agent"),
//! );
//!
//! let view = surface.render().expect("request is displayed");
//! assert_eq!(view.summary, "Cleanup Agent wants to delete /tmp/cache");
//! assert_eq!(view.risk, RiskTier::High);
//!
//! assert_eq!(surface.allow_once().await, Emission::Sent);
//! assert_eq!(pending.await?, Decision::allow_once());
//! assert!(!surface.is_visible());
//! # Ok(())
//! # }
//! ```

mod affordance;

pub use affordance::{Affordance, RiskTier, classify};

use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use crate::broker::{Broker, Ticket};
use crate::request::{Decision, OperationKind, PermissionRequest};

/// A choice offered on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceAction {
    /// Refuse the operation
    Deny,
    /// Allow this one invocation
    AllowOnce,
    /// Allow and remember for the session
    AllowSession,
}

impl SurfaceAction {
    /// Every action, in display order
    pub const ALL: [SurfaceAction; 3] = [
        SurfaceAction::Deny,
        SurfaceAction::AllowOnce,
        SurfaceAction::AllowSession,
    ];

    /// Decision this action emits
    pub const fn decision(self) -> Decision {
        match self {
            SurfaceAction::Deny => Decision::deny(),
            SurfaceAction::AllowOnce => Decision::allow_once(),
            SurfaceAction::AllowSession => Decision::allow_session(),
        }
    }

    /// Button caption
    pub const fn label(self) -> &'static str {
        match self {
            SurfaceAction::Deny => "Deny",
            SurfaceAction::AllowOnce => "Allow once",
            SurfaceAction::AllowSession => "Allow for session",
        }
    }
}

/// Everything a front-end needs to draw one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceView {
    /// Operation being requested
    pub operation: OperationKind,
    /// Icon name for the operation
    pub icon: &'static str,
    /// Heading for the prompt
    pub label: &'static str,
    /// Risk tier of the operation
    pub risk: RiskTier,
    /// One-line description, e.g. "Build Agent wants to delete /tmp/build"
    pub summary: String,
    /// Target path
    pub path: String,
    /// Requester's justification, empty if none was given
    pub reason: String,
    /// Requester display name
    pub requester: String,
    /// Actions offered, in display order
    pub actions: Vec<SurfaceAction>,
}

impl SurfaceView {
    /// Render a request
    pub fn for_request(request: &PermissionRequest) -> Self {
        let affordance = classify(&request.operation);
        let requester = request.requester_display().to_string();
        Self {
            operation: request.operation.clone(),
            icon: affordance.icon,
            label: affordance.label,
            risk: affordance.risk,
            summary: format!("{} wants to {} {}", requester, affordance.verb, request.path),
            path: request.path.clone(),
            reason: request.reason.clone(),
            requester,
            actions: SurfaceAction::ALL.to_vec(),
        }
    }
}

/// What happened to a user action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// The decision was delivered for the displayed request
    Sent,
    /// Nothing was displayed
    Hidden,
    /// A decision for the displayed request is already settling
    Busy,
    /// The broker had already moved past the rendered request
    Stale,
}

/// Presentation unit bound to one broker
///
/// Holds its own `processing` flag so a double click (or a click racing a
/// window close) produces a single decision per displayed request. The flag is
/// keyed on the displayed ticket, so it is clear again for the next request.
pub struct DecisionSurface {
    broker: Broker,
    display: watch::Receiver<Option<Ticket>>,
    processing: Mutex<Option<Ticket>>,
}

impl DecisionSurface {
    /// Attach a surface to `broker`
    pub fn new(broker: Broker) -> Self {
        let display = broker.subscribe_display();
        Self {
            broker,
            display,
            processing: Mutex::new(None),
        }
    }

    /// Whether a request is displayed
    pub fn is_visible(&self) -> bool {
        self.display.borrow().is_some()
    }

    /// Ticket of the displayed request
    pub fn displayed(&self) -> Option<Ticket> {
        self.display.borrow().clone()
    }

    /// Render the displayed request, or `None` when hidden
    pub fn render(&self) -> Option<SurfaceView> {
        self.display
            .borrow()
            .as_ref()
            .map(|ticket| SurfaceView::for_request(ticket.request()))
    }

    /// Wait until the displayed request changes, then render it
    ///
    /// Returns `None` when the surface became hidden.
    pub async fn changed(&mut self) -> Option<SurfaceView> {
        if self.display.changed().await.is_err() {
            return None;
        }
        self.render()
    }

    /// Wait until a request is displayed and render it
    pub async fn next_request(&mut self) -> Option<SurfaceView> {
        let ticket = self
            .display
            .wait_for(Option::is_some)
            .await
            .ok()?
            .clone()?;
        Some(SurfaceView::for_request(ticket.request()))
    }

    /// Whether a decision for the displayed request is still settling
    pub fn is_processing(&self) -> bool {
        let displayed = self.displayed();
        displayed.is_some() && *self.lock_processing() == displayed
    }

    /// Deny the displayed request
    pub async fn deny(&self) -> Emission {
        self.choose(SurfaceAction::Deny).await
    }

    /// Allow the displayed request once
    pub async fn allow_once(&self) -> Emission {
        self.choose(SurfaceAction::AllowOnce).await
    }

    /// Allow the displayed request for the session
    pub async fn allow_session(&self) -> Emission {
        self.choose(SurfaceAction::AllowSession).await
    }

    /// Apply one of the offered actions
    pub async fn choose(&self, action: SurfaceAction) -> Emission {
        self.emit(action.decision()).await
    }

    /// Closed without a choice (escape, backdrop click, window close)
    ///
    /// Dismisses the rendered request, which denies it.
    pub async fn close(&self) -> Emission {
        self.emit(Decision::deny()).await
    }

    async fn emit(&self, decision: Decision) -> Emission {
        let Some(ticket) = self.displayed() else {
            return Emission::Hidden;
        };

        {
            let mut processing = self.lock_processing();
            if processing.as_ref() == Some(&ticket) {
                debug!(
                    requester = %ticket.request().requester_id,
                    "Ignoring repeated action while decision settles"
                );
                return Emission::Busy;
            }
            *processing = Some(ticket.clone());
        }

        if self.broker.resolve(&ticket, decision).await {
            Emission::Sent
        } else {
            Emission::Stale
        }
    }

    fn lock_processing(&self) -> std::sync::MutexGuard<'_, Option<Ticket>> {
        self.processing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
