//! Session-grant authority seam.
//!
//! When the human picks *allow for session*, the broker tells an external
//! [`GrantAuthority`] so that later asks from the same requester for the same
//! operation can be answered without a prompt. The broker never consults the
//! authority itself; it only reports grants to it.
//!
//! # Implementing an authority
//!
//! Implement the trait directly, or pass any async closure taking
//! `(requester_id, operation)`:
//!
//! ```
//! use permission_broker::prelude::*;
//!
//! async fn audit_grant(requester_id: String, operation: OperationKind) -> Result<(), BrokerError> {
//!     println!("{requester_id} may {operation} for the rest of the session");
//!     Ok(())
//! }
//!
//! let broker = Broker::builder().grant_authority(audit_grant).build().unwrap();
//! assert!(broker.is_idle());
//! ```
//!
//! [`MemoryGrantAuthority`] keeps grants in process memory and is the default
//! when no authority is supplied.

mod memory;

pub use memory::MemoryGrantAuthority;

use async_trait::async_trait;
use std::future::Future;

use crate::error::BrokerError;
use crate::request::OperationKind;

/// External collaborator that persists session-scoped approvals
///
/// Calls may overlap: the broker does not serialize its own calls against the
/// authority, so implementations must tolerate concurrent use.
#[async_trait]
pub trait GrantAuthority: Send + Sync {
    /// Record that `requester_id` may perform `operation` for the session
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Grant persisted
    /// * `Err(...)` - Grant could not be persisted; the broker logs it and
    ///   still delivers the approval to the caller
    async fn grant_session(
        &self,
        requester_id: &str,
        operation: &OperationKind,
    ) -> Result<(), BrokerError>;
}

/// Blanket implementation for async functions and closures
#[async_trait]
impl<F, Fut> GrantAuthority for F
where
    F: Fn(String, OperationKind) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BrokerError>> + Send,
{
    async fn grant_session(
        &self,
        requester_id: &str,
        operation: &OperationKind,
    ) -> Result<(), BrokerError> {
        self(requester_id.to_string(), operation.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RejectingAuthority;

    #[async_trait]
    impl GrantAuthority for RejectingAuthority {
        async fn grant_session(
            &self,
            requester_id: &str,
            _operation: &OperationKind,
        ) -> Result<(), BrokerError> {
            Err(BrokerError::GrantFailed(format!("{requester_id} is read-only")))
        }
    }

    #[tokio::test]
    async fn test_struct_implementation() {
        let authority = RejectingAuthority;
        let err = authority
            .grant_session("agent-1", &OperationKind::Write)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("agent-1 is read-only"));
    }

    #[tokio::test]
    async fn test_closure_implementation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let authority = move |_requester: String, operation: OperationKind| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if operation == OperationKind::Execute {
                    Err(BrokerError::GrantFailed("no session exec".to_string()))
                } else {
                    Ok(())
                }
            }
        };

        assert!(authority.grant_session("a", &OperationKind::Read).await.is_ok());
        assert!(authority.grant_session("a", &OperationKind::Execute).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_trait_object() {
        let authority: Arc<dyn GrantAuthority> = Arc::new(MemoryGrantAuthority::new());
        assert!(authority
            .grant_session("agent-1", &OperationKind::Delete)
            .await
            .is_ok());
    }
}
