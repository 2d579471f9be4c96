//! In-memory grant authority.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::BrokerError;
use crate::grants::GrantAuthority;
use crate::request::OperationKind;

/// Grant authority that keeps session grants in process memory
///
/// Cloning shares the underlying grant set, so a clone handed to the broker
/// can be inspected from elsewhere.
///
/// # Examples
///
/// ```
/// use permission_broker::grants::{GrantAuthority, MemoryGrantAuthority};
/// use permission_broker::request::OperationKind;
///
/// # #[tokio::main]
/// # async fn main() {
/// let grants = MemoryGrantAuthority::new();
/// grants.grant_session("agent-1", &OperationKind::Write).await.unwrap();
///
/// assert!(grants.is_granted("agent-1", &OperationKind::Write).await);
/// assert!(!grants.is_granted("agent-1", &OperationKind::Delete).await);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryGrantAuthority {
    grants: Arc<RwLock<HashSet<(String, OperationKind)>>>,
}

impl MemoryGrantAuthority {
    /// Create an empty grant set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `requester_id` holds a session grant for `operation`
    pub async fn is_granted(&self, requester_id: &str, operation: &OperationKind) -> bool {
        self.grants
            .read()
            .await
            .contains(&(requester_id.to_string(), operation.clone()))
    }

    /// Remove a grant. Returns `true` if it existed.
    pub async fn revoke(&self, requester_id: &str, operation: &OperationKind) -> bool {
        self.grants
            .write()
            .await
            .remove(&(requester_id.to_string(), operation.clone()))
    }

    /// Drop every grant, e.g. when the session ends
    pub async fn clear(&self) {
        self.grants.write().await.clear();
    }

    /// Number of grants currently held
    pub async fn len(&self) -> usize {
        self.grants.read().await.len()
    }

    /// Whether no grants are held
    pub async fn is_empty(&self) -> bool {
        self.grants.read().await.is_empty()
    }
}

#[async_trait]
impl GrantAuthority for MemoryGrantAuthority {
    async fn grant_session(
        &self,
        requester_id: &str,
        operation: &OperationKind,
    ) -> Result<(), BrokerError> {
        self.grants
            .write()
            .await
            .insert((requester_id.to_string(), operation.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_and_lookup() {
        let grants = MemoryGrantAuthority::new();
        assert!(grants.is_empty().await);

        grants
            .grant_session("agent-1", &OperationKind::Read)
            .await
            .unwrap();

        assert!(grants.is_granted("agent-1", &OperationKind::Read).await);
        assert!(!grants.is_granted("agent-2", &OperationKind::Read).await);
        assert_eq!(grants.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_grant_is_idempotent() {
        let grants = MemoryGrantAuthority::new();
        for _ in 0..3 {
            grants
                .grant_session("agent-1", &OperationKind::Write)
                .await
                .unwrap();
        }
        assert_eq!(grants.len().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_and_clear() {
        let grants = MemoryGrantAuthority::new();
        grants
            .grant_session("agent-1", &OperationKind::Write)
            .await
            .unwrap();
        grants
            .grant_session("agent-1", &OperationKind::Other("chmod".to_string()))
            .await
            .unwrap();

        assert!(grants.revoke("agent-1", &OperationKind::Write).await);
        assert!(!grants.revoke("agent-1", &OperationKind::Write).await);
        assert_eq!(grants.len().await, 1);

        grants.clear().await;
        assert!(grants.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let grants = MemoryGrantAuthority::new();
        let shared = grants.clone();
        shared
            .grant_session("agent-9", &OperationKind::Execute)
            .await
            .unwrap();
        assert!(grants.is_granted("agent-9", &OperationKind::Execute).await);
    }

    #[tokio::test]
    async fn test_concurrent_grants() {
        let grants = MemoryGrantAuthority::new();
        let mut handles = vec![];

        for i in 0..10 {
            let grants = grants.clone();
            handles.push(tokio::spawn(async move {
                grants
                    .grant_session(&format!("agent-{}", i), &OperationKind::Read)
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(grants.len().await, 10);
    }
}
