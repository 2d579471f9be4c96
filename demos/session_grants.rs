//! Session grants — persisting "allow for session" through a custom authority.
//!
//! This example demonstrates the outbound side of the broker:
//! - A custom `GrantAuthority` that persists grants (here: a JSON lines log)
//! - A flaky authority whose failures are reported but never block a decision
//! - Watching broker events to surface non-blocking warnings
//! - Withdrawing a queued request whose work was cancelled
//!
//! ## Run
//! ```sh
//! cargo run -p demos --example session_grants
//! ```

use async_trait::async_trait;
use permission_broker::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio_stream::StreamExt;

/// Authority that appends every grant to an in-memory JSON lines log,
/// failing every other call to simulate an unreliable store.
struct JournalAuthority {
    journal: Arc<Mutex<Vec<String>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl GrantAuthority for JournalAuthority {
    async fn grant_session(
        &self,
        requester_id: &str,
        operation: &OperationKind,
    ) -> Result<(), BrokerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(BrokerError::GrantFailed("journal is read-only".to_string()));
        }
        let line = serde_json::to_string(&json!({
            "requester_id": requester_id,
            "operation": operation,
            "scope": Scope::Session,
        }))?;
        self.journal.lock().await.push(line);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "permission_broker=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let journal = Arc::new(Mutex::new(Vec::new()));
    let broker = Broker::builder()
        .grant_authority(JournalAuthority {
            journal: journal.clone(),
            calls: AtomicUsize::new(0),
        })
        .options(BrokerOptions::from_json(r#"{ "grant_timeout_ms": 2000 }"#)?)
        .build()?;
    let surface = DecisionSurface::new(broker.clone());

    // Non-blocking warnings, the way a UI would show a toast
    let mut events = broker.event_stream();
    let notifier = tokio::spawn(async move {
        while let Some(Ok(event)) = events.next().await {
            if let BrokerEvent::GrantFailed { ticket, reason } = event {
                println!(
                    "  ⚠ could not remember approval for {} ({}): {}",
                    ticket.request().requester_display(),
                    ticket.request().operation,
                    reason
                );
            }
        }
    });

    // --- 1. Queue a few requests ---
    println!("=== Session grants ===\n");

    let write = broker.request(PermissionRequest::new("editor", OperationKind::Write, "/src/lib.rs"));
    let delete = broker.request(PermissionRequest::new("janitor", OperationKind::Delete, "/tmp/old"));
    let build = broker.request(PermissionRequest::new("builder", OperationKind::Execute, "make"));
    let list = broker.request(PermissionRequest::new("indexer", OperationKind::List, "/src"));

    // --- 2. The build was cancelled upstream; withdraw its queued request ---
    let withdrawn = broker.withdraw(build.ticket());
    println!("Withdrew queued build request: {}", withdrawn);

    // --- 3. Approve the rest for the session ---
    while surface.is_visible() {
        if let Some(view) = surface.render() {
            println!("Approving for session: {}", view.summary);
        }
        surface.allow_session().await;
    }

    println!();
    for (name, pending) in [("write", write), ("delete", delete), ("build", build), ("list", list)] {
        let decision = pending.await?;
        println!(
            "  {:<6} allowed={} scope={}",
            name, decision.allowed, decision.scope
        );
    }

    println!("\nJournal:");
    for line in journal.lock().await.iter() {
        println!("  {}", line);
    }

    drop(surface);
    drop(broker);
    notifier.await?;
    Ok(())
}
