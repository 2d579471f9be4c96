//! Interactive prompt — answer concurrent agent requests from the terminal.
//!
//! This example demonstrates the broker end to end:
//! - Several agent tasks ask for permission at the same time
//! - `DecisionSurface` shows one request at a time, in arrival order
//! - Each answer is routed back to the agent that asked
//!
//! Keys: `d` deny, `o` allow once, `s` allow for session, anything else
//! (or EOF) closes the prompt, which denies.
//!
//! ## Run
//! ```sh
//! cargo run -p demos --example interactive_prompt
//! ```

use permission_broker::prelude::*;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

fn agent_requests() -> Vec<PermissionRequest> {
    vec![
        PermissionRequest::new("indexer", OperationKind::List, "/home/me/notes")
            .with_requester_name("Indexer")
            .with_reason("Build the search index"),
        PermissionRequest::new("editor", OperationKind::Write, "/home/me/notes/todo.md")
            .with_requester_name("Editor Agent")
            .with_reason("Append today's tasks"),
        PermissionRequest::new("janitor", OperationKind::Delete, "/home/me/.cache/thumbs")
            .with_requester_name("Janitor")
            .with_reason("Free 2 GB of stale thumbnails"),
        PermissionRequest::new("builder", OperationKind::Execute, "cargo build --release")
            .with_reason("Verify the workspace compiles"),
        PermissionRequest::new("syncer", "rename_file", "/home/me/notes/old.md")
            .with_requester_name("Sync Agent"),
    ]
}

fn print_view(view: &SurfaceView, waiting: usize) {
    println!();
    println!("┌─ [{}] {} ({} risk)", view.icon, view.label, view.risk);
    println!("│  {}", view.summary);
    if !view.reason.is_empty() {
        println!("│  Reason: {}", view.reason);
    }
    if waiting > 0 {
        println!("│  {} more waiting", waiting);
    }
    let choices: Vec<String> = view
        .actions
        .iter()
        .map(|action| match action {
            SurfaceAction::Deny => format!("[d] {}", action.label()),
            SurfaceAction::AllowOnce => format!("[o] {}", action.label()),
            SurfaceAction::AllowSession => format!("[s] {}", action.label()),
        })
        .collect();
    println!("└─ {}  [esc] Close", choices.join("  "));
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

    let grants = MemoryGrantAuthority::new();
    let broker = Broker::builder()
        .grant_authority(grants.clone())
        .options(
            BrokerOptions::builder()
                .grant_timeout(Duration::from_secs(5))
                .build(),
        )
        .build()?;
    let mut surface = DecisionSurface::new(broker.clone());

    // --- 1. Agents ask concurrently ---
    println!("=== Agents requesting permission ===");

    let mut agents = Vec::new();
    for request in agent_requests() {
        let broker = broker.clone();
        agents.push(tokio::spawn(async move {
            let who = request.requester_display().to_string();
            let what = format!("{} {}", request.operation, request.path);
            let decision = broker.request(request).await;
            (who, what, decision)
        }));
    }
    let total = agents.len();

    // --- 2. One human answers them one by one ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for _ in 0..total {
        let Some(view) = surface.next_request().await else {
            break;
        };
        print_view(&view, broker.queue_len());

        let choice = lines.next_line().await?.unwrap_or_default();
        let emission = match choice.trim() {
            "d" => surface.deny().await,
            "o" => surface.allow_once().await,
            "s" => surface.allow_session().await,
            _ => surface.close().await,
        };
        if emission != Emission::Sent {
            println!("  (ignored: {:?})", emission);
        }
    }

    // --- 3. Every agent got exactly one answer ---
    println!("\n=== Outcomes ===\n");
    for agent in agents {
        let (who, what, decision) = agent.await?;
        match decision {
            Ok(Decision { allowed: true, scope }) => {
                println!("  ALLOW ({scope}): {who} → {what}")
            }
            Ok(_) => println!("  DENY:          {who} → {what}"),
            Err(e) => println!("  ERROR:         {who} → {what}: {e}"),
        }
    }

    println!("\nSession grants held: {}", grants.len().await);
    Ok(())
}
