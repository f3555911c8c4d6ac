//! # Example: fair_chain
//!
//! Successive saves of one document, serialized in submission order, with one
//! stalled save that outlives its lifetime.
//!
//! Demonstrates how to:
//! - Attach the built-in [`LogWriter`] through [`Synchronizer::builder`].
//! - Bind a function to a resource with [`Synchronizer::wrap`].
//! - Observe a timeout releasing the key while the stalled save keeps running.
//!
//! ## Flow
//! ```text
//! save(1) ──► CallAccepted ──► CallStarting ──► CallCompleted ──► SlotReleased(handed_off)
//! save(2) ──► CallQueued   ──► CallStarting ──► TimeoutHit    ──► SlotReleased(handed_off)
//! save(3) ──► CallQueued   ──► CallStarting ──► CallCompleted ──► SlotReleased(drained)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=callvisor=debug cargo run --example fair_chain --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use callvisor::{LogWriter, Policy, ResourceId, Subscribe, SyncConfig, Synchronizer, WrapOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("callvisor=debug")),
        )
        .init();

    // 1. Runtime with the logging subscriber
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sync = Synchronizer::builder(SyncConfig::default())
        .with_subscribers(subs)
        .build();

    // 2. Bind the save operation to one document
    let save = sync.wrap(
        ResourceId::named("doc-42"),
        "save",
        WrapOptions::new()
            .with_policy(Policy::Fair)
            .with_lifetime(Duration::from_millis(300)),
        |rev: u32| async move {
            // Revision 2 hits a slow disk.
            let cost = if rev == 2 { 800 } else { 100 };
            tokio::time::sleep(Duration::from_millis(cost)).await;
            println!("[save] revision {rev} written after {cost}ms");
            Ok::<_, anyhow::Error>(rev)
        },
    );

    // 3. Submit three revisions back to back; they run one after another
    let pending: Vec<_> = (1..=3).filter_map(|rev| save.call(rev)).collect();
    for (rev, p) in (1..=3).zip(pending) {
        match p.await {
            Ok(v) => println!("[main] revision {v} saved"),
            Err(e) => println!("[main] revision {rev}: {}", e.as_message()),
        }
    }

    // 4. Let the abandoned revision finish, then flush the logger and stop
    tokio::time::sleep(Duration::from_millis(600)).await;
    sync.close().await?;
    Ok(())
}
