//! # Example: policies
//!
//! Same burst of calls under each policy, side by side.
//!
//! Shows how to:
//! - Submit raw futures with [`Synchronizer::submit`].
//! - Tell dropped calls (`None`) from accepted ones.
//! - Bound polling waits with `SyncConfig::acquire_timeout`.
//!
//! ## Flow
//! ```text
//! burst of 4 calls on one key, 100ms each:
//!   Fair      ─► all run, in order
//!   Exclusive ─► first runs, rest dropped
//!   OneShot   ─► first runs, rest dropped
//!   Polling   ─► all run one at a time; late ones give up after acquire_timeout
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example policies
//! ```

use std::time::Duration;

use callvisor::{Policy, ResourceId, SyncConfig, Synchronizer};
use tokio::time::Instant;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = SyncConfig {
        acquire_timeout: Duration::from_millis(250),
        ..SyncConfig::default()
    };
    let sync = Synchronizer::new(cfg);
    let job = ResourceId::named("report");

    for policy in [Policy::Fair, Policy::Exclusive, Policy::OneShot, Policy::Polling] {
        let key = sync.key(&job, policy.as_label());
        let started = Instant::now();

        let pending: Vec<_> = (0..4)
            .map(|i| {
                let call = sync.submit(key.clone(), policy, Duration::from_secs(1), async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, anyhow::Error>(i)
                });
                (i, call)
            })
            .collect();

        for (i, call) in pending {
            let Some(p) = call else {
                println!("[{:>9}] call {i}: dropped", policy.as_label());
                continue;
            };
            match p.await {
                Ok(_) => println!(
                    "[{:>9}] call {i}: done at {:?}",
                    policy.as_label(),
                    started.elapsed()
                ),
                Err(e) => println!("[{:>9}] call {i}: {}", policy.as_label(), e.as_label()),
            }
        }
    }

    sync.shutdown()?;
    Ok(())
}
