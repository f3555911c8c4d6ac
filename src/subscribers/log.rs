//! # LogWriter: events to `tracing`
//!
//! A minimal subscriber that writes incoming [`Event`]s through `tracing`.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  callvisor: accepted key="expirable-synchronized-save@cart" ticket=1 policy=fair
//! INFO  callvisor: queued key="expirable-synchronized-save@cart" ticket=2 policy=fair
//! WARN  callvisor: timeout key="expirable-synchronized-save@cart" ticket=1 lifetime_ms=300
//! DEBUG callvisor: released key="expirable-synchronized-save@cart" ticket=1 reason="handed_off"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let key = e.key.as_deref().unwrap_or("-");
        let ticket = e.ticket.unwrap_or_default();
        let policy = e.policy.map(|p| p.as_label()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::CallAccepted => {
                tracing::info!(target: "callvisor", key, ticket, policy, "accepted");
            }
            EventKind::CallQueued => {
                tracing::info!(target: "callvisor", key, ticket, policy, "queued");
            }
            EventKind::CallDropped => {
                tracing::info!(target: "callvisor", key, policy, "dropped");
            }
            EventKind::CallWaiting => {
                tracing::debug!(target: "callvisor", key, ticket, "waiting for lock");
            }
            EventKind::AcquireTimedOut => {
                tracing::warn!(target: "callvisor", key, ticket, reason, "gave up waiting");
            }
            EventKind::CallStarting => {
                tracing::debug!(target: "callvisor", key, ticket, lifetime_ms = ?e.lifetime_ms, "starting");
            }
            EventKind::CallCompleted => {
                tracing::debug!(target: "callvisor", key, ticket, "completed");
            }
            EventKind::CallFailed => {
                tracing::warn!(target: "callvisor", key, ticket, reason, "failed");
            }
            EventKind::TimeoutHit => {
                tracing::warn!(target: "callvisor", key, ticket, lifetime_ms = ?e.lifetime_ms, "timeout");
            }
            EventKind::SlotReleased => {
                tracing::debug!(target: "callvisor", key, ticket, reason, "released");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "callvisor", "shutdown requested");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
