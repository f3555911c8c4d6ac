//! # Subscribe: observing calls.
//!
//! Implement [`Subscribe`] to export metrics, ship logs or alert on timeouts.
//! Attach implementations with
//! [`SynchronizerBuilder::with_subscribers`](crate::SynchronizerBuilder::with_subscribers).
//!
//! A subscriber runs on its own worker behind a bounded lane (see
//! [`SubscriberSet`](crate::SubscriberSet)). It sees events in publish order and
//! never delays the calls it observes: when it falls behind, events are dropped
//! for it alone.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use callvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct TimeoutCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for TimeoutCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TimeoutHit {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "timeouts" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of call events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    ///
    /// Runs on the subscriber's worker task. A panic here is caught and logged.
    async fn on_event(&self, event: &Event);

    /// Name used in diagnostics and by [`SubscriberSet::dropped`](crate::SubscriberSet::dropped).
    ///
    /// Defaults to the full type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Lane capacity (at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
