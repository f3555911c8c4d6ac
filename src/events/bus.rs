//! # Bus: where call events go first.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Every call task
//! publishes to it; the synchronizer's listener forwards to the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Consumer (one):
//!   submit()    ──┐
//!   call task 1 ──┼──────► Bus ───────► subscriber listener ────► SubscriberSet
//!   call task N ──┤  (broadcast chan)     (in Synchronizer)
//!   SlotGuard   ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and never fails.
//! - **Bounded capacity**: one ring buffer shared by all receivers.
//! - **Lag**: a receiver that falls `n` events behind sees `RecvError::Lagged(n)` and resumes at the oldest retained event.
//! - **No persistence**: events are lost if there is no receiver at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Shared sender side of the event channel.
///
/// Cloneable; clones share the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver observing events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publishes the event built by `build`, or skips building it when
    /// nobody is listening.
    pub fn publish_with(&self, build: impl FnOnce() -> Event) {
        if !self.is_idle() {
            self.publish(build());
        }
    }

    /// True if nobody is listening.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.tx.receiver_count() == 0
    }
}
