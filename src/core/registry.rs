//! # Key registry: per-key chain and lock state.
//!
//! Maps each busy [`Key`] to its [`SlotState`]. An entry exists only while the
//! key is busy; it is created lazily by the first call and removed by the call
//! that leaves the key idle.
//!
//! ## Architecture
//! ```text
//! submit()  ──► chain(key, ticket, release)   Fair
//!           ──► try_lock(key, ticket)         Exclusive / Polling / OneShot
//!
//! SlotGuard::drop ──► clear_if(key, ticket)   (every policy)
//!
//!            DashMap<Key, SlotState>
//!               ├─ Chained { tail, release, drained } (fair chain)
//!               └─ Locked  { holder, released } (lock / gate)
//! ```
//!
//! ## Rules
//! - Read-modify-write on a key happens under that key's shard lock: two
//!   arrivals can never both see the key idle.
//! - Operations on different keys never wait for each other beyond shard
//!   contention.
//! - `clear_if` only removes the entry if it still belongs to the given ticket,
//!   so overlapping releases are idempotent.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{oneshot, watch};

use crate::keys::Key;

/// State of one busy key.
pub(crate) enum SlotState {
    /// Fair chain: the last enqueued call and the signal it fires on settle.
    Chained {
        /// Ticket of the current tail.
        tail: u64,
        /// Completes when the tail settles; the next arrival waits on it.
        release: oneshot::Receiver<()>,
        /// Dropped together with the entry, when the chain drains.
        drained: watch::Sender<()>,
    },

    /// Lock held by one call.
    Locked {
        /// Ticket of the holder.
        holder: u64,
        /// Dropped together with the entry; waiters observe the drop.
        released: watch::Sender<()>,
    },
}

impl SlotState {
    fn owner(&self) -> u64 {
        match self {
            SlotState::Chained { tail, .. } => *tail,
            SlotState::Locked { holder, .. } => *holder,
        }
    }

    fn view(&self) -> SlotView {
        match self {
            SlotState::Chained { tail, .. } => SlotView::Chained { tail: *tail },
            SlotState::Locked { holder, .. } => SlotView::Locked { holder: *holder },
        }
    }

    /// Subscribes to the moment this entry leaves the registry.
    fn idle_signal(&self) -> watch::Receiver<()> {
        match self {
            SlotState::Chained { drained, .. } => drained.subscribe(),
            SlotState::Locked { released, .. } => released.subscribe(),
        }
    }
}

/// Read-only snapshot of a busy key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotView {
    /// A fair chain is running; `tail` is the ticket of the last enqueued call.
    Chained {
        /// Ticket of the last enqueued call.
        tail: u64,
    },
    /// A lock or gate is held by the call with ticket `holder`.
    Locked {
        /// Ticket of the holding call.
        holder: u64,
    },
}

/// Outcome of an admission attempt on the registry.
pub(crate) enum Admit {
    /// The key was idle; the caller now owns it and may start right away.
    Idle,
    /// Appended to a fair chain; start once the predecessor's signal completes.
    Behind(oneshot::Receiver<()>),
    /// The key is busy in a way the caller cannot join; the receiver errors
    /// out when the key goes idle.
    Busy(watch::Receiver<()>),
}

/// Concurrent registry of busy keys.
#[derive(Default)]
pub(crate) struct Registry {
    slots: DashMap<Key, SlotState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the key's state (`None` = idle).
    pub fn get(&self, key: &Key) -> Option<SlotView> {
        self.slots.get(key).map(|s| s.view())
    }

    /// Appends `ticket` to the key's fair chain.
    ///
    /// `release` completes when this call settles. A key currently held by a
    /// lock policy cannot be chained onto: the caller gets [`Admit::Busy`] and
    /// retries once the lock is gone.
    pub fn chain(&self, key: &Key, ticket: u64, release: oneshot::Receiver<()>) -> Admit {
        match self.slots.entry(key.clone()) {
            Entry::Vacant(v) => {
                let (drained, _) = watch::channel(());
                v.insert(SlotState::Chained {
                    tail: ticket,
                    release,
                    drained,
                });
                Admit::Idle
            }
            Entry::Occupied(mut o) => match o.get_mut() {
                SlotState::Chained {
                    tail,
                    release: prev,
                    ..
                } => {
                    *tail = ticket;
                    Admit::Behind(std::mem::replace(prev, release))
                }
                locked @ SlotState::Locked { .. } => Admit::Busy(locked.idle_signal()),
            },
        }
    }

    /// Takes the key's lock for `ticket`, or subscribes to the key going idle.
    ///
    /// Never returns [`Admit::Behind`].
    pub fn try_lock(&self, key: &Key, ticket: u64) -> Admit {
        match self.slots.entry(key.clone()) {
            Entry::Vacant(v) => {
                let (released, _) = watch::channel(());
                v.insert(SlotState::Locked {
                    holder: ticket,
                    released,
                });
                Admit::Idle
            }
            Entry::Occupied(o) => Admit::Busy(o.get().idle_signal()),
        }
    }

    /// Removes the key's entry if it still belongs to `ticket`.
    ///
    /// Returns `true` if the entry was removed (the key is idle now).
    pub fn clear_if(&self, key: &Key, ticket: u64) -> bool {
        self.slots
            .remove_if(key, |_, state| state.owner() == ticket)
            .is_some()
    }

    /// Snapshot of the busy keys.
    pub fn keys(&self) -> Vec<Key> {
        self.slots.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of busy keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if no key is busy.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ResourceId;

    fn key(slot: &str) -> Key {
        Key::new(ResourceId::named("test"), slot)
    }

    #[test]
    fn first_chain_member_has_no_predecessor() {
        let reg = Registry::new();
        let (_tx1, rx1) = oneshot::channel();
        let (_tx2, rx2) = oneshot::channel();

        assert!(matches!(reg.chain(&key("a"), 1, rx1), Admit::Idle));
        assert!(matches!(reg.chain(&key("a"), 2, rx2), Admit::Behind(_)));
        assert_eq!(reg.get(&key("a")), Some(SlotView::Chained { tail: 2 }));
    }

    #[tokio::test]
    async fn predecessor_signal_is_handed_to_successor() {
        let reg = Registry::new();
        let (tx1, rx1) = oneshot::channel();
        let (_tx2, rx2) = oneshot::channel();
        reg.chain(&key("a"), 1, rx1);
        let Admit::Behind(prev) = reg.chain(&key("a"), 2, rx2) else {
            panic!("second call must queue");
        };

        tx1.send(()).unwrap();
        assert!(prev.await.is_ok());
    }

    #[test]
    fn clear_is_owner_checked_and_idempotent() {
        let reg = Registry::new();
        let (_tx1, rx1) = oneshot::channel();
        let (_tx2, rx2) = oneshot::channel();
        reg.chain(&key("a"), 1, rx1);
        reg.chain(&key("a"), 2, rx2);

        assert!(!reg.clear_if(&key("a"), 1), "non-tail must not clear");
        assert!(reg.clear_if(&key("a"), 2));
        assert!(!reg.clear_if(&key("a"), 2), "second clear is a no-op");
        assert!(reg.is_empty());
    }

    #[test]
    fn lock_is_exclusive_per_key() {
        let reg = Registry::new();
        assert!(matches!(reg.try_lock(&key("a"), 1), Admit::Idle));
        assert!(matches!(reg.try_lock(&key("a"), 2), Admit::Busy(_)));
        assert!(matches!(reg.try_lock(&key("b"), 3), Admit::Idle));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(&key("a")), Some(SlotView::Locked { holder: 1 }));
    }

    #[tokio::test]
    async fn release_wakes_lock_waiters() {
        let reg = Registry::new();
        assert!(matches!(reg.try_lock(&key("a"), 1), Admit::Idle));
        let Admit::Busy(mut released) = reg.try_lock(&key("a"), 2) else {
            panic!("lock should be busy");
        };

        assert!(reg.clear_if(&key("a"), 1));
        assert!(released.changed().await.is_err(), "sender dropped with the entry");
        assert!(matches!(reg.try_lock(&key("a"), 2), Admit::Idle));
    }

    #[tokio::test]
    async fn mixed_policies_wait_for_idle() {
        let reg = Registry::new();
        let (_tx, rx) = oneshot::channel();
        reg.chain(&key("a"), 1, rx);
        let Admit::Busy(mut drained) = reg.try_lock(&key("a"), 2) else {
            panic!("a chained key is busy for lock policies");
        };

        assert!(reg.clear_if(&key("a"), 1));
        assert!(drained.changed().await.is_err());

        assert!(matches!(reg.try_lock(&key("a"), 3), Admit::Idle));
        let (_tx, rx) = oneshot::channel();
        assert!(matches!(reg.chain(&key("a"), 4, rx), Admit::Busy(_)));
    }
}
