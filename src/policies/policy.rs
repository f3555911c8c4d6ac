//! # Per-key queueing policy
//!
//! Calls are serialized per [`Key`](crate::Key). At any given time at most
//! **one** call may run for a key. When a new call arrives while the key is
//! busy, the policy decides what to do with it.
//!
//! ## Variants
//! - `Fair`: **Append** the call to the key's chain (FIFO). Nothing is lost.
//! - `Exclusive`: **Drop** the call if the key is busy.
//! - `Polling`: **Wait** until the key is free, then run.
//! - `OneShot`: **Drop** the call if the key's gate is closed.
//!
//! ## Invariants
//! - Calls sharing a key never run in parallel (use distinct keys for parallelism).
//! - Chained calls start strictly in submission order.
//! - A call that fails, panics or times out always frees the key.

/// Policy controlling how a call is handled when its key is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Queue the call behind the running one (FIFO).
    ///
    /// Use when:
    /// - Every submission must execute
    /// - Order matters
    /// - Example: persisting successive edits of a document
    #[default]
    Fair,

    /// Skip the call if one is already running.
    ///
    /// Use when:
    /// - Redundant work should be avoided
    /// - Only one refresh at a time makes sense
    /// - Example: "reload" button handlers
    Exclusive,

    /// Wait for the running call to finish, then run.
    ///
    /// Use when:
    /// - Every submission must execute but order does not matter
    /// - Example: best-effort cache fills
    Polling,

    /// Gate: skip the call while the gate is closed; it reopens when the
    /// running call settles.
    ///
    /// Behaves like [`Policy::Exclusive`] today; kept separate so gate reset
    /// rules can diverge without touching exclusive callers.
    OneShot,
}

impl Policy {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Policy::Fair => "fair",
            Policy::Exclusive => "exclusive",
            Policy::Polling => "polling",
            Policy::OneShot => "one_shot",
        }
    }

    /// True if calls arriving on a busy key are dropped.
    #[inline]
    pub fn drops_when_busy(&self) -> bool {
        matches!(self, Policy::Exclusive | Policy::OneShot)
    }

    /// True if the key state is a chain rather than a lock.
    #[inline]
    pub fn is_chained(&self) -> bool {
        matches!(self, Policy::Fair)
    }
}
