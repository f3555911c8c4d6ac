//! # Call events.
//!
//! Every step of a call's life is published as an [`Event`]. Kinds fall into
//! three groups:
//! - **Admission events**: what the policy decided for an arriving call
//! - **Execution events**: the call's run and how it settled
//! - **Runtime events**: shutdown
//!
//! The [`Event`] struct carries metadata such as the key, ticket, policy and
//! configured lifetime.
//!
//! ## Ordering
//! `seq` comes from one process-wide counter. Subscribers that see events out of
//! order (several lanes, a lagged receiver) can sort on it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use callvisor::{Event, EventKind, Policy};
//!
//! let ev = Event::new(EventKind::TimeoutHit)
//!     .with_key("expirable-synchronized-save@cart")
//!     .with_ticket(3)
//!     .with_policy(Policy::Fair)
//!     .with_lifetime(Duration::from_millis(300));
//!
//! assert_eq!(ev.kind, EventKind::TimeoutHit);
//! assert_eq!(ev.lifetime_ms, Some(300));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::policies::Policy;

/// Next value handed out as `Event::seq`.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened to a call or to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission ===
    /// Call admitted on an idle key; it starts right away.
    ///
    /// Sets: `key`, `ticket`, `policy`.
    CallAccepted,

    /// Call appended to a busy fair chain.
    ///
    /// Sets: `key`, `ticket`, `policy`.
    CallQueued,

    /// Call dropped because the key was busy (exclusive / one-shot).
    ///
    /// Sets: `key`, `policy`.
    CallDropped,

    /// Polling call found the key locked and is waiting for release.
    ///
    /// Sets: `key`, `ticket`, `policy`.
    CallWaiting,

    /// Polling call gave up waiting (`acquire_timeout` exceeded).
    ///
    /// Sets: `key`, `ticket`, `policy`, `reason`.
    AcquireTimedOut,

    // === Execution ===
    /// Operation is starting; its lifetime starts now.
    ///
    /// Sets: `key`, `ticket`, `policy`, `lifetime_ms` (absent = unbounded).
    CallStarting,

    /// Operation returned `Ok`.
    ///
    /// Sets: `key`, `ticket`, `policy`.
    CallCompleted,

    /// Operation returned an error or panicked.
    ///
    /// Sets: `key`, `ticket`, `policy`, `reason`.
    CallFailed,

    /// Lifetime elapsed before the operation settled.
    ///
    /// Sets: `key`, `ticket`, `policy`, `lifetime_ms`.
    TimeoutHit,

    /// The call released its key.
    ///
    /// `reason` is `"drained"` when the key state was cleared and
    /// `"handed_off"` when another call already owns the key.
    ///
    /// Sets: `key`, `ticket`, `policy`, `reason`.
    SlotReleased,

    // === Runtime ===
    /// [`Synchronizer::shutdown`](crate::Synchronizer::shutdown) was called.
    ShutdownRequested,
}

/// One call event.
///
/// Only `seq`, `at` and `kind` are always present; each [`EventKind`] lists the
/// optional fields it fills.
#[derive(Clone, Debug)]
pub struct Event {
    /// Publish order across the process.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Rendered key (`slot@resource`).
    pub key: Option<Arc<str>>,
    /// Ticket of the call (unique per accepted call).
    pub ticket: Option<u64>,
    /// Policy the call was submitted with.
    pub policy: Option<Policy>,
    /// Configured lifetime in milliseconds (compact).
    pub lifetime_ms: Option<u32>,
    /// Human-readable reason (errors, release outcome).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps a bare event of `kind` with the next `seq` and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            key: None,
            ticket: None,
            policy: None,
            lifetime_ms: None,
            reason: None,
        }
    }

    /// Attaches a rendered key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a call ticket.
    #[inline]
    pub fn with_ticket(mut self, ticket: u64) -> Self {
        self.ticket = Some(ticket);
        self
    }

    /// Attaches the submission policy.
    #[inline]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Attaches a lifetime (stored as milliseconds).
    #[inline]
    pub fn with_lifetime(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.lifetime_ms = Some(ms);
        self
    }

    /// Sets the failure text or release outcome.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for events that end a call's execution (completed, failed, timed out).
    #[inline]
    pub fn is_settle(&self) -> bool {
        matches!(
            self.kind,
            EventKind::CallCompleted | EventKind::CallFailed | EventKind::TimeoutHit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::CallAccepted);
        let b = Event::new(EventKind::CallAccepted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn lifetime_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::TimeoutHit).with_lifetime(Duration::from_secs(u64::MAX / 4));
        assert_eq!(ev.lifetime_ms, Some(u32::MAX));
    }

    #[test]
    fn settle_kinds() {
        assert!(Event::new(EventKind::TimeoutHit).is_settle());
        assert!(Event::new(EventKind::CallFailed).is_settle());
        assert!(!Event::new(EventKind::SlotReleased).is_settle());
    }
}
