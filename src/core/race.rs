//! # Timed race: an operation against its lifetime.
//!
//! Runs one operation alongside one timer and settles on whichever finishes first.
//!
//! - **Spawn** the operation as its own tokio task
//! - **Race** the join handle against `tokio::time::sleep(lifetime)`
//! - **Count** the timer in [`TimerStats`] (one start, one cancel per race)
//!
//! ## Outcomes
//! ```text
//! operation first:
//!   Ok(v)   ──► Ok(v)                 timer cancelled
//!   Err(e)  ──► CallError::Failed(e)  timer cancelled
//!   panic   ──► CallError::Panicked   timer cancelled
//!
//! timer first:
//!   ──► CallError::Timeout { lifetime }
//!       join handle dropped: the operation keeps running detached,
//!       its result is discarded
//! ```
//!
//! ## Rules
//! - The operation is **never** cancelled by the race.
//! - Ties go to the operation (`biased` select).
//! - The timer is released by a drop guard, so a dropped race future still
//!   records its cancellation.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinError;
use tokio::time;

use crate::error::CallError;

/// Timer instrumentation shared by every race of a synchronizer.
///
/// `started` and `cancelled` only ever grow; once every call has settled they
/// are equal.
#[derive(Debug, Default)]
pub struct TimerStats {
    started: AtomicU64,
    cancelled: AtomicU64,
}

impl TimerStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lifetime timers started so far.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Acquire)
    }

    /// Number of lifetime timers cancelled so far.
    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Timers currently armed.
    pub fn in_flight(&self) -> u64 {
        self.started().saturating_sub(self.cancelled())
    }

    fn arm(&self) -> ArmedTimer<'_> {
        self.started.fetch_add(1, Ordering::AcqRel);
        ArmedTimer { stats: self }
    }
}

/// Records the cancellation of one timer when dropped.
struct ArmedTimer<'a> {
    stats: &'a TimerStats,
}

impl Drop for ArmedTimer<'_> {
    fn drop(&mut self) {
        self.stats.cancelled.fetch_add(1, Ordering::AcqRel);
    }
}

/// Runs `operation` against `lifetime` (`None` = no timer).
///
/// Must be called inside a tokio runtime.
pub(crate) async fn race<T, E, Fut>(
    operation: Fut,
    lifetime: Option<Duration>,
    timers: &TimerStats,
) -> Result<T, CallError<E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let mut handle = tokio::spawn(operation);

    let Some(lifetime) = lifetime else {
        return settle(handle.await);
    };

    let _timer = timers.arm();
    let sleep = time::sleep(lifetime);
    tokio::pin!(sleep);

    tokio::select! {
        biased;
        joined = &mut handle => settle(joined),
        _ = &mut sleep => Err(CallError::Timeout { lifetime }),
    }
}

/// Maps a joined operation task to the call outcome.
fn settle<T, E>(joined: Result<Result<T, E>, JoinError>) -> Result<T, CallError<E>> {
    match joined {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(CallError::Failed(e)),
        Err(je) if je.is_panic() => Err(CallError::Panicked {
            reason: panic_reason(je.into_panic().as_ref()),
        }),
        Err(_) => Err(CallError::Setup {
            reason: "operation task cancelled".to_string(),
        }),
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
