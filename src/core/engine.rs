//! # Policy engine: admission, execution and release of one call.
//!
//! The [`Engine`] is the shared, cheaply cloneable core behind a
//! [`Synchronizer`](crate::Synchronizer). Every accepted call owns a
//! [`SlotGuard`] for its key; the guard is the only thing that ever clears
//! registry state.
//!
//! ## Lifecycle
//! ```text
//! submit() ──► admit(call)                       (synchronous, under the key's shard lock)
//!                 ├─ Owned { guard, prev: None }  ─► CallAccepted
//!                 ├─ Owned { guard, prev: Some }  ─► CallQueued     (fair chain)
//!                 └─ Busy(idle)
//!                      ├─ Exclusive / OneShot     ─► CallDropped    (nothing spawned)
//!                      └─ Polling / Fair          ─► CallWaiting
//!
//! invoke()  (spawned task)
//!   ├─► Busy: wait for idle / shutdown / acquire_timeout, then admit again
//!   ├─► await predecessor release (fair chain)
//!   ├─► publish CallStarting          (lifetime starts here)
//!   ├─► race(operation, lifetime)
//!   ├─► publish CallCompleted | CallFailed | TimeoutHit
//!   └─► drop(SlotGuard)
//!          ├─► release successor (fair chain)
//!          ├─► registry.clear_if(key, ticket)
//!          └─► publish SlotReleased { "drained" | "handed_off" }
//! ```
//!
//! ## Rules
//! - The operation factory runs only once the call owns its key and its
//!   predecessor has settled.
//! - A guard dropped by unwinding or task cancellation releases the key like a
//!   normal settle.
//! - Fair calls arriving on a key held under a lock policy wait for the key to
//!   go idle and then join a fresh chain; ordering between such late joiners is
//!   not guaranteed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    error::CallError,
    events::{Bus, Event, EventKind},
    keys::Key,
    policies::Policy,
};

use super::race::{TimerStats, race};
use super::registry::{Admit, Registry};

/// One admitted or pending invocation.
#[derive(Clone, Debug)]
pub(crate) struct Call {
    pub key: Key,
    /// Rendered key, shared by every event of this call.
    pub label: Arc<str>,
    pub ticket: u64,
    pub policy: Policy,
    pub lifetime: Option<Duration>,
}

impl Call {
    pub fn new(key: Key, ticket: u64, policy: Policy, lifetime: Option<Duration>) -> Self {
        let label: Arc<str> = key.to_string().into();
        Self {
            key,
            label,
            ticket,
            policy,
            lifetime,
        }
    }
}

/// Result of [`Engine::admit`].
pub(crate) enum Admission {
    /// The call owns its key. `prev` is the fair predecessor to wait for.
    Owned {
        guard: SlotGuard,
        prev: Option<oneshot::Receiver<()>>,
    },
    /// The key is busy; `idle` errors out once it goes idle.
    Busy(watch::Receiver<()>),
}

/// Releases a call's key when dropped.
pub(crate) struct SlotGuard {
    registry: Arc<Registry>,
    bus: Bus,
    key: Key,
    label: Arc<str>,
    ticket: u64,
    policy: Policy,
    release: Option<oneshot::Sender<()>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
        let drained = self.registry.clear_if(&self.key, self.ticket);

        self.bus.publish_with(|| {
            Event::new(EventKind::SlotReleased)
                .with_key(Arc::clone(&self.label))
                .with_ticket(self.ticket)
                .with_policy(self.policy)
                .with_reason(if drained { "drained" } else { "handed_off" })
        });
    }
}

/// Shared serialization core.
#[derive(Clone)]
pub(crate) struct Engine {
    registry: Arc<Registry>,
    timers: Arc<TimerStats>,
    bus: Bus,
    token: CancellationToken,
    acquire_limit: Option<Duration>,
}

impl Engine {
    pub fn new(bus: Bus, token: CancellationToken, acquire_limit: Option<Duration>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            timers: Arc::new(TimerStats::new()),
            bus,
            token,
            acquire_limit,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn timers(&self) -> &TimerStats {
        &self.timers
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Attaches the call to its key according to its policy.
    pub fn admit(&self, call: &Call) -> Admission {
        if call.policy.is_chained() {
            let (tx, rx) = oneshot::channel();
            match self.registry.chain(&call.key, call.ticket, rx) {
                Admit::Idle => Admission::Owned {
                    guard: self.guard(call, Some(tx)),
                    prev: None,
                },
                Admit::Behind(prev) => Admission::Owned {
                    guard: self.guard(call, Some(tx)),
                    prev: Some(prev),
                },
                Admit::Busy(idle) => Admission::Busy(idle),
            }
        } else {
            match self.registry.try_lock(&call.key, call.ticket) {
                Admit::Idle | Admit::Behind(_) => Admission::Owned {
                    guard: self.guard(call, None),
                    prev: None,
                },
                Admit::Busy(idle) => Admission::Busy(idle),
            }
        }
    }

    /// Publishes the admission event matching `admission`.
    pub fn announce(&self, call: &Call, admission: &Admission) {
        let kind = match admission {
            Admission::Owned { prev: None, .. } => EventKind::CallAccepted,
            Admission::Owned { prev: Some(_), .. } => EventKind::CallQueued,
            Admission::Busy(_) if call.policy.drops_when_busy() => EventKind::CallDropped,
            Admission::Busy(_) => EventKind::CallWaiting,
        };
        self.bus.publish_with(|| {
            let mut ev = self.event(kind, call);
            if kind == EventKind::CallDropped {
                // Dropped calls never own their ticket.
                ev.ticket = None;
            }
            ev
        });
    }

    /// Drives an admitted call to completion.
    ///
    /// `make` is invoked once, right before the operation starts.
    pub async fn invoke<T, E, F, Fut>(
        self,
        call: Call,
        admission: Admission,
        make: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (guard, prev) = match admission {
            Admission::Owned { guard, prev } => (guard, prev),
            Admission::Busy(idle) => self.acquire(&call, idle).await?,
        };

        if let Some(prev) = prev {
            // Ok or Err, the predecessor has settled.
            let _ = prev.await;
        }

        self.execute(&call, guard, make()).await
    }

    /// Waits until the key can be owned, retrying admission on every release.
    async fn acquire<E>(
        &self,
        call: &Call,
        mut idle: watch::Receiver<()>,
    ) -> Result<(SlotGuard, Option<oneshot::Receiver<()>>), CallError<E>> {
        let started = Instant::now();
        let deadline = match call.policy {
            Policy::Polling => self.acquire_limit.map(|d| started + d),
            _ => None,
        };

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(CallError::Shutdown),
                _ = idle.changed() => {}
                _ = sleep_until(deadline) => {
                    let waited = started.elapsed();
                    self.bus.publish_with(|| {
                        self.event(EventKind::AcquireTimedOut, call)
                            .with_reason(format!("waited {waited:?}"))
                    });
                    return Err(CallError::AcquireTimeout { waited });
                }
            }

            match self.admit(call) {
                Admission::Owned { guard, prev } => {
                    let kind = match prev {
                        Some(_) => EventKind::CallQueued,
                        None => EventKind::CallAccepted,
                    };
                    self.bus.publish_with(|| self.event(kind, call));
                    return Ok((guard, prev));
                }
                Admission::Busy(next) => idle = next,
            }
        }
    }

    /// Runs the operation against the call's lifetime, then releases the key.
    async fn execute<T, E, Fut>(
        &self,
        call: &Call,
        guard: SlotGuard,
        operation: Fut,
    ) -> Result<T, CallError<E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.bus.publish_with(|| {
            let starting = self.event(EventKind::CallStarting, call);
            match call.lifetime {
                Some(lifetime) => starting.with_lifetime(lifetime),
                None => starting,
            }
        });

        let out = race(operation, call.lifetime, &self.timers).await;

        self.bus.publish_with(|| match &out {
            Ok(_) => self.event(EventKind::CallCompleted, call),
            Err(CallError::Timeout { lifetime }) => {
                self.event(EventKind::TimeoutHit, call).with_lifetime(*lifetime)
            }
            Err(CallError::Panicked { reason }) => self
                .event(EventKind::CallFailed, call)
                .with_reason(format!("panic: {reason}")),
            Err(e) => self.event(EventKind::CallFailed, call).with_reason(e.as_label()),
        });

        drop(guard);
        out
    }

    fn guard(&self, call: &Call, release: Option<oneshot::Sender<()>>) -> SlotGuard {
        SlotGuard {
            registry: Arc::clone(&self.registry),
            bus: self.bus.clone(),
            key: call.key.clone(),
            label: Arc::clone(&call.label),
            ticket: call.ticket,
            policy: call.policy,
            release,
        }
    }

    fn event(&self, kind: EventKind, call: &Call) -> Event {
        Event::new(kind)
            .with_key(Arc::clone(&call.label))
            .with_ticket(call.ticket)
            .with_policy(call.policy)
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
