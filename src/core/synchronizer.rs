//! # Synchronizer: the public entry point.
//!
//! The [`Synchronizer`] owns the event bus, the [`SubscriberSet`], the key
//! registry (through its engine) and the runtime configuration. Calls reach it
//! either raw through [`Synchronizer::submit`] or through a
//! [`BoundOperation`] created by [`Synchronizer::wrap`].
//!
//! ## High-level architecture
//! ```text
//! submit(key, policy, lifetime, op) / BoundOperation::call(args)
//!        │
//!        ▼
//!   dispatch()                                     (synchronous)
//!        ├─ shut down?        ─► Pending::ready(Err(Shutdown))
//!        ├─ no tokio runtime? ─► Pending::ready(Err(Setup))
//!        ├─ ticket += 1
//!        ├─ engine.admit(call) ─► Busy + Exclusive/OneShot ─► None (dropped)
//!        └─ spawn(engine.invoke(call, admission, factory)) ─► Some(Pending)
//!
//! Event flow:
//!   engine / SlotGuard ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit
//!
//! Shutdown path:
//!   shutdown()
//!        ├─► Bus.publish(ShutdownRequested)
//!        └─► runtime_token.cancel()
//!               ├─► waiting calls resolve with CallError::Shutdown
//!               └─► subscriber listener forwards what the bus holds,
//!                   then SubscriberSet::shutdown() and exits
//!
//!   close().await = shutdown() + wait for the listener
//! ```
//!
//! ## Rules
//! - Admission happens inside `submit`, before it returns: submission order is
//!   arrival order.
//! - Running and chained calls are never interrupted by shutdown.
//! - Dropping the synchronizer shuts it down.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use callvisor::{Policy, ResourceId, SyncConfig, Synchronizer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sync = Synchronizer::new(SyncConfig::default());
//!     let key = sync.key(&ResourceId::named("cart"), "checkout");
//!
//!     let first = sync
//!         .submit(key.clone(), Policy::Exclusive, Duration::from_secs(1), async {
//!             tokio::time::sleep(Duration::from_millis(20)).await;
//!             Ok::<_, std::io::Error>("charged")
//!         })
//!         .expect("idle key accepts");
//!
//!     // Still running: an exclusive call on the same key is dropped.
//!     let second = sync.submit(key, Policy::Exclusive, Duration::from_secs(1), async {
//!         Ok::<_, std::io::Error>("charged twice")
//!     });
//!     assert!(second.is_none());
//!
//!     assert_eq!(first.await.unwrap(), "charged");
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{CallError, RuntimeError},
    events::{Bus, Event, EventKind},
    invocation::{BoundOperation, Pending, WrapOptions},
    keys::{Key, ResourceId},
    policies::Policy,
    subscribers::SubscriberSet,
};

use super::{
    builder::SynchronizerBuilder,
    config::{SyncConfig, non_zero},
    engine::{Admission, Call, Engine},
    race::TimerStats,
    registry::SlotView,
};

/// Serializes calls per key according to a [`Policy`], bounding each call by a lifetime.
pub struct Synchronizer {
    cfg: SyncConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    engine: Engine,
    tickets: AtomicU64,
    closed: AtomicBool,
    runtime_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Synchronizer {
    /// Creates a synchronizer without subscribers.
    ///
    /// Does not need a tokio runtime; calls do.
    pub fn new(cfg: SyncConfig) -> Arc<Self> {
        Self::builder(cfg).build()
    }

    /// Creates a builder (to attach subscribers).
    pub fn builder(cfg: SyncConfig) -> SynchronizerBuilder {
        SynchronizerBuilder::new(cfg)
    }

    /// Wires the runtime together; spawns the subscriber listener when there
    /// are subscribers.
    pub(super) fn new_internal(cfg: SyncConfig, bus: Bus, subs: Arc<SubscriberSet>) -> Self {
        let runtime_token = CancellationToken::new();
        let engine = Engine::new(bus.clone(), runtime_token.clone(), cfg.acquire_limit());
        let listener = (!subs.is_empty()).then(|| {
            let rx = bus.subscribe();
            tokio::spawn(subscriber_listener(rx, Arc::clone(&subs), runtime_token.clone()))
        });

        Self {
            cfg,
            bus,
            subs,
            engine,
            tickets: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            runtime_token,
            listener: Mutex::new(listener),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Event bus; subscribe to observe events directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Key of `operation` on `resource` under the configured prefix.
    pub fn key(&self, resource: &ResourceId, operation: &str) -> Key {
        Key::with_prefix(resource.clone(), &self.cfg.key_prefix, operation)
    }

    /// Submits one call.
    ///
    /// `lifetime` bounds the call once it starts (`0s` = unbounded). Returns
    /// `None` if `policy` dropped the call; `operation` is never polled then.
    pub fn submit<T, E, Fut>(
        &self,
        key: Key,
        policy: Policy,
        lifetime: Duration,
        operation: Fut,
    ) -> Option<Pending<T, E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.dispatch(key, policy, non_zero(lifetime), move || operation)
    }

    /// Like [`submit`](Self::submit), with the configured policy and lifetime.
    pub fn submit_default<T, E, Fut>(&self, key: Key, operation: Fut) -> Option<Pending<T, E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.dispatch(
            key,
            self.cfg.policy,
            self.cfg.default_lifetime(),
            move || operation,
        )
    }

    /// Binds `f` to `operation` on `resource`.
    ///
    /// Options left unset inherit the configured policy, lifetime and prefix.
    pub fn wrap<F>(
        self: &Arc<Self>,
        resource: ResourceId,
        operation: &str,
        opts: WrapOptions,
        f: F,
    ) -> BoundOperation<F> {
        let prefix = opts.prefix.as_deref().unwrap_or(&*self.cfg.key_prefix);
        let key = Key::with_prefix(resource, prefix, operation);
        let policy = opts.policy.unwrap_or(self.cfg.policy);
        let lifetime = opts.lifetime.map_or(self.cfg.default_lifetime(), non_zero);

        BoundOperation::new(Arc::clone(self), key, policy, lifetime, f)
    }

    /// Admits the call and spawns its invocation.
    ///
    /// `make` produces the operation; it is not called for dropped or rejected calls.
    pub(crate) fn dispatch<T, E, F, Fut>(
        &self,
        key: Key,
        policy: Policy,
        lifetime: Option<Duration>,
        make: F,
    ) -> Option<Pending<T, E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if self.engine.is_shut_down() {
            return Some(Pending::ready(Err(CallError::Shutdown)));
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(key = %key, "call submitted outside of a tokio runtime");
            return Some(Pending::ready(Err(CallError::Setup {
                reason: "no tokio runtime".to_string(),
            })));
        };

        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed) + 1;
        let call = Call::new(key, ticket, policy, lifetime);
        let admission = self.engine.admit(&call);
        self.engine.announce(&call, &admission);

        if matches!(admission, Admission::Busy(_)) && policy.drops_when_busy() {
            return None;
        }

        let engine = self.engine.clone();
        let handle = runtime.spawn(engine.invoke(call, admission, make));
        Some(Pending::spawned(ticket, handle))
    }

    /// True while a call holds or is queued on `key`.
    pub fn is_busy(&self, key: &Key) -> bool {
        self.engine.registry().get(key).is_some()
    }

    /// Snapshot of the key's state (`None` = idle).
    pub fn slot(&self, key: &Key) -> Option<SlotView> {
        self.engine.registry().get(key)
    }

    /// Busy keys, sorted.
    pub fn active_keys(&self) -> Vec<Key> {
        let mut keys = self.engine.registry().keys();
        keys.sort();
        keys
    }

    /// Lifetime timer counters.
    pub fn timers(&self) -> &TimerStats {
        self.engine.timers()
    }

    /// Stops accepting calls and wakes every waiting call with
    /// [`CallError::Shutdown`].
    ///
    /// Running and chained calls finish normally.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyShutdown);
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();
        Ok(())
    }

    /// [`shutdown`](Self::shutdown), then waits until subscribers have handled
    /// every event published before it.
    ///
    /// Events of calls still running afterwards are not delivered.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        self.shutdown()?;
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
        Ok(())
    }

    /// True once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Forwards bus events to the subscriber set until shutdown, then flushes.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: Arc<SubscriberSet>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            ev = rx.recv() => match ev {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(ev) => set.emit(&ev),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "subscriber listener lagged behind the bus");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    set.shutdown().await;
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("cfg", &self.cfg)
            .field("subscribers", &self.subs.len())
            .field("busy_keys", &self.engine.registry().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
