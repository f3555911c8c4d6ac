//! # callvisor
//!
//! **Callvisor** serializes async calls per key, with a lifetime on every call.
//!
//! A key names a logical resource: an operation bound to one resource
//! instance. Calls sharing a key never run concurrently; what happens to a call
//! arriving while its key is busy is decided by a [`Policy`]. Every call is
//! raced against its lifetime, and a call that outlives it releases the key so
//! a stalled caller can never wedge the key.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   BoundOperation::call(args)        Synchronizer::submit(key, policy, lifetime, op)
//!              └──────────────┬──────────────────┘
//!                             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Synchronizer                                                     │
//! │  - Registry (DashMap<Key, SlotState>: chain tail / lock holder)   │
//! │  - Engine (admission per Policy, timed race, SlotGuard release)   │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐         │
//!   │ call #1  │       │ call #2  │       │ call #3  │         │
//!   │ (task)   │       │ (task)   │       │ (task)   │         │
//!   └┬─────────┘       └┬─────────┘       └┬─────────┘         │
//!    │ - CallStarting   │ - CallQueued     │ - CallWaiting     │
//!    │ - TimeoutHit     │ - CallCompleted  │ - CallAccepted    │
//!    │ - SlotReleased   │ - SlotReleased   │ - ...             │
//!    ▼                  ▼                  ▼                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                  (capacity: SyncConfig::bus_capacity)             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       subscriber listener ──► SubscriberSet
//!                                        ┌─────────┼─────────┐
//!                                        ▼         ▼         ▼
//!                                     worker1  worker2  workerN
//! ```
//!
//! ### Lifecycle of one call
//! ```text
//! submit ──► admit (synchronous)
//!   ├─ Fair       idle → run now │ busy → chain behind the tail
//!   ├─ Exclusive  idle → run now │ busy → dropped (None)
//!   ├─ OneShot    idle → run now │ busy → dropped (None)
//!   └─ Polling    idle → run now │ busy → wait for release, retry
//!
//! run ──► race(operation, lifetime)
//!   ├─ Ok / Err / panic first ─► outcome to the caller
//!   └─ lifetime first         ─► CallError::Timeout, operation left running detached
//!
//! settle ──► SlotGuard drop: release successor, clear key if nobody followed
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Serialization** | Per-key queueing with a lifetime per call.                 | [`Synchronizer`], [`Policy`]                 |
//! | **Invocation**    | Bind functions to resources, await outcomes.              | [`BoundOperation`], [`Pending`], [`WrapOptions`] |
//! | **Keys**          | Resource identity plus prefixed operation name.            | [`Key`], [`ResourceId`]                      |
//! | **Subscriber API**| Hook into call events (logging, metrics, custom).          | [`Subscribe`], [`Event`]                     |
//! | **Errors**        | Typed per-call and runtime errors.                         | [`CallError`], [`RuntimeError`]              |
//! | **Configuration** | Runtime-wide defaults.                                     | [`SyncConfig`]                               |
//!
//! ## Optional features
//! - `logging`: adds [`LogWriter`], a subscriber that writes every event through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use callvisor::{Policy, ResourceId, SyncConfig, Synchronizer, WrapOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sync = Synchronizer::new(SyncConfig::default());
//!
//!     // Successive saves of one document run one after another, in order.
//!     let save = sync.wrap(
//!         ResourceId::named("doc-7"),
//!         "save",
//!         WrapOptions::new().with_policy(Policy::Fair).with_lifetime(Duration::from_secs(2)),
//!         |rev: u32| async move {
//!             tokio::time::sleep(Duration::from_millis(5)).await;
//!             Ok::<_, std::io::Error>(rev)
//!         },
//!     );
//!
//!     let pending: Vec<_> = (1..=3).filter_map(|rev| save.call(rev)).collect();
//!     for (rev, p) in (1..=3).zip(pending) {
//!         assert_eq!(p.await.unwrap(), rev);
//!     }
//!     assert!(sync.active_keys().is_empty());
//! }
//! ```
mod core;
mod error;
mod events;
mod invocation;
mod keys;
mod policies;
mod subscribers;

pub use self::core::{
    DEFAULT_KEY_PREFIX, DEFAULT_LIFETIME, SlotView, SyncConfig, Synchronizer, SynchronizerBuilder,
    TimerStats,
};
pub use error::{CallError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use invocation::{BoundOperation, Pending, WrapOptions};
pub use keys::{Key, ResourceId};
pub use policies::Policy;
pub use subscribers::{Subscribe, SubscriberSet};

// `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
