//! Runtime core: serialization engine and its owner.
//!
//! The public API from this module is [`Synchronizer`] (plus its builder and
//! configuration); everything else is internal.
//!
//! Internal modules:
//! - [`race`]: runs one operation against its lifetime;
//! - [`registry`]: per-key chain and lock state;
//! - [`engine`]: admission per policy, execution and key release;
//! - [`synchronizer`]: entry point, event fan-out and shutdown.

mod builder;
mod config;
mod engine;
mod race;
mod registry;
mod synchronizer;

pub use builder::SynchronizerBuilder;
pub use config::{DEFAULT_KEY_PREFIX, DEFAULT_LIFETIME, SyncConfig};
pub use race::TimerStats;
pub use registry::SlotView;
pub use synchronizer::Synchronizer;

pub(crate) use race::panic_reason;
