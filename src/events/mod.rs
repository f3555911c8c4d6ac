//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Synchronizer::submit` (admission), call tasks
//!   (start/settle), `SlotGuard` (release), `Synchronizer::shutdown`.
//! - **Consumers**: the synchronizer's subscriber listener, which fans out to
//!   the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
