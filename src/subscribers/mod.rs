//! # Event subscribers for the callvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and (with the `logging` feature) the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   call task ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                                       │
//!                                                         ┌─────────┬───┴─────┬───────┐
//!                                                         ▼         ▼         ▼       ▼
//!                                                      LogWriter  Metrics  Custom   ...
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
