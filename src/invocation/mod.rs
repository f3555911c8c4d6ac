//! Invocation surface: what callers hold.
//!
//! - [`Pending`] future of an accepted call's outcome
//! - [`BoundOperation`] function bound to a resource by `Synchronizer::wrap`
//! - [`WrapOptions`] per-wrap overrides of the runtime defaults

mod bound;
mod pending;

pub use bound::{BoundOperation, WrapOptions};
pub use pending::Pending;
