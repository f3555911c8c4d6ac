//! Queueing policies.
//!
//! This module groups the knob that controls **what happens** to a call whose
//! key is already busy.
//!
//! ## Contents
//! - [`Policy`] fair chain / exclusive drop / polling wait / one-shot gate
//!
//! ## Quick wiring
//! ```text
//! Synchronizer::submit(key, policy, lifetime, op)
//!      └─► core::engine admits per policy:
//!           - Fair      → chain behind the tail
//!           - Exclusive → run or drop
//!           - Polling   → run or wait for release
//!           - OneShot   → run or drop
//! ```
//!
//! ## Defaults
//! - `Policy::Fair`: nothing is ever lost.

mod policy;

pub use policy::Policy;
