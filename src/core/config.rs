//! # Runtime configuration.
//!
//! Provides [`SyncConfig`], the defaults every submission and wrapped operation
//! inherits unless it overrides them.
//!
//! ## Sentinel values
//! - `lifetime = 0s` → no lifetime (calls may hold their key indefinitely)
//! - `acquire_timeout = 0s` → polling calls wait for the lock indefinitely

use std::borrow::Cow;
use std::time::Duration;

use crate::policies::Policy;

/// Lifetime applied when nothing else is configured.
///
/// Some historical exclusive-only setups used 10s; 5s is the single default here.
pub const DEFAULT_LIFETIME: Duration = Duration::from_millis(5000);

/// Slot-name prefix applied when nothing else is configured.
pub const DEFAULT_KEY_PREFIX: &str = "expirable-synchronized-";

/// Global configuration for a [`Synchronizer`](crate::Synchronizer).
///
/// ## Field semantics
/// - `lifetime`: Default max time a call may run once started (`0s` = unbounded)
/// - `key_prefix`: Prepended to operation names to form slot names
/// - `policy`: Default queueing policy
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `acquire_timeout`: Max wait of polling calls for the lock (`0s` = unbounded)
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Default lifetime of a call, measured from when it starts executing.
    ///
    /// Queue wait under [`Policy::Fair`] and lock wait under [`Policy::Polling`]
    /// do not consume it.
    pub lifetime: Duration,

    /// Prefix namespacing slot names, so several wrapped operations on the same
    /// resource do not collide.
    pub key_prefix: Cow<'static, str>,

    /// Default policy for submissions that do not name one.
    pub policy: Policy,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Upper bound on how long a [`Policy::Polling`] call waits for the lock.
    pub acquire_timeout: Duration,
}

impl SyncConfig {
    /// Returns the default lifetime as an `Option` (`None` = unbounded).
    #[inline]
    pub fn default_lifetime(&self) -> Option<Duration> {
        non_zero(self.lifetime)
    }

    /// Returns the polling wait bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn acquire_limit(&self) -> Option<Duration> {
        non_zero(self.acquire_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SyncConfig {
    /// Default configuration:
    ///
    /// - `lifetime = 5s`
    /// - `key_prefix = "expirable-synchronized-"`
    /// - `policy = Policy::Fair`
    /// - `bus_capacity = 1024`
    /// - `acquire_timeout = 0s` (wait forever)
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_LIFETIME,
            key_prefix: Cow::Borrowed(DEFAULT_KEY_PREFIX),
            policy: Policy::default(),
            bus_capacity: 1024,
            acquire_timeout: Duration::ZERO,
        }
    }
}

/// Maps the `0s` sentinel to `None`.
#[inline]
pub(crate) fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO { None } else { Some(d) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.default_lifetime(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.key_prefix, "expirable-synchronized-");
        assert_eq!(cfg.policy, Policy::Fair);
        assert_eq!(cfg.acquire_limit(), None);
    }

    #[test]
    fn zero_sentinels() {
        let cfg = SyncConfig {
            lifetime: Duration::ZERO,
            bus_capacity: 0,
            ..SyncConfig::default()
        };
        assert_eq!(cfg.default_lifetime(), None);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
