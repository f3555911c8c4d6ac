//! # Bound operations: a function attached to a resource.
//!
//! [`Synchronizer::wrap`](crate::Synchronizer::wrap) binds a function to a
//! [`ResourceId`](crate::ResourceId) and an operation name. Every
//! [`BoundOperation::call`] goes through the same key, so calls serialize per
//! `(resource, prefix + operation)` according to the bound [`Policy`].
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use callvisor::{Policy, ResourceId, Synchronizer, SyncConfig, WrapOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sync = Synchronizer::new(SyncConfig::default());
//!
//!     let save = sync.wrap(
//!         ResourceId::named("doc-42"),
//!         "save",
//!         WrapOptions::new()
//!             .with_policy(Policy::Fair)
//!             .with_lifetime(Duration::from_secs(1)),
//!         |body: String| async move { Ok::<_, std::io::Error>(body.len()) },
//!     );
//!
//!     let first = save.call("hello".to_string()).expect("fair calls are never dropped");
//!     assert_eq!(first.await.unwrap(), 5);
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::Synchronizer;
use crate::keys::Key;
use crate::policies::Policy;

use super::Pending;

/// Per-wrap overrides. Unset fields inherit from [`SyncConfig`](crate::SyncConfig).
#[derive(Clone, Debug, Default)]
pub struct WrapOptions {
    /// Queueing policy.
    pub policy: Option<Policy>,
    /// Lifetime of each call (`0s` = unbounded).
    pub lifetime: Option<Duration>,
    /// Slot-name prefix.
    pub prefix: Option<Cow<'static, str>>,
}

impl WrapOptions {
    /// Options inheriting everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Overrides the prefix: two wraps with the same resource and
    /// `prefix + operation` share one key.
    pub fn with_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// A function bound to one key of a [`Synchronizer`].
///
/// Cheap to clone; clones share the key.
pub struct BoundOperation<F> {
    sync: Arc<Synchronizer>,
    key: Key,
    policy: Policy,
    lifetime: Option<Duration>,
    f: Arc<F>,
}

impl<F> Clone for BoundOperation<F> {
    fn clone(&self) -> Self {
        Self {
            sync: Arc::clone(&self.sync),
            key: self.key.clone(),
            policy: self.policy,
            lifetime: self.lifetime,
            f: Arc::clone(&self.f),
        }
    }
}

impl<F> BoundOperation<F> {
    pub(crate) fn new(
        sync: Arc<Synchronizer>,
        key: Key,
        policy: Policy,
        lifetime: Option<Duration>,
        f: F,
    ) -> Self {
        Self {
            sync,
            key,
            policy,
            lifetime,
            f: Arc::new(f),
        }
    }

    /// Submits one call with `args`.
    ///
    /// Returns `None` if the policy dropped the call; `f` is not invoked then.
    pub fn call<A, Fut, T, E>(&self, args: A) -> Option<Pending<T, E>>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let f = Arc::clone(&self.f);
        self.sync
            .dispatch(self.key.clone(), self.policy, self.lifetime, move || f(args))
    }

    /// Key every call of this operation serializes on.
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Lifetime of each call (`None` = unbounded).
    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    /// True while a call of this operation is running or queued.
    pub fn is_busy(&self) -> bool {
        self.sync.is_busy(&self.key)
    }
}

impl<F> std::fmt::Debug for BoundOperation<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundOperation")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
