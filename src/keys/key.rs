//! # Serialization keys.
//!
//! A [`Key`] names the thing calls serialize on: one operation of one resource
//! instance. It is made of a [`ResourceId`] (which instance) and a slot name
//! (`prefix + operation`, which operation).
//!
//! ## Rules
//! - Same key → calls serialize against each other under the chosen policy.
//! - Different keys → fully independent, whatever the policy.
//! - Two operations may share a slot on purpose by wrapping them with the same
//!   prefix and name; two operations with the same name can be kept apart with
//!   different prefixes.

use std::fmt;
use std::sync::Arc;

/// Identity of a resource instance.
///
/// Cheap to clone. Built either from a caller-chosen name or from an object's
/// address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    /// Identity from a stable, caller-chosen name (e.g. `"account:42"`).
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Identity from the address of `value`, tagged with its type name.
    ///
    /// Only unique while `value` is alive: a new object allocated at the same
    /// address after `value` is dropped gets the same identity.
    ///
    /// ## Example
    /// ```rust
    /// use callvisor::ResourceId;
    ///
    /// let a = String::from("a");
    /// let b = String::from("b");
    /// assert_eq!(ResourceId::of(&a), ResourceId::of(&a));
    /// assert_ne!(ResourceId::of(&a), ResourceId::of(&b));
    /// ```
    pub fn of<T: ?Sized>(value: &T) -> Self {
        let ty = std::any::type_name::<T>();
        let short = ty.rsplit("::").next().unwrap_or(ty);
        let addr = value as *const T as *const () as usize;
        Self(format!("{short}#{addr:x}").into())
    }

    /// Returns the identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key identifying which calls serialize against each other.
///
/// ## Example
/// ```rust
/// use callvisor::{Key, ResourceId};
///
/// let key = Key::with_prefix(ResourceId::named("cart"), "sync-", "save");
/// assert_eq!(key.slot(), "sync-save");
/// assert_eq!(key.to_string(), "sync-save@cart");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    resource: ResourceId,
    slot: Arc<str>,
}

impl Key {
    /// Creates a key from a resource and an already composed slot name.
    pub fn new(resource: ResourceId, slot: impl Into<Arc<str>>) -> Self {
        Self {
            resource,
            slot: slot.into(),
        }
    }

    /// Creates a key whose slot name is `prefix + operation`.
    pub fn with_prefix(resource: ResourceId, prefix: &str, operation: &str) -> Self {
        Self::new(resource, format!("{prefix}{operation}"))
    }

    /// Returns the resource part.
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Returns the slot part (`prefix + operation`).
    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slot, self.resource)
    }
}
