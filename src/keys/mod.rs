//! Keys: which calls serialize against each other.
//!
//! - [`ResourceId`] identity of a resource instance
//! - [`Key`] resource + slot name (`prefix + operation`)

mod key;

pub use key::{Key, ResourceId};
