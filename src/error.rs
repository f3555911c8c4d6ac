//! Error types used by the callvisor runtime and by serialized calls.
//!
//! This module defines two enums:
//!
//! - [`CallError`]: the outcome of a single serialized call that did not succeed.
//! - [`RuntimeError`]: misuse of the [`Synchronizer`](crate::Synchronizer) itself.
//!
//! Both provide `as_label` (stable snake_case, for logs/metrics) and `as_message`.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the synchronizer runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// [`Synchronizer::shutdown`](crate::Synchronizer::shutdown) was called more than once.
    #[error("synchronizer already shut down")]
    AlreadyShutdown,
}

impl RuntimeError {
    /// Stable snake_case name, for logs and metric labels.
    ///
    /// # Example
    /// ```
    /// use callvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::AlreadyShutdown.as_label(), "runtime_already_shutdown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyShutdown => "runtime_already_shutdown",
        }
    }
}

/// # Failure of one serialized call.
///
/// `E` is the error type of the wrapped operation. It is carried through
/// untouched in [`CallError::Failed`]; every other variant is produced by the
/// synchronizer and never affects other calls sharing the same key.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The operation itself returned an error.
    #[error("operation failed: {0}")]
    Failed(E),

    /// The lifetime elapsed before the operation settled.
    ///
    /// The slot was released; the operation keeps running detached and its
    /// eventual result is discarded.
    #[error("synchronized call timed out after {lifetime:?}")]
    Timeout {
        /// The configured lifetime that was exceeded.
        lifetime: Duration,
    },

    /// The operation panicked while running.
    #[error("operation panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text (when it was a string).
        reason: String,
    },

    /// A polling call gave up waiting for the lock (only with `acquire_timeout` set).
    #[error("lock not acquired within {waited:?}")]
    AcquireTimeout {
        /// How long the call waited before giving up.
        waited: Duration,
    },

    /// The invocation machinery failed (no runtime, invocation task lost).
    ///
    /// The key has already been released when this is observed.
    #[error("invocation setup failed: {reason}")]
    Setup {
        /// What went wrong.
        reason: String,
    },

    /// The synchronizer was shut down before the call could start.
    #[error("synchronizer shut down")]
    Shutdown,
}

impl<E> CallError<E> {
    /// Stable snake_case name of the variant.
    ///
    /// # Example
    /// ```
    /// use callvisor::CallError;
    /// use std::time::Duration;
    ///
    /// let err: CallError<std::io::Error> = CallError::Timeout { lifetime: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "call_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CallError::Failed(_) => "call_failed",
            CallError::Timeout { .. } => "call_timeout",
            CallError::Panicked { .. } => "call_panicked",
            CallError::AcquireTimeout { .. } => "call_acquire_timeout",
            CallError::Setup { .. } => "call_setup_failed",
            CallError::Shutdown => "call_shutdown",
        }
    }

    /// True for [`CallError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }

    /// Borrows the operation's own error, if that is what this is.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            CallError::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Unwraps the operation's own error, if that is what this is.
    ///
    /// # Example
    /// ```
    /// use callvisor::CallError;
    ///
    /// let err = CallError::Failed("boom");
    /// assert_eq!(err.into_operation_error(), Some("boom"));
    ///
    /// let err: CallError<&str> = CallError::Shutdown;
    /// assert_eq!(err.into_operation_error(), None);
    /// ```
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CallError::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation error type, keeping every runtime-produced variant.
    pub fn map_failed<F>(self, f: impl FnOnce(E) -> F) -> CallError<F> {
        match self {
            CallError::Failed(e) => CallError::Failed(f(e)),
            CallError::Timeout { lifetime } => CallError::Timeout { lifetime },
            CallError::Panicked { reason } => CallError::Panicked { reason },
            CallError::AcquireTimeout { waited } => CallError::AcquireTimeout { waited },
            CallError::Setup { reason } => CallError::Setup { reason },
            CallError::Shutdown => CallError::Shutdown,
        }
    }
}

impl<E: std::fmt::Display> CallError<E> {
    /// Display text with the variant's details filled in.
    pub fn as_message(&self) -> String {
        match self {
            CallError::Failed(e) => format!("error: {e}"),
            CallError::Timeout { lifetime } => format!("timeout: {lifetime:?}"),
            CallError::Panicked { reason } => format!("panic: {reason}"),
            CallError::AcquireTimeout { waited } => format!("acquire timeout: {waited:?}"),
            CallError::Setup { reason } => format!("setup: {reason}"),
            CallError::Shutdown => "shutdown".to_string(),
        }
    }
}
