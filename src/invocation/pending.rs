//! # Pending: the caller's side of an accepted call.
//!
//! [`Pending`] resolves to the call's outcome. The call itself runs in its own
//! task from the moment it is submitted, so awaiting is optional: dropping a
//! `Pending` detaches the call, it still runs and still releases its key.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::core::panic_reason;
use crate::error::CallError;

enum Inner<T, E> {
    Spawned(JoinHandle<Result<T, CallError<E>>>),
    Ready(Option<Result<T, CallError<E>>>),
}

/// Outcome of an accepted call, resolved once the call settles.
///
/// Output is `Result<T, CallError<E>>`.
#[must_use = "dropping a Pending detaches the call; its outcome is lost"]
pub struct Pending<T, E> {
    ticket: Option<u64>,
    inner: Inner<T, E>,
}

impl<T, E> Pending<T, E> {
    pub(crate) fn spawned(ticket: u64, handle: JoinHandle<Result<T, CallError<E>>>) -> Self {
        Self {
            ticket: Some(ticket),
            inner: Inner::Spawned(handle),
        }
    }

    pub(crate) fn ready(out: Result<T, CallError<E>>) -> Self {
        Self {
            ticket: None,
            inner: Inner::Ready(Some(out)),
        }
    }

    /// Ticket of the call (`None` if it was rejected before being admitted).
    pub fn ticket(&self) -> Option<u64> {
        self.ticket
    }

    /// True once the outcome is available without waiting.
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Spawned(h) => h.is_finished(),
            Inner::Ready(_) => true,
        }
    }
}

// No field is ever structurally pinned.
impl<T, E> Unpin for Pending<T, E> {}

impl<T, E> Future for Pending<T, E> {
    type Output = Result<T, CallError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            Inner::Spawned(handle) => Pin::new(handle).poll(cx).map(|joined| match joined {
                Ok(out) => out,
                Err(je) if je.is_panic() => Err(CallError::Setup {
                    reason: format!("invocation panicked: {}", panic_reason(je.into_panic().as_ref())),
                }),
                Err(_) => Err(CallError::Setup {
                    reason: "invocation task cancelled".to_string(),
                }),
            }),
            Inner::Ready(out) => Poll::Ready(out.take().unwrap_or_else(|| {
                Err(CallError::Setup {
                    reason: "outcome already taken".to_string(),
                })
            })),
        }
    }
}

impl<T, E> std::fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("ticket", &self.ticket)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_resolves_immediately() {
        let p: Pending<u8, ()> = Pending::ready(Err(CallError::Shutdown));
        assert!(p.is_finished());
        assert_eq!(p.ticket(), None);
        assert_eq!(p.await.unwrap_err().as_label(), "call_shutdown");
    }

    #[tokio::test]
    async fn panicking_invocation_maps_to_setup() {
        let handle = tokio::spawn(async {
            if true {
                panic!("factory blew up");
            }
            Ok::<u8, CallError<()>>(1)
        });
        let p = Pending::spawned(9, handle);
        assert_eq!(p.ticket(), Some(9));

        match p.await {
            Err(CallError::Setup { reason }) => assert!(reason.contains("factory blew up")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
