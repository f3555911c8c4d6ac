//! # SubscriberSet: fan-out of call events.
//!
//! Each subscriber gets its own bounded lane and worker task. Emitting never
//! waits on a subscriber, so a slow metrics exporter cannot hold back a key
//! release.
//!
//! ```text
//!   emit(&Event) ──► Arc<Event>
//!        ├──► lane "log"     [bounded mpsc] ──► worker ──► on_event()
//!        ├──► lane "metrics" [bounded mpsc] ──► worker ──► on_event()
//!        └──► lane ...
//! ```
//!
//! ## Delivery
//! - One lane preserves publish order; lanes are not ordered against each other.
//! - A full lane drops the event for that subscriber only and counts the drop.
//! - A panic inside `on_event` is caught and logged; the worker keeps going.
//! - [`SubscriberSet::shutdown`] stops accepting events; workers finish what
//!   their lanes already hold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::Event;

use super::Subscribe;

/// Queue feeding one subscriber's worker.
struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
}

/// Subscribers of one synchronizer, each behind its own lane.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closing: CancellationToken,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber.
    ///
    /// Needs a tokio runtime unless `subs` is empty.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let closing = CancellationToken::new();
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let name = sub.name();
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name,
                    tx,
                    dropped: AtomicU64::new(0),
                };
                (lane, tokio::spawn(drain(sub, rx, closing.clone())))
            })
            .unzip();

        Self {
            lanes,
            workers: Mutex::new(workers),
            closing,
        }
    }

    /// Hands `event` to every lane without waiting.
    pub fn emit(&self, event: &Event) {
        if self.closing.is_cancelled() {
            return;
        }
        let ev = Arc::new(event.clone());
        for lane in &self.lanes {
            let why = match lane.tx.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "lane full",
                Err(TrySendError::Closed(_)) => "worker gone",
            };
            let total = lane.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(subscriber = lane.name, seq = ev.seq, total, "event dropped: {why}");
        }
    }

    /// Events dropped so far for the subscriber called `name`.
    pub fn dropped(&self, name: &str) -> Option<u64> {
        self.lanes
            .iter()
            .find(|lane| lane.name == name)
            .map(|lane| lane.dropped.load(Ordering::Relaxed))
    }

    /// Stops accepting events and waits until workers have delivered what
    /// their lanes hold.
    ///
    /// Later calls return at once.
    pub async fn shutdown(&self) {
        self.closing.cancel();
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

/// Worker loop of one lane.
async fn drain(
    sub: Arc<dyn Subscribe>,
    mut rx: mpsc::Receiver<Arc<Event>>,
    closing: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            ev = rx.recv() => match ev {
                Some(ev) => deliver(&*sub, &ev).await,
                None => return,
            },
            () = closing.cancelled() => break,
        }
    }

    rx.close();
    while let Ok(ev) = rx.try_recv() {
        deliver(&*sub, &ev).await;
    }
}

async fn deliver(sub: &dyn Subscribe, ev: &Event) {
    let delivery = std::panic::AssertUnwindSafe(sub.on_event(ev)).catch_unwind();
    if let Err(payload) = delivery.await {
        let info = crate::core::panic_reason(payload.as_ref());
        tracing::error!(subscriber = sub.name(), seq = ev.seq, %info, "subscriber panicked");
    }
}
