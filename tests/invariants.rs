use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use callvisor::{
    CallError, Event, EventKind, Policy, ResourceId, RuntimeError, SlotView, Subscribe,
    SyncConfig, Synchronizer,
};
use tokio::time;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

async fn sleepy(n: u64) -> Result<u64, String> {
    time::sleep(ms(n)).await;
    if n % 7 == 0 {
        Err(format!("{n} is unlucky"))
    } else {
        Ok(n)
    }
}

#[tokio::test(start_paused = true)]
async fn every_timer_is_cancelled_once_calls_settle() {
    let sync = Synchronizer::new(SyncConfig::default());
    let mut pending = Vec::new();

    for (i, policy) in [Policy::Fair, Policy::Exclusive, Policy::Polling, Policy::OneShot]
        .into_iter()
        .enumerate()
    {
        let key = sync.key(&ResourceId::named(format!("r{i}")), "op");
        for n in [14u64, 50, 120, 350] {
            // 300ms lifetime: the 350ms calls time out, the 14ms ones fail.
            if let Some(p) = sync.submit(key.clone(), policy, ms(300), sleepy(n)) {
                pending.push(p);
            }
        }
    }
    let accepted = pending.len() as u64;
    let mut timeouts = 0;
    for p in pending {
        if let Err(e) = p.await {
            timeouts += usize::from(e.is_timeout());
        }
    }

    assert!(timeouts > 0);
    let timers = sync.timers();
    assert_eq!(timers.started(), accepted);
    assert_eq!(timers.cancelled(), accepted);
    assert_eq!(timers.in_flight(), 0);
    assert!(sync.active_keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unbounded_calls_start_no_timer() {
    let sync = Synchronizer::new(SyncConfig {
        lifetime: Duration::ZERO,
        ..SyncConfig::default()
    });
    let key = sync.key(&ResourceId::named("r"), "op");

    sync.submit_default(key, sleepy(10)).unwrap().await.unwrap();
    assert_eq!(sync.timers().started(), 0);
}

#[tokio::test(start_paused = true)]
async fn keys_are_independent() {
    let sync = Synchronizer::new(SyncConfig::default());
    let a = sync.key(&ResourceId::named("a"), "op");
    let b = sync.key(&ResourceId::named("b"), "op");

    for policy in [Policy::Fair, Policy::Exclusive, Policy::Polling, Policy::OneShot] {
        let start = time::Instant::now();
        let pa = sync.submit(a.clone(), policy, ms(1000), sleepy(100)).unwrap();
        let pb = sync.submit(b.clone(), policy, ms(1000), sleepy(100)).unwrap();
        let (ra, rb) = tokio::join!(pa, pb);
        assert!(ra.is_ok() && rb.is_ok());
        assert!(start.elapsed() < ms(110), "{} calls on distinct keys overlapped", policy.as_label());
    }
}

#[tokio::test(start_paused = true)]
async fn slot_state_tracks_the_tail_and_drains() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("r"), "op");

    let first = sync.submit(key.clone(), Policy::Fair, ms(50), sleepy(100)).unwrap();
    let second = sync.submit(key.clone(), Policy::Fair, ms(50), sleepy(100)).unwrap();
    assert_eq!(
        sync.slot(&key),
        Some(SlotView::Chained {
            tail: second.ticket().unwrap()
        })
    );
    assert_eq!(sync.active_keys(), [key.clone()]);

    // Both time out; the first release hands off, the second drains.
    assert!(first.await.unwrap_err().is_timeout());
    assert!(second.await.unwrap_err().is_timeout());
    assert_eq!(sync.slot(&key), None);

    let lock = sync.submit(key.clone(), Policy::Exclusive, ms(50), sleepy(10)).unwrap();
    assert_eq!(
        sync.slot(&key),
        Some(SlotView::Locked {
            holder: lock.ticket().unwrap()
        })
    );
    lock.await.unwrap();
    assert!(!sync.is_busy(&key));
}

#[tokio::test(start_paused = true)]
async fn detached_calls_still_run_and_release() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("r"), "op");
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    drop(sync.submit(key.clone(), Policy::Exclusive, ms(1000), async move {
        time::sleep(ms(20)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<_, ()>(())
    }));

    time::sleep(ms(50)).await;
    assert!(ran.load(Ordering::SeqCst));
    assert!(!sync.is_busy(&key));
}

#[test]
fn submitting_outside_a_runtime_is_a_setup_failure() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("r"), "op");

    let pending = sync
        .submit(key.clone(), Policy::Fair, ms(100), async { Ok::<_, ()>(()) })
        .expect("setup failures are reported through the Pending");
    let out = futures::executor::block_on(pending);

    assert!(matches!(out, Err(CallError::Setup { .. })));
    assert!(!sync.is_busy(&key));
}

#[derive(Default)]
struct Collect(Mutex<Vec<Event>>);

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_the_call_lifecycle() {
    let collect = Arc::new(Collect::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone()];
    let sync = Synchronizer::builder(SyncConfig::default())
        .with_subscribers(subs)
        .build();
    let key = sync.key(&ResourceId::named("r"), "op");

    let first = sync.submit(key.clone(), Policy::Exclusive, ms(1000), sleepy(10)).unwrap();
    assert!(sync.submit(key.clone(), Policy::Exclusive, ms(1000), sleepy(10)).is_none());
    let ticket = first.ticket();
    first.await.unwrap();

    let timed_out = sync.submit(key.clone(), Policy::Fair, ms(20), sleepy(40)).unwrap();
    assert!(timed_out.await.unwrap_err().is_timeout());

    time::sleep(ms(100)).await;
    let events = collect.0.lock().unwrap().clone();

    let lifecycle: Vec<EventKind> = events
        .iter()
        .filter(|e| e.ticket == ticket)
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        lifecycle,
        [
            EventKind::CallAccepted,
            EventKind::CallStarting,
            EventKind::CallCompleted,
            EventKind::SlotReleased,
        ]
    );

    assert!(events.iter().any(|e| e.kind == EventKind::CallDropped && e.ticket.is_none()));
    assert_eq!(events.iter().filter(|e| e.is_settle()).count(), 2);
    let timeout = events
        .iter()
        .find(|e| e.kind == EventKind::TimeoutHit)
        .expect("timeout event");
    assert_eq!(timeout.lifetime_ms, Some(20));
    assert_eq!(timeout.policy, Some(Policy::Fair));
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
}

/// Takes its time over every event.
#[derive(Default)]
struct Sluggish(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Sluggish {
    async fn on_event(&self, event: &Event) {
        time::sleep(ms(5)).await;
        self.0.lock().unwrap().push(event.kind);
    }
}

#[tokio::test(start_paused = true)]
async fn close_waits_for_subscribers_to_catch_up() {
    let sluggish = Arc::new(Sluggish::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![sluggish.clone()];
    let sync = Synchronizer::builder(SyncConfig::default())
        .with_subscribers(subs)
        .build();
    let key = sync.key(&ResourceId::named("r"), "op");

    sync.submit(key, Policy::Exclusive, ms(1000), sleepy(10))
        .unwrap()
        .await
        .unwrap();
    sync.close().await.unwrap();

    let seen = sluggish.0.lock().unwrap().clone();
    assert_eq!(
        seen,
        [
            EventKind::CallAccepted,
            EventKind::CallStarting,
            EventKind::CallCompleted,
            EventKind::SlotReleased,
            EventKind::ShutdownRequested,
        ]
    );
    assert_eq!(sync.close().await, Err(RuntimeError::AlreadyShutdown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn contended_key_never_runs_two_bodies_at_once() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("hot"), "op");

    for policy in [Policy::Fair, Policy::Polling, Policy::Exclusive] {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..16)
            .map(|_| {
                let (sync, key) = (sync.clone(), key.clone());
                let (active, peak, done) = (active.clone(), peak.clone(), done.clone());
                tokio::spawn(async move {
                    let mut pending = Vec::new();
                    for _ in 0..50 {
                        let (active, peak, done) = (active.clone(), peak.clone(), done.clone());
                        let body = async move {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            done.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, ()>(())
                        };
                        pending.extend(sync.submit(key.clone(), policy, ms(10_000), body));
                    }
                    for p in pending {
                        p.await.unwrap();
                    }
                })
            })
            .collect();
        for submitter in submitters {
            submitter.await.unwrap();
        }

        let label = policy.as_label();
        assert_eq!(peak.load(Ordering::SeqCst), 1, "{label}: bodies overlapped");
        match policy {
            Policy::Exclusive => assert!(done.load(Ordering::SeqCst) >= 1, "{label}"),
            _ => assert_eq!(done.load(Ordering::SeqCst), 16 * 50, "{label}"),
        }
        assert!(!sync.is_busy(&key), "{label}: key left busy");
        assert_eq!(sync.timers().in_flight(), 0, "{label}");
    }
}
