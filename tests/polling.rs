use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use callvisor::{CallError, Policy, ResourceId, RuntimeError, SyncConfig, Synchronizer};
use tokio::time::{self, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn waiters_all_run_one_at_a_time() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("cache"), "fill");
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let pending: Vec<_> = (0..5)
        .map(|_| {
            let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
            sync.submit(key.clone(), Policy::Polling, ms(1000), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                time::sleep(ms(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            })
            .expect("polling calls are never dropped")
        })
        .collect();

    for p in pending {
        p.await.unwrap();
    }
    assert_eq!(done.load(Ordering::SeqCst), 5);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(!sync.is_busy(&key));
}

#[tokio::test(start_paused = true)]
async fn lock_wait_does_not_consume_lifetime() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("cache"), "fill");
    let work = |n| async move {
        time::sleep(ms(n)).await;
        Ok::<_, Infallible>(n)
    };

    let a = sync.submit(key.clone(), Policy::Polling, ms(100), work(90)).unwrap();
    let b = sync.submit(key.clone(), Policy::Polling, ms(100), work(80)).unwrap();

    assert_eq!(a.await.unwrap(), 90);
    assert_eq!(b.await.unwrap(), 80);
    assert_eq!(sync.timers().started(), 2);
}

#[tokio::test(start_paused = true)]
async fn acquire_timeout_gives_up() {
    let cfg = SyncConfig {
        acquire_timeout: ms(50),
        ..SyncConfig::default()
    };
    let sync = Synchronizer::new(cfg);
    let key = sync.key(&ResourceId::named("cache"), "fill");
    let ran = Arc::new(AtomicBool::new(false));

    let holder = sync
        .submit(key.clone(), Policy::Polling, ms(1000), async {
            time::sleep(ms(200)).await;
            Ok::<_, Infallible>(())
        })
        .unwrap();

    let flag = ran.clone();
    let t0 = Instant::now();
    let waiter = sync
        .submit(key.clone(), Policy::Polling, ms(1000), async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, Infallible>(())
        })
        .unwrap();

    match waiter.await {
        Err(CallError::AcquireTimeout { waited }) => assert!(waited >= ms(50)),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(t0.elapsed() < ms(60));
    holder.await.unwrap();
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn shutdown_wakes_waiters_but_not_the_holder() {
    let sync = Synchronizer::new(SyncConfig::default());
    let key = sync.key(&ResourceId::named("cache"), "fill");

    let holder = sync
        .submit(key.clone(), Policy::Polling, ms(5000), async {
            time::sleep(ms(300)).await;
            Ok::<_, Infallible>("held")
        })
        .unwrap();
    let waiter = sync
        .submit(key.clone(), Policy::Polling, ms(5000), async {
            Ok::<_, Infallible>("waited")
        })
        .unwrap();

    time::sleep(ms(10)).await;
    sync.shutdown().unwrap();

    assert!(matches!(waiter.await, Err(CallError::Shutdown)));
    assert_eq!(holder.await.unwrap(), "held");
    assert!(!sync.is_busy(&key));

    let late = sync
        .submit(key, Policy::Fair, ms(5000), async { Ok::<_, Infallible>("late") })
        .expect("rejected calls still get a Pending");
    assert_eq!(late.ticket(), None);
    assert!(matches!(late.await, Err(CallError::Shutdown)));

    assert_eq!(sync.shutdown(), Err(RuntimeError::AlreadyShutdown));
}
