//! Integration tests for the timer

use framelink::Timer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_shot_fires_after_the_duration() {
    let timer = Timer::new();
    let (tx, rx) = oneshot::channel();

    let started = Instant::now();
    timer.start_timeout(Duration::from_millis(50), move || {
        let _ = tx.send(Instant::now());
    });

    let fired_at = timeout(Duration::from_secs(5), rx)
        .await
        .expect("timer never fired")
        .unwrap();
    let elapsed = fired_at - started;
    assert!(elapsed >= Duration::from_millis(45), "fired early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "fired late: {elapsed:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_fires_evenly_until_cancelled() {
    let timer = Timer::new();
    let instants = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));

    let period = Duration::from_millis(25);
    let recorder = instants.clone();
    timer.start_periodic_timeout(period, move || {
        let mut firings = recorder.lock().unwrap();
        firings.push(Instant::now());
        if firings.len() == 5 {
            if let Some(tx) = done_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    });

    timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("periodic timer stalled")
        .unwrap();
    timer.cancel();

    let firings = instants.lock().unwrap().clone();
    assert!(firings.len() >= 5);

    // Each period lands near the nominal interval; the chain is computed
    // from the previous deadline, so error does not accumulate.
    for pair in firings.windows(2).take(4) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(10), "gap too short: {gap:?}");
        assert!(gap < Duration::from_millis(200), "gap too long: {gap:?}");
    }
    let span = *firings.last().unwrap() - firings[0];
    assert!(span >= Duration::from_millis(80), "5 firings too fast: {span:?}");

    // No further firings after cancel.
    let count_after_cancel = instants.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(instants.lock().unwrap().len(), count_after_cancel);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_one_shot_never_fires() {
    let timer = Timer::new();
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = fired.clone();
    timer.start_timeout(Duration::from_millis(30), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    timer.cancel();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timer_can_be_rearmed_after_cancel() {
    let timer = Timer::new();

    timer.start_timeout(Duration::from_millis(30), || {});
    timer.cancel();

    let (tx, rx) = oneshot::channel();
    timer.start_timeout(Duration::from_millis(20), move || {
        let _ = tx.send(());
    });

    timeout(Duration::from_secs(5), rx)
        .await
        .expect("re-armed timer never fired")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_replaced_by_one_shot() {
    let timer = Timer::new();
    let periodic_count = Arc::new(AtomicUsize::new(0));

    let counter = periodic_count.clone();
    timer.start_periodic_timeout(Duration::from_millis(20), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    tokio::time::sleep(Duration::from_millis(70)).await;

    let (tx, rx) = oneshot::channel();
    timer.start_timeout(Duration::from_millis(20), move || {
        let _ = tx.send(());
    });

    timeout(Duration::from_secs(5), rx)
        .await
        .expect("replacement timer never fired")
        .unwrap();

    // The periodic chain is broken; its count stops moving.
    let frozen = periodic_count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(periodic_count.load(Ordering::SeqCst), frozen);
}
