//! Scenarios that exercise the temporal operators against a clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ripple::prelude::*;

fn immediate() -> Arc<dyn Executor> { Arc::new(Immediate) }

#[test]
fn switch_map_keeps_only_the_last_inner() {
  let bus: Topic<i32> = Topic::new();
  let pool: Arc<dyn Executor> = Arc::new(ThreadPool::new(1));
  let got = Arc::new(Mutex::new(Vec::new()));
  let g = got.clone();

  let queries = bus.as_observable(immediate());
  let exec = pool.clone();
  let _sub = (queries
    | switch_map(move |v: i32| timer(Duration::from_millis(80), exec.clone()) | map(move |_| v)))
  .subscribe(move |v| g.lock().unwrap().push(v));

  for v in 1..=3 {
    bus.publish(&v);
    std::thread::sleep(Duration::from_millis(20));
  }
  std::thread::sleep(Duration::from_millis(150));
  assert_eq!(*got.lock().unwrap(), vec![3]);
}

/// A search backend that takes `latency` to answer.
fn fake_search(latency: Duration, exec: Arc<dyn Executor>) -> Observable<String> {
  timer(latency, exec) | map(|_| "result".to_string())
}

#[test]
fn slow_search_times_out() {
  let pool: Arc<dyn Executor> = Arc::new(ThreadPool::new(1));
  let log = Arc::new(Mutex::new(Vec::new()));
  let (l1, l2) = (log.clone(), log.clone());

  let exec = pool.clone();
  let _sub = (observable::of(1)
    | switch_map(move |_| fake_search(Duration::from_millis(120), exec.clone()))
    | timeout(Duration::from_millis(80)))
  .subscribe_all(
    move |v| l1.lock().unwrap().push(v),
    move |e| l2.lock().unwrap().push(format!("timeout={}", e.is_timeout())),
    || {},
  );

  std::thread::sleep(Duration::from_millis(200));
  assert_eq!(*log.lock().unwrap(), vec!["timeout=true"]);
}

#[test]
fn fast_search_beats_the_timeout() {
  let pool: Arc<dyn Executor> = Arc::new(ThreadPool::new(1));
  let got = Arc::new(Mutex::new(Vec::new()));
  let g = got.clone();

  let exec = pool.clone();
  let _sub = (observable::of(1)
    | switch_map(move |_| fake_search(Duration::from_millis(120), exec.clone()))
    | timeout(Duration::from_millis(200)))
  .subscribe_all(move |v| g.lock().unwrap().push(v), |_| {}, || {});

  std::thread::sleep(Duration::from_millis(250));
  assert_eq!(*got.lock().unwrap(), vec!["result".to_string()]);
}

#[test]
fn debounced_queries_only_fire_after_the_pause() {
  let bus: Topic<&'static str> = Topic::new();
  let got = Arc::new(Mutex::new(Vec::new()));
  let g = got.clone();

  let _sub = (bus.as_observable(immediate())
    | debounce(Duration::from_millis(50), immediate()))
  .subscribe(move |v| g.lock().unwrap().push(v));

  // Rapid typing: only the final query survives.
  for q in ["r", "ru", "rus", "rust"] {
    bus.publish(&q);
    std::thread::sleep(Duration::from_millis(15));
  }
  std::thread::sleep(Duration::from_millis(110));
  assert_eq!(*got.lock().unwrap(), vec!["rust"]);
}

#[test]
fn throttle_latest_drains_a_steady_burst() {
  let bus: Topic<i32> = Topic::new();
  let got = Arc::new(Mutex::new(Vec::new()));
  let g = got.clone();

  let _sub = (bus.as_observable(immediate())
    | throttle_latest(Duration::from_millis(40), immediate()))
  .subscribe(move |v| g.lock().unwrap().push(v));

  for v in 1..=6 {
    bus.publish(&v);
    std::thread::sleep(Duration::from_millis(10));
  }
  std::thread::sleep(Duration::from_millis(120));

  let got = got.lock().unwrap().clone();
  // Leading edge first, final latest last, never the whole burst.
  assert_eq!(got.first(), Some(&1));
  assert_eq!(got.last(), Some(&6));
  assert!(got.len() < 6, "throttle_latest let too much through: {got:?}");
}

#[test]
fn interval_ticks_are_independent_per_subscriber() {
  let pool: Arc<dyn Executor> = Arc::new(ThreadPool::new(1));
  let src = interval(Duration::from_millis(30), pool) | take(3);

  let a = Arc::new(Mutex::new(Vec::new()));
  let b = Arc::new(Mutex::new(Vec::new()));
  let (ac, bc) = (a.clone(), b.clone());
  let _sa = src.clone().subscribe(move |v| ac.lock().unwrap().push(v));
  let _sb = src.clone().subscribe(move |v| bc.lock().unwrap().push(v));

  std::thread::sleep(Duration::from_millis(220));
  assert_eq!(*a.lock().unwrap(), vec![0, 1, 2]);
  assert_eq!(*b.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn zip_pairs_two_intervals() {
  let pool: Arc<dyn Executor> = Arc::new(ThreadPool::new(2));
  let fast = interval(Duration::from_millis(20), pool.clone()) | take(4);
  let slow = interval(Duration::from_millis(45), pool) | take(2);

  let got = Arc::new(Mutex::new(Vec::new()));
  let done = Arc::new(Mutex::new(false));
  let (g, d) = (got.clone(), done.clone());
  let _sub = zip(fast, slow, |a, b| (a, b)).subscribe_all(
    move |v| g.lock().unwrap().push(v),
    |_| {},
    move || *d.lock().unwrap() = true,
  );

  std::thread::sleep(Duration::from_millis(250));
  assert_eq!(*got.lock().unwrap(), vec![(0, 0), (1, 1)]);
  assert!(*done.lock().unwrap());
}
