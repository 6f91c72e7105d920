//! Time-based sources.
//!
//! Both sources run their clock on a detached helper thread and deliver
//! through the supplied executor. Cancellation flips a shared alive flag; the
//! helper observes it and returns without posting, and already-posted tasks
//! re-check it before touching the observer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observable::Observable;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// One tick (`0`) after `delay`, then completion.
pub fn timer(delay: Duration, exec: Arc<dyn Executor>) -> Observable<u64> {
  Observable::create(move |observer| {
    let alive = Arc::new(AtomicBool::new(true));
    let thread_alive = alive.clone();
    let exec = exec.clone();
    std::thread::spawn(move || {
      std::thread::sleep(delay);
      if !thread_alive.load(Ordering::Acquire) {
        return;
      }
      let task_alive = thread_alive.clone();
      exec.post(Box::new(move || {
        if !task_alive.load(Ordering::Acquire) {
          return;
        }
        observer.next(0);
        observer.complete();
      }));
    });
    Subscription::new(move || alive.store(false, Ordering::Release))
  })
}

/// Monotonic ticks `0, 1, 2, …` every `period`, starting immediately.
pub fn interval(period: Duration, exec: Arc<dyn Executor>) -> Observable<u64> {
  interval_at(Duration::ZERO, period, exec)
}

/// Like [`interval`], with the first tick deferred by `initial_delay`.
pub fn interval_at(
  initial_delay: Duration,
  period: Duration,
  exec: Arc<dyn Executor>,
) -> Observable<u64> {
  Observable::create(move |observer| {
    let alive = Arc::new(AtomicBool::new(true));
    let thread_alive = alive.clone();
    let exec = exec.clone();
    std::thread::spawn(move || {
      if !initial_delay.is_zero() {
        std::thread::sleep(initial_delay);
      }
      let mut tick: u64 = 0;
      while thread_alive.load(Ordering::Acquire) {
        let task_alive = thread_alive.clone();
        let observer = observer.clone();
        exec.post(Box::new(move || {
          if task_alive.load(Ordering::Acquire) {
            observer.next(tick);
          }
        }));
        tick += 1;
        std::thread::sleep(period);
      }
    });
    Subscription::new(move || alive.store(false, Ordering::Release))
  })
}
