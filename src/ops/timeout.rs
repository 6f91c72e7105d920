use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::CoreError;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::Subscription;

/// Fail with [`CoreError::Timeout`] if the source stays silent for `d`.
///
/// A watchdog thread is armed at subscribe time; the first upstream signal of
/// any kind disarms it atomically, after which the stream flows untouched.
/// If the watchdog wins instead, downstream gets `on_err(Timeout)`, the
/// upstream is cancelled, and everything it emits afterwards is suppressed.
pub fn timeout(d: Duration) -> TimeoutOp {
  TimeoutOp { d }
}

pub struct TimeoutOp {
  d: Duration,
}

impl<T> Operator<T> for TimeoutOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let d = self.d;
    Observable::create(move |observer: Observer<T>| {
      // armed: the watchdog has not been beaten yet.
      // expired: the watchdog won; the stream is dead.
      let armed = Arc::new(AtomicBool::new(true));
      let expired = Arc::new(AtomicBool::new(false));
      let upstream = Arc::new(Mutex::new(Subscription::empty()));

      let watchdog_armed = armed.clone();
      let watchdog_expired = expired.clone();
      let watchdog_upstream = upstream.clone();
      let watchdog_down = observer.clone();
      std::thread::spawn(move || {
        std::thread::sleep(d);
        if watchdog_armed.swap(false, Ordering::AcqRel) {
          tracing::debug!(after = ?d, "timeout watchdog fired");
          watchdog_expired.store(true, Ordering::Release);
          watchdog_down.error(CoreError::Timeout.into());
          watchdog_upstream.lock().reset();
        }
      });

      let down = observer.clone();
      let (next_armed, err_armed, done_armed) = (armed.clone(), armed.clone(), armed.clone());
      let (next_expired, err_expired, done_expired) =
        (expired.clone(), expired.clone(), expired.clone());
      let err_down = observer.clone();
      let done_down = observer.clone();

      let sub = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          next_armed.store(false, Ordering::Release);
          if !next_expired.load(Ordering::Acquire) {
            down.next(v);
          }
        })),
        Some(Arc::new(move |e| {
          err_armed.store(false, Ordering::Release);
          if !err_expired.load(Ordering::Acquire) {
            err_down.error(e);
          }
        })),
        Some(Arc::new(move || {
          done_armed.store(false, Ordering::Release);
          if !done_expired.load(Ordering::Acquire) {
            done_down.complete();
          }
        })),
      ));
      *upstream.lock() = sub;

      let cancel_armed = armed;
      Subscription::new(move || {
        cancel_armed.store(false, Ordering::Release);
        upstream.lock().reset();
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex as StdMutex;

  use super::*;
  use crate::prelude::*;
  use crate::scheduler::Immediate;

  fn immediate() -> Arc<dyn crate::scheduler::Executor> { Arc::new(Immediate) }

  #[test]
  fn slow_source_times_out() {
    let errs = Arc::new(StdMutex::new(Vec::new()));
    let e = errs.clone();
    let _sub = (observable::timer(Duration::from_millis(120), immediate())
      | timeout(Duration::from_millis(40)))
    .subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err.is_timeout()),
      || {},
    );
    std::thread::sleep(Duration::from_millis(90));
    assert_eq!(*errs.lock().unwrap(), vec![true]);
  }

  #[test]
  fn fast_source_beats_the_watchdog() {
    let log = Arc::new(StdMutex::new(Vec::new()));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    let _sub = (observable::timer(Duration::from_millis(20), immediate())
      | timeout(Duration::from_millis(150)))
    .subscribe_all(
      move |v| l1.lock().unwrap().push(format!("v{v}")),
      move |_| l2.lock().unwrap().push("err".into()),
      move || l3.lock().unwrap().push("done".into()),
    );
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(*log.lock().unwrap(), vec!["v0", "done"]);
  }

  #[test]
  fn stream_flows_untouched_after_disarm() {
    let got = Arc::new(StdMutex::new(Vec::new()));
    let done = Arc::new(StdMutex::new(false));
    let (g, d) = (got.clone(), done.clone());
    (observable::from_iter(1..=4) | timeout(Duration::from_millis(500))).subscribe_all(
      move |v| g.lock().unwrap().push(v),
      |_| {},
      move || *d.lock().unwrap() = true,
    );
    assert_eq!(*got.lock().unwrap(), vec![1, 2, 3, 4]);
    assert!(*done.lock().unwrap());
  }

  #[test]
  fn nothing_after_the_watchdog_wins() {
    let subject = Subject::new();
    let log = Arc::new(StdMutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    let _sub = (subject.as_observable() | timeout(Duration::from_millis(30))).subscribe_all(
      move |v: i32| l1.lock().unwrap().push(format!("v{v}")),
      move |e| l2.lock().unwrap().push(format!("timeout={}", e.is_timeout())),
      || {},
    );
    std::thread::sleep(Duration::from_millis(80));
    subject.on_next(1);
    subject.on_completed();
    assert_eq!(*log.lock().unwrap(), vec!["timeout=true"]);
  }
}
