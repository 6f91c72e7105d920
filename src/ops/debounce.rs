use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// Emit a value only once `delay` has passed without a newer one.
///
/// Each value takes a ticket; a helper thread sleeps for `delay` and posts
/// the value to `exec` only if its ticket is still the latest. Errors and
/// completion are forwarded through `exec` without debouncing.
pub fn debounce(delay: Duration, exec: Arc<dyn Executor>) -> DebounceOp {
  DebounceOp { delay, exec }
}

pub struct DebounceOp {
  delay: Duration,
  exec: Arc<dyn Executor>,
}

impl<T> Operator<T> for DebounceOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let delay = self.delay;
    let exec = self.exec;
    Observable::create(move |observer: Observer<T>| {
      let ticket = Arc::new(AtomicU64::new(0));
      let alive = Arc::new(AtomicBool::new(true));

      let down = observer.clone();
      let (next_exec, err_exec, done_exec) = (exec.clone(), exec.clone(), exec.clone());
      let (next_alive, err_alive, done_alive) = (alive.clone(), alive.clone(), alive.clone());
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          let my = ticket.fetch_add(1, Ordering::AcqRel) + 1;
          let ticket = ticket.clone();
          let exec = next_exec.clone();
          let alive = next_alive.clone();
          let down = down.clone();
          std::thread::spawn(move || {
            std::thread::sleep(delay);
            if !alive.load(Ordering::Acquire) || ticket.load(Ordering::Acquire) != my {
              return;
            }
            let task_alive = alive.clone();
            exec.post(Box::new(move || {
              if task_alive.load(Ordering::Acquire) {
                down.next(v);
              }
            }));
          });
        })),
        Some(Arc::new(move |e| {
          if !err_alive.load(Ordering::Acquire) {
            return;
          }
          let alive = err_alive.clone();
          let down = err_down.clone();
          err_exec.post(Box::new(move || {
            if alive.load(Ordering::Acquire) {
              down.error(e);
            }
          }));
        })),
        Some(Arc::new(move || {
          if !done_alive.load(Ordering::Acquire) {
            return;
          }
          let alive = done_alive.clone();
          let down = done_down.clone();
          done_exec.post(Box::new(move || {
            if alive.load(Ordering::Acquire) {
              down.complete();
            }
          }));
        })),
      ));

      Subscription::new(move || {
        alive.store(false, Ordering::Release);
        upstream.reset();
      })
    })
  }
}
