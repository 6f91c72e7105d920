use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// Hop every callback onto `exec`.
///
/// Downstream callbacks never run synchronously inside upstream emission;
/// they are posted in arrival order, so order is preserved whenever the
/// executor drains FIFO. Liveness is checked on both sides of each hop.
pub fn observe_on(exec: Arc<dyn Executor>) -> ObserveOnOp {
  ObserveOnOp { exec }
}

pub struct ObserveOnOp {
  exec: Arc<dyn Executor>,
}

impl<T> Operator<T> for ObserveOnOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let exec = self.exec;
    Observable::create(move |observer: Observer<T>| {
      let alive = Arc::new(AtomicBool::new(true));
      let exec = exec.clone();

      let down = observer.clone();
      let (next_exec, err_exec, done_exec) = (exec.clone(), exec.clone(), exec.clone());
      let (next_alive, err_alive, done_alive) = (alive.clone(), alive.clone(), alive.clone());
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          if !next_alive.load(Ordering::Acquire) {
            return;
          }
          let (alive, down) = (next_alive.clone(), down.clone());
          next_exec.post(Box::new(move || {
            if alive.load(Ordering::Acquire) {
              down.next(v);
            }
          }));
        })),
        Some(Arc::new(move |e| {
          if !err_alive.load(Ordering::Acquire) {
            return;
          }
          let (alive, down) = (err_alive.clone(), err_down.clone());
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
          let (alive, down) = (done_alive.clone(), done_down.clone());
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
