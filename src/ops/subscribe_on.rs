use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// Perform the act of subscribing to upstream on `exec`.
///
/// Cancellation is effective even while the posted subscription is still
/// queued: the task observes the cleared liveness flag and never subscribes.
pub fn subscribe_on(exec: Arc<dyn Executor>) -> SubscribeOnOp {
  SubscribeOnOp { exec }
}

pub struct SubscribeOnOp {
  exec: Arc<dyn Executor>,
}

struct DeferredState {
  upstream: Subscription,
  alive: bool,
}

impl<T> Operator<T> for SubscribeOnOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let exec = self.exec;
    Observable::create(move |observer: Observer<T>| {
      let state = Arc::new(Mutex::new(DeferredState {
        upstream: Subscription::empty(),
        alive: true,
      }));

      let task_state = state.clone();
      let source = source.clone();
      exec.post(Box::new(move || {
        if !task_state.lock().alive {
          return;
        }
        let sub = source.subscribe_observer(observer);
        let mut st = task_state.lock();
        if st.alive {
          st.upstream = sub;
        } else {
          // Cancelled while we were subscribing.
          drop(st);
          let mut sub = sub;
          sub.reset();
        }
      }));

      Subscription::new(move || {
        let mut upstream = {
          let mut st = state.lock();
          st.alive = false;
          std::mem::take(&mut st.upstream)
        };
        upstream.reset();
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex as StdMutex;

  use super::*;
  use crate::prelude::*;
  use crate::scheduler::{Strand, ThreadPool};

  #[test]
  fn subscription_happens_on_the_executor() {
    let strand = Arc::new(Strand::new());
    let got = Arc::new(StdMutex::new(Vec::new()));
    let g = got.clone();
    let _sub = (observable::from_iter(1..=3) | subscribe_on(strand.clone()))
      .subscribe(move |v| g.lock().unwrap().push(v));

    // Nothing has run yet: the subscription itself is queued.
    assert!(got.lock().unwrap().is_empty());
    strand.drain();
    assert_eq!(*got.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn cancel_before_the_task_runs_prevents_subscription() {
    let strand = Arc::new(Strand::new());
    let subscribed = Arc::new(AtomicUsize::new(0));
    let s = subscribed.clone();
    let source = Observable::create(move |observer: Observer<i32>| {
      s.fetch_add(1, Ordering::SeqCst);
      observer.complete();
      Subscription::empty()
    });

    let mut sub = (source | subscribe_on(strand.clone())).subscribe(|_| {});
    sub.reset();
    strand.drain();
    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn pool_subscription_runs_off_the_caller_thread() {
    let pool = Arc::new(ThreadPool::new(1));
    let caller = std::thread::current().id();
    let seen = Arc::new(StdMutex::new(None));
    let s = seen.clone();
    let source = Observable::create(move |observer: Observer<i32>| {
      *s.lock().unwrap() = Some(std::thread::current().id());
      observer.next(1);
      observer.complete();
      Subscription::empty()
    });

    let _sub = (source | subscribe_on(pool)).subscribe(|_| {});
    std::thread::sleep(std::time::Duration::from_millis(80));
    let seen = seen.lock().unwrap();
    assert!(seen.is_some());
    assert_ne!(seen.unwrap(), caller);
  }
}
