use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::{CompositeSubscription, Subscription};

/// Resubscribe on error, up to `k` additional attempts.
///
/// `retry(k)` allows `k + 1` subscriptions in total; the error of the last
/// attempt is forwarded downstream. Completion is forwarded unchanged.
/// Resubscription goes through a composite, so cancelling downstream stops
/// an in-flight retry loop.
pub fn retry(k: usize) -> RetryOp {
  RetryOp { k }
}

pub struct RetryOp {
  k: usize,
}

struct RetryCtx<T> {
  source: Observable<T>,
  down: Observer<T>,
  attempts: AtomicUsize,
  limit: usize,
  composite: Arc<CompositeSubscription>,
}

fn attempt<T: Send + 'static>(ctx: Arc<RetryCtx<T>>) {
  if ctx.composite.is_cancelled() {
    return;
  }

  let next_down = ctx.down.clone();
  let done_down = ctx.down.clone();
  let done_composite = ctx.composite.clone();
  let err_ctx = ctx.clone();

  let sub = ctx.source.subscribe_observer(Observer::from_parts(
    Some(Arc::new(move |v: T| next_down.next(v))),
    Some(Arc::new(move |e| {
      let used = err_ctx.attempts.fetch_add(1, Ordering::AcqRel);
      if used < err_ctx.limit {
        tracing::debug!(attempt = used + 1, "retrying after upstream error");
        attempt(err_ctx.clone());
      } else {
        err_ctx.down.error(e);
        err_ctx.composite.reset();
      }
    })),
    Some(Arc::new(move || {
      done_down.complete();
      done_composite.reset();
    })),
  ));
  ctx.composite.add(sub);
}

impl<T> Operator<T> for RetryOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let limit = self.k;
    Observable::create(move |observer: Observer<T>| {
      let composite = Arc::new(CompositeSubscription::new());
      let ctx = Arc::new(RetryCtx {
        source: source.clone(),
        down: observer,
        attempts: AtomicUsize::new(0),
        limit,
        composite: composite.clone(),
      });
      attempt(ctx);
      Subscription::new(move || composite.reset())
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::prelude::*;

  /// Errors on the first `failures` subscriptions, then emits 42 and
  /// completes.
  fn flaky(failures: usize) -> (Observable<i32>, Arc<AtomicUsize>) {
    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    let source = Observable::create(move |observer: Observer<i32>| {
      let n = s.fetch_add(1, Ordering::SeqCst);
      if n < failures {
        observer.error(Error::msg(format!("failure {n}")));
      } else {
        observer.next(42);
        observer.complete();
      }
      Subscription::empty()
    });
    (source, seen)
  }

  #[test]
  fn recovers_within_the_limit() {
    let (source, seen) = flaky(2);
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    (source | retry(2)).subscribe_all(
      move |v| l1.lock().unwrap().push(format!("v{v}")),
      move |_| l2.lock().unwrap().push("err".into()),
      move || l3.lock().unwrap().push("done".into()),
    );
    assert_eq!(*log.lock().unwrap(), vec!["v42", "done"]);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn exhausted_retries_forward_the_last_error() {
    let (source, seen) = flaky(5);
    let errs = Arc::new(Mutex::new(Vec::new()));
    let e = errs.clone();
    (source | retry(2)).subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err.to_string()),
      || {},
    );
    // Initial subscription plus two retries.
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert_eq!(*errs.lock().unwrap(), vec!["failure 2"]);
  }

  #[test]
  fn retry_zero_forwards_the_first_error() {
    let (source, seen) = flaky(1);
    let errs = Arc::new(Mutex::new(Vec::new()));
    let e = errs.clone();
    (source | retry(0)).subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err.to_string()),
      || {},
    );
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(*errs.lock().unwrap(), vec!["failure 0"]);
  }

  #[test]
  fn completion_passes_straight_through() {
    let done = Arc::new(Mutex::new(false));
    let d = done.clone();
    (observable::from_iter(1..=2) | retry(3)).subscribe_all(
      |_| {},
      |_| {},
      move || *d.lock().unwrap() = true,
    );
    assert!(*done.lock().unwrap());
  }
}
