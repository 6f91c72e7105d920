use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::{CompositeSubscription, Subscription};

/// Forward the first `n` values, then complete and cancel upstream.
///
/// `take(0)` completes immediately without subscribing upstream. The counter
/// is atomic, so re-entrant or concurrent upstream emissions are clipped
/// exactly at `n`.
pub fn take(n: usize) -> TakeOp {
  TakeOp { n }
}

pub struct TakeOp {
  n: usize,
}

impl<T> Operator<T> for TakeOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let n = self.n;
    Observable::create(move |observer: Observer<T>| {
      if n == 0 {
        observer.complete();
        return Subscription::empty();
      }

      let remaining = Arc::new(AtomicUsize::new(n));
      let terminated = Arc::new(AtomicBool::new(false));
      let composite = Arc::new(CompositeSubscription::new());
      let down = observer.clone();
      let (comp_next, comp_err, comp_done) = (composite.clone(), composite.clone(), composite.clone());
      let (term_next, term_err, term_done) = (terminated.clone(), terminated.clone(), terminated.clone());
      let err_down = observer.clone();
      let done_down = observer.clone();

      let upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          let taken = remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1));
          match taken {
            Ok(1) => {
              // This was the n-th value.
              down.next(v);
              if !term_next.swap(true, Ordering::AcqRel) {
                down.complete();
              }
              comp_next.reset();
            }
            Ok(_) => down.next(v),
            Err(_) => {}
          }
        })),
        Some(Arc::new(move |e| {
          if !term_err.swap(true, Ordering::AcqRel) {
            err_down.error(e);
          }
          comp_err.reset();
        })),
        Some(Arc::new(move || {
          if !term_done.swap(true, Ordering::AcqRel) {
            done_down.complete();
          }
          comp_done.reset();
        })),
      ));

      composite.add(upstream);
      let composite = composite.clone();
      Subscription::new(move || composite.reset())
    })
  }
}
