use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::Subscription;

/// Interleave two sources.
///
/// Values are forwarded as they arrive from either side. Downstream completes
/// only when both sources have completed; the first error terminates
/// downstream and cancels the sibling.
pub fn merge<T: Send + 'static>(a: Observable<T>, b: Observable<T>) -> Observable<T> {
  Observable::create(move |observer: Observer<T>| {
    let state = Arc::new(MergeState {
      alive: AtomicBool::new(true),
      terminated: AtomicBool::new(false),
      remaining: AtomicUsize::new(2),
      subs: Mutex::new((Subscription::empty(), Subscription::empty())),
    });

    let sub_a = subscribe_side(&a, &state, &observer);
    let sub_b = subscribe_side(&b, &state, &observer);
    {
      let mut subs = state.subs.lock();
      subs.0 = sub_a;
      subs.1 = sub_b;
      // Either side may already have terminated us synchronously.
      if !state.alive.load(Ordering::Acquire) {
        subs.0.reset();
        subs.1.reset();
      }
    }

    let state = state.clone();
    Subscription::new(move || {
      state.alive.store(false, Ordering::Release);
      state.cancel_both();
    })
  })
}

/// Fold any number of sources into pairwise merges.
pub fn merge_all<T, I>(sources: I) -> Observable<T>
where
  T: Send + 'static,
  I: IntoIterator<Item = Observable<T>>,
{
  let mut iter = sources.into_iter();
  let first = match iter.next() {
    Some(first) => first,
    None => return crate::observable::empty(),
  };
  iter.fold(first, merge)
}

struct MergeState {
  alive: AtomicBool,
  terminated: AtomicBool,
  remaining: AtomicUsize,
  subs: Mutex<(Subscription, Subscription)>,
}

impl MergeState {
  fn cancel_both(&self) {
    let mut subs = self.subs.lock();
    subs.0.reset();
    subs.1.reset();
  }
}

fn subscribe_side<T: Send + 'static>(
  side: &Observable<T>,
  state: &Arc<MergeState>,
  observer: &Observer<T>,
) -> Subscription {
  let down = observer.clone();
  let (next_state, err_state, done_state) = (state.clone(), state.clone(), state.clone());
  let err_down = observer.clone();
  let done_down = observer.clone();

  side.subscribe_observer(Observer::from_parts(
    Some(Arc::new(move |v: T| {
      if next_state.alive.load(Ordering::Acquire) {
        down.next(v);
      }
    })),
    Some(Arc::new(move |e: Error| {
      if !err_state.alive.load(Ordering::Acquire) {
        return;
      }
      if !err_state.terminated.swap(true, Ordering::AcqRel) {
        err_state.alive.store(false, Ordering::Release);
        err_state.cancel_both();
        err_down.error(e);
      }
    })),
    Some(Arc::new(move || {
      if !done_state.alive.load(Ordering::Acquire) {
        return;
      }
      if done_state.remaining.fetch_sub(1, Ordering::AcqRel) == 1
        && !done_state.terminated.swap(true, Ordering::AcqRel)
      {
        done_state.alive.store(false, Ordering::Release);
        done_state.cancel_both();
        done_down.complete();
      }
    })),
  ))
}
