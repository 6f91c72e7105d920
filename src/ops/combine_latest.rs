use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::{CompositeSubscription, Subscription};

/// Combine the most recent value of two sources.
///
/// Each emission from either side produces `combiner(latest_a, latest_b)`
/// once both sides have emitted at least once. Downstream completes when both
/// sources have completed; the first error terminates downstream and cancels
/// the sibling.
pub fn combine_latest<A, B, R, F>(
  a: Observable<A>,
  b: Observable<B>,
  combiner: F,
) -> Observable<R>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  R: Send + 'static,
  F: Fn(&A, &B) -> R + Send + Sync + 'static,
{
  let combiner = Arc::new(combiner);
  Observable::create(move |observer: Observer<R>| {
    let state = Arc::new(Mutex::new(PairState {
      last_a: None,
      last_b: None,
      done_a: false,
      done_b: false,
      alive: true,
    }));
    let composite = Arc::new(CompositeSubscription::new());
    let combiner = combiner.clone();

    let down = observer.clone();
    let (a_state, a_combiner) = (state.clone(), combiner.clone());
    let sub_a = a.subscribe_observer(Observer::from_parts(
      Some(Arc::new(move |v: A| {
        let out = {
          let mut st = a_state.lock();
          if !st.alive {
            return;
          }
          st.last_a = Some(v);
          st.combined(&*a_combiner)
        };
        if let Some(out) = out {
          down.next(out);
        }
      })),
      Some(error_side(&state, &composite, &observer)),
      Some(done_side(&state, &composite, &observer, Side::A)),
    ));

    let down = observer.clone();
    let (b_state, b_combiner) = (state.clone(), combiner.clone());
    let sub_b = b.subscribe_observer(Observer::from_parts(
      Some(Arc::new(move |v: B| {
        let out = {
          let mut st = b_state.lock();
          if !st.alive {
            return;
          }
          st.last_b = Some(v);
          st.combined(&*b_combiner)
        };
        if let Some(out) = out {
          down.next(out);
        }
      })),
      Some(error_side(&state, &composite, &observer)),
      Some(done_side(&state, &composite, &observer, Side::B)),
    ));

    composite.add(sub_a);
    composite.add(sub_b);
    let composite = composite.clone();
    Subscription::new(move || composite.reset())
  })
}

struct PairState<A, B> {
  last_a: Option<A>,
  last_b: Option<B>,
  done_a: bool,
  done_b: bool,
  alive: bool,
}

impl<A, B> PairState<A, B> {
  fn combined<R, F: Fn(&A, &B) -> R>(&self, combiner: &F) -> Option<R> {
    match (&self.last_a, &self.last_b) {
      (Some(a), Some(b)) => Some(combiner(a, b)),
      _ => None,
    }
  }
}

enum Side {
  A,
  B,
}

fn error_side<A, B, R>(
  state: &Arc<Mutex<PairState<A, B>>>,
  composite: &Arc<CompositeSubscription>,
  observer: &Observer<R>,
) -> Arc<dyn Fn(Error) + Send + Sync>
where
  A: Send + 'static,
  B: Send + 'static,
  R: 'static,
{
  let state = state.clone();
  let composite = composite.clone();
  let down = observer.clone();
  Arc::new(move |e: Error| {
    {
      let mut st = state.lock();
      if !st.alive {
        return;
      }
      st.alive = false;
    }
    down.error(e);
    composite.reset();
  })
}

fn done_side<A, B, R>(
  state: &Arc<Mutex<PairState<A, B>>>,
  composite: &Arc<CompositeSubscription>,
  observer: &Observer<R>,
  side: Side,
) -> Arc<dyn Fn() + Send + Sync>
where
  A: Send + 'static,
  B: Send + 'static,
  R: 'static,
{
  let state = state.clone();
  let composite = composite.clone();
  let down = observer.clone();
  Arc::new(move || {
    let both_done = {
      let mut st = state.lock();
      if !st.alive {
        return;
      }
      match side {
        Side::A => st.done_a = true,
        Side::B => st.done_b = true,
      }
      if st.done_a && st.done_b {
        st.alive = false;
        true
      } else {
        false
      }
    };
    if both_done {
      down.complete();
      composite.reset();
    }
  })
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex as StdMutex;

  use super::*;
  use crate::prelude::*;
  use crate::subject::Subject;

  #[test]
  fn waits_for_both_then_recombines_on_every_emission() {
    let a: Subject<i32> = Subject::new();
    let b: Subject<&'static str> = Subject::new();
    let got = Arc::new(StdMutex::new(Vec::new()));
    let g = got.clone();
    let _sub = combine_latest(a.as_observable(), b.as_observable(), |n, s| format!("{s}{n}"))
      .subscribe(move |v| g.lock().unwrap().push(v));

    a.on_next(1);
    assert!(got.lock().unwrap().is_empty());
    b.on_next("x");
    a.on_next(2);
    b.on_next("y");
    assert_eq!(*got.lock().unwrap(), vec!["x1", "x2", "y2"]);
  }

  #[test]
  fn completes_when_both_sides_complete() {
    let a: Subject<i32> = Subject::new();
    let b: Subject<i32> = Subject::new();
    let done = Arc::new(StdMutex::new(false));
    let d = done.clone();
    let _sub = combine_latest(a.as_observable(), b.as_observable(), |x, y| x + y)
      .subscribe_all(|_| {}, |_| {}, move || *d.lock().unwrap() = true);

    a.on_completed();
    assert!(!*done.lock().unwrap());
    b.on_completed();
    assert!(*done.lock().unwrap());
  }

  #[test]
  fn error_from_either_side_terminates() {
    let a: Subject<i32> = Subject::new();
    let b: Subject<i32> = Subject::new();
    let errs = Arc::new(StdMutex::new(Vec::new()));
    let e = errs.clone();
    let _sub = combine_latest(a.as_observable(), b.as_observable(), |x, y| x + y)
      .subscribe_all(|_| {}, move |err| e.lock().unwrap().push(err.to_string()), || {});

    b.on_error(Error::msg("side b failed"));
    assert_eq!(*errs.lock().unwrap(), vec!["side b failed"]);
    assert_eq!(a.subscriber_count(), 0);
  }
}
