use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::{CompositeSubscription, Subscription};

/// Pair values of two sources positionally.
///
/// Each side buffers in a FIFO; whenever both heads are available they are
/// consumed and `combiner(head_a, head_b)` is emitted. The stream completes
/// when one source has completed and its queue is empty, since no further pair can
/// ever form. The first error terminates downstream and cancels the sibling.
pub fn zip<A, B, R, F>(a: Observable<A>, b: Observable<B>, combiner: F) -> Observable<R>
where
  A: Send + 'static,
  B: Send + 'static,
  R: Send + 'static,
  F: Fn(A, B) -> R + Send + Sync + 'static,
{
  let combiner = Arc::new(combiner);
  Observable::create(move |observer: Observer<R>| {
    let state = Arc::new(Mutex::new(ZipState {
      queue_a: VecDeque::new(),
      queue_b: VecDeque::new(),
      done_a: false,
      done_b: false,
      alive: true,
    }));
    let composite = Arc::new(CompositeSubscription::new());
    let combiner = combiner.clone();

    let sub_a = {
      let (st, comp, down, f) = (state.clone(), composite.clone(), observer.clone(), combiner.clone());
      let (err_st, err_comp, err_down) = (state.clone(), composite.clone(), observer.clone());
      let (done_st, done_comp, done_down, done_f) =
        (state.clone(), composite.clone(), observer.clone(), combiner.clone());
      a.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: A| {
          {
            let mut s = st.lock();
            if !s.alive {
              return;
            }
            s.queue_a.push_back(v);
          }
          pump(&st, &comp, &down, &*f);
        })),
        Some(Arc::new(move |e: Error| fail(&err_st, &err_comp, &err_down, e))),
        Some(Arc::new(move || {
          {
            let mut s = done_st.lock();
            if !s.alive {
              return;
            }
            s.done_a = true;
          }
          pump(&done_st, &done_comp, &done_down, &*done_f)
        })),
      ))
    };

    let sub_b = {
      let (st, comp, down, f) = (state.clone(), composite.clone(), observer.clone(), combiner.clone());
      let (err_st, err_comp, err_down) = (state.clone(), composite.clone(), observer.clone());
      let (done_st, done_comp, done_down, done_f) =
        (state.clone(), composite.clone(), observer.clone(), combiner.clone());
      b.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: B| {
          {
            let mut s = st.lock();
            if !s.alive {
              return;
            }
            s.queue_b.push_back(v);
          }
          pump(&st, &comp, &down, &*f);
        })),
        Some(Arc::new(move |e: Error| fail(&err_st, &err_comp, &err_down, e))),
        Some(Arc::new(move || {
          {
            let mut s = done_st.lock();
            if !s.alive {
              return;
            }
            s.done_b = true;
          }
          pump(&done_st, &done_comp, &done_down, &*done_f)
        })),
      ))
    };

    composite.add(sub_a);
    composite.add(sub_b);
    let composite = composite.clone();
    Subscription::new(move || composite.reset())
  })
}

struct ZipState<A, B> {
  queue_a: VecDeque<A>,
  queue_b: VecDeque<B>,
  done_a: bool,
  done_b: bool,
  alive: bool,
}

enum Step<R> {
  Emit(R),
  Complete,
  Wait,
}

/// Emit every ready pair, then check whether the stream can still produce.
fn pump<A, B, R, F: Fn(A, B) -> R>(
  state: &Arc<Mutex<ZipState<A, B>>>,
  composite: &Arc<CompositeSubscription>,
  down: &Observer<R>,
  combiner: &F,
) {
  loop {
    let step = {
      let mut st = state.lock();
      if !st.alive {
        return;
      }
      match (st.queue_a.pop_front(), st.queue_b.pop_front()) {
        (Some(a), Some(b)) => Step::Emit(combiner(a, b)),
        (a, b) => {
          // Put back whichever head we speculatively took.
          if let Some(a) = a {
            st.queue_a.push_front(a);
          }
          if let Some(b) = b {
            st.queue_b.push_front(b);
          }
          if (st.done_a && st.queue_a.is_empty()) || (st.done_b && st.queue_b.is_empty()) {
            st.alive = false;
            Step::Complete
          } else {
            Step::Wait
          }
        }
      }
    };
    match step {
      Step::Emit(out) => down.next(out),
      Step::Complete => {
        down.complete();
        composite.reset();
        return;
      }
      Step::Wait => return,
    }
  }
}

fn fail<A, B, R>(
  state: &Arc<Mutex<ZipState<A, B>>>,
  composite: &Arc<CompositeSubscription>,
  down: &Observer<R>,
  err: Error,
) {
  {
    let mut st = state.lock();
    if !st.alive {
      return;
    }
    st.alive = false;
  }
  down.error(err);
  composite.reset();
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex as StdMutex;

  use super::*;
  use crate::prelude::*;
  use crate::subject::Subject;

  #[test]
  fn pairs_by_position() {
    let a: Subject<i32> = Subject::new();
    let b: Subject<&'static str> = Subject::new();
    let got = Arc::new(StdMutex::new(Vec::new()));
    let g = got.clone();
    let _sub = zip(a.as_observable(), b.as_observable(), |n, s| format!("{s}{n}"))
      .subscribe(move |v| g.lock().unwrap().push(v));

    a.on_next(1);
    a.on_next(2);
    assert!(got.lock().unwrap().is_empty());
    b.on_next("x");
    b.on_next("y");
    b.on_next("z");
    assert_eq!(*got.lock().unwrap(), vec!["x1", "y2"]);
  }

  #[test]
  fn completes_when_a_done_side_runs_dry() {
    let a: Subject<i32> = Subject::new();
    let b: Subject<i32> = Subject::new();
    let log = Arc::new(StdMutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    let _sub = zip(a.as_observable(), b.as_observable(), |x, y| x + y).subscribe_all(
      move |v| l1.lock().unwrap().push(format!("v{v}")),
      |_| {},
      move || l2.lock().unwrap().push("done".into()),
    );

    a.on_next(1);
    a.on_completed();
    // Side a is done but its value is still queued: one pair remains possible.
    assert_eq!(*log.lock().unwrap(), Vec::<String>::new());
    b.on_next(10);
    assert_eq!(*log.lock().unwrap(), vec!["v11", "done"]);
  }

  #[test]
  fn error_cancels_the_sibling() {
    let a: Subject<i32> = Subject::new();
    let b: Subject<i32> = Subject::new();
    let errs = Arc::new(StdMutex::new(Vec::new()));
    let e = errs.clone();
    let _sub = zip(a.as_observable(), b.as_observable(), |x, y| x + y)
      .subscribe_all(|_| {}, move |err| e.lock().unwrap().push(err.to_string()), || {});

    a.on_error(Error::msg("zip side failed"));
    assert_eq!(*errs.lock().unwrap(), vec!["zip side failed"]);
    assert_eq!(b.subscriber_count(), 0);
  }
}
