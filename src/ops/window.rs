use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::Subscription;

/// Like `buffer`, but each group is exposed as an inner observable.
///
/// The outer stream emits an inner observable when a group opens; the inner
/// completes when the group reaches `count` values. Upstream completion
/// closes the current inner and completes the outer; an upstream error closes
/// the current inner with the error, then errors the outer.
///
/// Values that arrive before the inner is subscribed are not replayed;
/// windows are live, so the usual pattern is subscribing to the inner inside
/// the outer `on_next`.
///
/// # Panics
///
/// `count` must be greater than zero; `window(0)` panics at construction.
pub fn window(count: usize) -> WindowOp {
  assert!(count > 0, "window: count must be > 0");
  WindowOp { count }
}

pub struct WindowOp {
  count: usize,
}

/// Slot an inner observable delivers through once it is subscribed.
struct WindowSlot<T> {
  observer: Mutex<Observer<T>>,
  open: AtomicBool,
}

impl<T: Send + 'static> WindowSlot<T> {
  fn new() -> Arc<Self> {
    Arc::new(WindowSlot {
      observer: Mutex::new(Observer::default()),
      open: AtomicBool::new(true),
    })
  }

  fn as_inner(self: &Arc<Self>) -> Observable<T> {
    let slot = self.clone();
    Observable::create(move |observer| {
      // A window that already closed has nothing left to deliver.
      if !slot.open.load(Ordering::Acquire) {
        observer.complete();
        return Subscription::empty();
      }
      *slot.observer.lock() = observer;
      Subscription::empty()
    })
  }

  fn observer(&self) -> Observer<T> { self.observer.lock().clone() }
}

struct WindowState<T> {
  current: Option<Arc<WindowSlot<T>>>,
  filled: usize,
  alive: bool,
}

impl<T> Operator<T> for WindowOp
where
  T: Send + 'static,
{
  type Out = Observable<T>;

  fn apply(self, source: Observable<T>) -> Observable<Observable<T>> {
    let count = self.count;
    Observable::create(move |observer: Observer<Observable<T>>| {
      let state = Arc::new(Mutex::new(WindowState::<T> {
        current: None,
        filled: 0,
        alive: true,
      }));

      let down = observer.clone();
      let (next_state, err_state, done_state, cancel_state) =
        (state.clone(), state.clone(), state.clone(), state);
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          // Open if needed, outside the lock so the outer may subscribe the
          // inner synchronously.
          let opened = {
            let mut st = next_state.lock();
            if !st.alive {
              return;
            }
            if st.current.is_none() {
              let slot = WindowSlot::new();
              st.current = Some(slot.clone());
              st.filled = 0;
              Some(slot)
            } else {
              None
            }
          };
          if let Some(slot) = opened {
            down.next(slot.as_inner());
          }

          let (deliver_to, close) = {
            let mut st = next_state.lock();
            if !st.alive {
              return;
            }
            let Some(slot) = st.current.clone() else {
              return;
            };
            st.filled += 1;
            let close = if st.filled >= count {
              st.current = None;
              st.filled = 0;
              true
            } else {
              false
            };
            (slot, close)
          };
          deliver_to.observer().next(v);
          if close {
            deliver_to.open.store(false, Ordering::Release);
            deliver_to.observer().complete();
          }
        })),
        Some(Arc::new(move |e| {
          let current = {
            let mut st = err_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
            st.current.take()
          };
          if let Some(slot) = current {
            slot.open.store(false, Ordering::Release);
            slot.observer().error(e.clone());
          }
          err_down.error(e);
        })),
        Some(Arc::new(move || {
          let current = {
            let mut st = done_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
            st.current.take()
          };
          if let Some(slot) = current {
            slot.open.store(false, Ordering::Release);
            slot.observer().complete();
          }
          done_down.complete();
        })),
      ));

      Subscription::new(move || {
        let current = {
          let mut st = cancel_state.lock();
          st.alive = false;
          st.current.take()
        };
        if let Some(slot) = current {
          slot.open.store(false, Ordering::Release);
          *slot.observer.lock() = Observer::default();
        }
        upstream.reset();
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex as StdMutex;

  use super::*;
  use crate::prelude::*;

  #[test]
  fn windows_partition_the_stream() {
    let groups: Arc<StdMutex<Vec<Vec<i32>>>> = Arc::new(StdMutex::new(Vec::new()));
    let done = Arc::new(StdMutex::new(false));
    let (g, d) = (groups.clone(), done.clone());

    (observable::from_iter(1..=7) | window(3)).subscribe_all(
      move |inner: Observable<i32>| {
        g.lock().unwrap().push(Vec::new());
        let g = g.clone();
        inner.subscribe(move |v| {
          if let Some(last) = g.lock().unwrap().last_mut() {
            last.push(v);
          }
        });
      },
      |_| {},
      move || *d.lock().unwrap() = true,
    );

    assert_eq!(*groups.lock().unwrap(), vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    assert!(*done.lock().unwrap());
  }

  #[test]
  fn inner_count_matches_group_count() {
    let inners = Arc::new(StdMutex::new(0));
    let i = inners.clone();
    (observable::from_iter(1..=7) | window(3)).subscribe(move |_inner| {
      *i.lock().unwrap() += 1;
    });
    assert_eq!(*inners.lock().unwrap(), 3);
  }

  #[test]
  fn upstream_error_reaches_inner_and_outer() {
    let subject: Subject<i32> = Subject::new();
    let log = Arc::new(StdMutex::new(Vec::new()));
    let (outer_log, inner_log) = (log.clone(), log.clone());
    let _sub = (subject.as_observable() | window(3)).subscribe_all(
      move |inner: Observable<i32>| {
        let l = inner_log.clone();
        inner.subscribe_all(
          |_| {},
          move |e| l.lock().unwrap().push(format!("inner err: {e}")),
          || {},
        );
      },
      move |e| outer_log.lock().unwrap().push(format!("outer err: {e}")),
      || {},
    );

    subject.on_next(1);
    subject.on_error(Error::msg("broke"));
    assert_eq!(
      *log.lock().unwrap(),
      vec!["inner err: broke".to_string(), "outer err: broke".to_string()]
    );
  }

  #[test]
  #[should_panic(expected = "count must be > 0")]
  fn zero_count_is_rejected_at_construction() {
    let _ = window(0);
  }
}
