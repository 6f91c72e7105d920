use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::Subscription;

/// Collect values into groups of exactly `count`.
///
/// Upstream completion flushes the partial tail before `on_done`; an upstream
/// error is forwarded immediately and the tail is discarded.
///
/// # Panics
///
/// `count` must be greater than zero; `buffer(0)` panics at construction.
pub fn buffer(count: usize) -> BufferOp {
  assert!(count > 0, "buffer: count must be > 0");
  BufferOp { count }
}

pub struct BufferOp {
  count: usize,
}

struct BufferState<T> {
  group: Vec<T>,
  alive: bool,
}

impl<T> Operator<T> for BufferOp
where
  T: Send + 'static,
{
  type Out = Vec<T>;

  fn apply(self, source: Observable<T>) -> Observable<Vec<T>> {
    let count = self.count;
    Observable::create(move |observer: Observer<Vec<T>>| {
      let state = Arc::new(Mutex::new(BufferState {
        group: Vec::with_capacity(count),
        alive: true,
      }));

      let down = observer.clone();
      let (next_state, err_state, done_state, cancel_state) =
        (state.clone(), state.clone(), state.clone(), state);
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          let full = {
            let mut st = next_state.lock();
            if !st.alive {
              return;
            }
            st.group.push(v);
            if st.group.len() >= count {
              Some(std::mem::replace(&mut st.group, Vec::with_capacity(count)))
            } else {
              None
            }
          };
          if let Some(group) = full {
            down.next(group);
          }
        })),
        Some(Arc::new(move |e| {
          {
            let mut st = err_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
            // The tail is dropped on error.
            st.group.clear();
          }
          err_down.error(e);
        })),
        Some(Arc::new(move || {
          let tail = {
            let mut st = done_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
            std::mem::take(&mut st.group)
          };
          if !tail.is_empty() {
            done_down.next(tail);
          }
          done_down.complete();
        })),
      ));

      Subscription::new(move || {
        cancel_state.lock().alive = false;
        upstream.reset();
      })
    })
  }
}
