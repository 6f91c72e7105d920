use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::Subscription;

/// Map each outer value to an inner observable and run the inners serially.
///
/// Inners queue in arrival order and never overlap. Downstream completes when
/// the outer has completed and every queued inner has completed; an error in
/// the outer or any inner terminates downstream and cancels the rest.
pub fn concat_map<F>(f: F) -> ConcatMapOp<F> {
  ConcatMapOp { f }
}

pub struct ConcatMapOp<F> {
  f: F,
}

struct ConcatState<Out> {
  queue: VecDeque<Observable<Out>>,
  inner: Subscription,
  inner_active: bool,
  // Bumps every time an inner slot opens; guards the late store of a
  // synchronously-finished inner's subscription.
  inner_generation: u64,
  outer_done: bool,
  alive: bool,
}

fn drain<Out: Send + 'static>(state: &Arc<Mutex<ConcatState<Out>>>, down: &Observer<Out>) {
  let (inner, my_generation) = {
    let mut st = state.lock();
    if !st.alive || st.inner_active {
      return;
    }
    match st.queue.pop_front() {
      Some(inner) => {
        st.inner_active = true;
        st.inner_generation += 1;
        (inner, st.inner_generation)
      }
      None => {
        if st.outer_done {
          st.alive = false;
          drop(st);
          down.complete();
        }
        return;
      }
    }
  };

  let in_down = down.clone();
  let (next_state, err_state, done_state) = (state.clone(), state.clone(), state.clone());
  let in_err_down = down.clone();
  let in_done_down = down.clone();

  let sub = inner.subscribe_observer(Observer::from_parts(
    Some(Arc::new(move |v| {
      if next_state.lock().alive {
        in_down.next(v);
      }
    })),
    Some(Arc::new(move |e| {
      let mut current = {
        let mut st = err_state.lock();
        if !st.alive {
          return;
        }
        st.alive = false;
        st.queue.clear();
        std::mem::take(&mut st.inner)
      };
      current.reset();
      in_err_down.error(e);
    })),
    Some(Arc::new(move || {
      let mut finished = {
        let mut st = done_state.lock();
        if !st.alive || !st.inner_active {
          return;
        }
        st.inner_active = false;
        std::mem::take(&mut st.inner)
      };
      finished.reset();
      drain(&done_state, &in_done_down);
    })),
  ));

  let mut st = state.lock();
  if st.alive && st.inner_active && st.inner_generation == my_generation {
    st.inner = sub;
  }
}

impl<In, Out, F> Operator<In> for ConcatMapOp<F>
where
  In: Send + 'static,
  Out: Send + 'static,
  F: Fn(In) -> Observable<Out> + Send + Sync + 'static,
{
  type Out = Out;

  fn apply(self, source: Observable<In>) -> Observable<Out> {
    let f = Arc::new(self.f);
    Observable::create(move |observer: Observer<Out>| {
      let state = Arc::new(Mutex::new(ConcatState {
        queue: VecDeque::new(),
        inner: Subscription::empty(),
        inner_active: false,
        inner_generation: 0,
        outer_done: false,
        alive: true,
      }));
      let f = f.clone();

      let down = observer.clone();
      let (outer_state, err_state, done_state, cancel_state) =
        (state.clone(), state.clone(), state.clone(), state);
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: In| {
          let inner = f(v);
          {
            let mut st = outer_state.lock();
            if !st.alive {
              return;
            }
            st.queue.push_back(inner);
          }
          drain(&outer_state, &down);
        })),
        Some(Arc::new(move |e| {
          let mut current = {
            let mut st = err_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
            st.queue.clear();
            std::mem::take(&mut st.inner)
          };
          current.reset();
          err_down.error(e);
        })),
        Some(Arc::new(move || {
          {
            let mut st = done_state.lock();
            if !st.alive {
              return;
            }
            st.outer_done = true;
            if st.inner_active || !st.queue.is_empty() {
              return;
            }
            st.alive = false;
          }
          done_down.complete();
        })),
      ));

      Subscription::new(move || {
        let mut current = {
          let mut st = cancel_state.lock();
          st.alive = false;
          st.queue.clear();
          std::mem::take(&mut st.inner)
        };
        current.reset();
        upstream.reset();
      })
    })
  }
}
