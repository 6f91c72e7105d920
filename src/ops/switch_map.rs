use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::subscription::Subscription;

/// Map each outer value to an inner observable, mirroring only the latest.
///
/// A new outer value cancels the current inner subscription before
/// subscribing to its replacement. Downstream completes once the outer has
/// completed and the current inner (if any) has completed too; an error from
/// either side terminates downstream immediately.
pub fn switch_map<F>(f: F) -> SwitchMapOp<F> {
  SwitchMapOp { f }
}

pub struct SwitchMapOp<F> {
  f: F,
}

struct SwitchState {
  inner: Subscription,
  inner_active: bool,
  outer_done: bool,
  alive: bool,
}

impl<In, Out, F> Operator<In> for SwitchMapOp<F>
where
  In: Send + 'static,
  Out: Send + 'static,
  F: Fn(In) -> Observable<Out> + Send + Sync + 'static,
{
  type Out = Out;

  fn apply(self, source: Observable<In>) -> Observable<Out> {
    let f = Arc::new(self.f);
    Observable::create(move |observer: Observer<Out>| {
      let state = Arc::new(Mutex::new(SwitchState {
        inner: Subscription::empty(),
        inner_active: false,
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
          // Replace the previous inner before the new one starts.
          let mut previous = {
            let mut st = outer_state.lock();
            if !st.alive {
              return;
            }
            st.inner_active = true;
            std::mem::take(&mut st.inner)
          };
          previous.reset();

          let inner = f(v);
          let in_down = down.clone();
          let (in_state, in_err_state, in_done_state) =
            (outer_state.clone(), outer_state.clone(), outer_state.clone());
          let in_err_down = down.clone();
          let in_done_down = down.clone();

          let sub = inner.subscribe_observer(Observer::from_parts(
            Some(Arc::new(move |v| {
              if in_state.lock().alive {
                in_down.next(v);
              }
            })),
            Some(Arc::new(move |e| {
              {
                let mut st = in_err_state.lock();
                if !st.alive {
                  return;
                }
                st.alive = false;
              }
              in_err_down.error(e);
            })),
            Some(Arc::new(move || {
              let finish = {
                let mut st = in_done_state.lock();
                if !st.alive {
                  return;
                }
                st.inner_active = false;
                if st.outer_done {
                  st.alive = false;
                  true
                } else {
                  false
                }
              };
              if finish {
                in_done_down.complete();
              }
            })),
          ));

          let mut st = outer_state.lock();
          if st.alive && st.inner_active {
            st.inner = sub;
          }
        })),
        Some(Arc::new(move |e| {
          let mut current = {
            let mut st = err_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
            std::mem::take(&mut st.inner)
          };
          current.reset();
          err_down.error(e);
        })),
        Some(Arc::new(move || {
          let finish = {
            let mut st = done_state.lock();
            if !st.alive {
              return;
            }
            st.outer_done = true;
            if st.inner_active {
              false
            } else {
              st.alive = false;
              true
            }
          };
          if finish {
            done_down.complete();
          }
        })),
      ));

      Subscription::new(move || {
        let mut current = {
          let mut st = cancel_state.lock();
          st.alive = false;
          std::mem::take(&mut st.inner)
        };
        current.reset();
        upstream.reset();
      })
    })
  }
}
