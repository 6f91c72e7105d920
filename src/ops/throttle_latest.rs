use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// Leading edge plus trailing latest.
///
/// The first value of an open window is delivered immediately and closes the
/// window; later arrivals overwrite a pending slot. When the window ends, a
/// pending value is delivered and another window starts; with nothing
/// pending the gate simply reopens. A steady burst therefore drains at one
/// value per window, and a finite burst emits at most its leading value and
/// its final latest.
pub fn throttle_latest(window: Duration, exec: Arc<dyn Executor>) -> ThrottleLatestOp {
  ThrottleLatestOp { window, exec }
}

pub struct ThrottleLatestOp {
  window: Duration,
  exec: Arc<dyn Executor>,
}

struct LatestState<T> {
  closed: bool,
  pending: Option<T>,
  alive: bool,
}

fn schedule_window_end<T: Send + 'static>(
  state: Arc<Mutex<LatestState<T>>>,
  window: Duration,
  exec: Arc<dyn Executor>,
  down: Observer<T>,
) {
  std::thread::spawn(move || {
    std::thread::sleep(window);
    let trailing = {
      let mut st = state.lock();
      if !st.alive {
        return;
      }
      match st.pending.take() {
        // Stay closed: the trailing emit opens a fresh window.
        Some(value) => Some(value),
        None => {
          st.closed = false;
          None
        }
      }
    };
    if let Some(value) = trailing {
      let (task_state, task_down) = (state.clone(), down.clone());
      exec.post(Box::new(move || {
        if task_state.lock().alive {
          task_down.next(value);
        }
      }));
      schedule_window_end(state, window, exec, down);
    }
  });
}

impl<T> Operator<T> for ThrottleLatestOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let window = self.window;
    let exec = self.exec;
    Observable::create(move |observer: Observer<T>| {
      let state = Arc::new(Mutex::new(LatestState {
        closed: false,
        pending: None,
        alive: true,
      }));
      let exec = exec.clone();

      let down = observer.clone();
      let (next_state, err_state, done_state, cancel_state) =
        (state.clone(), state.clone(), state.clone(), state);
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          let leading = {
            let mut st = next_state.lock();
            if !st.alive {
              return;
            }
            if st.closed {
              st.pending = Some(v);
              None
            } else {
              st.closed = true;
              Some(v)
            }
          };
          if let Some(value) = leading {
            let (task_state, task_down) = (next_state.clone(), down.clone());
            exec.post(Box::new(move || {
              if task_state.lock().alive {
                task_down.next(value);
              }
            }));
            schedule_window_end(next_state.clone(), window, exec.clone(), down.clone());
          }
        })),
        Some(Arc::new(move |e| {
          {
            let mut st = err_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
          }
          err_down.error(e);
        })),
        Some(Arc::new(move || {
          {
            let mut st = done_state.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
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
