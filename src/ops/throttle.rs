use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// Leading-edge rate gate.
///
/// The first value of an open window is delivered immediately through `exec`
/// and closes the window for `window`; values arriving while closed are
/// dropped.
pub fn throttle(window: Duration, exec: Arc<dyn Executor>) -> ThrottleOp {
  ThrottleOp { window, exec }
}

pub struct ThrottleOp {
  window: Duration,
  exec: Arc<dyn Executor>,
}

struct GateState {
  closed: bool,
  alive: bool,
}

impl<T> Operator<T> for ThrottleOp
where
  T: Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let window = self.window;
    let exec = self.exec;
    Observable::create(move |observer: Observer<T>| {
      let gate = Arc::new(Mutex::new(GateState { closed: false, alive: true }));
      let exec = exec.clone();

      let down = observer.clone();
      let (next_gate, err_gate, done_gate, cancel_gate) =
        (gate.clone(), gate.clone(), gate.clone(), gate);
      let err_down = observer.clone();
      let done_down = observer.clone();

      let mut upstream = source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          {
            let mut st = next_gate.lock();
            if !st.alive || st.closed {
              return;
            }
            st.closed = true;
          }
          let (value_exec, down) = (exec.clone(), down.clone());
          let st = next_gate.clone();
          value_exec.post(Box::new(move || {
            if st.lock().alive {
              down.next(v);
            }
          }));
          // Reopen the gate once the window passes.
          let st = next_gate.clone();
          std::thread::spawn(move || {
            std::thread::sleep(window);
            let mut st = st.lock();
            if st.alive {
              st.closed = false;
            }
          });
        })),
        Some(Arc::new(move |e| {
          {
            let mut st = err_gate.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
          }
          err_down.error(e);
        })),
        Some(Arc::new(move || {
          {
            let mut st = done_gate.lock();
            if !st.alive {
              return;
            }
            st.alive = false;
          }
          done_down.complete();
        })),
      ));

      Subscription::new(move || {
        cancel_gate.lock().alive = false;
        upstream.reset();
      })
    })
  }
}
