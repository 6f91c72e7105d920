use std::sync::Arc;

use parking_lot::Mutex;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;

/// Suppress values equal to the previously delivered one.
pub fn distinct_until_changed() -> DistinctUntilChangedOp {
  DistinctUntilChangedOp
}

pub struct DistinctUntilChangedOp;

impl<T> Operator<T> for DistinctUntilChangedOp
where
  T: Clone + PartialEq + Send + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    Observable::create(move |observer: Observer<T>| {
      let previous: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
      let down = observer.clone();
      source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v: T| {
          let changed = {
            let mut prev = previous.lock();
            if prev.as_ref() != Some(&v) {
              *prev = Some(v.clone());
              true
            } else {
              false
            }
          };
          if changed {
            down.next(v);
          }
        })),
        observer.error.clone(),
        observer.done.clone(),
      ))
    })
  }
}
