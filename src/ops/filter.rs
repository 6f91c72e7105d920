use std::sync::Arc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;

/// Drop values the predicate rejects.
pub fn filter<P>(predicate: P) -> FilterOp<P> {
  FilterOp { predicate }
}

pub struct FilterOp<P> {
  predicate: P,
}

impl<T, P> Operator<T> for FilterOp<P>
where
  T: Send + 'static,
  P: Fn(&T) -> bool + Send + Sync + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let predicate = Arc::new(self.predicate);
    Observable::create(move |observer: Observer<T>| {
      let predicate = predicate.clone();
      let down = observer.clone();
      source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v| {
          if predicate(&v) {
            down.next(v);
          }
        })),
        observer.error.clone(),
        observer.done.clone(),
      ))
    })
  }
}
