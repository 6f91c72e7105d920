use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;

/// Emit `seed` synchronously on subscribe, before any upstream value.
pub fn start_with<T>(seed: T) -> StartWithOp<T> {
  StartWithOp { seed }
}

pub struct StartWithOp<T> {
  seed: T,
}

impl<T> Operator<T> for StartWithOp<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Out = T;

  fn apply(self, source: Observable<T>) -> Observable<T> {
    let seed = self.seed;
    Observable::create(move |observer: Observer<T>| {
      observer.next(seed.clone());
      source.subscribe_observer(observer)
    })
  }
}
