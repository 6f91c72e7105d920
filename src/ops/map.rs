use std::sync::Arc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::ops::Operator;

/// Apply `f` to every value; errors and completion pass through.
pub fn map<F>(f: F) -> MapOp<F> {
  MapOp { f }
}

pub struct MapOp<F> {
  f: F,
}

impl<In, Out, F> Operator<In> for MapOp<F>
where
  In: Send + 'static,
  Out: Send + 'static,
  F: Fn(In) -> Out + Send + Sync + 'static,
{
  type Out = Out;

  fn apply(self, source: Observable<In>) -> Observable<Out> {
    let f = Arc::new(self.f);
    Observable::create(move |observer: Observer<Out>| {
      let f = f.clone();
      let down = observer.clone();
      source.subscribe_observer(Observer::from_parts(
        Some(Arc::new(move |v| down.next(f(v)))),
        observer.error.clone(),
        observer.done.clone(),
      ))
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::prelude::*;

  #[test]
  fn transforms_each_value() {
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = got.clone();
    (observable::from_iter(1..=3) | map(|v| v * 10)).subscribe(move |v| {
      g.lock().unwrap().push(v);
    });
    assert_eq!(*got.lock().unwrap(), vec![10, 20, 30]);
  }

  #[test]
  fn changes_the_value_type() {
    let got = Arc::new(Mutex::new(Vec::new()));
    let g = got.clone();
    (observable::from_iter(1..=2) | map(|v| format!("#{v}")))
      .subscribe(move |v| g.lock().unwrap().push(v));
    assert_eq!(*got.lock().unwrap(), vec!["#1", "#2"]);
  }

  #[test]
  fn terminals_pass_through() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    (observable::throw::<i32>(Error::msg("oops")) | map(|v: i32| v))
      .subscribe_all(|_| {}, move |e| l1.lock().unwrap().push(e.to_string()), || {});
    (observable::empty::<i32>() | map(|v: i32| v))
      .subscribe_all(|_| {}, |_| {}, move || l2.lock().unwrap().push("done".into()));
    assert_eq!(*log.lock().unwrap(), vec!["oops", "done"]);
  }
}
