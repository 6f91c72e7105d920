//! Cold push sources.
//!
//! An [`Observable`] wraps a subscription function: subscribing hands the
//! factory an [`Observer`] and gets back a [`Subscription`] that cancels the
//! production run. Observables are cheap, copyable references to the shared
//! factory; every `subscribe` starts a fresh run (cold semantics) unless the
//! source was made hot with [`share`](crate::observable::share) or a
//! [`Subject`](crate::subject::Subject).

use std::sync::Arc;

use crate::error::Error;
use crate::observer::Observer;
use crate::subscription::Subscription;

pub(crate) mod connectable;
pub use connectable::{publish, ref_count, ref_count_with_grace, share, share_with_grace, Connectable};
pub(crate) mod timer;
pub use timer::{interval, interval_at, timer};

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Subscription + Send + Sync;

/// A lazy producer of a stream of `T`.
pub struct Observable<T> {
  subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
  fn clone(&self) -> Self { Observable { subscribe_fn: self.subscribe_fn.clone() } }
}

impl<T: Send + 'static> Observable<T> {
  /// Create an observable from its subscription function.
  ///
  /// The function is called once per subscriber. It receives the observer and
  /// returns the cancellation for whatever production it started.
  pub fn create(
    subscribe: impl Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
  ) -> Self {
    Observable { subscribe_fn: Arc::new(subscribe) }
  }

  /// Subscribe with a value callback only.
  pub fn subscribe(&self, on_next: impl Fn(T) + Send + Sync + 'static) -> Subscription {
    self.subscribe_observer(Observer::on_next(on_next))
  }

  /// Subscribe with the full callback triple.
  pub fn subscribe_all(
    &self,
    on_next: impl Fn(T) + Send + Sync + 'static,
    on_err: impl Fn(Error) + Send + Sync + 'static,
    on_done: impl Fn() + Send + Sync + 'static,
  ) -> Subscription {
    self.subscribe_observer(
      Observer::on_next(on_next).with_error(on_err).with_done(on_done),
    )
  }

  pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
    (self.subscribe_fn)(observer)
  }

  /// Method form of the `|` pipe.
  pub fn pipe<Op>(self, op: Op) -> Observable<Op::Out>
  where
    Op: crate::ops::Operator<T>,
  {
    op.apply(self)
  }
}

/// A single value, then completion.
pub fn of<T: Clone + Send + Sync + 'static>(value: T) -> Observable<T> {
  Observable::create(move |observer| {
    observer.next(value.clone());
    observer.complete();
    Subscription::empty()
  })
}

/// Every item of a clonable iterable, then completion.
pub fn from_iter<I>(iter: I) -> Observable<I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: Send + 'static,
{
  Observable::create(move |observer| {
    for item in iter.clone() {
      observer.next(item);
    }
    observer.complete();
    Subscription::empty()
  })
}

/// Completes immediately without emitting.
pub fn empty<T: Send + 'static>() -> Observable<T> {
  Observable::create(|observer| {
    observer.complete();
    Subscription::empty()
  })
}

/// Errors immediately with `err`.
pub fn throw<T: Send + 'static>(err: Error) -> Observable<T> {
  Observable::create(move |observer| {
    observer.error(err.clone());
    Subscription::empty()
  })
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use super::*;

  #[test]
  fn create_runs_factory_per_subscriber() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = runs.clone();
    let source = Observable::create(move |observer: Observer<i32>| {
      r.fetch_add(1, Ordering::SeqCst);
      observer.next(1);
      observer.complete();
      Subscription::empty()
    });

    let sum1 = Arc::new(AtomicUsize::new(0));
    let sum2 = Arc::new(AtomicUsize::new(0));
    let (s1, s2) = (sum1.clone(), sum2.clone());
    source.subscribe(move |v| {
      s1.fetch_add(v as usize, Ordering::SeqCst);
    });
    source.subscribe(move |v| {
      s2.fetch_add(v as usize, Ordering::SeqCst);
    });

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(sum1.load(Ordering::SeqCst), 1);
    assert_eq!(sum2.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn of_emits_once_then_completes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    of(42).subscribe_all(
      move |v| l1.lock().unwrap().push(format!("next {v}")),
      |_| {},
      move || l2.lock().unwrap().push("done".into()),
    );
    assert_eq!(*log.lock().unwrap(), vec!["next 42", "done"]);
  }

  #[test]
  fn from_iter_replays_for_each_subscriber() {
    let source = from_iter(1..=3);
    let a = Arc::new(Mutex::new(Vec::new()));
    let b = Arc::new(Mutex::new(Vec::new()));
    let (ac, bc) = (a.clone(), b.clone());
    source.subscribe(move |v| ac.lock().unwrap().push(v));
    source.subscribe(move |v| bc.lock().unwrap().push(v));
    assert_eq!(*a.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(*b.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn empty_and_throw_terminate_immediately() {
    let done = Arc::new(AtomicUsize::new(0));
    let d = done.clone();
    empty::<i32>().subscribe_all(|_| {}, |_| {}, move || {
      d.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(done.load(Ordering::SeqCst), 1);

    let errs = Arc::new(Mutex::new(Vec::new()));
    let e = errs.clone();
    throw::<i32>(Error::msg("bang")).subscribe_all(
      |_| {},
      move |err| e.lock().unwrap().push(err.to_string()),
      || {},
    );
    assert_eq!(*errs.lock().unwrap(), vec!["bang"]);
  }
}
