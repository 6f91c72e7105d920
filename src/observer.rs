//! The observer callback triple.
//!
//! An observer is the receiving end of a subscription: `(next, error,
//! complete)`. Any of the three may be absent, in which case the signal is
//! dropped on the floor. Operators wrap upstream observers by cloning the
//! pieces they forward unchanged and replacing the ones they transform.

use std::sync::Arc;

use crate::error::Error;

pub type NextFn<T> = Arc<dyn Fn(T) + Send + Sync>;
pub type ErrFn = Arc<dyn Fn(Error) + Send + Sync>;
pub type DoneFn = Arc<dyn Fn() + Send + Sync>;

/// The `(on_next, on_err, on_done)` triple delivered to by a stream.
///
/// Cloning an observer clones the shared callbacks, not their state; an
/// operator that needs to forward `error`/`complete` untouched clones those
/// two fields into its own wrapper.
pub struct Observer<T> {
  pub(crate) next: Option<NextFn<T>>,
  pub(crate) error: Option<ErrFn>,
  pub(crate) done: Option<DoneFn>,
}

impl<T> Clone for Observer<T> {
  fn clone(&self) -> Self {
    Observer {
      next: self.next.clone(),
      error: self.error.clone(),
      done: self.done.clone(),
    }
  }
}

impl<T> Default for Observer<T> {
  fn default() -> Self { Observer { next: None, error: None, done: None } }
}

impl<T> Observer<T> {
  /// An observer that reacts to values only.
  pub fn on_next(f: impl Fn(T) + Send + Sync + 'static) -> Self {
    Observer { next: Some(Arc::new(f)), error: None, done: None }
  }

  /// Builder: attach an error callback.
  pub fn with_error(mut self, f: impl Fn(Error) + Send + Sync + 'static) -> Self {
    self.error = Some(Arc::new(f));
    self
  }

  /// Builder: attach a completion callback.
  pub fn with_done(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.done = Some(Arc::new(f));
    self
  }

  pub(crate) fn from_parts(
    next: Option<NextFn<T>>,
    error: Option<ErrFn>,
    done: Option<DoneFn>,
  ) -> Self {
    Observer { next, error, done }
  }

  pub fn next(&self, value: T) {
    if let Some(f) = &self.next {
      f(value);
    }
  }

  pub fn error(&self, err: Error) {
    if let Some(f) = &self.error {
      f(err);
    }
  }

  pub fn complete(&self) {
    if let Some(f) = &self.done {
      f();
    }
  }
}
