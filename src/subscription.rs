//! Move-only cancellation handles.
//!
//! A [`Subscription`] owns the action that tears an observation down. The
//! action runs at most once across `reset`, move, and drop; dropping the
//! handle cancels unless the action was [`released`](Subscription::release)
//! first. Panics from user cancel actions are swallowed so terminal cleanup
//! never unwinds into the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};

mod composite;
pub use composite::CompositeSubscription;

type CancelFn = Box<dyn FnOnce() + Send>;

/// One-shot owner of a cancel action.
///
/// Move semantics come for free: `Subscription` is not `Clone`, and moving it
/// transfers the action, leaving nothing behind in the source.
#[derive(Default)]
pub struct Subscription {
  cancel: Option<CancelFn>,
}

impl Subscription {
  /// A subscription with nothing to cancel.
  pub fn empty() -> Self { Subscription { cancel: None } }

  pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
    Subscription { cancel: Some(Box::new(cancel)) }
  }

  /// Run the cancel action if it has not run yet. Idempotent.
  pub fn reset(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      if catch_unwind(AssertUnwindSafe(cancel)).is_err() {
        tracing::warn!("subscription cancel action panicked; ignored");
      }
    }
  }

  /// Discard the cancel action without running it.
  pub fn release(&mut self) { self.cancel = None; }

  /// Whether a cancel action is still pending.
  pub fn is_active(&self) -> bool { self.cancel.is_some() }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.reset(); }
}
