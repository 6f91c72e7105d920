//! Aggregated cancellation.

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::Subscription;

/// A bag of child subscriptions cancelled as one.
///
/// `add` after the composite was reset cancels the child on the spot, which
/// closes the race between a subscription being produced and the aggregate
/// being torn down. `reset` moves all children out under the lock and cancels
/// them outside it, so a child's cancel action may safely touch the composite
/// again.
#[derive(Default)]
pub struct CompositeSubscription {
  inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
  cancelled: bool,
  children: SmallVec<[Subscription; 4]>,
}

impl CompositeSubscription {
  pub fn new() -> Self { Self::default() }

  pub fn add(&self, mut sub: Subscription) {
    {
      let mut inner = self.inner.lock();
      if !inner.cancelled {
        inner.children.push(sub);
        return;
      }
    }
    sub.reset();
  }

  /// Cancel every child, exactly once across all callers.
  pub fn reset(&self) {
    let mut local = {
      let mut inner = self.inner.lock();
      if inner.cancelled {
        return;
      }
      inner.cancelled = true;
      std::mem::take(&mut inner.children)
    };
    for sub in &mut local {
      sub.reset();
    }
  }

  pub fn is_cancelled(&self) -> bool { self.inner.lock().cancelled }
}

impl Drop for CompositeSubscription {
  fn drop(&mut self) { self.reset(); }
}
