//! Hot multicast with a sticky terminal.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::Error;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::Subscription;

/// A hot, multicast push source.
///
/// Values pushed with [`on_next`](Subject::on_next) fan out to every current
/// subscriber. The terminal state is sticky: once completed or errored, the
/// subject stays that way, pushes become no-ops, and a late subscriber is
/// notified immediately on subscribe without ever being registered.
///
/// Fan-out snapshots the slot list under the lock and invokes callbacks
/// outside it, so a handler may subscribe or unsubscribe re-entrantly.
pub struct Subject<T> {
  inner: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
  fn clone(&self) -> Self { Subject { inner: self.inner.clone() } }
}

impl<T> Default for Subject<T> {
  fn default() -> Self {
    Subject {
      inner: Arc::new(Mutex::new(SubjectState {
        slots: Vec::new(),
        next_id: 0,
        completed: false,
        error: None,
      })),
    }
  }
}

struct SubjectState<T> {
  slots: Vec<Slot<T>>,
  next_id: u64,
  completed: bool,
  error: Option<Error>,
}

struct Slot<T> {
  id: u64,
  observer: Observer<T>,
}

impl<T: Clone + Send + 'static> Subject<T> {
  pub fn new() -> Self { Self::default() }

  /// The subscribable face of the subject.
  pub fn as_observable(&self) -> Observable<T> {
    let inner = self.inner.clone();
    Observable::create(move |observer| {
      let id = {
        let mut state = inner.lock();
        if state.completed {
          drop(state);
          observer.complete();
          return Subscription::empty();
        }
        if let Some(err) = state.error.clone() {
          drop(state);
          observer.error(err);
          return Subscription::empty();
        }
        let id = state.next_id;
        state.next_id += 1;
        state.slots.push(Slot { id, observer });
        id
      };

      let inner = inner.clone();
      Subscription::new(move || {
        let mut state = inner.lock();
        if let Some(at) = state.slots.iter().position(|s| s.id == id) {
          state.slots.remove(at);
        }
      })
    })
  }

  pub fn on_next(&self, value: T) {
    let snapshot: SmallVec<[Observer<T>; 4]> = {
      let state = self.inner.lock();
      if state.completed || state.error.is_some() {
        return;
      }
      state.slots.iter().map(|s| s.observer.clone()).collect()
    };
    for observer in &snapshot {
      observer.next(value.clone());
    }
  }

  pub fn on_error(&self, err: Error) {
    let snapshot: SmallVec<[Observer<T>; 4]> = {
      let mut state = self.inner.lock();
      if state.completed || state.error.is_some() {
        return;
      }
      state.error = Some(err.clone());
      state.slots.drain(..).map(|s| s.observer).collect()
    };
    for observer in &snapshot {
      observer.error(err.clone());
    }
  }

  pub fn on_completed(&self) {
    let snapshot: SmallVec<[Observer<T>; 4]> = {
      let mut state = self.inner.lock();
      if state.completed || state.error.is_some() {
        return;
      }
      state.completed = true;
      state.slots.drain(..).map(|s| s.observer).collect()
    };
    for observer in &snapshot {
      observer.complete();
    }
  }

  /// Number of registered subscribers.
  pub fn subscriber_count(&self) -> usize { self.inner.lock().slots.len() }
}
