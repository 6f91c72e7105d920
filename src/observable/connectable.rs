//! Hot multicast from a cold source.
//!
//! [`publish`] wraps an observable in a [`Connectable`]: a shared hub that
//! fans upstream events out to a dynamic set of downstream observers, with
//! upstream activation gated behind [`connect`](Connectable::connect).
//! [`ref_count`] automates the gating by subscriber count, and [`share`]
//! composes the two. The grace-period variants defer teardown so a quick
//! resubscribe reuses the running upstream.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::{CoreError, Error};
use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::Subscription;

/// An observable bound to a shared hub, with explicit `connect` gating.
pub struct Connectable<T> {
  source: Observable<T>,
  hub: Arc<Hub<T>>,
}

impl<T> Clone for Connectable<T> {
  fn clone(&self) -> Self {
    Connectable { source: self.source.clone(), hub: self.hub.clone() }
  }
}

struct Hub<T> {
  state: Mutex<HubState<T>>,
}

struct HubState<T> {
  slots: Vec<Slot<T>>,
  next_id: u64,
  upstream: Subscription,
  started: bool,
  completed: bool,
  error: Option<Error>,
}

struct Slot<T> {
  id: u64,
  observer: Observer<T>,
}

impl<T> Default for Hub<T> {
  fn default() -> Self {
    Hub {
      state: Mutex::new(HubState {
        slots: Vec::new(),
        next_id: 0,
        upstream: Subscription::empty(),
        started: false,
        completed: false,
        error: None,
      }),
    }
  }
}

impl<T: Clone + Send + 'static> Hub<T> {
  /// Register a downstream observer, or replay the latched terminal if the
  /// hub already finished.
  fn attach(self: &Arc<Self>, observer: Observer<T>) -> Subscription {
    let id = {
      let mut state = self.state.lock();
      if state.completed {
        drop(state);
        observer.complete();
        return Subscription::empty();
      }
      if let Some(err) = state.error.clone() {
        drop(state);
        observer.error(CoreError::SharedAlreadyErrored(err).into());
        return Subscription::empty();
      }
      let id = state.next_id;
      state.next_id += 1;
      state.slots.push(Slot { id, observer });
      id
    };

    let hub = self.clone();
    Subscription::new(move || {
      let mut state = hub.state.lock();
      if let Some(at) = state.slots.iter().position(|s| s.id == id) {
        state.slots.remove(at);
      }
    })
  }

  fn snapshot(&self) -> SmallVec<[Observer<T>; 4]> {
    let state = self.state.lock();
    state.slots.iter().map(|s| s.observer.clone()).collect()
  }

  fn fan_next(&self, value: T) {
    let snapshot = self.snapshot();
    for observer in &snapshot {
      observer.next(value.clone());
    }
  }

  fn fan_error(&self, err: Error) {
    let snapshot: SmallVec<[Observer<T>; 4]> = {
      let mut state = self.state.lock();
      state.error = Some(err.clone());
      state.slots.drain(..).map(|s| s.observer).collect()
    };
    for observer in &snapshot {
      observer.error(err.clone());
    }
  }

  fn fan_done(&self) {
    let snapshot: SmallVec<[Observer<T>; 4]> = {
      let mut state = self.state.lock();
      state.completed = true;
      state.slots.drain(..).map(|s| s.observer).collect()
    };
    for observer in &snapshot {
      observer.complete();
    }
  }
}

impl<T: Clone + Send + 'static> Connectable<T> {
  /// A view that registers downstream observers against the hub.
  ///
  /// Values flow only while the hub is connected. A subscriber joining after
  /// the upstream terminated is notified immediately: `on_done` after
  /// completion, [`CoreError::SharedAlreadyErrored`] carrying the latched
  /// error after a failure.
  pub fn as_observable(&self) -> Observable<T> {
    let hub = self.hub.clone();
    Observable::create(move |observer| hub.attach(observer))
  }

  /// Subscribe the hub to the upstream source.
  ///
  /// Idempotent: while already started, returns an empty handle. The
  /// returned subscription tears the upstream down and flips the hub back to
  /// not-started.
  pub fn connect(&self) -> Subscription {
    {
      let mut state = self.hub.state.lock();
      if state.started {
        return Subscription::empty();
      }
      state.started = true;
      state.completed = false;
      state.error = None;
    }
    tracing::debug!("connectable hub starting upstream");

    let (next_hub, err_hub, done_hub) = (self.hub.clone(), self.hub.clone(), self.hub.clone());
    let upstream = self.source.subscribe_observer(Observer::from_parts(
      Some(Arc::new(move |v| next_hub.fan_next(v))),
      Some(Arc::new(move |e| err_hub.fan_error(e))),
      Some(Arc::new(move || done_hub.fan_done())),
    ));
    self.hub.state.lock().upstream = upstream;

    let hub = self.hub.clone();
    Subscription::new(move || {
      let mut state = hub.state.lock();
      state.upstream.reset();
      state.started = false;
      tracing::debug!("connectable hub upstream torn down");
    })
  }

  fn hub_terminated(&self) -> bool {
    let state = self.hub.state.lock();
    state.completed || state.error.is_some()
  }

  /// Force-reset the hub: tear down the upstream and clear the latched
  /// terminal state so a later `connect` starts fresh.
  pub fn disconnect(&self) {
    let mut state = self.hub.state.lock();
    state.upstream.reset();
    state.started = false;
    state.completed = false;
    state.error = None;
  }
}

/// Bind a cold source to a hub, producing a [`Connectable`].
pub fn publish<T: Clone + Send + 'static>(source: Observable<T>) -> Connectable<T> {
  Connectable { source, hub: Arc::new(Hub::default()) }
}

struct RefCountState {
  refs: usize,
  connection: Subscription,
  generation: u64,
}

/// Auto-connect by subscriber count: upstream starts on 0→1 and tears down
/// on 1→0.
pub fn ref_count<T: Clone + Send + 'static>(conn: Connectable<T>) -> Observable<T> {
  let state = Arc::new(Mutex::new(RefCountState {
    refs: 0,
    connection: Subscription::empty(),
    generation: 0,
  }));
  let hot = conn.as_observable();

  Observable::create(move |observer| {
    // A terminated hub replays its terminal on attach; the refcount and the
    // upstream stay untouched.
    if conn.hub_terminated() {
      return hot.subscribe_observer(observer);
    }

    let mut down = hot.subscribe_observer(observer);
    let need_connect = {
      let mut st = state.lock();
      st.refs += 1;
      st.refs == 1
    };
    if need_connect {
      // Connect outside the lock: the source may emit synchronously.
      let connection = conn.connect();
      state.lock().connection = connection;
    }

    let state = state.clone();
    Subscription::new(move || {
      down.reset();
      let mut st = state.lock();
      st.refs = st.refs.saturating_sub(1);
      if st.refs == 0 {
        st.connection.reset();
      }
    })
  })
}

/// [`ref_count`] with teardown deferred by `grace` after the last
/// unsubscribe.
///
/// A subscriber arriving within the grace window adopts the running
/// upstream. Each refcount transition bumps a generation counter; the
/// deferred teardown captures the counter at schedule time and acts only if
/// it still matches, so it can never tear down an upstream a newer
/// subscriber adopted.
pub fn ref_count_with_grace<T: Clone + Send + 'static>(
  conn: Connectable<T>,
  grace: Duration,
) -> Observable<T> {
  let state = Arc::new(Mutex::new(RefCountState {
    refs: 0,
    connection: Subscription::empty(),
    generation: 0,
  }));
  let hot = conn.as_observable();

  Observable::create(move |observer| {
    if conn.hub_terminated() {
      return hot.subscribe_observer(observer);
    }

    let mut down = hot.subscribe_observer(observer);
    let need_connect = {
      let mut st = state.lock();
      st.generation += 1;
      st.refs += 1;
      st.refs == 1 && !st.connection.is_active()
    };
    if need_connect {
      let connection = conn.connect();
      state.lock().connection = connection;
    }

    let state = state.clone();
    Subscription::new(move || {
      down.reset();
      let scheduled_generation = {
        let mut st = state.lock();
        st.refs = st.refs.saturating_sub(1);
        if st.refs == 0 {
          st.generation += 1;
          Some(st.generation)
        } else {
          None
        }
      };

      if let Some(my_generation) = scheduled_generation {
        let state = state.clone();
        std::thread::spawn(move || {
          std::thread::sleep(grace);
          let mut st = state.lock();
          if st.refs == 0 && st.generation == my_generation {
            tracing::trace!("grace elapsed; tearing down shared upstream");
            st.connection.reset();
          } else {
            tracing::trace!("grace teardown stale; upstream adopted by a newer subscriber");
          }
        });
      }
    })
  })
}

/// Hot-share a source: one hub, upstream started by the first subscriber and
/// torn down by the last.
pub fn share<T: Clone + Send + 'static>(source: Observable<T>) -> Observable<T> {
  ref_count(publish(source))
}

/// [`share`] with a grace period before upstream teardown.
pub fn share_with_grace<T: Clone + Send + 'static>(
  source: Observable<T>,
  grace: Duration,
) -> Observable<T> {
  ref_count_with_grace(publish(source), grace)
}
