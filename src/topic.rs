//! The multicast bus.
//!
//! A [`Topic`] is an ordered list of subscriber nodes. Each node carries its
//! own executor, an integer [`Priority`], and a [`Backpressure`] policy;
//! every `publish` walks the list in `(priority DESC, insertion order ASC)`
//! order and routes the value through each node's policy.
//!
//! Topics are endless: there is no completion or error on the bus itself.
//! [`Topic::as_observable`] adapts a topic to the observable protocol for
//! composition with operators.
//!
//! Concurrent `publish` calls are not serialized by the topic; callers that
//! publish from several threads serialize externally. The node list itself is
//! lock-guarded, so misuse cannot corrupt it; the interleaving is merely
//! unspecified. Per-subscriber delivery order matches publish order for
//! accept-class policies.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::backpressure::{Backpressure, Invoke, PolicyState};
use crate::observable::Observable;
use crate::scheduler::Executor;
use crate::subscription::Subscription;

/// Subscriber ordering weight; higher values are dispatched earlier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub i32);

/// A multicast bus with per-subscriber executor, priority and backpressure.
///
/// `Topic` is a cheap-clone handle; clones publish into and subscribe to the
/// same bus.
pub struct Topic<T> {
  inner: Arc<TopicInner<T>>,
}

impl<T> Clone for Topic<T> {
  fn clone(&self) -> Self { Topic { inner: self.inner.clone() } }
}

impl<T> Default for Topic<T> {
  fn default() -> Self {
    Topic {
      inner: Arc::new(TopicInner {
        nodes: Mutex::new(Vec::new()),
        next_id: AtomicU64::new(1),
        order_counter: AtomicU64::new(1),
      }),
    }
  }
}

struct TopicInner<T> {
  nodes: Mutex<Vec<Node<T>>>,
  next_id: AtomicU64,
  order_counter: AtomicU64,
}

struct Node<T> {
  id: u64,
  order: u64,
  priority: i32,
  exec: Arc<dyn Executor>,
  handler: Invoke<T>,
  policy: Arc<PolicyState<T>>,
  enabled: Arc<AtomicBool>,
}

impl<T: Clone + Send + 'static> Topic<T> {
  pub fn new() -> Self { Self::default() }

  /// Insert a subscriber node at the position its `(priority, order)` pair
  /// dictates. The returned handle flips the node off; the node itself is
  /// collected lazily on the next publish.
  pub fn subscribe(
    &self,
    exec: Arc<dyn Executor>,
    priority: Priority,
    policy: Backpressure,
    handler: impl Fn(T) + Send + Sync + 'static,
  ) -> Subscription {
    let node = Node {
      id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
      order: self.inner.order_counter.fetch_add(1, Ordering::Relaxed),
      priority: priority.0,
      exec,
      handler: Arc::new(handler),
      policy: Arc::new(PolicyState::from_config(policy)),
      enabled: Arc::new(AtomicBool::new(true)),
    };
    let enabled = node.enabled.clone();
    let id = node.id;

    let mut nodes = self.inner.nodes.lock();
    let at = nodes
      .iter()
      .position(|n| {
        node.priority > n.priority || (node.priority == n.priority && node.order < n.order)
      })
      .unwrap_or(nodes.len());
    nodes.insert(at, node);
    drop(nodes);
    tracing::trace!(id, priority = priority.0, "topic subscriber added");

    Subscription::new(move || {
      enabled.store(false, Ordering::Release);
      tracing::trace!(id, "topic subscriber disabled");
    })
  }

  /// Dispatch `value` to every enabled subscriber, then collect the nodes
  /// disabled since the last publish.
  ///
  /// Dispatch runs on a snapshot taken under the lock, so a handler running
  /// on an immediate executor may subscribe or unsubscribe without
  /// deadlocking the bus.
  pub fn publish(&self, value: &T) {
    let snapshot: SmallVec<[DispatchEntry<T>; 8]> = {
      let nodes = self.inner.nodes.lock();
      nodes
        .iter()
        .filter(|n| n.enabled.load(Ordering::Acquire))
        .map(|n| DispatchEntry {
          exec: n.exec.clone(),
          handler: n.handler.clone(),
          policy: n.policy.clone(),
          enabled: n.enabled.clone(),
        })
        .collect()
    };

    for entry in &snapshot {
      // The handle may have been reset between snapshot and dispatch.
      if !entry.enabled.load(Ordering::Acquire) {
        continue;
      }
      entry.policy.dispatch(value, &entry.exec, &entry.handler);
    }

    let mut nodes = self.inner.nodes.lock();
    nodes.retain(|n| n.enabled.load(Ordering::Acquire));
  }

  /// Number of currently enabled subscribers.
  pub fn subscriber_count(&self) -> usize {
    let nodes = self.inner.nodes.lock();
    nodes.iter().filter(|n| n.enabled.load(Ordering::Acquire)).count()
  }

  /// Expose the bus as an endless observable.
  ///
  /// Each subscription installs a priority-0, no-backpressure subscriber on
  /// `exec` that forwards values to `on_next`; unsubscribing removes it.
  /// Topics never terminate, so `on_err`/`on_done` are never delivered.
  pub fn as_observable(&self, exec: Arc<dyn Executor>) -> Observable<T> {
    let topic = self.clone();
    Observable::create(move |observer| {
      topic.subscribe(exec.clone(), Priority(0), Backpressure::None, move |v| {
        observer.next(v);
      })
    })
  }
}

struct DispatchEntry<T> {
  exec: Arc<dyn Executor>,
  handler: Invoke<T>,
  policy: Arc<PolicyState<T>>,
  enabled: Arc<AtomicBool>,
}
