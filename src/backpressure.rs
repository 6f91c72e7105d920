//! Per-subscriber flow shaping.
//!
//! A backpressure policy sits between `Topic::publish` and one subscriber's
//! handler, deciding which values reach the handler and when. Policies come
//! in two classes:
//!
//! - **accept-class** (`None`, `Drop`): a synchronous gate; accepted values
//!   are posted to the subscriber's executor one by one, in publish order.
//! - **flow-owning** (`Latest`, `Buffer`, `Batch`, `BatchOrTimeout`): the
//!   policy buffers values itself and schedules its own drain on the
//!   subscriber's executor.
//!
//! Within one policy instance, handler invocations are serialized: at most
//! one drain task is scheduled at any time, guarded by a `scheduled` flag
//! kept under the instance lock (or an atomic CAS for `Latest`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::scheduler::Executor;

/// Policy configuration, selected per subscriber at `Topic::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
  /// Always accept.
  None,
  /// Accept the first `n` values, then reject everything.
  Drop(usize),
  /// Coalesce bursts: a pending slot holds the newest value; one drain task
  /// delivers whatever is current when it runs.
  Latest,
  /// Bounded FIFO of the given capacity; the newest value is dropped when
  /// full. A capacity of zero is promoted to one.
  Buffer(usize),
  /// Deliver in groups of exactly `n`; a tail below `n` is held back.
  Batch(usize),
  /// Deliver in groups of `count`, or flush whatever is present once
  /// `timeout` elapses after the timer was armed. The timer re-arms when new
  /// values arrive after its window ended.
  BatchOrTimeout { count: usize, timeout: Duration },
}

pub(crate) type Invoke<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Instantiated per topic node from a [`Backpressure`] config.
pub(crate) enum PolicyState<T> {
  None,
  Drop(AtomicUsize),
  Latest(Arc<LatestSlot<T>>),
  Buffer(Arc<BoundedQueue<T>>),
  Batch(Arc<BatchQueue<T>>),
  BatchOrTimeout(Arc<TimedBatch<T>>),
}

impl<T: Clone + Send + 'static> PolicyState<T> {
  pub(crate) fn from_config(config: Backpressure) -> Self {
    match config {
      Backpressure::None => PolicyState::None,
      Backpressure::Drop(n) => PolicyState::Drop(AtomicUsize::new(n)),
      Backpressure::Latest => PolicyState::Latest(Arc::new(LatestSlot::new())),
      Backpressure::Buffer(cap) => {
        PolicyState::Buffer(Arc::new(BoundedQueue::new(cap.max(1))))
      }
      Backpressure::Batch(n) => {
        assert!(n > 0, "Backpressure::Batch: group size must be > 0");
        PolicyState::Batch(Arc::new(BatchQueue::new(n)))
      }
      Backpressure::BatchOrTimeout { count, timeout } => {
        assert!(count > 0, "Backpressure::BatchOrTimeout: group size must be > 0");
        PolicyState::BatchOrTimeout(Arc::new(TimedBatch::new(count, timeout)))
      }
    }
  }

  /// Route one published value through this policy.
  pub(crate) fn dispatch(&self, value: &T, exec: &Arc<dyn Executor>, invoke: &Invoke<T>) {
    match self {
      PolicyState::None => {
        let (invoke, value) = (invoke.clone(), value.clone());
        exec.post(Box::new(move || invoke(value)));
      }
      PolicyState::Drop(remaining) => {
        let accepted = remaining
          .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
          .is_ok();
        if accepted {
          let (invoke, value) = (invoke.clone(), value.clone());
          exec.post(Box::new(move || invoke(value)));
        } else {
          tracing::trace!("drop policy exhausted; value rejected");
        }
      }
      PolicyState::Latest(slot) => slot.publish(value.clone(), exec, invoke),
      PolicyState::Buffer(queue) => queue.publish(value.clone(), exec, invoke),
      PolicyState::Batch(queue) => queue.publish(value.clone(), exec, invoke),
      PolicyState::BatchOrTimeout(batch) => batch.publish(value.clone(), exec, invoke),
    }
  }
}

/// Single-slot coalescing state for [`Backpressure::Latest`].
pub(crate) struct LatestSlot<T> {
  slot: Mutex<Option<T>>,
  scheduled: AtomicBool,
}

impl<T: Send + 'static> LatestSlot<T> {
  fn new() -> Self { LatestSlot { slot: Mutex::new(None), scheduled: AtomicBool::new(false) } }

  fn publish(self: &Arc<Self>, value: T, exec: &Arc<dyn Executor>, invoke: &Invoke<T>) {
    *self.slot.lock() = Some(value);
    if self
      .scheduled
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      let state = self.clone();
      let invoke = invoke.clone();
      exec.post(Box::new(move || {
        // Consume the current slot until it stays empty; values published
        // while we run are picked up by this same drain.
        while let Some(current) = state.slot.lock().take() {
          invoke(current);
        }
        state.scheduled.store(false, Ordering::Release);
      }));
    }
  }
}

/// Bounded FIFO state for [`Backpressure::Buffer`].
pub(crate) struct BoundedQueue<T> {
  inner: Mutex<QueueInner<T>>,
  capacity: usize,
}

struct QueueInner<T> {
  queue: VecDeque<T>,
  scheduled: bool,
}

impl<T: Send + 'static> BoundedQueue<T> {
  fn new(capacity: usize) -> Self {
    BoundedQueue {
      inner: Mutex::new(QueueInner { queue: VecDeque::new(), scheduled: false }),
      capacity,
    }
  }

  fn publish(self: &Arc<Self>, value: T, exec: &Arc<dyn Executor>, invoke: &Invoke<T>) {
    let should_schedule = {
      let mut inner = self.inner.lock();
      if inner.queue.len() >= self.capacity {
        tracing::trace!(capacity = self.capacity, "bounded buffer full; value dropped");
        return;
      }
      inner.queue.push_back(value);
      if inner.scheduled {
        false
      } else {
        inner.scheduled = true;
        true
      }
    };

    if should_schedule {
      let state = self.clone();
      let invoke = invoke.clone();
      exec.post(Box::new(move || loop {
        let item = {
          let mut inner = state.inner.lock();
          match inner.queue.pop_front() {
            Some(item) => item,
            None => {
              inner.scheduled = false;
              break;
            }
          }
        };
        invoke(item);
      }));
    }
  }
}

/// Fixed-size grouping state for [`Backpressure::Batch`].
pub(crate) struct BatchQueue<T> {
  inner: Mutex<QueueInner<T>>,
  size: usize,
}

impl<T: Send + 'static> BatchQueue<T> {
  fn new(size: usize) -> Self {
    BatchQueue {
      inner: Mutex::new(QueueInner { queue: VecDeque::new(), scheduled: false }),
      size,
    }
  }

  fn publish(self: &Arc<Self>, value: T, exec: &Arc<dyn Executor>, invoke: &Invoke<T>) {
    let should_flush = {
      let mut inner = self.inner.lock();
      inner.queue.push_back(value);
      if inner.queue.len() >= self.size && !inner.scheduled {
        inner.scheduled = true;
        true
      } else {
        false
      }
    };

    if should_flush {
      let state = self.clone();
      let invoke = invoke.clone();
      exec.post(Box::new(move || loop {
        let group: Vec<T> = {
          let mut inner = state.inner.lock();
          if inner.queue.len() < state.size {
            inner.scheduled = false;
            break;
          }
          inner.queue.drain(..state.size).collect()
        };
        for item in group {
          invoke(item);
        }
      }));
    }
  }
}

/// Count-or-deadline grouping state for [`Backpressure::BatchOrTimeout`].
pub(crate) struct TimedBatch<T> {
  inner: Mutex<TimedBatchInner<T>>,
  size: usize,
  timeout: Duration,
}

struct TimedBatchInner<T> {
  queue: VecDeque<T>,
  scheduled: bool,
  timer_armed: bool,
}

impl<T: Send + 'static> TimedBatch<T> {
  fn new(size: usize, timeout: Duration) -> Self {
    TimedBatch {
      inner: Mutex::new(TimedBatchInner {
        queue: VecDeque::new(),
        scheduled: false,
        timer_armed: false,
      }),
      size,
      timeout,
    }
  }

  fn publish(self: &Arc<Self>, value: T, exec: &Arc<dyn Executor>, invoke: &Invoke<T>) {
    let (should_flush, should_arm) = {
      let mut inner = self.inner.lock();
      inner.queue.push_back(value);
      let flush = if inner.queue.len() >= self.size && !inner.scheduled {
        inner.scheduled = true;
        true
      } else {
        false
      };
      let arm = if inner.timer_armed {
        false
      } else {
        inner.timer_armed = true;
        true
      };
      (flush, arm)
    };

    if should_flush {
      let state = self.clone();
      let invoke = invoke.clone();
      exec.post(Box::new(move || state.flush_group(&invoke)));
    }

    if should_arm {
      let state = self.clone();
      let exec = exec.clone();
      let invoke = invoke.clone();
      std::thread::spawn(move || {
        std::thread::sleep(state.timeout);
        let need_flush = {
          let inner = state.inner.lock();
          !inner.queue.is_empty() && !inner.scheduled
        };
        if need_flush {
          let drain_state = state.clone();
          let invoke = invoke.clone();
          exec.post(Box::new(move || drain_state.flush_all(&invoke)));
        }
        // Disarm last: a value arriving after this point re-arms the timer.
        state.inner.lock().timer_armed = false;
      });
    }
  }

  fn flush_group(&self, invoke: &Invoke<T>) {
    let group: Vec<T> = {
      let mut inner = self.inner.lock();
      let take = self.size.min(inner.queue.len());
      let group = inner.queue.drain(..take).collect();
      inner.scheduled = false;
      group
    };
    for item in group {
      invoke(item);
    }
  }

  fn flush_all(&self, invoke: &Invoke<T>) {
    let drained: VecDeque<T> = {
      let mut inner = self.inner.lock();
      std::mem::take(&mut inner.queue)
    };
    for item in drained {
      invoke(item);
    }
  }
}
