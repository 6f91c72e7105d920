//! Pooled task execution.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use super::{Executor, Task};

/// A fixed set of worker threads on a shared FIFO.
///
/// Ordering between tasks is unspecified beyond each task running to
/// completion on one worker. Dropping the pool signals stop, wakes every
/// worker, lets the queue drain to completion, and joins the workers.
pub struct ThreadPool {
  shared: Arc<PoolShared>,
  workers: Vec<JoinHandle<()>>,
}

struct PoolShared {
  state: Mutex<PoolState>,
  available: Condvar,
}

struct PoolState {
  queue: VecDeque<Task>,
  stop: bool,
}

impl ThreadPool {
  /// Spawn a pool with `threads` workers. Zero is promoted to one.
  pub fn new(threads: usize) -> Self {
    let threads = threads.max(1);
    let shared = Arc::new(PoolShared {
      state: Mutex::new(PoolState { queue: VecDeque::new(), stop: false }),
      available: Condvar::new(),
    });
    let workers = (0..threads)
      .map(|i| {
        let shared = shared.clone();
        std::thread::Builder::new()
          .name(format!("ripple-pool-{i}"))
          .spawn(move || worker_loop(&shared))
          .expect("failed to spawn pool worker")
      })
      .collect();
    tracing::debug!(threads, "thread pool started");
    ThreadPool { shared, workers }
  }
}

impl Default for ThreadPool {
  /// A pool sized to the machine's available parallelism.
  fn default() -> Self {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    ThreadPool::new(threads)
  }
}

fn worker_loop(shared: &PoolShared) {
  loop {
    let task = {
      let mut state = shared.state.lock();
      loop {
        if let Some(task) = state.queue.pop_front() {
          break task;
        }
        if state.stop {
          return;
        }
        shared.available.wait(&mut state);
      }
    };
    task();
  }
}

impl Executor for ThreadPool {
  fn post(&self, task: Task) {
    self.shared.state.lock().queue.push_back(task);
    self.shared.available.notify_one();
  }
}

impl Drop for ThreadPool {
  fn drop(&mut self) {
    self.shared.state.lock().stop = true;
    self.shared.available.notify_all();
    for worker in self.workers.drain(..) {
      let _ = worker.join();
    }
    tracing::debug!("thread pool stopped");
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use super::*;

  #[test]
  fn runs_posted_tasks() {
    let pool = ThreadPool::new(2);
    let hit = Arc::new(AtomicUsize::new(0));
    for _ in 0..16 {
      let h = hit.clone();
      pool.post(Box::new(move || {
        h.fetch_add(1, Ordering::SeqCst);
      }));
    }
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(hit.load(Ordering::SeqCst), 16);
  }

  #[test]
  fn zero_threads_becomes_one() {
    let pool = ThreadPool::new(0);
    let hit = Arc::new(AtomicUsize::new(0));
    let h = hit.clone();
    pool.post(Box::new(move || {
      h.fetch_add(1, Ordering::SeqCst);
    }));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(hit.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn drop_drains_queue_before_joining() {
    let hit = Arc::new(AtomicUsize::new(0));
    {
      let pool = ThreadPool::new(1);
      for _ in 0..8 {
        let h = hit.clone();
        pool.post(Box::new(move || {
          std::thread::sleep(Duration::from_millis(2));
          h.fetch_add(1, Ordering::SeqCst);
        }));
      }
      // Drop fires here; all eight tasks must still run.
    }
    assert_eq!(hit.load(Ordering::SeqCst), 8);
  }

  #[test]
  fn single_worker_preserves_fifo() {
    let pool = ThreadPool::new(1);
    let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for i in 0..8 {
      let l = log.clone();
      pool.post(Box::new(move || l.lock().push(i)));
    }
    drop(pool);
    assert_eq!(*log.lock(), (0..8).collect::<Vec<_>>());
  }
}
