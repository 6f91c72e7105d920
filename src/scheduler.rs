//! Task dispatch.
//!
//! Executors are the sole locus of task dispatch in the library: every
//! cross-thread hop an operator or policy makes goes through
//! [`Executor::post`]. Three variants cover the design space:
//!
//! - [`Immediate`] runs the task inline on the posting thread. Re-entrancy is
//!   the caller's responsibility.
//! - [`Strand`] queues tasks for an owning thread to [`drain`](Strand::drain)
//!   explicitly (a UI or game-loop thread, typically).
//! - [`ThreadPool`] runs tasks on a fixed set of workers.
//!
//! Executors are shared as `Arc<dyn Executor>` so subscriptions, policies and
//! helper threads can hold them for as long as they are needed.

use std::collections::VecDeque;

use parking_lot::Mutex;

mod thread_pool;
pub use thread_pool::ThreadPool;

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send>;

/// A dispatcher of no-arg tasks.
pub trait Executor: Send + Sync {
  fn post(&self, task: Task);
}

/// Runs each task synchronously inside `post`.
#[derive(Default)]
pub struct Immediate;

impl Executor for Immediate {
  fn post(&self, task: Task) { task() }
}

/// A FIFO queue drained explicitly by its owning thread.
///
/// `post` is safe from any thread; `drain` must be called by exactly one
/// thread at a time. Tasks posted while a drain is in flight are picked up by
/// the same drain.
#[derive(Default)]
pub struct Strand {
  queue: Mutex<VecDeque<Task>>,
}

impl Strand {
  pub fn new() -> Self { Self::default() }

  /// Run queued tasks until the queue is observed empty.
  ///
  /// The lock is released around each task, so tasks may post follow-up work
  /// without deadlocking.
  pub fn drain(&self) {
    loop {
      let task = self.queue.lock().pop_front();
      match task {
        Some(task) => task(),
        None => break,
      }
    }
  }

  pub fn is_empty(&self) -> bool { self.queue.lock().is_empty() }
}

impl Executor for Strand {
  fn post(&self, task: Task) { self.queue.lock().push_back(task) }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use super::*;

  #[test]
  fn immediate_runs_inline() {
    let hit = Arc::new(AtomicUsize::new(0));
    let h = hit.clone();
    Immediate.post(Box::new(move || {
      h.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(hit.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn strand_holds_tasks_until_drained() {
    let strand = Strand::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
      let l = log.clone();
      strand.post(Box::new(move || l.lock().unwrap().push(i)));
    }
    assert!(log.lock().unwrap().is_empty());
    strand.drain();
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    assert!(strand.is_empty());
  }

  #[test]
  fn strand_drain_picks_up_reposted_work() {
    let strand = Arc::new(Strand::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let (s, l) = (strand.clone(), log.clone());
    strand.post(Box::new(move || {
      l.lock().unwrap().push("first");
      let l2 = l.clone();
      s.post(Box::new(move || l2.lock().unwrap().push("second")));
    }));
    strand.drain();
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
  }

  #[test]
  fn strand_posts_from_other_threads() {
    let strand = Arc::new(Strand::new());
    let hit = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
      .map(|_| {
        let (s, h) = (strand.clone(), hit.clone());
        std::thread::spawn(move || {
          s.post(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
          }));
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }
    strand.drain();
    assert_eq!(hit.load(Ordering::SeqCst), 4);
  }
}
