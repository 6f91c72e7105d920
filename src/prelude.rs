//! Glob-import surface: `use ripple::prelude::*;`.

pub use crate::backpressure::Backpressure;
pub use crate::error::{CoreError, Error};
pub use crate::observable::{
  self, interval, interval_at, publish, ref_count, ref_count_with_grace, share,
  share_with_grace, timer, Connectable, Observable,
};
pub use crate::observer::Observer;
pub use crate::ops::{
  buffer, combine_latest, concat_map, debounce, distinct_until_changed, filter, map, merge,
  merge_all, observe_on, retry, start_with, subscribe_on, switch_map, take, throttle,
  throttle_latest, timeout, window, zip, Operator,
};
pub use crate::scheduler::{Executor, Immediate, Strand, Task, ThreadPool};
pub use crate::subject::Subject;
pub use crate::subscription::{CompositeSubscription, Subscription};
pub use crate::topic::{Priority, Topic};
