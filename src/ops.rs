//! The operator algebra.
//!
//! Every pipeable operator is a small struct implementing [`Operator`]; its
//! `apply` wraps an upstream [`Observable`] in a new one. Composition reads
//! left to right through the `|` pipe:
//!
//! ```
//! use ripple::prelude::*;
//!
//! let doubled_evens = observable::from_iter(1..=5) | map(|v: i32| v * 2) | filter(|v: &i32| v % 4 == 0);
//! ```
//!
//! Multi-source combinators (`merge`, `combine_latest`, `zip`) and the hot
//! sharing operators (`publish`, `share`, `ref_count`) are free functions, as
//! they do not transform a single upstream.

use std::ops::BitOr;

use crate::observable::Observable;

mod buffer;
mod combine_latest;
mod concat_map;
mod debounce;
mod distinct_until_changed;
mod filter;
mod map;
mod merge;
mod observe_on;
mod retry;
mod start_with;
mod subscribe_on;
mod switch_map;
mod take;
mod throttle;
mod throttle_latest;
mod timeout;
mod window;
mod zip;

pub use buffer::{buffer, BufferOp};
pub use combine_latest::combine_latest;
pub use concat_map::{concat_map, ConcatMapOp};
pub use debounce::{debounce, DebounceOp};
pub use distinct_until_changed::{distinct_until_changed, DistinctUntilChangedOp};
pub use filter::{filter, FilterOp};
pub use map::{map, MapOp};
pub use merge::{merge, merge_all};
pub use observe_on::{observe_on, ObserveOnOp};
pub use retry::{retry, RetryOp};
pub use start_with::{start_with, StartWithOp};
pub use subscribe_on::{subscribe_on, SubscribeOnOp};
pub use switch_map::{switch_map, SwitchMapOp};
pub use take::{take, TakeOp};
pub use throttle::{throttle, ThrottleOp};
pub use throttle_latest::{throttle_latest, ThrottleLatestOp};
pub use timeout::{timeout, TimeoutOp};
pub use window::{window, WindowOp};
pub use zip::zip;

/// A transformation from `Observable<In>` to `Observable<Out>`.
pub trait Operator<In> {
  type Out;

  fn apply(self, source: Observable<In>) -> Observable<Self::Out>;
}

impl<T, Op> BitOr<Op> for Observable<T>
where
  Op: Operator<T>,
{
  type Output = Observable<Op::Out>;

  fn bitor(self, op: Op) -> Self::Output { op.apply(self) }
}
