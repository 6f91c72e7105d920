//! Push-based reactive streams.
//!
//! `ripple` is a small reactive dataflow library: producers push values into
//! [`Observable`](observable::Observable) streams, consumers observe them
//! through pipelines of operators, and delivery is mediated by pluggable
//! [executors](scheduler) and per-subscriber [backpressure] policies on the
//! multicast [`Topic`](topic::Topic) bus.
//!
//! ```
//! use std::sync::Arc;
//! use ripple::prelude::*;
//!
//! let bus: Topic<i32> = Topic::new();
//! let ui = Arc::new(Immediate);
//!
//! let stream = bus.as_observable(ui) | map(|v| v * 2) | filter(|v: &i32| v % 4 == 0);
//! let _sub = stream.subscribe(|v| println!("{v}"));
//!
//! bus.publish(&1);
//! bus.publish(&2); // prints 4
//! ```
//!
//! The contract every operator upholds:
//!
//! 1. at most one terminal (`on_err` or `on_done`) per observer, and no
//!    `on_next` after it;
//! 2. callbacks for one observer never run concurrently;
//! 3. after cancellation, no further callbacks;
//! 4. upstream subscriptions are released once a terminal is delivered.

pub mod backpressure;
pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub mod subject;
pub mod subscription;
pub mod topic;
