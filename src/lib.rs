//! # rxflow: demand-driven reactive streams
//!
//! Publishers emit values to subscribers only as fast as the subscribers ask
//! for them. Operators compose publishers into pipelines, subjects bridge
//! imperative code into a stream, and connectors share one upstream
//! subscription between many subscribers.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::{prelude::*, publisher};
//!
//! let out = Arc::new(Mutex::new(vec![]));
//! let sink = out.clone();
//! let _handle = publisher::sequence(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .sink(move |v| sink.lock().unwrap().push(v));
//! assert_eq!(*out.lock().unwrap(), vec![0, 4, 8, 12, 16]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | A source of values, subscribed any number of times |
//! | [`Subscriber`] | Consumes `on_subscribe`, `on_value` and `on_completion` |
//! | [`Subscription`] | Handle to `request` more values or `cancel` |
//! | [`Demand`] | How many more values a subscriber accepts |
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`**: a [`Scheduler`](scheduler::Scheduler) backed by
//!   the tokio runtime, for the time-based operators.
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Demand`]: demand::Demand

pub mod connectable;
pub mod demand;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod rc;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

pub use prelude::*;

#[cfg(doctest)]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
