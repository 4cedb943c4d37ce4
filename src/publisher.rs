//! The publisher side of the protocol and the built-in sources.
//!
//! A [`Publisher`] is subscribed with `&self`, so the same value can be
//! subscribed any number of times. Cold publishers (every source in this
//! module except [`Promise`]) replay their whole sequence for each
//! subscriber. No source delivers a value from inside its subscriber's
//! `on_subscribe`: demand requested there is recorded and served once
//! `on_subscribe` has returned.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::{prelude::*, publisher};
//!
//! let out = Arc::new(Mutex::new(vec![]));
//! let sink = out.clone();
//! let _handle = publisher::sequence(1..=3).sink(move |v| sink.lock().unwrap().push(v));
//! assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
//! ```

mod any;
mod deferred;
mod promise;
mod sequence;
mod trivial;

pub use any::{AnyPublisher, DynPublisher};
pub use deferred::{deferred, Deferred};
pub use promise::{Promise, Resolver};
pub use sequence::{just, record, sequence, Just, Record, Sequence};
pub use trivial::{empty, fail, never, Empty, Fail, Never};

use crate::subscriber::Subscriber;

/// A source of values terminated by a completion signal.
///
/// `subscribe` must call `on_subscribe` on the subscriber exactly once,
/// before any other signal, and afterwards honour the demand requested
/// through the handed-out subscription.
pub trait Publisher: Send + Sync + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item, Self::Err> + 'static;
}

impl<P: Publisher> Publisher for std::sync::Arc<P> {
  type Item = P::Item;
  type Err = P::Err;

  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item, Self::Err> + 'static,
  {
    (**self).subscribe(subscriber)
  }
}
