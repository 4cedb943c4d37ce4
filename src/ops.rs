//! Operators and the [`PublisherExt`] combinator trait.
//!
//! Every operator is a publisher wrapping its upstream. Subscribing to it
//! subscribes the upstream with an operator-specific subscriber which
//! transforms signals on their way down and demand on its way up.

pub mod catch;
pub mod collect;
pub mod combine_latest;
pub mod concat;
pub mod filter;
pub mod flat_map;
pub mod handle_events;
pub mod into_stream;
pub mod map;
pub mod merge;
pub mod reduce;
pub(crate) mod relay;
pub mod retry;
pub mod scan;
pub mod switch_to_latest;
pub mod take;
pub mod timeout;
pub mod zip;

use std::{convert::Infallible, fmt::Debug, marker::PhantomData, sync::Arc, time::Duration};

use crate::{
  connectable::{Multicast, Share, SubjectMulticast},
  error::TimeoutError,
  publisher::{AnyPublisher, Publisher},
  scheduler::Scheduler,
  subject::Subject,
  subscriber::{Completion, Sink, ValueSink},
  subscription::{Cancellable, SubscriptionProxy},
};
use catch::{Catch, ReplaceError};
use collect::Collect;
use combine_latest::CombineLatest;
use concat::Concat;
use filter::{CompactMap, Filter, RemoveDuplicates};
use flat_map::FlatMap;
use handle_events::{EventHooks, HandleEvents};
use into_stream::PublisherStream;
use map::{Map, MapError, SetFailureType, TryMap};
use merge::Merge;
use reduce::{Last, Reduce, ReplaceEmpty};
use retry::{Retry, RetryPolicy};
use scan::Scan;
use switch_to_latest::SwitchToLatest;
use take::{DropFirst, IgnoreOutput, Prefix};
use timeout::Timeout;
use zip::Zip;

pub use merge::merge_all;

/// Combinators available on every [`Publisher`].
///
/// Combinators consume `self` and return a new publisher; nothing is
/// subscribed until a subscriber attaches to the end of the chain.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::{prelude::*, publisher};
///
/// let out = Arc::new(Mutex::new(vec![]));
/// let sink = out.clone();
/// let _handle = publisher::sequence(1..=10)
///   .filter(|v| v % 2 == 0)
///   .map(|v| v * 10)
///   .collect_into_batches(2)
///   .sink(move |batch| sink.lock().unwrap().push(batch));
/// assert_eq!(*out.lock().unwrap(), vec![vec![20, 40], vec![60, 80], vec![100]]);
/// ```
pub trait PublisherExt: Publisher + Sized {
  // ==== Transforming ====

  fn map<B, F>(self, f: F) -> Map<Self, F>
  where
    F: Fn(Self::Item) -> B + Send + Sync + 'static,
    B: Send + 'static,
  {
    Map { source: self, map: Arc::new(f) }
  }

  /// Like `map`, but `f` may fail the stream; the upstream is cancelled when
  /// it does.
  fn try_map<B, F>(self, f: F) -> TryMap<Self, F>
  where
    F: Fn(Self::Item) -> Result<B, Self::Err> + Send + Sync + 'static,
    B: Send + 'static,
  {
    TryMap { source: self, map: Arc::new(f) }
  }

  fn map_error<E, F>(self, f: F) -> MapError<Self, F>
  where
    F: Fn(Self::Err) -> E + Send + Sync + 'static,
    E: Send + 'static,
  {
    MapError { source: self, map: Arc::new(f) }
  }

  /// Gives a publisher that cannot fail the failure type `E`, so it can be
  /// combined with publishers that can.
  fn set_failure_type<E>(self) -> SetFailureType<Self, E>
  where
    Self: Publisher<Err = Infallible>,
    E: Send + 'static,
  {
    SetFailureType { source: self, _err: PhantomData }
  }

  fn filter<F>(self, f: F) -> Filter<Self, F>
  where
    F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
  {
    Filter { source: self, filter: Arc::new(f) }
  }

  /// Maps every value and drops the `None`s.
  fn compact_map<B, F>(self, f: F) -> CompactMap<Self, F>
  where
    F: Fn(Self::Item) -> Option<B> + Send + Sync + 'static,
    B: Send + 'static,
  {
    CompactMap { source: self, map: Arc::new(f) }
  }

  /// Drops a value equal to the one emitted just before it.
  fn remove_duplicates(self) -> RemoveDuplicates<Self>
  where
    Self::Item: PartialEq + Clone,
  {
    RemoveDuplicates { source: self }
  }

  /// Emits the running accumulator after every value.
  fn scan<A, F>(self, initial: A, f: F) -> Scan<Self, A, F>
  where
    A: Clone + Send + Sync + 'static,
    F: Fn(A, Self::Item) -> A + Send + Sync + 'static,
  {
    Scan { source: self, initial, scan: Arc::new(f) }
  }

  /// Folds the whole sequence and emits the result once, at completion.
  fn reduce<A, F>(self, initial: A, f: F) -> Reduce<Self, A, F>
  where
    A: Clone + Send + Sync + 'static,
    F: Fn(A, Self::Item) -> A + Send + Sync + 'static,
  {
    Reduce { source: self, initial, reduce: Arc::new(f) }
  }

  fn last(self) -> Last<Self> { Last { source: self } }

  /// Emits `value` when the upstream finishes without emitting anything.
  fn replace_empty(self, value: Self::Item) -> ReplaceEmpty<Self>
  where
    Self::Item: Clone + Sync,
  {
    ReplaceEmpty { source: self, value }
  }

  // ==== Collecting ====

  /// Collects every value and emits them as one `Vec` when the upstream
  /// finishes.
  fn collect(self) -> Collect<Self> { Collect { source: self, batch: None } }

  /// Emits a `Vec` every `size` values, and the remainder when the upstream
  /// finishes. A failure drops the partial batch.
  ///
  /// # Panics
  ///
  /// Panics if `size` is zero.
  fn collect_into_batches(self, size: usize) -> Collect<Self> {
    assert!(size > 0, "batch size must be positive");
    Collect { source: self, batch: Some(size) }
  }

  // ==== Limiting ====

  /// Emits the first `count` values, then finishes and cancels the
  /// upstream.
  fn prefix(self, count: usize) -> Prefix<Self> { Prefix { source: self, count } }

  fn first(self) -> Prefix<Self> { self.prefix(1) }

  fn drop_first(self, count: usize) -> DropFirst<Self> { DropFirst { source: self, count } }

  fn ignore_output(self) -> IgnoreOutput<Self> { IgnoreOutput { source: self } }

  // ==== Recovery and concatenation ====

  /// Replaces a failure with the publisher built by `handler`.
  fn catch<Q, F>(self, handler: F) -> Catch<Self, F>
  where
    F: Fn(Self::Err) -> Q + Send + Sync + 'static,
    Q: Publisher<Item = Self::Item>,
  {
    Catch { source: self, handler: Arc::new(handler) }
  }

  /// Replaces a failure with a final `value`.
  fn replace_error(self, value: Self::Item) -> ReplaceError<Self>
  where
    Self::Item: Clone + Sync,
  {
    ReplaceError { source: self, value }
  }

  /// Emits `other` after this publisher finishes.
  fn append<B>(self, other: B) -> Concat<Self, B>
  where
    B: Publisher<Item = Self::Item, Err = Self::Err>,
  {
    Concat { first: self, second: Arc::new(other) }
  }

  /// Emits `other` before this publisher.
  fn prepend<B>(self, other: B) -> Concat<B, Self>
  where
    B: Publisher<Item = Self::Item, Err = Self::Err>,
  {
    Concat { first: other, second: Arc::new(self) }
  }

  /// Resubscribes after a failure while `policy` allows it. A plain `usize`
  /// is the number of retries.
  fn retry<R>(self, policy: R) -> Retry<Self, R>
  where
    R: RetryPolicy<Self::Err>,
  {
    Retry { source: Arc::new(self), policy }
  }

  // ==== Combining ====

  fn merge<B>(self, other: B) -> Merge<Self, B>
  where
    B: Publisher<Item = Self::Item, Err = Self::Err>,
  {
    Merge { a: self, b: other }
  }

  /// Emits `f(a, b)` of the latest value of each side, once both sides have
  /// emitted.
  fn combine_latest<B, F, O>(self, other: B, f: F) -> CombineLatest<Self, B, F>
  where
    B: Publisher<Err = Self::Err>,
    Self::Item: Clone,
    B::Item: Clone,
    F: Fn(Self::Item, B::Item) -> O + Send + Sync + 'static,
    O: Send + 'static,
  {
    CombineLatest { a: self, b: other, combine: Arc::new(f) }
  }

  fn zip<B>(self, other: B) -> Zip<Self, B>
  where
    B: Publisher<Err = Self::Err>,
  {
    Zip { a: self, b: other }
  }

  /// Subscribes to `f(value)` for every value and merges the results.
  fn flat_map<Q, F>(self, f: F) -> FlatMap<Self, F>
  where
    F: Fn(Self::Item) -> Q + Send + Sync + 'static,
    Q: Publisher<Err = Self::Err>,
  {
    FlatMap { source: self, transform: Arc::new(f), max: None }
  }

  /// `flat_map` with at most `max` inner publishers subscribed at a time.
  ///
  /// # Panics
  ///
  /// Panics if `max` is zero.
  fn flat_map_bounded<Q, F>(self, max: usize, f: F) -> FlatMap<Self, F>
  where
    F: Fn(Self::Item) -> Q + Send + Sync + 'static,
    Q: Publisher<Err = Self::Err>,
  {
    assert!(max > 0, "at least one inner publisher must be allowed");
    FlatMap { source: self, transform: Arc::new(f), max: Some(max) }
  }

  /// Follows only the most recent inner publisher.
  fn switch_to_latest(self) -> SwitchToLatest<Self>
  where
    Self::Item: Publisher<Err = Self::Err>,
  {
    SwitchToLatest { source: self }
  }

  // ==== Time and hooks ====

  /// Fails with [`TimeoutError`] when nothing arrives within `after` of the
  /// subscription or of the previous value.
  #[allow(clippy::type_complexity)]
  fn timeout<Sch>(
    self, after: Duration, scheduler: Sch,
  ) -> Timeout<Self, Sch, fn(TimeoutError) -> Self::Err>
  where
    Sch: Scheduler,
    Self::Err: From<TimeoutError>,
  {
    let make_err: fn(TimeoutError) -> Self::Err = From::from;
    Timeout { source: self, after, scheduler, make_err: Arc::new(make_err) }
  }

  /// `timeout` with the failure built by `f`.
  fn timeout_with<Sch, F>(self, after: Duration, scheduler: Sch, f: F) -> Timeout<Self, Sch, F>
  where
    Sch: Scheduler,
    F: Fn(TimeoutError) -> Self::Err + Send + Sync + 'static,
  {
    Timeout { source: self, after, scheduler, make_err: Arc::new(f) }
  }

  fn handle_events(self, hooks: EventHooks<Self::Item, Self::Err>) -> HandleEvents<Self> {
    HandleEvents { source: self, hooks: Arc::new(hooks) }
  }

  /// Logs every event of the chain at debug level, prefixed by `prefix`.
  fn log_events(self, prefix: impl Into<String>) -> HandleEvents<Self>
  where
    Self::Item: Debug,
    Self::Err: Debug,
  {
    self.handle_events(EventHooks::logging(prefix))
  }

  // ==== Output ====

  /// Hides the concrete publisher type.
  fn erase(self) -> AnyPublisher<Self::Item, Self::Err> { AnyPublisher::new(self) }

  /// Subscribes and pulls the values as a `futures::Stream`.
  fn into_stream(&self) -> PublisherStream<Self::Item, Self::Err> { PublisherStream::new(self) }

  /// Subscribes with unbounded demand and calls `on_value` for every value.
  fn sink<F>(&self, on_value: F) -> Cancellable
  where
    Self: Publisher<Err = Infallible>,
    F: FnMut(Self::Item) + Send + 'static,
  {
    let handle = SubscriptionProxy::new();
    self.subscribe(ValueSink::new(on_value, handle.clone()));
    Cancellable::new(Arc::new(handle))
  }

  /// Subscribes with unbounded demand; `on_completion` receives the
  /// terminal signal.
  fn sink_all<F, C>(&self, on_value: F, on_completion: C) -> Cancellable
  where
    F: FnMut(Self::Item) + Send + 'static,
    C: FnOnce(Completion<Self::Err>) + Send + 'static,
  {
    let handle = SubscriptionProxy::new();
    self.subscribe(Sink::new(on_value, on_completion, handle.clone()));
    Cancellable::new(Arc::new(handle))
  }

  // ==== Connectors ====

  /// Shares one upstream subscription, started by
  /// [`connect`](Multicast::connect).
  fn multicast(self) -> Multicast<Self>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    Multicast::new(self, false)
  }

  /// Like [`multicast`](Self::multicast), but routes upstream through
  /// `subject`, which also decides what each subscriber receives.
  fn multicast_with<S>(self, subject: S) -> SubjectMulticast<Self, S>
  where
    S: Subject<Self::Item, Self::Err> + Clone + Send + Sync + 'static,
  {
    SubjectMulticast::new(self, subject)
  }

  /// Shares one upstream subscription, started by the first subscriber and
  /// torn down when the last one leaves.
  fn share(self) -> Share<Self>
  where
    Self::Item: Clone,
    Self::Err: Clone,
  {
    Share::new(self)
  }
}

impl<P: Publisher> PublisherExt for P {}
