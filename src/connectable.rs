//! Multicast connectors: one upstream subscription shared by many
//! subscribers.
//!
//! # Key Concepts
//!
//! - **Connect**: a [`Multicast`] does not subscribe upstream until
//!   [`connect`](Multicast::connect) is called. Subscribers may attach before
//!   or after; nothing sent earlier is replayed to them.
//! - **Shared demand**: upstream is asked for the largest outstanding demand
//!   among the attached subscribers. Every value reaches every subscriber,
//!   so a slower one may receive values it did not request.
//! - **Teardown**: once connected, the last attached subscriber cancelling
//!   disconnects upstream. A [`Multicast`] can be connected again.
//! - **Share**: [`Share`] connects on its first subscriber and disconnects
//!   when the last one cancels; the next subscriber starts over.
//! - **Own subject**: [`SubjectMulticast`], from `multicast_with`, routes
//!   upstream through a caller-supplied [`Subject`] instead of the built-in
//!   fan-out.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::prelude::*;
//!
//! let subject = PassthroughSubject::<i32, ()>::new();
//! let multicast = subject.clone().multicast();
//!
//! let out = Arc::new(Mutex::new(vec![]));
//! let (a, b) = (out.clone(), out.clone());
//! let _first = multicast.sink_all(move |v| a.lock().unwrap().push(("first", v)), |_| {});
//! let _second = multicast.sink_all(move |v| b.lock().unwrap().push(("second", v)), |_| {});
//!
//! subject.send(0);
//! let mut connection = multicast.connect();
//! subject.send(1);
//! connection.cancel();
//! subject.send(2);
//! assert_eq!(*out.lock().unwrap(), vec![("first", 1), ("second", 1)]);
//! ```

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::{MutArc, WeakArc},
  subject::Subject,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{
    Cancellable, DynamicSubscriptions, Subscription, SubscriptionProxy, SubscriptionRef,
  },
};

/// A publisher that shares one upstream subscription, started by
/// [`connect`](Multicast::connect).
///
/// A subscriber attaching after upstream terminated receives the stored
/// terminal signal.
pub struct Multicast<P: Publisher> {
  source: Arc<P>,
  core: Connector<P::Item, P::Err>,
}

/// A [`Multicast`] that connects itself on the first subscriber and
/// disconnects when the last one cancels or upstream terminates.
pub struct Share<P: Publisher>(Multicast<P>);

impl<P: Publisher> Clone for Multicast<P> {
  fn clone(&self) -> Self { Multicast { source: self.source.clone(), core: self.core.clone() } }
}

impl<P: Publisher> Clone for Share<P> {
  fn clone(&self) -> Self { Share(self.0.clone()) }
}

impl<P> Multicast<P>
where
  P: Publisher,
  P::Item: Clone,
  P::Err: Clone,
{
  pub(crate) fn new(source: P, auto_connect: bool) -> Self {
    Multicast { source: Arc::new(source), core: Connector::new(auto_connect) }
  }

  /// Subscribe upstream once, for every current and future subscriber.
  ///
  /// Cancelling the returned handle cancels the upstream subscription; the
  /// attached subscribers simply stop receiving signals. So does the last
  /// attached subscriber cancelling. Calling `connect` while connected
  /// returns a handle to the existing connection.
  pub fn connect(&self) -> Cancellable { self.core.connect(&*self.source) }

  pub fn is_connected(&self) -> bool { self.core.0.rc_deref_mut().upstream.is_some() }

  pub fn subscriber_count(&self) -> usize { self.core.0.rc_deref_mut().subscribers.len() }
}

impl<P> Share<P>
where
  P: Publisher,
  P::Item: Clone,
  P::Err: Clone,
{
  pub(crate) fn new(source: P) -> Self { Share(Multicast::new(source, true)) }

  pub fn is_connected(&self) -> bool { self.0.is_connected() }

  pub fn subscriber_count(&self) -> usize { self.0.subscriber_count() }
}

impl<P> Publisher for Multicast<P>
where
  P: Publisher,
  P::Item: Clone,
  P::Err: Clone,
{
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    if self.core.attach(subscriber) {
      let connection = self.core.connect(&*self.source);
      // Owned by the connector: the last subscriber leaving disconnects.
      drop(connection.detach());
    }
  }
}

impl<P> Publisher for Share<P>
where
  P: Publisher,
  P::Item: Clone,
  P::Err: Clone,
{
  type Item = P::Item;
  type Err = P::Err;

  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.0.subscribe(subscriber)
  }
}

// ==== Connector state ====

struct ConnectorState<Item, Err> {
  subscribers: DynamicSubscriptions<DemandBuffer<Item, Err>>,
  upstream: Option<SubscriptionProxy>,
  // Requested from the current upstream and not delivered yet.
  in_flight: Demand,
  // Bumped on every connect and teardown; stale signals carry an old one.
  generation: u64,
  completion: Option<Completion<Err>>,
  auto_connect: bool,
}

struct Connector<Item, Err>(MutArc<ConnectorState<Item, Err>>);

impl<Item, Err> Clone for Connector<Item, Err> {
  fn clone(&self) -> Self { Connector(self.0.clone()) }
}

impl<Item, Err> Connector<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn new(auto_connect: bool) -> Self {
    Connector(MutArc::own(ConnectorState {
      subscribers: DynamicSubscriptions::default(),
      upstream: None,
      in_flight: Demand::NONE,
      generation: 0,
      completion: None,
      auto_connect,
    }))
  }

  /// Attach a subscriber; returns `true` when this attach should start an
  /// automatic connection.
  fn attach<S>(&self, subscriber: S) -> bool
  where
    S: Subscriber<Item, Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Ignore);
    let mut state = self.0.rc_deref_mut();
    if let Some(completion) = state.completion.clone() {
      drop(state);
      buffer.complete(completion);
      buffer.attach(None);
      return false;
    }
    let id = state.subscribers.add(buffer.clone());
    let auto_connect = state.auto_connect && state.upstream.is_none();
    drop(state);

    buffer.attach(Some(Arc::new(ConnectorLink { core: self.0.downgrade(), id })));
    auto_connect
  }

  fn connect<P>(&self, source: &P) -> Cancellable
  where
    P: Publisher<Item = Item, Err = Err>,
  {
    let mut state = self.0.rc_deref_mut();
    if state.upstream.is_some() {
      let generation = state.generation;
      drop(state);
      log::debug!("multicast: already connected");
      return Cancellable::new(Arc::new(Connection { core: self.0.downgrade(), generation }));
    }
    state.generation += 1;
    let generation = state.generation;
    let proxy = SubscriptionProxy::new();
    state.upstream = Some(proxy.clone());
    state.in_flight = Demand::NONE;
    drop(state);

    log::debug!("multicast: connecting upstream");
    // Demand is queued on the proxy and reaches upstream on bind.
    rebalance(&self.0);
    source.subscribe(ConnectorSubscriber { core: self.0.clone(), generation, proxy });
    Cancellable::new(Arc::new(Connection { core: self.0.downgrade(), generation }))
  }
}

/// Bring the upstream request up to the largest outstanding demand among the
/// attached subscribers.
fn rebalance<Item, Err>(core: &MutArc<ConnectorState<Item, Err>>)
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  let mut state = core.rc_deref_mut();
  let Some(upstream) = state.upstream.clone() else {
    return;
  };
  let wanted = state
    .subscribers
    .iter()
    .map(DemandBuffer::outstanding)
    .max()
    .unwrap_or(Demand::NONE);
  let delta = wanted.saturating_sub(state.in_flight);
  if delta.is_zero() {
    return;
  }
  state.in_flight += delta;
  drop(state);
  upstream.request(delta);
}

fn disconnect<Item, Err>(core: &MutArc<ConnectorState<Item, Err>>, generation: u64) {
  let mut state = core.rc_deref_mut();
  if state.generation != generation {
    return;
  }
  state.generation += 1;
  let upstream = state.upstream.take();
  drop(state);
  if let Some(upstream) = upstream {
    log::debug!("multicast: disconnecting upstream");
    upstream.cancel();
  }
}

/// Upstream handle of one subscriber's buffer.
struct ConnectorLink<Item, Err> {
  core: WeakArc<ConnectorState<Item, Err>>,
  id: usize,
}

impl<Item: Send + 'static, Err: Send + 'static> Subscription for ConnectorLink<Item, Err> {
  fn request(&self, _demand: Demand) {
    if let Some(core) = self.core.upgrade() {
      rebalance(&core);
    }
  }

  fn cancel(&self) {
    let Some(core) = self.core.upgrade() else {
      return;
    };
    let mut state = core.rc_deref_mut();
    let removed = state.subscribers.remove(self.id);
    let last_gone = removed.is_some() && state.subscribers.is_empty();
    let generation = state.generation;
    drop(state);
    drop(removed);
    if last_gone {
      disconnect(&core, generation);
    }
  }
}

/// The handle returned by `connect`.
struct Connection<Item, Err> {
  core: WeakArc<ConnectorState<Item, Err>>,
  generation: u64,
}

impl<Item: Send, Err: Send> Subscription for Connection<Item, Err> {
  fn request(&self, _demand: Demand) {}

  fn cancel(&self) {
    if let Some(core) = self.core.upgrade() {
      disconnect(&core, self.generation);
    }
  }
}

struct ConnectorSubscriber<Item, Err> {
  core: MutArc<ConnectorState<Item, Err>>,
  generation: u64,
  proxy: SubscriptionProxy,
}

impl<Item, Err> Subscriber<Item, Err> for ConnectorSubscriber<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  fn on_value(&mut self, value: Item) -> Demand {
    let mut state = self.core.rc_deref_mut();
    if state.generation != self.generation {
      return Demand::none();
    }
    state.in_flight = state.in_flight.saturating_decrement();
    let targets = state.subscribers.snapshot();
    for target in &targets {
      target.enqueue(value.clone());
    }
    drop(state);
    targets.iter().for_each(DemandBuffer::flush);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    let mut state = self.core.rc_deref_mut();
    if state.generation != self.generation {
      return;
    }
    state.generation += 1;
    state.upstream = None;
    let targets = state.subscribers.drain();
    if !state.auto_connect {
      state.completion = Some(completion.clone());
    }
    let released: Vec<_> =
      targets.iter().filter_map(|target| target.enqueue_completion(completion.clone())).collect();
    drop(state);
    drop(released);

    log::debug!("multicast: upstream terminated, tearing down");
    targets.iter().for_each(DemandBuffer::flush);
  }
}

// ==== Subject multicast ====

/// A connectable publisher that feeds upstream into a caller-supplied
/// subject, started by [`connect`](SubjectMulticast::connect).
///
/// Subscribers attach to the subject itself, so its replay and demand
/// behaviour apply: a [`CurrentValueSubject`](crate::subject::CurrentValueSubject)
/// hands late subscribers the latest value. Upstream is requested without
/// bound and the subject decides what each subscriber gets.
pub struct SubjectMulticast<P, S> {
  source: Arc<P>,
  subject: S,
  link: MutArc<SubjectLink>,
}

#[derive(Default)]
struct SubjectLink {
  upstream: Option<SubscriptionProxy>,
  generation: u64,
}

impl<P: Publisher, S: Clone> Clone for SubjectMulticast<P, S> {
  fn clone(&self) -> Self {
    SubjectMulticast {
      source: self.source.clone(),
      subject: self.subject.clone(),
      link: self.link.clone(),
    }
  }
}

impl<P, S> SubjectMulticast<P, S>
where
  P: Publisher,
  S: Subject<P::Item, P::Err> + Clone + Send + Sync + 'static,
{
  pub(crate) fn new(source: P, subject: S) -> Self {
    let link = MutArc::own(SubjectLink::default());
    SubjectMulticast { source: Arc::new(source), subject, link }
  }

  /// Subscribe the subject to upstream. Calling `connect` while connected
  /// returns a handle to the existing connection.
  pub fn connect(&self) -> Cancellable {
    let mut link = self.link.rc_deref_mut();
    if link.upstream.is_some() {
      let generation = link.generation;
      drop(link);
      return self.connection(generation);
    }
    link.generation += 1;
    let generation = link.generation;
    let proxy = SubscriptionProxy::new();
    link.upstream = Some(proxy.clone());
    drop(link);

    log::debug!("multicast: connecting upstream into subject");
    self.source.subscribe(SubjectFeed {
      subject: self.subject.clone(),
      link: self.link.clone(),
      generation,
      proxy,
    });
    self.connection(generation)
  }

  fn connection(&self, generation: u64) -> Cancellable {
    Cancellable::new(Arc::new(SubjectConnection { link: self.link.downgrade(), generation }))
  }

  pub fn is_connected(&self) -> bool { self.link.rc_deref_mut().upstream.is_some() }

  /// The subject upstream is routed through.
  pub fn subject(&self) -> &S { &self.subject }
}

impl<P, S> Publisher for SubjectMulticast<P, S>
where
  P: Publisher,
  S: Subject<P::Item, P::Err> + Clone + Send + Sync + 'static,
{
  type Item = P::Item;
  type Err = P::Err;

  #[inline]
  fn subscribe<Sub>(&self, subscriber: Sub)
  where
    Sub: Subscriber<P::Item, P::Err> + 'static,
  {
    self.subject.subscribe(subscriber)
  }
}

fn unlink(link: &MutArc<SubjectLink>, generation: u64) -> Option<SubscriptionProxy> {
  let mut link = link.rc_deref_mut();
  if link.generation != generation {
    return None;
  }
  link.generation += 1;
  link.upstream.take()
}

struct SubjectConnection {
  link: WeakArc<SubjectLink>,
  generation: u64,
}

impl Subscription for SubjectConnection {
  fn request(&self, _demand: Demand) {}

  fn cancel(&self) {
    let Some(link) = self.link.upgrade() else {
      return;
    };
    if let Some(upstream) = unlink(&link, self.generation) {
      log::debug!("multicast: disconnecting subject from upstream");
      upstream.cancel();
    }
  }
}

struct SubjectFeed<S> {
  subject: S,
  link: MutArc<SubjectLink>,
  generation: u64,
  proxy: SubscriptionProxy,
}

impl<Item, Err, S> Subscriber<Item, Err> for SubjectFeed<S>
where
  S: Subject<Item, Err> + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.proxy.bind(subscription);
    self.proxy.request(Demand::unbounded());
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if !self.proxy.is_cancelled() {
      self.subject.send(value);
    }
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if self.proxy.is_cancelled() {
      return;
    }
    drop(unlink(&self.link, self.generation));
    self.subject.send_completion(completion);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  };

  use crate::{prelude::*, publisher, subscription::SubscriptionRef};

  type Events = Arc<Mutex<Vec<String>>>;

  fn record_into<P>(source: &P, events: &Events, name: &'static str) -> Cancellable
  where
    P: Publisher,
    P::Item: std::fmt::Debug,
    P::Err: std::fmt::Debug,
  {
    let (values, done) = (events.clone(), events.clone());
    source.sink_all(
      move |v| values.lock().unwrap().push(format!("{name} {v:?}")),
      move |c| done.lock().unwrap().push(format!("{name} {c:?}")),
    )
  }

  #[test]
  fn nothing_flows_before_connect() {
    let subject = PassthroughSubject::<i32, ()>::new();
    let multicast = subject.clone().multicast();
    let events = Events::default();
    let _a = record_into(&multicast, &events, "a");

    subject.send(1);
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(subject.subscriber_count(), 0);

    let _connection = multicast.connect();
    let _b = record_into(&multicast, &events, "b");
    subject.send(2);
    assert_eq!(*events.lock().unwrap(), vec!["a 2", "b 2"]);
  }

  #[test]
  fn cancelling_the_connection_stops_delivery() {
    let subject = PassthroughSubject::<i32, ()>::new();
    let multicast = subject.clone().multicast();
    let events = Events::default();
    let _a = record_into(&multicast, &events, "a");
    let _b = record_into(&multicast, &events, "b");

    let mut connection = multicast.connect();
    subject.send(1);
    connection.cancel();
    subject.send(2);

    assert_eq!(*events.lock().unwrap(), vec!["a 1", "b 1"]);
    assert_eq!(subject.subscriber_count(), 0);
    assert!(!multicast.is_connected());
    assert_eq!(multicast.subscriber_count(), 2);
  }

  #[test]
  fn last_subscriber_leaving_disconnects() {
    let subject = PassthroughSubject::<i32, ()>::new();
    let multicast = subject.clone().multicast();
    let events = Events::default();
    let a = record_into(&multicast, &events, "a");
    let b = record_into(&multicast, &events, "b");

    let _connection = multicast.connect();
    assert_eq!(subject.subscriber_count(), 1);
    subject.send(1);

    drop(a);
    assert!(multicast.is_connected());
    drop(b);
    assert_eq!(subject.subscriber_count(), 0);
    assert!(!multicast.is_connected());

    let _c = record_into(&multicast, &events, "c");
    let _again = multicast.connect();
    subject.send(2);
    assert_eq!(*events.lock().unwrap(), vec!["a 1", "b 1", "c 2"]);
  }

  #[test]
  fn subject_multicast_routes_through_the_given_subject() {
    let source = PassthroughSubject::<i32, ()>::new();
    let multicast = source.clone().multicast_with(CurrentValueSubject::new(0));
    let events = Events::default();
    let _a = record_into(&multicast, &events, "a");

    source.send(1);
    let mut connection = multicast.connect();
    assert!(multicast.is_connected());
    source.send(2);
    let _late = record_into(&multicast, &events, "late");
    assert_eq!(multicast.subject().value(), 2);

    connection.cancel();
    source.send(3);
    assert!(!multicast.is_connected());
    assert_eq!(source.subscriber_count(), 0);
    assert_eq!(*events.lock().unwrap(), vec!["a 0", "a 2", "late 2"]);
  }

  #[test]
  fn subject_multicast_forwards_termination() {
    let source = PassthroughSubject::<i32, &str>::new();
    let multicast = source.clone().multicast_with(PassthroughSubject::new());
    let events = Events::default();
    let _a = record_into(&multicast, &events, "a");
    let _connection = multicast.connect();

    source.send(7);
    source.send_completion(Completion::Failed("down"));
    assert!(!multicast.is_connected());
    assert!(multicast.subject().is_terminated());
    assert_eq!(*events.lock().unwrap(), vec!["a 7", "a Failed(\"down\")"]);
  }

  #[test]
  fn termination_is_broadcast_and_stored() {
    let subject = PassthroughSubject::<i32, &str>::new();
    let multicast = subject.clone().multicast();
    let events = Events::default();
    let _a = record_into(&multicast, &events, "a");
    let _connection = multicast.connect();

    subject.send_completion(Completion::Failed("gone"));
    let _late = record_into(&multicast, &events, "late");
    assert_eq!(
      *events.lock().unwrap(),
      vec!["a Failed(\"gone\")", "late Failed(\"gone\")"]
    );
  }

  struct Pull(Arc<AtomicUsize>, Demand, Arc<Mutex<Option<SubscriptionRef>>>);

  impl Subscriber<u64, std::convert::Infallible> for Pull {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(self.1);
      *self.2.lock().unwrap() = Some(subscription);
    }

    fn on_value(&mut self, _: u64) -> Demand {
      self.0.fetch_add(1, Ordering::SeqCst);
      Demand::none()
    }

    fn on_completion(&mut self, _: Completion<std::convert::Infallible>) {}
  }

  #[test]
  fn upstream_demand_is_the_largest_outstanding() {
    let multicast = publisher::sequence(0u64..).multicast();
    let (slow, fast) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let slow_handle = Arc::new(Mutex::new(None));
    multicast.subscribe(Pull(slow.clone(), Demand::bounded(2), slow_handle.clone()));
    multicast.subscribe(Pull(fast.clone(), Demand::bounded(5), Default::default()));

    let _connection = multicast.connect();
    assert_eq!(slow.load(Ordering::SeqCst), 5);
    assert_eq!(fast.load(Ordering::SeqCst), 5);

    slow_handle.lock().unwrap().clone().unwrap().request(Demand::bounded(3));
    assert_eq!(slow.load(Ordering::SeqCst), 8);
    assert_eq!(fast.load(Ordering::SeqCst), 8);
  }

  #[test]
  fn share_connects_on_first_subscriber_and_restarts() {
    let subject = PassthroughSubject::<i32, ()>::new();
    let subscriptions = Arc::new(AtomicUsize::new(0));
    let (counter, inner) = (subscriptions.clone(), subject.clone());
    let shared = publisher::deferred(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      inner.clone()
    })
    .share();

    let events = Events::default();
    let a = record_into(&shared, &events, "a");
    let b = record_into(&shared, &events, "b");
    assert_eq!(subscriptions.load(Ordering::SeqCst), 1);
    subject.send(1);

    drop(a);
    drop(b);
    assert_eq!(subject.subscriber_count(), 0);
    assert!(!shared.is_connected());

    let _c = record_into(&shared, &events, "c");
    subject.send(2);
    assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    assert_eq!(*events.lock().unwrap(), vec!["a 1", "b 1", "c 2"]);
  }

  #[test]
  fn share_restarts_after_completion() {
    let shared = publisher::sequence(vec![1, 2]).share();
    let events = Events::default();
    let _a = record_into(&shared, &events, "a");
    let _b = record_into(&shared, &events, "b");
    assert_eq!(
      *events.lock().unwrap(),
      vec!["a 1", "a 2", "a Finished", "b 1", "b 2", "b Finished"]
    );
  }
}
