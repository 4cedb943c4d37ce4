//! Side-effect hooks on every protocol event of a chain.
//!
//! [`EventHooks`] is a builder of optional callbacks; `handle_events` runs
//! them as the events pass through, without touching values or demand.
//! `log_events` is the same operator wired to the `log` facade.

use std::{fmt::Debug, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::{Subscription, SubscriptionRef},
};

type Hook<T> = Option<Box<dyn Fn(T) + Send + Sync>>;

/// Callbacks run by `handle_events`. Every hook is optional.
///
/// ```rust
/// use std::sync::{
///   atomic::{AtomicUsize, Ordering},
///   Arc,
/// };
///
/// use rxflow::{ops::handle_events::EventHooks, prelude::*, publisher};
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
/// let hooks = EventHooks::new().on_output(move |_: &i32| {
///   counter.fetch_add(1, Ordering::SeqCst);
/// });
/// let _handle = publisher::sequence(1..=3).handle_events(hooks).sink(|_| {});
/// assert_eq!(seen.load(Ordering::SeqCst), 3);
/// ```
pub struct EventHooks<Item, Err> {
  subscription: Hook<()>,
  output: Option<Box<dyn Fn(&Item) + Send + Sync>>,
  completion: Option<Box<dyn Fn(&Completion<Err>) + Send + Sync>>,
  cancel: Hook<()>,
  request: Hook<Demand>,
}

impl<Item, Err> Default for EventHooks<Item, Err> {
  fn default() -> Self {
    EventHooks { subscription: None, output: None, completion: None, cancel: None, request: None }
  }
}

impl<Item, Err> EventHooks<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn on_subscription(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.subscription = Some(Box::new(move |()| f()));
    self
  }

  pub fn on_output(mut self, f: impl Fn(&Item) + Send + Sync + 'static) -> Self {
    self.output = Some(Box::new(f));
    self
  }

  pub fn on_completion(mut self, f: impl Fn(&Completion<Err>) + Send + Sync + 'static) -> Self {
    self.completion = Some(Box::new(f));
    self
  }

  pub fn on_cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
    self.cancel = Some(Box::new(move |()| f()));
    self
  }

  /// Runs for every demand sent upstream, including the top-ups returned
  /// from `on_value`.
  pub fn on_request(mut self, f: impl Fn(Demand) + Send + Sync + 'static) -> Self {
    self.request = Some(Box::new(f));
    self
  }

  fn requested(&self, demand: Demand) {
    if let Some(hook) = &self.request {
      hook(demand);
    }
  }
}

impl<Item: Debug, Err: Debug> EventHooks<Item, Err> {
  /// Hooks that log every event at `debug` level, each line starting with
  /// `prefix`.
  pub fn logging(prefix: impl Into<String>) -> Self {
    let prefix: Arc<str> = prefix.into().into();
    let (p1, p2, p3, p4, p5) =
      (prefix.clone(), prefix.clone(), prefix.clone(), prefix.clone(), prefix);
    EventHooks::new()
      .on_subscription(move || log::debug!("{p1}: receive subscription"))
      .on_output(move |v| log::debug!("{p2}: receive value: ({v:?})"))
      .on_completion(move |c| match c {
        Completion::Finished => log::debug!("{p3}: receive finished"),
        Completion::Failed(err) => log::debug!("{p3}: receive error: ({err:?})"),
      })
      .on_cancel(move || log::debug!("{p4}: receive cancel"))
      .on_request(move |d| log::debug!("{p5}: request {d}"))
  }
}

pub struct HandleEvents<P: Publisher> {
  pub(crate) source: P,
  pub(crate) hooks: Arc<EventHooks<P::Item, P::Err>>,
}

impl<P: Publisher> Publisher for HandleEvents<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self
      .source
      .subscribe(HandleEventsSubscriber { downstream: subscriber, hooks: self.hooks.clone() })
  }
}

pub struct HandleEventsSubscriber<S, Item, Err> {
  downstream: S,
  hooks: Arc<EventHooks<Item, Err>>,
}

impl<S, Item, Err> Subscriber<Item, Err> for HandleEventsSubscriber<S, Item, Err>
where
  S: Subscriber<Item, Err>,
  Item: 'static,
  Err: 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    if let Some(hook) = &self.hooks.subscription {
      hook(());
    }
    self
      .downstream
      .on_subscribe(Arc::new(HookedSubscription { upstream: subscription, hooks: self.hooks.clone() }))
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if let Some(hook) = &self.hooks.output {
      hook(&value);
    }
    let more = self.downstream.on_value(value);
    if !more.is_zero() {
      self.hooks.requested(more);
    }
    more
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if let Some(hook) = &self.hooks.completion {
      hook(&completion);
    }
    self.downstream.on_completion(completion)
  }
}

struct HookedSubscription<Item, Err> {
  upstream: SubscriptionRef,
  hooks: Arc<EventHooks<Item, Err>>,
}

impl<Item, Err> Subscription for HookedSubscription<Item, Err> {
  fn request(&self, demand: Demand) {
    self.hooks.requested(demand);
    self.upstream.request(demand);
  }

  fn cancel(&self) {
    if let Some(hook) = &self.hooks.cancel {
      hook(());
    }
    self.upstream.cancel();
  }
}
