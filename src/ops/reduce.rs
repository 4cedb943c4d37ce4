//! Operators that need to see the whole upstream sequence before they can
//! emit. They request unbounded demand from upstream as soon as downstream
//! asks for anything, and hold their single result in a `DemandBuffer`
//! until downstream demand allows it through.

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{unbounded_on_any, MapDemand, SubscriptionRef},
};

/// Folds the whole sequence into one value, emitted when upstream finishes.
pub struct Reduce<P, A, F> {
  pub(crate) source: P,
  pub(crate) initial: A,
  pub(crate) reduce: Arc<F>,
}

impl<P, A, F> Publisher for Reduce<P, A, F>
where
  P: Publisher,
  A: Clone + Send + Sync + 'static,
  F: Fn(A, P::Item) -> A + Send + Sync + 'static,
{
  type Item = A;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<A, P::Err> + 'static,
  {
    self.source.subscribe(ReduceSubscriber {
      buffer: DemandBuffer::new(subscriber, Backpressure::Buffer),
      acc: Some(self.initial.clone()),
      reduce: self.reduce.clone(),
    })
  }
}

pub struct ReduceSubscriber<A, Err, F> {
  buffer: DemandBuffer<A, Err>,
  acc: Option<A>,
  reduce: Arc<F>,
}

impl<Item, Err, A, F> Subscriber<Item, Err> for ReduceSubscriber<A, Err, F>
where
  A: Send + 'static,
  Err: Send + 'static,
  F: Fn(A, Item) -> A + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.buffer.attach(Some(MapDemand::shared(subscription, unbounded_on_any)));
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if let Some(acc) = self.acc.take() {
      self.acc = Some((self.reduce)(acc, value));
    }
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if completion.is_finished() {
      if let Some(acc) = self.acc.take() {
        self.buffer.push(acc);
      }
    }
    self.buffer.complete(completion);
  }
}

/// Emits only the last value, when upstream finishes.
pub struct Last<P> {
  pub(crate) source: P,
}

impl<P: Publisher> Publisher for Last<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(LastSubscriber {
      buffer: DemandBuffer::new(subscriber, Backpressure::Buffer),
      last: None,
    })
  }
}

pub struct LastSubscriber<Item, Err> {
  buffer: DemandBuffer<Item, Err>,
  last: Option<Item>,
}

impl<Item, Err> Subscriber<Item, Err> for LastSubscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.buffer.attach(Some(MapDemand::shared(subscription, unbounded_on_any)));
  }

  fn on_value(&mut self, value: Item) -> Demand {
    self.last = Some(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if completion.is_finished() {
      if let Some(last) = self.last.take() {
        self.buffer.push(last);
      }
    }
    self.buffer.complete(completion);
  }
}

/// Emits a default value if upstream finishes without emitting anything.
pub struct ReplaceEmpty<P: Publisher> {
  pub(crate) source: P,
  pub(crate) value: P::Item,
}

impl<P> Publisher for ReplaceEmpty<P>
where
  P: Publisher,
  P::Item: Clone + Sync,
{
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(ReplaceEmptySubscriber {
      buffer: DemandBuffer::new(subscriber, Backpressure::Buffer),
      fallback: Some(self.value.clone()),
    })
  }
}

pub struct ReplaceEmptySubscriber<Item, Err> {
  buffer: DemandBuffer<Item, Err>,
  fallback: Option<Item>,
}

impl<Item, Err> Subscriber<Item, Err> for ReplaceEmptySubscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.buffer.attach(Some(subscription)); }

  fn on_value(&mut self, value: Item) -> Demand {
    self.fallback = None;
    self.buffer.push(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if completion.is_finished() {
      if let Some(fallback) = self.fallback.take() {
        self.buffer.push(fallback);
      }
    }
    self.buffer.complete(completion);
  }
}
