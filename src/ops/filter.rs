use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::SubscriptionRef,
};

// A dropped value still consumed a unit of upstream demand without
// satisfying any downstream demand; it is replaced by requesting one more.
const REPLACE_DROPPED: Demand = Demand::Bounded(1);

/// Emits only the values that pass a predicate.
pub struct Filter<P, F> {
  pub(crate) source: P,
  pub(crate) filter: Arc<F>,
}

impl<P, F> Publisher for Filter<P, F>
where
  P: Publisher,
  F: Fn(&P::Item) -> bool + Send + Sync + 'static,
{
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(FilterSubscriber { downstream: subscriber, filter: self.filter.clone() })
  }
}

pub struct FilterSubscriber<S, F> {
  downstream: S,
  filter: Arc<F>,
}

impl<Item, Err, S, F> Subscriber<Item, Err> for FilterSubscriber<S, F>
where
  S: Subscriber<Item, Err>,
  F: Fn(&Item) -> bool + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if (self.filter)(&value) { self.downstream.on_value(value) } else { REPLACE_DROPPED }
  }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) {
    self.downstream.on_completion(completion)
  }
}

/// Maps every value to an `Option` and emits the `Some`s.
pub struct CompactMap<P, F> {
  pub(crate) source: P,
  pub(crate) map: Arc<F>,
}

impl<P, F, B> Publisher for CompactMap<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> Option<B> + Send + Sync + 'static,
  B: Send + 'static,
{
  type Item = B;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<B, P::Err> + 'static,
  {
    self.source.subscribe(CompactMapSubscriber { downstream: subscriber, map: self.map.clone() })
  }
}

pub struct CompactMapSubscriber<S, F> {
  downstream: S,
  map: Arc<F>,
}

impl<Item, Err, B, S, F> Subscriber<Item, Err> for CompactMapSubscriber<S, F>
where
  S: Subscriber<B, Err>,
  F: Fn(Item) -> Option<B> + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: Item) -> Demand {
    match (self.map)(value) {
      Some(mapped) => self.downstream.on_value(mapped),
      None => REPLACE_DROPPED,
    }
  }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) {
    self.downstream.on_completion(completion)
  }
}

/// Drops a value equal to the one emitted right before it.
pub struct RemoveDuplicates<P> {
  pub(crate) source: P,
}

impl<P> Publisher for RemoveDuplicates<P>
where
  P: Publisher,
  P::Item: PartialEq + Clone,
{
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(RemoveDuplicatesSubscriber { downstream: subscriber, last: None })
  }
}

pub struct RemoveDuplicatesSubscriber<S, Item> {
  downstream: S,
  last: Option<Item>,
}

impl<Item, Err, S> Subscriber<Item, Err> for RemoveDuplicatesSubscriber<S, Item>
where
  S: Subscriber<Item, Err>,
  Item: PartialEq + Clone + Send,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.last.as_ref() == Some(&value) {
      return REPLACE_DROPPED;
    }
    self.last = Some(value.clone());
    self.downstream.on_value(value)
  }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) {
    self.downstream.on_completion(completion)
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher, subscription::SubscriptionRef};

  /// Requests a fixed amount once and records what arrives.
  struct Bounded(u64, Arc<Mutex<Vec<i32>>>);

  impl<E> Subscriber<i32, E> for Bounded {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(Demand::bounded(self.0));
    }

    fn on_value(&mut self, value: i32) -> Demand {
      self.1.lock().unwrap().push(value);
      Demand::none()
    }

    fn on_completion(&mut self, _: Completion<E>) {}
  }

  #[test]
  fn dropped_values_do_not_stall_bounded_demand() {
    let out = Arc::new(Mutex::new(vec![]));
    publisher::sequence(0..).filter(|v| v % 3 == 0).subscribe(Bounded(3, out.clone()));
    assert_eq!(*out.lock().unwrap(), vec![0, 3, 6]);
  }

  #[test]
  fn compact_map_keeps_somes() {
    let out = Arc::new(Mutex::new(vec![]));
    publisher::sequence(vec!["1", "x", "3"])
      .compact_map(|s| s.parse::<i32>().ok())
      .subscribe(Bounded(10, out.clone()));
    assert_eq!(*out.lock().unwrap(), vec![1, 3]);
  }

  #[test]
  fn remove_duplicates_only_adjacent() {
    let out = Arc::new(Mutex::new(vec![]));
    publisher::sequence(vec![1, 1, 2, 2, 1, 3, 3])
      .remove_duplicates()
      .subscribe(Bounded(3, out.clone()));
    assert_eq!(*out.lock().unwrap(), vec![1, 2, 1]);
  }
}
