use super::{subject_core::SubjectCore, Subject};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, Subscriber},
  subscription::SubscriptionRef,
};

/// A subject that retains its latest value.
///
/// A new subscriber receives the current value before anything sent later.
/// After termination it receives the stored terminal signal instead, and
/// none of the historical values.
pub struct CurrentValueSubject<Item, Err> {
  core: SubjectCore<Item, Err>,
}

impl<Item, Err> Clone for CurrentValueSubject<Item, Err> {
  fn clone(&self) -> Self { CurrentValueSubject { core: self.core.clone() } }
}

impl<Item, Err> CurrentValueSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new(value: Item) -> Self { CurrentValueSubject { core: SubjectCore::new(Some(value)) } }

  /// The latest value sent, or the initial one.
  pub fn value(&self) -> Item {
    match self.core.current() {
      Some(value) => value,
      None => unreachable!("a current value subject always holds a value"),
    }
  }

  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }
}

impl<Item, Err> Publisher for CurrentValueSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    self.core.attach(subscriber, Backpressure::KeepLatest, true)
  }
}

impl<Item, Err> Subject<Item, Err> for CurrentValueSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  #[inline]
  fn send(&self, value: Item) { self.core.send(value) }

  #[inline]
  fn send_completion(&self, completion: Completion<Err>) { self.core.send_completion(completion) }

  #[inline]
  fn is_terminated(&self) -> bool { self.core.is_terminated() }
}

impl<Item, Err> Subscriber<Item, Err> for CurrentValueSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    subscription.request(Demand::unbounded());
  }

  fn on_value(&mut self, value: Item) -> Demand {
    self.send(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) { self.send_completion(completion) }
}
