use super::{subject_core::SubjectCore, Subject};
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, Subscriber},
  subscription::SubscriptionRef,
};

/// A subject without history.
///
/// Values reach only the subscribers that are attached and have demand at
/// the moment of `send`. A subscriber attaching after termination receives
/// its subscription and nothing else.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::prelude::*;
///
/// let subject = PassthroughSubject::<i32, ()>::new();
/// subject.send(0);
///
/// let out = Arc::new(Mutex::new(vec![]));
/// let sink = out.clone();
/// let _handle = subject.sink_all(move |v| sink.lock().unwrap().push(v), |_| {});
/// subject.send(1);
/// subject.send(2);
/// assert_eq!(*out.lock().unwrap(), vec![1, 2]);
/// ```
pub struct PassthroughSubject<Item, Err> {
  core: SubjectCore<Item, Err>,
}

impl<Item, Err> Clone for PassthroughSubject<Item, Err> {
  fn clone(&self) -> Self { PassthroughSubject { core: self.core.clone() } }
}

impl<Item, Err> Default for PassthroughSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  fn default() -> Self { PassthroughSubject { core: SubjectCore::new(None) } }
}

impl<Item, Err> PassthroughSubject<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub fn new() -> Self { Self::default() }

  /// Number of subscribers currently attached.
  pub fn subscriber_count(&self) -> usize { self.core.subscriber_count() }
}

impl<Item, Err> Publisher for PassthroughSubject<Item, Err>
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
    self.core.attach(subscriber, Backpressure::Drop, false)
  }
}

impl<Item, Err> Subject<Item, Err> for PassthroughSubject<Item, Err>
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

impl<Item, Err> Subscriber<Item, Err> for PassthroughSubject<Item, Err>
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
