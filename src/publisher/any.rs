use std::sync::Arc;

use crate::{
  publisher::Publisher,
  subscriber::{BoxedSubscriber, Subscriber},
};

/// Object-safe face of [`Publisher`]. Every publisher implements it; use it
/// through [`AnyPublisher`].
pub trait DynPublisher<Item, Err>: Send + Sync {
  fn dyn_subscribe(&self, subscriber: BoxedSubscriber<Item, Err>);
}

impl<P: Publisher> DynPublisher<P::Item, P::Err> for P {
  #[inline]
  fn dyn_subscribe(&self, subscriber: BoxedSubscriber<P::Item, P::Err>) { self.subscribe(subscriber) }
}

/// A type-erased publisher: hides the concrete operator chain behind it and
/// exposes only its item and failure types.
///
/// Cloning is cheap and shares the erased chain.
pub struct AnyPublisher<Item, Err>(Arc<dyn DynPublisher<Item, Err>>);

impl<Item, Err> AnyPublisher<Item, Err> {
  pub fn new<P>(publisher: P) -> Self
  where
    P: Publisher<Item = Item, Err = Err>,
  {
    AnyPublisher(Arc::new(publisher))
  }
}

impl<Item, Err> Clone for AnyPublisher<Item, Err> {
  fn clone(&self) -> Self { AnyPublisher(self.0.clone()) }
}

impl<Item, Err> Publisher for AnyPublisher<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    self.0.dyn_subscribe(Box::new(subscriber))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{
    demand::Demand,
    publisher::{just, sequence},
    subscriber::Completion,
    subscription::SubscriptionRef,
  };

  struct Collect(Arc<Mutex<Vec<i32>>>);

  impl<E> Subscriber<i32, E> for Collect {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(Demand::unbounded());
    }

    fn on_value(&mut self, value: i32) -> Demand {
      self.0.lock().unwrap().push(value);
      Demand::none()
    }

    fn on_completion(&mut self, _: Completion<E>) {}
  }

  #[test]
  fn erased_publishers_share_one_type() {
    let sources: Vec<AnyPublisher<i32, std::convert::Infallible>> =
      vec![AnyPublisher::new(just(1)), AnyPublisher::new(sequence(vec![2, 3]))];
    let out = Arc::new(Mutex::new(vec![]));
    for source in &sources {
      source.subscribe(Collect(out.clone()));
    }
    assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
  }
}
