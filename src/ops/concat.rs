use std::sync::Arc;

use super::relay::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{SubscriptionProxy, SubscriptionRef},
};

/// Emits every value of `first`, then, once it finishes, every value of
/// `second`. Backs both `append` and `prepend`.
pub struct Concat<A, B> {
  pub(crate) first: A,
  pub(crate) second: Arc<B>,
}

impl<A, B> Publisher for Concat<A, B>
where
  A: Publisher,
  B: Publisher<Item = A::Item, Err = A::Err>,
{
  type Item = A::Item;
  type Err = A::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<A::Item, A::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let proxy = SubscriptionProxy::new();
    buffer.attach(Some(Arc::new(proxy.clone())));
    self.first.subscribe(ConcatSubscriber { buffer, proxy, second: self.second.clone() })
  }
}

pub struct ConcatSubscriber<Item, Err, B> {
  buffer: DemandBuffer<Item, Err>,
  proxy: SubscriptionProxy,
  second: Arc<B>,
}

impl<Item, Err, B> Subscriber<Item, Err> for ConcatSubscriber<Item, Err, B>
where
  Item: Send + 'static,
  Err: Send + 'static,
  B: Publisher<Item = Item, Err = Err>,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand {
    self.buffer.push(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if completion.is_failed() || self.buffer.is_closed() {
      self.buffer.complete(completion);
      return;
    }
    self.proxy.unbind(self.buffer.outstanding());
    self.second.subscribe(Relay { buffer: self.buffer.clone(), proxy: self.proxy.clone() });
  }
}
