use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::SubscriptionRef,
};

/// Emits the running accumulator after every value, starting from a seed.
pub struct Scan<P, A, F> {
  pub(crate) source: P,
  pub(crate) initial: A,
  pub(crate) scan: Arc<F>,
}

impl<P, A, F> Publisher for Scan<P, A, F>
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
    self.source.subscribe(ScanSubscriber {
      downstream: subscriber,
      acc: self.initial.clone(),
      scan: self.scan.clone(),
    })
  }
}

pub struct ScanSubscriber<S, A, F> {
  downstream: S,
  acc: A,
  scan: Arc<F>,
}

impl<Item, Err, S, A, F> Subscriber<Item, Err> for ScanSubscriber<S, A, F>
where
  S: Subscriber<A, Err>,
  A: Clone + Send,
  F: Fn(A, Item) -> A + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: Item) -> Demand {
    self.acc = (self.scan)(self.acc.clone(), value);
    self.downstream.on_value(self.acc.clone())
  }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) {
    self.downstream.on_completion(completion)
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher};

  #[test]
  fn running_sum() {
    let out = Arc::new(Mutex::new(vec![]));
    let sink = out.clone();
    let _handle = publisher::sequence(vec![1, 2, 3, 4])
      .scan(10, |acc, v| acc + v)
      .sink(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*out.lock().unwrap(), vec![11, 13, 16, 20]);
  }

  #[test]
  fn each_subscription_starts_from_the_seed() {
    let source = publisher::sequence(vec![1, 1]).scan(0, |acc, v| acc + v);
    for _ in 0..2 {
      let out = Arc::new(Mutex::new(vec![]));
      let sink = out.clone();
      let _handle = source.sink(move |v| sink.lock().unwrap().push(v));
      assert_eq!(*out.lock().unwrap(), vec![1, 2]);
    }
  }
}
