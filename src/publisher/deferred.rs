use crate::{publisher::Publisher, subscriber::Subscriber};

/// Builds a fresh publisher for every subscriber.
///
/// Useful to delay the construction of an expensive or eager publisher (a
/// [`Promise`](crate::publisher::Promise) starts its work on creation) until
/// somebody actually subscribes.
pub fn deferred<F, P>(factory: F) -> Deferred<F>
where
  F: Fn() -> P + Send + Sync + 'static,
  P: Publisher,
{
  Deferred(factory)
}

#[derive(Clone)]
pub struct Deferred<F>(F);

impl<F, P> Publisher for Deferred<F>
where
  F: Fn() -> P + Send + Sync + 'static,
  P: Publisher,
{
  type Item = P::Item;
  type Err = P::Err;

  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    (self.0)().subscribe(subscriber)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::{
    demand::Demand,
    publisher::just,
    subscriber::Completion,
    subscription::SubscriptionRef,
  };

  struct Request;

  impl<T, E> Subscriber<T, E> for Request {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(Demand::unbounded());
    }

    fn on_value(&mut self, _: T) -> Demand { Demand::none() }

    fn on_completion(&mut self, _: Completion<E>) {}
  }

  #[test]
  fn factory_runs_per_subscription() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let source = deferred(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      just(1)
    });
    assert_eq!(built.load(Ordering::SeqCst), 0);

    source.subscribe(Request);
    source.subscribe(Request);
    assert_eq!(built.load(Ordering::SeqCst), 2);
  }
}
