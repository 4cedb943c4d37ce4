use std::{convert::Infallible, sync::Arc};

use super::relay::Relay;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{SubscriptionProxy, SubscriptionRef},
};

/// On failure, continues with a fallback publisher built from the error.
///
/// Downstream keeps its subscription across the switch: demand it has
/// requested and not yet received is requested from the fallback.
pub struct Catch<P, F> {
  pub(crate) source: P,
  pub(crate) handler: Arc<F>,
}

impl<P, F, Q> Publisher for Catch<P, F>
where
  P: Publisher,
  F: Fn(P::Err) -> Q + Send + Sync + 'static,
  Q: Publisher<Item = P::Item>,
{
  type Item = P::Item;
  type Err = Q::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, Q::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let proxy = SubscriptionProxy::new();
    buffer.attach(Some(Arc::new(proxy.clone())));
    self.source.subscribe(CatchSubscriber { buffer, proxy, handler: self.handler.clone() })
  }
}

pub struct CatchSubscriber<Item, E, F> {
  buffer: DemandBuffer<Item, E>,
  proxy: SubscriptionProxy,
  handler: Arc<F>,
}

impl<Item, Err, E, F, Q> Subscriber<Item, Err> for CatchSubscriber<Item, E, F>
where
  Item: Send + 'static,
  E: Send + 'static,
  F: Fn(Err) -> Q + Send + Sync,
  Q: Publisher<Item = Item, Err = E>,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand {
    self.buffer.push(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => self.buffer.complete(Completion::Finished),
      Completion::Failed(err) => {
        if self.buffer.is_closed() {
          return;
        }
        self.proxy.unbind(self.buffer.outstanding());
        let fallback = (self.handler)(err);
        fallback.subscribe(Relay { buffer: self.buffer.clone(), proxy: self.proxy.clone() });
      }
    }
  }
}

/// On failure, emits a fallback value and finishes.
pub struct ReplaceError<P: Publisher> {
  pub(crate) source: P,
  pub(crate) value: P::Item,
}

impl<P> Publisher for ReplaceError<P>
where
  P: Publisher,
  P::Item: Clone + Sync,
{
  type Item = P::Item;
  type Err = Infallible;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, Infallible> + 'static,
  {
    self.source.subscribe(ReplaceErrorSubscriber {
      buffer: DemandBuffer::new(subscriber, Backpressure::Buffer),
      value: Some(self.value.clone()),
    })
  }
}

pub struct ReplaceErrorSubscriber<Item> {
  buffer: DemandBuffer<Item, Infallible>,
  value: Option<Item>,
}

impl<Item, Err> Subscriber<Item, Err> for ReplaceErrorSubscriber<Item>
where
  Item: Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.buffer.attach(Some(subscription)); }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand {
    self.buffer.push(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if completion.is_failed() {
      if let Some(value) = self.value.take() {
        self.buffer.push(value);
      }
    }
    self.buffer.complete(Completion::Finished);
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher, subscription::SubscriptionRef};

  type Events = Arc<Mutex<Vec<String>>>;

  struct Pull(Events, u64, Arc<Mutex<Option<SubscriptionRef>>>);

  impl<T: std::fmt::Debug, E: std::fmt::Debug> Subscriber<T, E> for Pull {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(Demand::bounded(self.1));
      *self.2.lock().unwrap() = Some(subscription);
    }

    fn on_value(&mut self, value: T) -> Demand {
      self.0.lock().unwrap().push(format!("{value:?}"));
      Demand::none()
    }

    fn on_completion(&mut self, completion: Completion<E>) {
      self.0.lock().unwrap().push(format!("{completion:?}"));
    }
  }

  #[test]
  fn catch_switches_to_fallback_with_outstanding_demand() {
    let events = Events::default();
    let handle = Arc::new(Mutex::new(None));
    publisher::record(vec![1, 2], Completion::Failed("boom"))
      .catch(|_| publisher::sequence(vec![10, 20, 30]))
      .subscribe(Pull(events.clone(), 3, handle.clone()));
    assert_eq!(*events.lock().unwrap(), vec!["1", "2", "10"]);

    handle.lock().unwrap().clone().unwrap().request(Demand::bounded(5));
    assert_eq!(*events.lock().unwrap(), vec!["1", "2", "10", "20", "30", "Finished"]);
  }

  #[test]
  fn catch_passes_finished_through() {
    let events = Events::default();
    publisher::record(vec![1], Completion::<&str>::Finished)
      .catch(|_| publisher::just(99))
      .subscribe(Pull(events.clone(), 5, Default::default()));
    assert_eq!(*events.lock().unwrap(), vec!["1", "Finished"]);
  }

  #[test]
  fn replace_error_emits_fallback_once() {
    let events = Events::default();
    publisher::record(vec![1], Completion::Failed("boom"))
      .replace_error(0)
      .subscribe(Pull(events.clone(), 5, Default::default()));
    assert_eq!(*events.lock().unwrap(), vec!["1", "0", "Finished"]);
  }
}
