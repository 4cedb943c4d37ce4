use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::SubscriptionRef,
};

/// Emits at most the first `count` values, then cancels upstream and
/// finishes.
pub struct Prefix<P> {
  pub(crate) source: P,
  pub(crate) count: usize,
}

impl<P: Publisher> Publisher for Prefix<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(PrefixSubscriber {
      downstream: subscriber,
      remaining: self.count,
      upstream: None,
      done: false,
    })
  }
}

pub struct PrefixSubscriber<S> {
  downstream: S,
  remaining: usize,
  upstream: Option<SubscriptionRef>,
  done: bool,
}

impl<S> PrefixSubscriber<S> {
  fn finish<Item, Err>(&mut self)
  where
    S: Subscriber<Item, Err>,
  {
    self.done = true;
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
    self.downstream.on_completion(Completion::Finished);
  }
}

impl<Item, Err, S> Subscriber<Item, Err> for PrefixSubscriber<S>
where
  S: Subscriber<Item, Err>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription);
    if self.remaining == 0 && !self.done {
      self.finish::<Item, Err>();
    }
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.done {
      return Demand::none();
    }
    self.remaining -= 1;
    let more = self.downstream.on_value(value);
    if self.remaining == 0 {
      self.finish::<Item, Err>();
      return Demand::none();
    }
    more
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_completion(completion);
    }
  }
}

/// Skips the first `count` values.
pub struct DropFirst<P> {
  pub(crate) source: P,
  pub(crate) count: usize,
}

impl<P: Publisher> Publisher for DropFirst<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(DropFirstSubscriber { downstream: subscriber, remaining: self.count })
  }
}

pub struct DropFirstSubscriber<S> {
  downstream: S,
  remaining: usize,
}

impl<Item, Err, S> Subscriber<Item, Err> for DropFirstSubscriber<S>
where
  S: Subscriber<Item, Err>,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.remaining > 0 {
      self.remaining -= 1;
      return Demand::bounded(1);
    }
    self.downstream.on_value(value)
  }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) {
    self.downstream.on_completion(completion)
  }
}

/// Discards every value and forwards only the terminal signal. Upstream is
/// drained with unbounded demand.
pub struct IgnoreOutput<P> {
  pub(crate) source: P,
}

impl<P: Publisher> Publisher for IgnoreOutput<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    self.source.subscribe(IgnoreOutputSubscriber(subscriber))
  }
}

pub struct IgnoreOutputSubscriber<S>(S);

impl<Item, Err, S> Subscriber<Item, Err> for IgnoreOutputSubscriber<S>
where
  S: Subscriber<Item, Err>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.0.on_subscribe(subscription.clone());
    subscription.request(Demand::unbounded());
  }

  #[inline]
  fn on_value(&mut self, _: Item) -> Demand { Demand::none() }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) { self.0.on_completion(completion) }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher};

  fn run<P>(source: P) -> Vec<String>
  where
    P: Publisher<Err = std::convert::Infallible>,
    P::Item: std::fmt::Debug,
  {
    let out = Arc::new(Mutex::new(vec![]));
    let (values, done) = (out.clone(), out.clone());
    let _handle = source.sink_all(
      move |v| values.lock().unwrap().push(format!("{v:?}")),
      move |c| done.lock().unwrap().push(format!("{c:?}")),
    );
    let result = out.lock().unwrap().clone();
    result
  }

  #[test]
  fn prefix_stops_an_infinite_source() {
    assert_eq!(run(publisher::sequence(0..).prefix(3)), vec!["0", "1", "2", "Finished"]);
    assert_eq!(run(publisher::sequence(0..).first()), vec!["0", "Finished"]);
    assert_eq!(run(publisher::sequence(0..).prefix(0)), vec!["Finished"]);
  }

  #[test]
  fn drop_first_skips() {
    assert_eq!(run(publisher::sequence(1..=4).drop_first(2)), vec!["3", "4", "Finished"]);
  }

  #[test]
  fn ignore_output_keeps_completion() {
    assert_eq!(run(publisher::sequence(1..=4).ignore_output()), vec!["Finished"]);
  }
}
