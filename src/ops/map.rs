use std::{convert::Infallible, marker::PhantomData, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Completion, Subscriber},
  subscription::SubscriptionRef,
};

/// Transforms every value with a function.
pub struct Map<P, F> {
  pub(crate) source: P,
  pub(crate) map: Arc<F>,
}

impl<P, F, B> Publisher for Map<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> B + Send + Sync + 'static,
  B: Send + 'static,
{
  type Item = B;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<B, P::Err> + 'static,
  {
    self.source.subscribe(MapSubscriber { downstream: subscriber, map: self.map.clone() })
  }
}

pub struct MapSubscriber<S, F> {
  downstream: S,
  map: Arc<F>,
}

impl<Item, Err, B, S, F> Subscriber<Item, Err> for MapSubscriber<S, F>
where
  S: Subscriber<B, Err>,
  F: Fn(Item) -> B + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { self.downstream.on_value((self.map)(value)) }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) {
    self.downstream.on_completion(completion)
  }
}

/// Transforms every value with a fallible function; the first error fails
/// the stream and cancels the upstream.
pub struct TryMap<P, F> {
  pub(crate) source: P,
  pub(crate) map: Arc<F>,
}

impl<P, F, B> Publisher for TryMap<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> Result<B, P::Err> + Send + Sync + 'static,
  B: Send + 'static,
{
  type Item = B;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<B, P::Err> + 'static,
  {
    self.source.subscribe(TryMapSubscriber {
      downstream: subscriber,
      map: self.map.clone(),
      upstream: None,
      done: false,
    })
  }
}

pub struct TryMapSubscriber<S, F> {
  downstream: S,
  map: Arc<F>,
  upstream: Option<SubscriptionRef>,
  done: bool,
}

impl<Item, Err, B, S, F> Subscriber<Item, Err> for TryMapSubscriber<S, F>
where
  S: Subscriber<B, Err>,
  F: Fn(Item) -> Result<B, Err> + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.upstream = Some(subscription.clone());
    self.downstream.on_subscribe(subscription)
  }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.done {
      return Demand::none();
    }
    match (self.map)(value) {
      Ok(mapped) => self.downstream.on_value(mapped),
      Err(err) => {
        self.done = true;
        if let Some(upstream) = self.upstream.take() {
          upstream.cancel();
        }
        self.downstream.on_completion(Completion::Failed(err));
        Demand::none()
      }
    }
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if !self.done {
      self.done = true;
      self.upstream = None;
      self.downstream.on_completion(completion)
    }
  }
}

/// Converts the failure with a function.
pub struct MapError<P, F> {
  pub(crate) source: P,
  pub(crate) map: Arc<F>,
}

impl<P, F, E> Publisher for MapError<P, F>
where
  P: Publisher,
  F: Fn(P::Err) -> E + Send + Sync + 'static,
  E: Send + 'static,
{
  type Item = P::Item;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, E> + 'static,
  {
    self.source.subscribe(MapErrorSubscriber { downstream: subscriber, map: self.map.clone() })
  }
}

pub struct MapErrorSubscriber<S, F> {
  downstream: S,
  map: Arc<F>,
}

impl<Item, Err, E, S, F> Subscriber<Item, Err> for MapErrorSubscriber<S, F>
where
  S: Subscriber<Item, E>,
  F: Fn(Err) -> E + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { self.downstream.on_value(value) }

  fn on_completion(&mut self, completion: Completion<Err>) {
    let map = &self.map;
    self.downstream.on_completion(completion.map_err(|err| map(err)))
  }
}

/// Gives a publisher that cannot fail any failure type, so that it can be
/// combined with publishers that can.
pub struct SetFailureType<P, E> {
  pub(crate) source: P,
  pub(crate) _err: PhantomData<fn() -> E>,
}

impl<P, E> Publisher for SetFailureType<P, E>
where
  P: Publisher<Err = Infallible>,
  E: Send + 'static,
{
  type Item = P::Item;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, E> + 'static,
  {
    self.source.subscribe(SetFailureTypeSubscriber { downstream: subscriber, _err: PhantomData })
  }
}

pub struct SetFailureTypeSubscriber<S, E> {
  downstream: S,
  _err: PhantomData<fn() -> E>,
}

impl<Item, E, S> Subscriber<Item, Infallible> for SetFailureTypeSubscriber<S, E>
where
  S: Subscriber<Item, E>,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(subscription)
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { self.downstream.on_value(value) }

  fn on_completion(&mut self, completion: Completion<Infallible>) {
    match completion {
      Completion::Finished => self.downstream.on_completion(Completion::Finished),
      Completion::Failed(never) => match never {},
    }
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher};

  #[test]
  fn maps_values() {
    let out = Arc::new(Mutex::new(vec![]));
    let sink = out.clone();
    let _handle = publisher::sequence(1..=3)
      .map(|v| v * 2)
      .sink(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*out.lock().unwrap(), vec![2, 4, 6]);
  }

  #[test]
  fn try_map_fails_on_first_error() {
    let out = Arc::new(Mutex::new(vec![]));
    let (values, done) = (out.clone(), out.clone());
    let _handle = publisher::sequence(vec![1, 2, 3, 4])
      .set_failure_type::<String>()
      .try_map(|v| if v == 3 { Err(format!("bad {v}")) } else { Ok(v) })
      .sink_all(
        move |v| values.lock().unwrap().push(format!("{v}")),
        move |c| done.lock().unwrap().push(format!("{c:?}")),
      );
    assert_eq!(*out.lock().unwrap(), vec!["1", "2", "Failed(\"bad 3\")"]);
  }

  #[test]
  fn map_error_converts_failure() {
    let out = Arc::new(Mutex::new(None));
    let slot = out.clone();
    let _handle = publisher::fail::<i32, _>(404u16)
      .map_error(|code| format!("status {code}"))
      .sink_all(|_| {}, move |c| *slot.lock().unwrap() = Some(c));
    assert_eq!(*out.lock().unwrap(), Some(Completion::Failed("status 404".to_owned())));
  }
}
