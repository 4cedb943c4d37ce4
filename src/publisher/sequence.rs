use std::{convert::Infallible, iter::Peekable, sync::Arc};

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
  subscription::Subscription,
};

/// Emits one value, then finishes.
pub fn just<T>(value: T) -> Just<T>
where
  T: Clone + Send + Sync + 'static,
{
  Just(value)
}

/// Emits every element of `iter` in order, then finishes.
///
/// Elements are pulled lazily, one per unit of demand, so an infinite
/// iterator is fine as long as the subscriber's demand is bounded.
pub fn sequence<I>(iter: I) -> Sequence<I>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  Sequence(iter)
}

/// Replays `values` and then the recorded terminal signal.
pub fn record<T, E>(values: Vec<T>, completion: Completion<E>) -> Record<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  Record { values, completion }
}

#[derive(Clone, Debug)]
pub struct Just<T>(T);

#[derive(Clone, Debug)]
pub struct Sequence<I>(I);

#[derive(Clone, Debug)]
pub struct Record<T, E> {
  values: Vec<T>,
  completion: Completion<E>,
}

impl<T> Publisher for Just<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Item = T;
  type Err = Infallible;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, Infallible> + 'static,
  {
    IterSubscription::start(std::iter::once(self.0.clone()), Completion::Finished, subscriber)
  }
}

impl<I> Publisher for Sequence<I>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  type Item = I::Item;
  type Err = Infallible;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<I::Item, Infallible> + 'static,
  {
    IterSubscription::start(self.0.clone().into_iter(), Completion::Finished, subscriber)
  }
}

impl<T, E> Publisher for Record<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    IterSubscription::start(self.values.clone().into_iter(), self.completion.clone(), subscriber)
  }
}

/// Pull-based subscription over an iterator: an element is taken from the
/// iterator only when a unit of demand is available for it. The terminal
/// signal needs no demand and follows the last element immediately.
pub(crate) struct IterSubscription<It: Iterator, Err>(MutArc<IterState<It, Err>>);

struct IterState<It: Iterator, Err> {
  subscriber: Option<BoxedSubscriber<It::Item, Err>>,
  iter: Peekable<It>,
  completion: Option<Completion<Err>>,
  demand: Demand,
  emitting: bool,
  closed: bool,
}

impl<It: Iterator, Err> Clone for IterSubscription<It, Err> {
  fn clone(&self) -> Self { IterSubscription(self.0.clone()) }
}

impl<It, Err> IterSubscription<It, Err>
where
  It: Iterator + Send + 'static,
  It::Item: Send + 'static,
  Err: Send + 'static,
{
  pub(crate) fn start<S>(iter: It, completion: Completion<Err>, subscriber: S)
  where
    S: Subscriber<It::Item, Err> + 'static,
  {
    let this = IterSubscription(MutArc::own(IterState {
      subscriber: None,
      iter: iter.peekable(),
      completion: Some(completion),
      demand: Demand::NONE,
      emitting: true,
      closed: false,
    }));
    let mut subscriber: BoxedSubscriber<It::Item, Err> = Box::new(subscriber);
    subscriber.on_subscribe(Arc::new(this.clone()));

    let mut state = this.0.rc_deref_mut();
    if state.closed {
      return;
    }
    state.subscriber = Some(subscriber);
    state.emitting = false;
    drop(state);
    this.emit();
  }

  fn emit(&self) {
    let mut state = self.0.rc_deref_mut();
    if state.emitting || state.closed {
      return;
    }
    state.emitting = true;
    loop {
      if state.closed {
        state.emitting = false;
        let subscriber = state.subscriber.take();
        drop(state);
        drop(subscriber);
        return;
      }

      if state.iter.peek().is_none() {
        state.closed = true;
        state.emitting = false;
        let subscriber = state.subscriber.take();
        let completion = state.completion.take();
        drop(state);
        if let (Some(mut subscriber), Some(completion)) = (subscriber, completion) {
          subscriber.on_completion(completion);
        }
        return;
      }

      if state.demand.is_zero() {
        state.emitting = false;
        return;
      }
      let (Some(value), Some(mut subscriber)) = (state.iter.next(), state.subscriber.take()) else {
        state.emitting = false;
        return;
      };
      state.demand = state.demand.saturating_decrement();
      drop(state);

      let more = subscriber.on_value(value);

      state = self.0.rc_deref_mut();
      state.subscriber = Some(subscriber);
      state.demand += more;
    }
  }
}

impl<It, Err> Subscription for IterSubscription<It, Err>
where
  It: Iterator + Send + 'static,
  It::Item: Send + 'static,
  Err: Send + 'static,
{
  fn request(&self, demand: Demand) {
    let mut state = self.0.rc_deref_mut();
    if state.closed || demand.is_zero() {
      return;
    }
    state.demand += demand;
    drop(state);
    self.emit();
  }

  fn cancel(&self) {
    let mut state = self.0.rc_deref_mut();
    if state.closed {
      return;
    }
    state.closed = true;
    let subscriber = if state.emitting { None } else { state.subscriber.take() };
    drop(state);
    drop(subscriber);
  }
}
