use std::{collections::VecDeque, sync::Arc};

use super::relay::FanOut;
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Pairs the i-th value of `a` with the i-th value of `b`.
///
/// Each input receives the downstream demand as is, so `n` requested pairs
/// pull at most `n` values from either side. Finishes as soon as one side
/// has finished and has no buffered value left to pair.
pub struct Zip<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

impl<A, B> Publisher for Zip<A, B>
where
  A: Publisher,
  B: Publisher<Err = A::Err>,
{
  type Item = (A::Item, B::Item);
  type Err = A::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<(A::Item, B::Item), A::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let inputs = FanOut::default();
    buffer.attach(Some(Arc::new(inputs.clone())));
    let state = ZipState {
      queues: MutArc::own(ZipQueues::default()),
      buffer,
      inputs: inputs.clone(),
    };
    let state = Arc::new(state);
    let (_, left) = inputs.add();
    self.a.subscribe(ZipLeft { state: state.clone(), proxy: left });
    let (_, right) = inputs.add();
    self.b.subscribe(ZipRight { state, proxy: right });
  }
}

struct ZipQueues<A, B> {
  a: VecDeque<A>,
  b: VecDeque<B>,
  a_done: bool,
  b_done: bool,
}

impl<A, B> Default for ZipQueues<A, B> {
  fn default() -> Self {
    ZipQueues { a: VecDeque::new(), b: VecDeque::new(), a_done: false, b_done: false }
  }
}

impl<A, B> ZipQueues<A, B> {
  fn next_pair(&mut self) -> Option<(A, B)> {
    if self.a.is_empty() || self.b.is_empty() {
      return None;
    }
    self.a.pop_front().zip(self.b.pop_front())
  }

  fn exhausted(&self) -> bool {
    (self.a_done && self.a.is_empty()) || (self.b_done && self.b.is_empty())
  }
}

struct ZipState<A, B, Err> {
  queues: MutArc<ZipQueues<A, B>>,
  buffer: DemandBuffer<(A, B), Err>,
  inputs: FanOut,
}

impl<A, B, Err> ZipState<A, B, Err>
where
  A: Send + 'static,
  B: Send + 'static,
  Err: Send + 'static,
{
  fn update(&self, f: impl FnOnce(&mut ZipQueues<A, B>)) {
    let mut queues = self.queues.rc_deref_mut();
    f(&mut queues);
    // Pairs are queued while the queues are locked, so they reach
    // downstream in pairing order even when both inputs emit concurrently.
    if let Some(pair) = queues.next_pair() {
      self.buffer.enqueue(pair);
    }
    let exhausted = queues.exhausted();
    let released =
      if exhausted { self.buffer.enqueue_completion(Completion::Finished) } else { None };
    drop(queues);
    drop(released);

    self.buffer.flush();
    if exhausted {
      self.inputs.cancel();
    }
  }

  fn fail(&self, completion: Completion<Err>) {
    self.buffer.complete(completion);
    self.inputs.cancel();
  }
}

pub struct ZipLeft<St> {
  state: Arc<St>,
  proxy: SubscriptionProxy,
}

pub struct ZipRight<St> {
  state: Arc<St>,
  proxy: SubscriptionProxy,
}

impl<A, B, Err> Subscriber<A, Err> for ZipLeft<ZipState<A, B, Err>>
where
  A: Send + 'static,
  B: Send + 'static,
  Err: Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  fn on_value(&mut self, value: A) -> Demand {
    self.state.update(|q| q.a.push_back(value));
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => self.state.update(|q| q.a_done = true),
      failed => self.state.fail(failed),
    }
  }
}

impl<A, B, Err> Subscriber<B, Err> for ZipRight<ZipState<A, B, Err>>
where
  A: Send + 'static,
  B: Send + 'static,
  Err: Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  fn on_value(&mut self, value: B) -> Demand {
    self.state.update(|q| q.b.push_back(value));
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => self.state.update(|q| q.b_done = true),
      failed => self.state.fail(failed),
    }
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher, subscription::SubscriptionRef};

  type Events = Arc<Mutex<Vec<String>>>;

  struct Take(Events, u64);

  impl<T: std::fmt::Debug, E: std::fmt::Debug> Subscriber<T, E> for Take {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(Demand::bounded(self.1));
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
  fn pairs_by_index_and_stops_at_the_shorter_side() {
    let events = Events::default();
    publisher::sequence(vec![1, 2, 3])
      .zip(publisher::sequence(vec!["a", "b"]))
      .subscribe(Take(events.clone(), 10));
    assert_eq!(*events.lock().unwrap(), vec!["(1, \"a\")", "(2, \"b\")", "Finished"]);
  }

  #[test]
  fn bounded_demand_limits_both_sides() {
    let events = Events::default();
    publisher::sequence(0..)
      .zip(publisher::sequence(10..))
      .subscribe(Take(events.clone(), 2));
    assert_eq!(*events.lock().unwrap(), vec!["(0, 10)", "(1, 11)"]);
  }

  #[test]
  fn waits_for_the_slower_side() {
    let a = PassthroughSubject::<i32, ()>::new();
    let b = PassthroughSubject::<char, ()>::new();
    let events = Events::default();
    a.clone().zip(b.clone()).subscribe(Take(events.clone(), 10));

    a.send(1);
    a.send(2);
    assert!(events.lock().unwrap().is_empty());
    b.send('x');
    a.send_completion(Completion::Finished);
    assert_eq!(*events.lock().unwrap(), vec!["(1, 'x')"]);
    b.send('y');
    assert_eq!(*events.lock().unwrap(), vec!["(1, 'x')", "(2, 'y')", "Finished"]);
  }
}
