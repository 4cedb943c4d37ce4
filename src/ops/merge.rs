use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use super::relay::FanOut;
use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Emits the values of two publishers as they arrive.
///
/// Finishes once both inputs have finished; the first failure is forwarded
/// at once and the other input is cancelled.
pub struct Merge<A, B> {
  pub(crate) a: A,
  pub(crate) b: B,
}

/// Emits the values of any number of publishers of the same type as they
/// arrive. Finishes right away when `sources` is empty.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::{ops::merge::merge_all, prelude::*};
///
/// let subjects: Vec<_> = (0..3).map(|_| PassthroughSubject::<i32, ()>::new()).collect();
/// let out = Arc::new(Mutex::new(vec![]));
/// let sink = out.clone();
/// let _handle = merge_all(subjects.clone()).sink_all(move |v| sink.lock().unwrap().push(v), |_| {});
/// subjects[2].send(3);
/// subjects[0].send(1);
/// assert_eq!(*out.lock().unwrap(), vec![3, 1]);
/// ```
pub fn merge_all<P: Publisher>(sources: Vec<P>) -> MergeAll<P> { MergeAll { sources } }

pub struct MergeAll<P> {
  sources: Vec<P>,
}

impl<A, B> Publisher for Merge<A, B>
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
    let merged = MergeInputs::start(subscriber, 2);
    self.a.subscribe(merged.input());
    self.b.subscribe(merged.input());
  }
}

impl<P: Publisher> Publisher for MergeAll<P> {
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    let merged = MergeInputs::start(subscriber, self.sources.len());
    for source in &self.sources {
      source.subscribe(merged.input());
    }
  }
}

struct MergeInputs<Item, Err> {
  buffer: DemandBuffer<Item, Err>,
  inputs: FanOut,
  remaining: Arc<AtomicUsize>,
}

impl<Item, Err> MergeInputs<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn start<S>(subscriber: S, count: usize) -> Self
  where
    S: Subscriber<Item, Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let inputs = FanOut::default();
    if count == 0 {
      buffer.complete(Completion::Finished);
    }
    buffer.attach(Some(Arc::new(inputs.clone())));
    MergeInputs { buffer, inputs, remaining: Arc::new(AtomicUsize::new(count)) }
  }

  fn input(&self) -> MergeSubscriber<Item, Err> {
    let (_, proxy) = self.inputs.add();
    MergeSubscriber {
      buffer: self.buffer.clone(),
      inputs: self.inputs.clone(),
      proxy,
      remaining: self.remaining.clone(),
    }
  }
}

pub struct MergeSubscriber<Item, Err> {
  buffer: DemandBuffer<Item, Err>,
  inputs: FanOut,
  proxy: SubscriptionProxy,
  remaining: Arc<AtomicUsize>,
}

impl<Item, Err> Subscriber<Item, Err> for MergeSubscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
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
      Completion::Finished => {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
          self.buffer.complete(Completion::Finished);
        }
      }
      failed => {
        self.buffer.complete(failed);
        self.inputs.cancel();
      }
    }
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{prelude::*, publisher};

  type Events = Arc<Mutex<Vec<String>>>;

  fn record_into<P>(source: P, events: &Events) -> Cancellable
  where
    P: Publisher,
    P::Item: std::fmt::Debug,
    P::Err: std::fmt::Debug,
  {
    let (values, done) = (events.clone(), events.clone());
    source.sink_all(
      move |v| values.lock().unwrap().push(format!("{v:?}")),
      move |c| done.lock().unwrap().push(format!("{c:?}")),
    )
  }

  #[test]
  fn interleaves_in_arrival_order() {
    let a = PassthroughSubject::<i32, ()>::new();
    let b = PassthroughSubject::<i32, ()>::new();
    let events = Events::default();
    let _handle = record_into(a.clone().merge(b.clone()), &events);

    a.send(1);
    b.send(2);
    a.send_completion(Completion::Finished);
    b.send(3);
    assert_eq!(*events.lock().unwrap(), vec!["1", "2", "3"]);
    b.send_completion(Completion::Finished);
    assert_eq!(events.lock().unwrap().last().unwrap(), "Finished");
  }

  #[test]
  fn first_failure_cancels_the_rest() {
    let a = PassthroughSubject::<i32, &str>::new();
    let b = PassthroughSubject::<i32, &str>::new();
    let events = Events::default();
    let _handle = record_into(a.clone().merge(b.clone()), &events);

    a.send_completion(Completion::Failed("a broke"));
    b.send(9);
    assert_eq!(*events.lock().unwrap(), vec!["Failed(\"a broke\")"]);
  }

  #[test]
  fn prefix_cancels_remaining_inputs() {
    let source = merge_all(vec![publisher::sequence(0..3), publisher::sequence(10..13)]).prefix(4);
    let events = Events::default();
    let _handle = record_into(source, &events);
    assert_eq!(*events.lock().unwrap(), vec!["0", "1", "2", "10", "Finished"]);
  }

  #[test]
  fn empty_merge_finishes() {
    let events = Events::default();
    let _handle = record_into(merge_all(Vec::<publisher::Just<i32>>::new()), &events);
    assert_eq!(*events.lock().unwrap(), vec!["Finished"]);
  }
}
