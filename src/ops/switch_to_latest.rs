use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Flattens a publisher of publishers by following only the most recent
/// inner publisher.
///
/// Each new inner publisher cancels the previous one, and anything the
/// previous one emits afterwards is ignored. Values it handed over before
/// the switch that are still waiting for downstream demand are delivered
/// first. Finishes once upstream and the current inner publisher have both
/// finished.
pub struct SwitchToLatest<P> {
  pub(crate) source: P,
}

impl<P> Publisher for SwitchToLatest<P>
where
  P: Publisher,
  P::Item: Publisher<Err = P::Err>,
{
  type Item = <P::Item as Publisher>::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Self::Item, P::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let outer = SubscriptionProxy::new();
    let state = MutArc::own(SwitchState::default());
    buffer.attach(Some(Arc::new(SwitchUpstream { outer: outer.clone(), state: state.clone() })));

    outer.request(Demand::Unbounded);
    let core = Arc::new(SwitchCore { buffer, outer, state });
    self.source.subscribe(SwitchOuter { core })
  }
}

#[derive(Default)]
struct SwitchState {
  generation: u64,
  inner: Option<SubscriptionProxy>,
  outer_done: bool,
  cancelled: bool,
}

struct SwitchUpstream {
  outer: SubscriptionProxy,
  state: MutArc<SwitchState>,
}

impl Subscription for SwitchUpstream {
  fn request(&self, demand: Demand) {
    let inner = self.state.rc_deref_mut().inner.clone();
    if let Some(inner) = inner {
      inner.request(demand);
    }
  }

  fn cancel(&self) {
    let mut state = self.state.rc_deref_mut();
    state.cancelled = true;
    let inner = state.inner.take();
    drop(state);
    self.outer.cancel();
    if let Some(inner) = inner {
      inner.cancel();
    }
  }
}

pub struct SwitchCore<O, Err> {
  buffer: DemandBuffer<O, Err>,
  outer: SubscriptionProxy,
  state: MutArc<SwitchState>,
}

impl<O, Err> SwitchCore<O, Err>
where
  O: Send + 'static,
  Err: Send + 'static,
{
  fn is_current(&self, generation: u64) -> bool {
    let state = self.state.rc_deref_mut();
    !state.cancelled && state.generation == generation
  }

  fn fail(&self, completion: Completion<Err>) {
    let inner = self.state.rc_deref_mut().inner.take();
    self.buffer.complete(completion);
    self.outer.cancel();
    if let Some(inner) = inner {
      inner.cancel();
    }
  }
}

pub struct SwitchOuter<C> {
  core: Arc<C>,
}

impl<Q, O, Err> Subscriber<Q, Err> for SwitchOuter<SwitchCore<O, Err>>
where
  Q: Publisher<Item = O, Err = Err>,
  O: Send + 'static,
  Err: Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.core.outer.bind(subscription); }

  fn on_value(&mut self, inner: Q) -> Demand {
    let proxy = SubscriptionProxy::new();
    let mut state = self.core.state.rc_deref_mut();
    if state.cancelled {
      return Demand::none();
    }
    state.generation += 1;
    let generation = state.generation;
    let previous = state.inner.replace(proxy.clone());
    drop(state);

    if let Some(previous) = previous {
      previous.cancel();
    }
    proxy.request(self.core.buffer.outstanding());
    inner.subscribe(SwitchInner { core: self.core.clone(), generation, proxy });
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        let mut state = self.core.state.rc_deref_mut();
        state.outer_done = true;
        let idle = state.inner.is_none();
        drop(state);
        if idle {
          self.core.buffer.complete(Completion::Finished);
        }
      }
      failed => self.core.fail(failed),
    }
  }
}

pub struct SwitchInner<C> {
  core: Arc<C>,
  generation: u64,
  proxy: SubscriptionProxy,
}

impl<O, Err> Subscriber<O, Err> for SwitchInner<SwitchCore<O, Err>>
where
  O: Send + 'static,
  Err: Send + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  fn on_value(&mut self, value: O) -> Demand {
    if self.core.is_current(self.generation) {
      self.core.buffer.push(value);
    } else {
      log::trace!("value from a replaced inner publisher is ignored");
    }
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if !self.core.is_current(self.generation) {
      return;
    }
    match completion {
      Completion::Finished => {
        let mut state = self.core.state.rc_deref_mut();
        state.inner = None;
        let done = state.outer_done;
        drop(state);
        if done {
          self.core.buffer.complete(Completion::Finished);
        }
      }
      failed => self.core.fail(failed),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, subscription::EmptySubscription};

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
  fn follows_only_the_latest_inner() {
    let outer = PassthroughSubject::<PassthroughSubject<i32, ()>, ()>::new();
    let (a, b) = (PassthroughSubject::new(), PassthroughSubject::new());
    let events = Events::default();
    let _handle = record_into(outer.clone().switch_to_latest(), &events);

    outer.send(a.clone());
    a.send(1);
    outer.send(b.clone());
    a.send(2);
    b.send(3);
    outer.send_completion(Completion::Finished);
    assert_eq!(*events.lock().unwrap(), vec!["1", "3"]);

    a.send_completion(Completion::Finished);
    assert_eq!(*events.lock().unwrap(), vec!["1", "3"]);
    b.send_completion(Completion::Finished);
    assert_eq!(*events.lock().unwrap(), vec!["1", "3", "Finished"]);
  }

  #[test]
  fn inner_failure_fails_the_stream() {
    let outer = PassthroughSubject::<PassthroughSubject<i32, &str>, &str>::new();
    let inner = PassthroughSubject::new();
    let events = Events::default();
    let _handle = record_into(outer.clone().switch_to_latest(), &events);

    outer.send(inner.clone());
    inner.send_completion(Completion::Failed("inner broke"));
    outer.send(PassthroughSubject::new());
    assert_eq!(*events.lock().unwrap(), vec!["Failed(\"inner broke\")"]);
  }

  #[test]
  fn cancel_reaches_outer_and_inner() {
    let outer = PassthroughSubject::<PassthroughSubject<i32, ()>, ()>::new();
    let inner = PassthroughSubject::new();
    let events = Events::default();
    let mut handle = record_into(outer.clone().switch_to_latest(), &events);

    outer.send(inner.clone());
    handle.cancel();
    inner.send(1);
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(outer.subscriber_count(), 0);
    assert_eq!(inner.subscriber_count(), 0);
  }

  /// Emits all its values on subscribe, whatever the demand.
  struct Eager(Vec<i32>);

  impl Publisher for Eager {
    type Item = i32;
    type Err = ();

    fn subscribe<S>(&self, mut subscriber: S)
    where
      S: Subscriber<i32, ()> + 'static,
    {
      subscriber.on_subscribe(EmptySubscription::shared());
      for v in &self.0 {
        subscriber.on_value(*v);
      }
    }
  }

  struct Pull(Events, Arc<Mutex<Option<SubscriptionRef>>>);

  impl Subscriber<i32, ()> for Pull {
    fn on_subscribe(&mut self, subscription: SubscriptionRef) {
      subscription.request(Demand::bounded(1));
      *self.1.lock().unwrap() = Some(subscription);
    }

    fn on_value(&mut self, value: i32) -> Demand {
      self.0.lock().unwrap().push(value.to_string());
      Demand::none()
    }

    fn on_completion(&mut self, completion: Completion<()>) {
      self.0.lock().unwrap().push(format!("{completion:?}"));
    }
  }

  #[test]
  fn values_queued_before_a_switch_are_still_delivered() {
    let outer = PassthroughSubject::<AnyPublisher<i32, ()>, ()>::new();
    let latest = PassthroughSubject::<i32, ()>::new();
    let events = Events::default();
    let handle = Arc::new(Mutex::new(None));
    outer.clone().switch_to_latest().subscribe(Pull(events.clone(), handle.clone()));

    outer.send(Eager(vec![1, 2, 3]).erase());
    assert_eq!(*events.lock().unwrap(), vec!["1"]);

    outer.send(latest.clone().erase());
    handle.lock().unwrap().clone().unwrap().request(Demand::bounded(5));
    latest.send(10);
    assert_eq!(*events.lock().unwrap(), vec!["1", "2", "3", "10"]);
  }
}
