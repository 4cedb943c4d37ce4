use std::sync::Arc;

use super::relay::FanOut;
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Maps every upstream value to an inner publisher and merges the values of
/// all inner publishers as they arrive.
///
/// `max` caps the number of inner publishers subscribed at the same time;
/// upstream values are requested one by one as inner publishers finish.
/// Finishes once upstream and every inner publisher have finished. The first
/// failure, outer or inner, is forwarded at once and everything else is
/// cancelled.
pub struct FlatMap<P, F> {
  pub(crate) source: P,
  pub(crate) transform: Arc<F>,
  pub(crate) max: Option<usize>,
}

impl<P, F, Q> Publisher for FlatMap<P, F>
where
  P: Publisher,
  F: Fn(P::Item) -> Q + Send + Sync + 'static,
  Q: Publisher<Err = P::Err>,
{
  type Item = Q::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Q::Item, P::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let outer = SubscriptionProxy::new();
    let inners = FanOut::default();
    buffer.attach(Some(Arc::new(FlatMapUpstream { outer: outer.clone(), inners: inners.clone() })));

    outer.request(self.max.map_or(Demand::Unbounded, |n| Demand::bounded(n as u64)));
    let core = FlatMapCore {
      buffer,
      outer,
      inners,
      state: MutArc::own(FlatMapState { active: 0, outer_done: false }),
      transform: self.transform.clone(),
      bounded: self.max.is_some(),
    };
    self.source.subscribe(FlatMapOuter { core: Arc::new(core) })
  }
}

/// What downstream sees as its upstream: demand goes to the live inner
/// publishers only, cancellation reaches the outer one too.
struct FlatMapUpstream {
  outer: SubscriptionProxy,
  inners: FanOut,
}

impl Subscription for FlatMapUpstream {
  fn request(&self, demand: Demand) { self.inners.request(demand); }

  fn cancel(&self) {
    self.outer.cancel();
    self.inners.cancel();
  }
}

struct FlatMapState {
  active: usize,
  outer_done: bool,
}

pub struct FlatMapCore<O, Err, F> {
  buffer: DemandBuffer<O, Err>,
  outer: SubscriptionProxy,
  inners: FanOut,
  state: MutArc<FlatMapState>,
  transform: Arc<F>,
  bounded: bool,
}

impl<O, Err, F> FlatMapCore<O, Err, F>
where
  O: Send + 'static,
  Err: Send + 'static,
{
  fn fail(&self, completion: Completion<Err>) {
    self.buffer.complete(completion);
    self.outer.cancel();
    self.inners.cancel();
  }

  fn inner_finished(&self, id: usize) {
    self.inners.remove(id);
    let mut state = self.state.rc_deref_mut();
    state.active -= 1;
    let done = state.outer_done && state.active == 0;
    drop(state);
    if done {
      self.buffer.complete(Completion::Finished);
    } else if self.bounded {
      self.outer.request(Demand::bounded(1));
    }
  }

  fn outer_finished(&self) {
    let mut state = self.state.rc_deref_mut();
    state.outer_done = true;
    let done = state.active == 0;
    drop(state);
    if done {
      self.buffer.complete(Completion::Finished);
    }
  }
}

pub struct FlatMapOuter<C> {
  core: Arc<C>,
}

impl<T, O, Err, F, Q> Subscriber<T, Err> for FlatMapOuter<FlatMapCore<O, Err, F>>
where
  O: Send + 'static,
  Err: Send + 'static,
  F: Fn(T) -> Q + Send + Sync + 'static,
  Q: Publisher<Item = O, Err = Err>,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.core.outer.bind(subscription); }

  fn on_value(&mut self, value: T) -> Demand {
    let inner = (self.core.transform)(value);
    self.core.state.rc_deref_mut().active += 1;
    let (id, proxy) = self.core.inners.add_with(self.core.buffer.outstanding());
    inner.subscribe(FlatMapInner { core: self.core.clone(), id, proxy });
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => self.core.outer_finished(),
      failed => self.core.fail(failed),
    }
  }
}

pub struct FlatMapInner<C> {
  core: Arc<C>,
  id: usize,
  proxy: SubscriptionProxy,
}

impl<O, Err, F> Subscriber<O, Err> for FlatMapInner<FlatMapCore<O, Err, F>>
where
  O: Send + 'static,
  Err: Send + 'static,
  F: Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  #[inline]
  fn on_value(&mut self, value: O) -> Demand {
    self.core.buffer.push(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => self.core.inner_finished(self.id),
      failed => self.core.fail(failed),
    }
  }
}
