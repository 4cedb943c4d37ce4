//! Plumbing shared by the operators that own a downstream `DemandBuffer`.

use crate::{
  demand::Demand,
  rc::MutArc,
  subscriber::{Completion, DemandBuffer, Subscriber},
  subscription::{DynamicSubscriptions, Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Forwards every signal of one upstream into a downstream buffer.
///
/// The upstream subscription is bound to `proxy`, through which the buffer
/// already routes downstream demand and cancellation.
pub(crate) struct Relay<Item, Err> {
  pub(crate) buffer: DemandBuffer<Item, Err>,
  pub(crate) proxy: SubscriptionProxy,
}

impl<Item, Err> Subscriber<Item, Err> for Relay<Item, Err>
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

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) { self.buffer.complete(completion); }
}

/// The upstream side of a multi-input operator: one proxy per input.
///
/// Demand is forwarded to every live input and cancellation reaches all of
/// them. An input added later starts with every demand requested so far; an
/// input added after cancellation is cancelled on the spot.
#[derive(Clone, Default)]
pub(crate) struct FanOut(MutArc<FanOutState>);

#[derive(Default)]
struct FanOutState {
  inputs: DynamicSubscriptions<SubscriptionProxy>,
  requested: Demand,
  cancelled: bool,
}

impl FanOut {
  /// Register a new input; its subscription must be bound to the returned
  /// proxy.
  pub(crate) fn add(&self) -> (usize, SubscriptionProxy) {
    let requested = self.0.rc_deref_mut().requested;
    self.add_with(requested)
  }

  /// Register a new input seeded with `demand` instead of the cumulative
  /// request.
  pub(crate) fn add_with(&self, demand: Demand) -> (usize, SubscriptionProxy) {
    let proxy = SubscriptionProxy::new();
    let mut state = self.0.rc_deref_mut();
    if state.cancelled {
      drop(state);
      proxy.cancel();
      return (usize::MAX, proxy);
    }
    proxy.request(demand);
    let id = state.inputs.add(proxy.clone());
    (id, proxy)
  }

  pub(crate) fn is_cancelled(&self) -> bool { self.0.rc_deref_mut().cancelled }

  /// Forget an input that has terminated on its own.
  pub(crate) fn remove(&self, id: usize) {
    let removed = self.0.rc_deref_mut().inputs.remove(id);
    drop(removed);
  }
}

impl Subscription for FanOut {
  fn request(&self, demand: Demand) {
    let mut state = self.0.rc_deref_mut();
    state.requested += demand;
    let inputs = state.inputs.snapshot();
    drop(state);
    for input in inputs {
      input.request(demand);
    }
  }

  fn cancel(&self) {
    let mut state = self.0.rc_deref_mut();
    state.cancelled = true;
    let inputs = state.inputs.drain();
    drop(state);
    for input in inputs {
      input.cancel();
    }
  }
}
