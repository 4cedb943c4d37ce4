use std::sync::Arc;

use super::relay::FanOut;
use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Combines the latest value of two publishers whenever either emits, once
/// both have emitted at least once.
///
/// Finishes when both inputs have finished. A failure of either input is
/// forwarded at once and the other input is cancelled.
pub struct CombineLatest<A, B, F> {
  pub(crate) a: A,
  pub(crate) b: B,
  pub(crate) combine: Arc<F>,
}

impl<A, B, F, O> Publisher for CombineLatest<A, B, F>
where
  A: Publisher,
  B: Publisher<Err = A::Err>,
  A::Item: Clone,
  B::Item: Clone,
  F: Fn(A::Item, B::Item) -> O + Send + Sync + 'static,
  O: Send + 'static,
{
  type Item = O;
  type Err = A::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<O, A::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let inputs = FanOut::default();
    buffer.attach(Some(Arc::new(inputs.clone())));
    let core = Arc::new(CombineCore {
      state: MutArc::own(CombineState { left: None, right: None, finished: 0 }),
      buffer,
      inputs: inputs.clone(),
      combine: self.combine.clone(),
    });
    let (_, left) = inputs.add();
    self.a.subscribe(CombineLeft { core: core.clone(), proxy: left });
    let (_, right) = inputs.add();
    self.b.subscribe(CombineRight { core, proxy: right });
  }
}

enum CombineItem<A, B> {
  ItemA(A),
  ItemB(B),
}

struct CombineState<A, B> {
  left: Option<A>,
  right: Option<B>,
  finished: u8,
}

struct CombineCore<A, B, O, Err, F> {
  state: MutArc<CombineState<A, B>>,
  buffer: DemandBuffer<O, Err>,
  inputs: FanOut,
  combine: Arc<F>,
}

impl<A, B, O, Err, F> CombineCore<A, B, O, Err, F>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  O: Send + 'static,
  Err: Send + 'static,
  F: Fn(A, B) -> O,
{
  fn on_item(&self, item: CombineItem<A, B>) -> Demand {
    let mut state = self.state.rc_deref_mut();
    match item {
      CombineItem::ItemA(a) => state.left = Some(a),
      CombineItem::ItemB(b) => state.right = Some(b),
    }
    let combined = match (&state.left, &state.right) {
      (Some(a), Some(b)) => (self.combine)(a.clone(), b.clone()),
      // Nothing reached downstream, so its demand is still unmet.
      _ => return Demand::bounded(1),
    };
    // Queued under the lock so that the last combination delivered is the
    // one of the latest pair.
    self.buffer.enqueue(combined);
    drop(state);
    self.buffer.flush();
    Demand::none()
  }

  fn on_completion(&self, completion: Completion<Err>) {
    match completion {
      Completion::Finished => {
        let mut state = self.state.rc_deref_mut();
        state.finished += 1;
        let released = match state.finished {
          2 => self.buffer.enqueue_completion(Completion::Finished),
          _ => None,
        };
        drop(state);
        drop(released);
        self.buffer.flush();
      }
      failed => {
        self.buffer.complete(failed);
        self.inputs.cancel();
      }
    }
  }
}

pub struct CombineLeft<C> {
  core: Arc<C>,
  proxy: SubscriptionProxy,
}

pub struct CombineRight<C> {
  core: Arc<C>,
  proxy: SubscriptionProxy,
}

impl<A, B, O, Err, F> Subscriber<A, Err> for CombineLeft<CombineCore<A, B, O, Err, F>>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  O: Send + 'static,
  Err: Send + 'static,
  F: Fn(A, B) -> O + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  #[inline]
  fn on_value(&mut self, value: A) -> Demand { self.core.on_item(CombineItem::ItemA(value)) }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) { self.core.on_completion(completion) }
}

impl<A, B, O, Err, F> Subscriber<B, Err> for CombineRight<CombineCore<A, B, O, Err, F>>
where
  A: Clone + Send + 'static,
  B: Clone + Send + 'static,
  O: Send + 'static,
  Err: Send + 'static,
  F: Fn(A, B) -> O + Send + Sync,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.proxy.bind(subscription); }

  #[inline]
  fn on_value(&mut self, value: B) -> Demand { self.core.on_item(CombineItem::ItemB(value)) }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) { self.core.on_completion(completion) }
}
