use std::sync::Arc;

use crate::{
  demand::Demand,
  rc::{MutArc, WeakArc},
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{DynamicSubscriptions, EmptySubscription, Subscription},
};

/// Shared state behind both subject kinds: the attached subscribers in
/// attach order, the terminal signal once sent, and the latest value when
/// the subject retains one.
pub(crate) struct SubjectCore<Item, Err>(MutArc<CoreState<Item, Err>>);

struct CoreState<Item, Err> {
  subscribers: DynamicSubscriptions<DemandBuffer<Item, Err>>,
  completion: Option<Completion<Err>>,
  current: Option<Item>,
}

impl<Item, Err> Clone for SubjectCore<Item, Err> {
  fn clone(&self) -> Self { SubjectCore(self.0.clone()) }
}

impl<Item, Err> SubjectCore<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + Send + 'static,
{
  pub(crate) fn new(current: Option<Item>) -> Self {
    SubjectCore(MutArc::own(CoreState {
      subscribers: DynamicSubscriptions::default(),
      completion: None,
      current,
    }))
  }

  /// Attach a subscriber. A retained value is queued ahead of anything sent
  /// later; after termination the stored terminal signal is delivered only
  /// when `replay_completion` is set.
  pub(crate) fn attach<S>(&self, subscriber: S, policy: Backpressure, replay_completion: bool)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    let mut state = self.0.rc_deref_mut();
    if let Some(completion) = state.completion.clone() {
      drop(state);
      if replay_completion {
        let buffer = DemandBuffer::new(subscriber, policy);
        buffer.complete(completion);
        buffer.attach(None);
      } else {
        let mut subscriber = subscriber;
        subscriber.on_subscribe(EmptySubscription::shared());
      }
      return;
    }

    let buffer = DemandBuffer::new(subscriber, policy);
    // Still pending: the value is queued, nothing runs under the lock.
    if let Some(current) = state.current.clone() {
      buffer.enqueue(current);
    }
    let id = state.subscribers.add(buffer.clone());
    drop(state);
    buffer.attach(Some(Arc::new(SubjectDetach { core: self.0.downgrade(), id })));
  }

  pub(crate) fn send(&self, value: Item) {
    let mut state = self.0.rc_deref_mut();
    if state.completion.is_some() {
      log::trace!("send on a terminated subject is ignored");
      return;
    }
    if state.current.is_some() {
      state.current = Some(value.clone());
    }
    // Queued under the lock: concurrent sends reach every subscriber in the
    // same order, the one that also decides `current`.
    let targets = state.subscribers.snapshot();
    for target in &targets {
      target.enqueue(value.clone());
    }
    drop(state);
    for target in targets {
      target.flush();
    }
  }

  pub(crate) fn send_completion(&self, completion: Completion<Err>) {
    let mut state = self.0.rc_deref_mut();
    if state.completion.is_some() {
      log::trace!("completion sent to a terminated subject is ignored");
      return;
    }
    state.completion = Some(completion.clone());
    let targets = state.subscribers.drain();
    let released: Vec<_> =
      targets.iter().map(|target| target.enqueue_completion(completion.clone())).collect();
    drop(state);
    drop(released);
    for target in targets {
      target.flush();
    }
  }

  pub(crate) fn is_terminated(&self) -> bool { self.0.rc_deref_mut().completion.is_some() }

  pub(crate) fn subscriber_count(&self) -> usize { self.0.rc_deref_mut().subscribers.len() }

  pub(crate) fn current(&self) -> Option<Item> { self.0.rc_deref_mut().current.clone() }
}

/// The upstream handle of a subscriber's buffer. Demand is tracked by the
/// buffer itself; cancelling detaches the subscriber. Holds the subject
/// weakly so that a subscriber never keeps its subject alive.
struct SubjectDetach<Item, Err> {
  core: WeakArc<CoreState<Item, Err>>,
  id: usize,
}

impl<Item: Send, Err: Send> Subscription for SubjectDetach<Item, Err> {
  fn request(&self, _demand: Demand) {}

  fn cancel(&self) {
    if let Some(core) = self.core.upgrade() {
      let removed = core.rc_deref_mut().subscribers.remove(self.id);
      drop(removed);
    }
  }
}
