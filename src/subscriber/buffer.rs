use std::{collections::VecDeque, sync::Arc};

use crate::{
  demand::Demand,
  rc::MutArc,
  subscriber::{BoxedSubscriber, Completion, Subscriber},
  subscription::{Lifecycle, Subscription, SubscriptionRef},
};

/// What a [`DemandBuffer`] does with a value that arrives while its
/// subscriber has no outstanding demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backpressure {
  /// Queue it until demand arrives. Used by operators that merge several
  /// inputs, so that downstream never receives more than it requested.
  Buffer,
  /// Discard it. Hot sources (a passthrough subject) behave this way.
  Drop,
  /// Keep only the newest undelivered value (a current-value subject).
  KeepLatest,
  /// Deliver it anyway and let demand bottom out at zero. Used by the
  /// multicast connector, whose backpressure is shared and best-effort.
  Ignore,
}

/// A serialising conduit in front of one subscriber.
///
/// Producers push values and a terminal signal into the buffer from any
/// thread; the buffer delivers them to the subscriber one at a time, in
/// push order, never more than the subscriber's outstanding demand (unless
/// the policy is [`Backpressure::Ignore`]).
///
/// The buffer is also the subscription the subscriber receives: `request`
/// adds demand locally and forwards it to the upstream handle given to
/// [`attach`](DemandBuffer::attach); `cancel` closes the buffer and cancels
/// the upstream.
///
/// No lock is held while the subscriber runs, so the subscriber may call
/// `request`, `cancel`, or push into the same buffer from its callbacks;
/// such re-entrant calls are recorded and picked up by the running drain
/// loop instead of recursing.
pub struct DemandBuffer<Item, Err>(MutArc<BufferState<Item, Err>>);

struct BufferState<Item, Err> {
  subscriber: Option<BoxedSubscriber<Item, Err>>,
  upstream: Option<SubscriptionRef>,
  policy: Backpressure,
  queue: VecDeque<Item>,
  demand: Demand,
  completion: Option<Completion<Err>>,
  lifecycle: Lifecycle,
  // Also set while the buffer waits for `attach`, so that nothing is
  // delivered before `on_subscribe`.
  draining: bool,
}

impl<Item, Err> Clone for DemandBuffer<Item, Err> {
  fn clone(&self) -> Self { DemandBuffer(self.0.clone()) }
}

impl<Item, Err> DemandBuffer<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  pub fn new<S>(subscriber: S, policy: Backpressure) -> Self
  where
    S: Subscriber<Item, Err> + 'static,
  {
    DemandBuffer(MutArc::own(BufferState {
      subscriber: Some(Box::new(subscriber)),
      upstream: None,
      policy,
      queue: VecDeque::new(),
      demand: Demand::NONE,
      completion: None,
      lifecycle: Lifecycle::Pending,
      draining: true,
    }))
  }

  /// Hand the subscriber its subscription and start delivering.
  ///
  /// `upstream` receives every demand the subscriber requests (including
  /// the top-ups returned from `on_value`) and the cancellation.
  pub fn attach(&self, upstream: Option<SubscriptionRef>) {
    let mut state = self.0.rc_deref_mut();
    if state.lifecycle != Lifecycle::Pending {
      return;
    }
    state.lifecycle = Lifecycle::Active;
    state.upstream = upstream;
    let subscriber = state.subscriber.take();
    drop(state);
    let Some(mut subscriber) = subscriber else {
      return;
    };

    subscriber.on_subscribe(Arc::new(self.clone()));

    let mut state = self.0.rc_deref_mut();
    if state.lifecycle == Lifecycle::Cancelled {
      drop(state);
      drop(subscriber);
      return;
    }
    state.subscriber = Some(subscriber);
    state.draining = false;
    drop(state);
    self.drain();
  }

  /// Queue a value for delivery according to the buffer's policy.
  pub fn push(&self, value: Item) {
    self.enqueue(value);
    self.drain();
  }

  /// Queue the terminal signal.
  ///
  /// A failure discards queued values and is delivered at once. `Finished`
  /// is delivered after the queued values, except for the hot policies
  /// (`Drop`, `KeepLatest`) whose undelivered values are discarded.
  pub fn complete(&self, completion: Completion<Err>) {
    let upstream = self.enqueue_completion(completion);
    drop(upstream);
    self.drain();
  }

  /// `push` without delivering.
  ///
  /// Lets a producer queue into several buffers inside its own critical
  /// section, so that every subscriber observes the same order, and
  /// [`flush`](Self::flush) them once the lock is released.
  pub(crate) fn enqueue(&self, value: Item) {
    let mut state = self.0.rc_deref_mut();
    if state.lifecycle.is_terminated() || state.completion.is_some() {
      log::trace!("value pushed after termination is ignored");
      return;
    }
    let has_room = state.demand.covers(state.queue.len());
    match state.policy {
      Backpressure::Buffer | Backpressure::Ignore => state.queue.push_back(value),
      Backpressure::Drop if has_room => state.queue.push_back(value),
      Backpressure::Drop => log::trace!("value dropped, subscriber has no outstanding demand"),
      Backpressure::KeepLatest => match state.queue.back_mut() {
        Some(last) if !has_room => *last = value,
        _ => state.queue.push_back(value),
      },
    }
  }

  /// `complete` without delivering. Returns the released upstream handle,
  /// which the caller drops outside its own lock.
  #[must_use]
  pub(crate) fn enqueue_completion(&self, completion: Completion<Err>) -> Option<SubscriptionRef> {
    let mut state = self.0.rc_deref_mut();
    if state.lifecycle.is_terminated() || state.completion.is_some() {
      return None;
    }
    let discard = completion.is_failed()
      || matches!(state.policy, Backpressure::Drop | Backpressure::KeepLatest);
    if discard {
      state.queue.clear();
    }
    state.completion = Some(completion);
    state.upstream.take()
  }

  /// Deliver whatever is queued and deliverable.
  #[inline]
  pub(crate) fn flush(&self) { self.drain(); }

  /// Demand the subscriber has requested and not yet received.
  pub fn outstanding(&self) -> Demand { self.0.rc_deref_mut().demand }

  pub fn lifecycle(&self) -> Lifecycle { self.0.rc_deref_mut().lifecycle }

  /// `true` once the subscriber is cancelled or has received its terminal
  /// signal, or a terminal signal is queued.
  pub fn is_closed(&self) -> bool {
    let state = self.0.rc_deref_mut();
    state.lifecycle.is_terminated() || state.completion.is_some()
  }

  fn drain(&self) {
    let mut state = self.0.rc_deref_mut();
    if state.draining {
      return;
    }
    state.draining = true;
    loop {
      if state.lifecycle.is_terminated() {
        state.draining = false;
        let subscriber = state.subscriber.take();
        drop(state);
        drop(subscriber);
        return;
      }

      let deliverable = state.policy == Backpressure::Ignore || !state.demand.is_zero();
      let next = if deliverable { state.queue.pop_front() } else { None };
      if let Some(value) = next {
        state.demand = state.demand.saturating_decrement();
        let Some(mut subscriber) = state.subscriber.take() else {
          state.draining = false;
          return;
        };
        drop(state);
        let more = subscriber.on_value(value);
        state = self.0.rc_deref_mut();
        if state.lifecycle.is_terminated() {
          state.draining = false;
          drop(state);
          drop(subscriber);
          return;
        }
        state.subscriber = Some(subscriber);
        if !more.is_zero() {
          state.demand += more;
          if let Some(upstream) = state.upstream.clone() {
            drop(state);
            upstream.request(more);
            state = self.0.rc_deref_mut();
          }
        }
        continue;
      }

      if state.queue.is_empty() {
        if let Some(completion) = state.completion.take() {
          state.lifecycle = if completion.is_finished() {
            Lifecycle::Finished
          } else {
            Lifecycle::Failed
          };
          state.draining = false;
          let subscriber = state.subscriber.take();
          drop(state);
          if let Some(mut subscriber) = subscriber {
            subscriber.on_completion(completion);
          }
          return;
        }
      }

      state.draining = false;
      return;
    }
  }
}

impl<Item, Err> Subscription for DemandBuffer<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn request(&self, demand: Demand) {
    if demand.is_zero() {
      return;
    }
    let mut state = self.0.rc_deref_mut();
    if state.lifecycle.is_terminated() {
      return;
    }
    state.demand += demand;
    let upstream = state.upstream.clone();
    drop(state);
    if let Some(upstream) = upstream {
      upstream.request(demand);
    }
    self.drain();
  }

  fn cancel(&self) {
    let mut state = self.0.rc_deref_mut();
    if state.lifecycle.is_terminated() {
      return;
    }
    state.lifecycle = Lifecycle::Cancelled;
    state.queue.clear();
    state.completion = None;
    let upstream = state.upstream.take();
    let subscriber = if state.draining { None } else { state.subscriber.take() };
    drop(state);
    drop(subscriber);
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}
