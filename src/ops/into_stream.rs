//! IntoStream operator
//!
//! Bridges a publisher into a `futures::Stream`. The stream pulls: every
//! `poll_next` that finds nothing buffered requests exactly one more value,
//! so an infinite publisher is safe to consume with `take`.
//!
//! # Example
//!
//! ```rust
//! use futures::{executor::block_on, StreamExt};
//! use rxflow::{prelude::*, publisher};
//!
//! let firsts: Vec<_> = block_on(publisher::sequence(0..).into_stream().take(3).collect());
//! assert_eq!(firsts, vec![Ok(0), Ok(1), Ok(2)]);
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  task::{Context, Poll, Waker},
};

use futures::Stream;

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Completion, Subscriber},
  subscription::SubscriptionRef,
};

struct StreamState<Item, Err> {
  queue: VecDeque<Result<Item, Err>>,
  upstream: Option<SubscriptionRef>,
  waker: Option<Waker>,
  requested: bool,
  closed: bool,
}

/// A `Stream` over the signals of a publisher.
///
/// - `Ok(value)` for every value.
/// - `Err(err)` once, when the publisher fails.
/// - `None` after the terminal signal.
///
/// Dropping the stream cancels the subscription.
pub struct PublisherStream<Item, Err>(MutArc<StreamState<Item, Err>>);

impl<Item, Err> PublisherStream<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  pub fn new<P>(publisher: &P) -> Self
  where
    P: Publisher<Item = Item, Err = Err>,
  {
    let state = MutArc::own(StreamState {
      queue: VecDeque::new(),
      upstream: None,
      waker: None,
      requested: false,
      closed: false,
    });
    publisher.subscribe(StreamSubscriber(state.clone()));
    PublisherStream(state)
  }
}

impl<Item, Err> Stream for PublisherStream<Item, Err> {
  type Item = Result<Item, Err>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    loop {
      let mut state = this.0.rc_deref_mut();
      if let Some(item) = state.queue.pop_front() {
        return Poll::Ready(Some(item));
      }
      if state.closed {
        return Poll::Ready(None);
      }
      state.waker = Some(cx.waker().clone());
      if state.requested {
        return Poll::Pending;
      }
      let Some(upstream) = state.upstream.clone() else {
        return Poll::Pending;
      };
      state.requested = true;
      drop(state);
      // A synchronous publisher delivers inside this call.
      upstream.request(Demand::bounded(1));
    }
  }
}

impl<Item, Err> Drop for PublisherStream<Item, Err> {
  fn drop(&mut self) {
    let upstream = self.0.rc_deref_mut().upstream.take();
    if let Some(upstream) = upstream {
      upstream.cancel();
    }
  }
}

struct StreamSubscriber<Item, Err>(MutArc<StreamState<Item, Err>>);

impl<Item, Err> StreamSubscriber<Item, Err> {
  fn wake(mut state: std::sync::MutexGuard<'_, StreamState<Item, Err>>) {
    let waker = state.waker.take();
    drop(state);
    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<Item: Send, Err: Send> Subscriber<Item, Err> for StreamSubscriber<Item, Err> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let mut state = self.0.rc_deref_mut();
    state.upstream = Some(subscription);
    Self::wake(state);
  }

  fn on_value(&mut self, value: Item) -> Demand {
    let mut state = self.0.rc_deref_mut();
    state.queue.push_back(Ok(value));
    state.requested = false;
    Self::wake(state);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    let mut state = self.0.rc_deref_mut();
    if let Completion::Failed(err) = completion {
      state.queue.push_back(Err(err));
    }
    state.closed = true;
    let upstream = state.upstream.take();
    Self::wake(state);
    drop(upstream);
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use futures::{executor::block_on, StreamExt};

  use crate::{
    prelude::*,
    publisher::{self, Promise},
  };

  #[test]
  fn yields_values_then_ends() {
    let all: Vec<_> = block_on(publisher::sequence(1..=3).into_stream().collect());
    assert_eq!(all, vec![Ok(1), Ok(2), Ok(3)]);
  }

  #[test]
  fn failure_is_the_last_item() {
    let all: Vec<_> =
      block_on(publisher::record(vec![1], Completion::Failed("broken")).into_stream().collect());
    assert_eq!(all, vec![Ok(1), Err("broken")]);
  }

  #[test]
  fn waits_for_a_value_from_another_thread() {
    let promise = Promise::<i32, ()>::new(|resolver| {
      thread::spawn(move || resolver.resolve(Ok(42)));
    });
    let mut stream = promise.into_stream();
    assert_eq!(block_on(stream.next()), Some(Ok(42)));
    assert_eq!(block_on(stream.next()), None);
  }

  #[test]
  fn dropping_the_stream_cancels() {
    let subject = PassthroughSubject::<i32, ()>::new();
    let stream = subject.clone().into_stream();
    assert_eq!(subject.subscriber_count(), 1);
    drop(stream);
    assert_eq!(subject.subscriber_count(), 0);
  }
}
