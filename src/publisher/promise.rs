use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::{MutArc, WeakArc},
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{DynamicSubscriptions, Subscription},
};

/// A publisher that eventually produces a single value or a failure.
///
/// The body given to [`Promise::new`] runs once, right away, and receives a
/// [`Resolver`]. The resolver may be moved to another thread and called
/// later; every subscriber, whether it arrived before or after resolution,
/// then receives the value followed by `Finished`, or the failure. The
/// value is delivered once the subscriber has requested it, on the thread
/// that resolves the promise or requests the value.
///
/// ```rust
/// use std::{sync::{Arc, Mutex}, thread};
///
/// use rxflow::{prelude::*, publisher::Promise};
///
/// let promise = Promise::<u32, String>::new(|resolve| {
///   thread::spawn(move || resolve.resolve(Ok(42))).join().unwrap();
/// });
/// let got = Arc::new(Mutex::new(vec![]));
/// let sink = got.clone();
/// let _handle = promise.sink_all(move |v| sink.lock().unwrap().push(v), |_| {});
/// assert_eq!(*got.lock().unwrap(), vec![42]);
/// ```
pub struct Promise<T, E>(MutArc<PromiseState<T, E>>);

struct PromiseState<T, E> {
  result: Option<Result<T, E>>,
  waiting: DynamicSubscriptions<DemandBuffer<T, E>>,
}

/// The completion handle passed to a [`Promise`] body.
pub struct Resolver<T, E>(MutArc<PromiseState<T, E>>);

impl<T, E> Clone for Promise<T, E> {
  fn clone(&self) -> Self { Promise(self.0.clone()) }
}

impl<T, E> Clone for Resolver<T, E> {
  fn clone(&self) -> Self { Resolver(self.0.clone()) }
}

impl<T, E> Promise<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  pub fn new<F>(body: F) -> Self
  where
    F: FnOnce(Resolver<T, E>),
  {
    let state = MutArc::own(PromiseState { result: None, waiting: DynamicSubscriptions::default() });
    body(Resolver(state.clone()));
    Promise(state)
  }

  /// `true` once the body has resolved the promise.
  pub fn is_resolved(&self) -> bool { self.0.rc_deref_mut().result.is_some() }
}

impl<T, E> Resolver<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  /// Settle the promise. Only the first call has an effect.
  pub fn resolve(&self, result: Result<T, E>) {
    let mut state = self.0.rc_deref_mut();
    if state.result.is_some() {
      log::warn!("promise resolved more than once, later result discarded");
      return;
    }
    state.result = Some(result.clone());
    let waiting = state.waiting.drain();
    drop(state);
    for buffer in waiting {
      deliver(&buffer, result.clone());
    }
  }
}

fn deliver<T, E>(buffer: &DemandBuffer<T, E>, result: Result<T, E>)
where
  T: Send + 'static,
  E: Send + 'static,
{
  match result {
    Ok(value) => {
      buffer.push(value);
      buffer.complete(Completion::Finished);
    }
    Err(err) => buffer.complete(Completion::Failed(err)),
  }
}

impl<T, E> Publisher for Promise<T, E>
where
  T: Clone + Send + 'static,
  E: Clone + Send + 'static,
{
  type Item = T;
  type Err = E;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T, E> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let mut state = self.0.rc_deref_mut();
    match state.result.clone() {
      Some(result) => {
        drop(state);
        deliver(&buffer, result);
        buffer.attach(None);
      }
      None => {
        let id = state.waiting.add(buffer.clone());
        drop(state);
        buffer.attach(Some(Arc::new(Waiting { promise: self.0.downgrade(), id })));
      }
    }
  }
}

/// Upstream handle of a subscriber still waiting for resolution; cancelling
/// it forgets the subscriber.
struct Waiting<T, E> {
  promise: WeakArc<PromiseState<T, E>>,
  id: usize,
}

impl<T, E> Subscription for Waiting<T, E>
where
  T: Send,
  E: Send,
{
  fn request(&self, _: Demand) {}

  fn cancel(&self) {
    if let Some(promise) = self.promise.upgrade() {
      let removed = promise.rc_deref_mut().waiting.remove(self.id);
      drop(removed);
    }
  }
}
