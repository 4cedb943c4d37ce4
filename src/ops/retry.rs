//! Retry operator implementation
//!
//! Resubscribes to the source when it fails, as long as the retry policy
//! allows it. Each attempt is a fresh subscription; values already emitted
//! by a failed attempt are not replayed. Demand downstream requested and has
//! not received yet carries over to the next attempt.
//!
//! # Examples
//!
//! Simple retry with count:
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc,
//! };
//!
//! use rxflow::{prelude::*, publisher};
//!
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let counter = attempts.clone();
//! let source = publisher::deferred(move || {
//!   counter.fetch_add(1, Ordering::SeqCst);
//!   publisher::fail::<i32, _>("always")
//! });
//!
//! let _handle = source.retry(2).sink_all(|_| {}, |_| {});
//! assert_eq!(attempts.load(Ordering::SeqCst), 3);
//! ```
//!
//! Custom retry policy based on the error:
//!
//! ```rust
//! use rxflow::ops::retry::RetryPolicy;
//!
//! #[derive(Clone)]
//! struct ServerErrors;
//!
//! impl RetryPolicy<u16> for ServerErrors {
//!   fn should_retry(&self, status: &u16, attempt: usize) -> bool {
//!     attempt < 3 && (500..600).contains(status)
//!   }
//! }
//! ```

use std::sync::Arc;

use crate::{
  demand::Demand,
  publisher::Publisher,
  rc::MutArc,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{SubscriptionProxy, SubscriptionRef},
};

/// Policy for determining whether to retry an error.
///
/// `usize` is the plain retry count; [`RetryConfig`] adds resetting the count
/// on success. Implement it for custom retry logic.
pub trait RetryPolicy<Err>: Clone + Send + Sync + 'static {
  /// Whether to resubscribe after `err`.
  ///
  /// `attempt` is the number of retries already made: 0 on the first
  /// failure.
  fn should_retry(&self, err: &Err, attempt: usize) -> bool;

  /// Whether a value emitted by the source resets the retry count to 0.
  fn reset_on_value(&self) -> bool { false }
}

impl<Err> RetryPolicy<Err> for usize {
  #[inline]
  fn should_retry(&self, _err: &Err, attempt: usize) -> bool { attempt < *self }
}

/// Builder for a retry policy.
///
/// ```rust
/// use rxflow::ops::retry::RetryConfig;
///
/// let config = RetryConfig::new().count(5).reset_on_value();
/// ```
#[derive(Clone, Debug, Default)]
pub struct RetryConfig {
  count: Option<usize>,
  reset_on_value: bool,
}

impl RetryConfig {
  /// Retry forever, never reset.
  ///
  /// A source that always fails synchronously makes the subscribing call
  /// loop forever under this policy; bound it with [`count`](Self::count).
  pub fn new() -> Self { Self::default() }

  /// Sets the maximum number of retry attempts: `count(3)` allows up to 4
  /// subscriptions in total.
  pub fn count(mut self, count: usize) -> Self {
    self.count = Some(count);
    self
  }

  /// Reset the retry count whenever the source emits a value, so that a
  /// source which stays healthy between failures is retried indefinitely.
  pub fn reset_on_value(mut self) -> Self {
    self.reset_on_value = true;
    self
  }
}

impl<Err> RetryPolicy<Err> for RetryConfig {
  fn should_retry(&self, _err: &Err, attempt: usize) -> bool {
    self.count.map_or(true, |count| attempt < count)
  }

  fn reset_on_value(&self) -> bool { self.reset_on_value }
}

/// The Retry operator struct.
pub struct Retry<P, R> {
  pub(crate) source: Arc<P>,
  pub(crate) policy: R,
}

impl<P, R> Publisher for Retry<P, R>
where
  P: Publisher,
  R: RetryPolicy<P::Err>,
{
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let proxy = SubscriptionProxy::new();
    buffer.attach(Some(Arc::new(proxy.clone())));
    let core = Arc::new(RetryCore {
      source: self.source.clone(),
      policy: self.policy.clone(),
      buffer,
      proxy,
      state: MutArc::own(RetryState { attempts: 0, subscribing: false, resubscribe: false }),
    });
    core.run();
  }
}

struct RetryState {
  attempts: usize,
  // Set while `source.subscribe` is on the stack. A failure delivered
  // inside it only flags `resubscribe` and the running loop picks it up.
  subscribing: bool,
  resubscribe: bool,
}

struct RetryCore<P: Publisher, R> {
  source: Arc<P>,
  policy: R,
  buffer: DemandBuffer<P::Item, P::Err>,
  proxy: SubscriptionProxy,
  state: MutArc<RetryState>,
}

impl<P, R> RetryCore<P, R>
where
  P: Publisher,
  R: RetryPolicy<P::Err>,
{
  /// Subscribe to the source until an attempt no longer fails synchronously.
  fn run(self: &Arc<Self>) {
    loop {
      {
        let mut state = self.state.rc_deref_mut();
        state.subscribing = true;
        state.resubscribe = false;
      }
      self.source.subscribe(RetrySubscriber { core: self.clone() });
      let mut state = self.state.rc_deref_mut();
      state.subscribing = false;
      if !state.resubscribe {
        return;
      }
    }
  }

  fn failed(self: &Arc<Self>, err: P::Err) {
    let mut state = self.state.rc_deref_mut();
    if !self.policy.should_retry(&err, state.attempts) {
      drop(state);
      self.buffer.complete(Completion::Failed(err));
      return;
    }
    state.attempts += 1;
    log::debug!("retry: resubscribing, attempt {}", state.attempts);
    let nested = state.subscribing;
    if nested {
      state.resubscribe = true;
    }
    drop(state);

    self.proxy.unbind(self.buffer.outstanding());
    if !nested {
      self.run();
    }
  }
}

pub struct RetrySubscriber<P: Publisher, R> {
  core: Arc<RetryCore<P, R>>,
}

impl<P, R> Subscriber<P::Item, P::Err> for RetrySubscriber<P, R>
where
  P: Publisher,
  R: RetryPolicy<P::Err>,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.core.proxy.bind(subscription); }

  fn on_value(&mut self, value: P::Item) -> Demand {
    if self.core.policy.reset_on_value() {
      self.core.state.rc_deref_mut().attempts = 0;
    }
    self.core.buffer.push(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<P::Err>) {
    match completion {
      Completion::Failed(err) if !self.core.buffer.is_closed() => self.core.failed(err),
      completion => self.core.buffer.complete(completion),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  };

  use super::*;
  use crate::{
    ops::PublisherExt,
    publisher,
    subject::{PassthroughSubject, Subject},
  };

  fn flaky(fail_times: usize) -> (impl Publisher<Item = usize, Err = String>, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let source = publisher::deferred(move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      let completion =
        if n < fail_times { Completion::Failed(format!("fail {n}")) } else { Completion::Finished };
      publisher::record(vec![n], completion)
    });
    (source, attempts)
  }

  fn run<P>(source: P) -> Vec<String>
  where
    P: Publisher<Item = usize, Err = String>,
  {
    let out = Arc::new(Mutex::new(vec![]));
    let (values, done) = (out.clone(), out.clone());
    let _handle = source.sink_all(
      move |v| values.lock().unwrap().push(v.to_string()),
      move |c| done.lock().unwrap().push(format!("{c:?}")),
    );
    let result = out.lock().unwrap().clone();
    result
  }

  #[test]
  fn retries_until_success() {
    let (source, attempts) = flaky(2);
    assert_eq!(run(source.retry(3)), vec!["0", "1", "2", "Finished"]);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn surfaces_the_last_failure() {
    let (source, attempts) = flaky(usize::MAX);
    assert_eq!(run(source.retry(2)), vec!["0", "1", "2", "Failed(\"fail 2\")"]);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn zero_retries_fails_at_once() {
    let (source, attempts) = flaky(1);
    assert_eq!(run(source.retry(0)), vec!["0", "Failed(\"fail 0\")"]);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn config_resets_on_value() {
    let config = RetryConfig::new().count(1).reset_on_value();
    assert!(RetryPolicy::<()>::should_retry(&config, &(), 0));
    assert!(!RetryPolicy::<()>::should_retry(&config, &(), 1));
    assert!(RetryPolicy::<()>::reset_on_value(&config));

    // Every attempt emits a value before failing, so one retry per failure
    // is always available again.
    let (source, attempts) = flaky(4);
    assert_eq!(run(source.retry(config)).last().map(String::as_str), Some("Finished"));
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
  }

  #[test]
  fn synchronous_failures_do_not_grow_the_stack() {
    let worker = std::thread::Builder::new()
      .stack_size(256 * 1024)
      .spawn(|| {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let source = publisher::deferred(move || {
          counter.fetch_add(1, Ordering::SeqCst);
          publisher::fail::<i32, &str>("down")
        });
        let out = Arc::new(Mutex::new(vec![]));
        let done = out.clone();
        let _handle = source
          .retry(10_000usize)
          .sink_all(|_| {}, move |c| done.lock().unwrap().push(format!("{c:?}")));
        let result = (attempts.load(Ordering::SeqCst), out.lock().unwrap().clone());
        result
      })
      .unwrap();
    let (attempts, completions) = worker.join().unwrap();
    assert_eq!(attempts, 10_001);
    assert_eq!(completions, vec!["Failed(\"down\")"]);
  }

  #[test]
  fn asynchronous_failure_resubscribes_from_the_failing_thread() {
    let subjects = Arc::new(Mutex::new(vec![]));
    let registry = subjects.clone();
    let source = publisher::deferred(move || {
      let subject = PassthroughSubject::<i32, &str>::new();
      registry.lock().unwrap().push(subject.clone());
      subject
    });
    let out = Arc::new(Mutex::new(vec![]));
    let (values, done) = (out.clone(), out.clone());
    let _handle = source.retry(1usize).sink_all(
      move |v| values.lock().unwrap().push(format!("{v}")),
      move |c| done.lock().unwrap().push(format!("{c:?}")),
    );

    let first = subjects.lock().unwrap()[0].clone();
    std::thread::spawn(move || {
      first.send(1);
      first.send_completion(Completion::Failed("first"));
    })
    .join()
    .unwrap();

    let second = subjects.lock().unwrap()[1].clone();
    second.send(2);
    second.send_completion(Completion::Failed("second"));
    assert_eq!(*out.lock().unwrap(), vec!["1", "2", "Failed(\"second\")"]);
  }
}
