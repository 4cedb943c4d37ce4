use std::convert::Infallible;

use crate::{
  demand::Demand,
  subscriber::{Completion, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Subscriber behind `sink_all`: requests unbounded demand and hands every
/// signal to a pair of closures.
pub struct Sink<F, C> {
  on_value: F,
  on_completion: Option<C>,
  handle: Option<SubscriptionProxy>,
}

impl<F, C> Sink<F, C> {
  /// `handle` is bound to the subscription once it arrives; keep a clone of
  /// it to cancel from outside.
  pub fn new(on_value: F, on_completion: C, handle: SubscriptionProxy) -> Self {
    Sink { on_value, on_completion: Some(on_completion), handle: Some(handle) }
  }
}

impl<Item, Err, F, C> Subscriber<Item, Err> for Sink<F, C>
where
  F: FnMut(Item) + Send,
  C: FnOnce(Completion<Err>) + Send,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    bind_unbounded(self.handle.take(), subscription);
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand {
    (self.on_value)(value);
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if let Some(on_completion) = self.on_completion.take() {
      on_completion(completion);
    }
  }
}

/// Subscriber behind `sink`, only for publishers that cannot fail.
pub struct ValueSink<F> {
  on_value: F,
  handle: Option<SubscriptionProxy>,
}

impl<F> ValueSink<F> {
  pub fn new(on_value: F, handle: SubscriptionProxy) -> Self {
    ValueSink { on_value, handle: Some(handle) }
  }
}

impl<Item, F> Subscriber<Item, Infallible> for ValueSink<F>
where
  F: FnMut(Item) + Send,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    bind_unbounded(self.handle.take(), subscription);
  }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand {
    (self.on_value)(value);
    Demand::none()
  }

  #[inline]
  fn on_completion(&mut self, _: Completion<Infallible>) {}
}

fn bind_unbounded(handle: Option<SubscriptionProxy>, subscription: SubscriptionRef) {
  match handle {
    Some(handle) => {
      handle.bind(subscription);
      handle.request(Demand::unbounded());
    }
    None => subscription.request(Demand::unbounded()),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[derive(Default)]
  struct Recorder(Mutex<Vec<Demand>>, Mutex<bool>);

  impl Subscription for Recorder {
    fn request(&self, demand: Demand) { self.0.lock().unwrap().push(demand); }

    fn cancel(&self) { *self.1.lock().unwrap() = true; }
  }

  #[test]
  fn requests_unbounded_and_cancels_through_handle() {
    let handle = SubscriptionProxy::new();
    let values = Arc::new(Mutex::new(vec![]));
    let completions = Arc::new(Mutex::new(vec![]));
    let (v, c) = (values.clone(), completions.clone());
    let mut sink = Sink::new(
      move |x: i32| v.lock().unwrap().push(x),
      move |done: Completion<()>| c.lock().unwrap().push(done),
      handle.clone(),
    );

    let upstream = Arc::new(Recorder::default());
    sink.on_subscribe(upstream.clone());
    assert_eq!(*upstream.0.lock().unwrap(), vec![Demand::Unbounded]);

    assert_eq!(sink.on_value(1), Demand::none());
    sink.on_completion(Completion::Finished);
    sink.on_completion(Completion::Failed(()));
    assert_eq!(*values.lock().unwrap(), vec![1]);
    assert_eq!(*completions.lock().unwrap(), vec![Completion::Finished]);

    handle.cancel();
    assert!(*upstream.1.lock().unwrap());
  }

  #[test]
  fn value_sink_ignores_completion() {
    let seen = Arc::new(Mutex::new(vec![]));
    let s = seen.clone();
    let mut sink = ValueSink::new(move |x: &'static str| s.lock().unwrap().push(x), SubscriptionProxy::new());
    sink.on_subscribe(Arc::new(Recorder::default()));
    sink.on_value("a");
    sink.on_completion(Completion::Finished);
    assert_eq!(*seen.lock().unwrap(), vec!["a"]);
  }
}
