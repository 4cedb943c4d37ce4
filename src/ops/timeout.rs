use std::{sync::Arc, time::Duration};

use crate::{
  demand::Demand,
  error::TimeoutError,
  publisher::Publisher,
  rc::MutArc,
  scheduler::{Scheduler, TaskHandle},
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{Subscription, SubscriptionProxy, SubscriptionRef},
};

/// Fails when no value or terminal signal arrives within `after` of the
/// previous event, or of the subscription for the first one.
///
/// On expiry upstream is cancelled and downstream receives
/// `make_err(TimeoutError { after })`.
pub struct Timeout<P, Sch, F> {
  pub(crate) source: P,
  pub(crate) after: Duration,
  pub(crate) scheduler: Sch,
  pub(crate) make_err: Arc<F>,
}

impl<P, Sch, F> Publisher for Timeout<P, Sch, F>
where
  P: Publisher,
  Sch: Scheduler,
  F: Fn(TimeoutError) -> P::Err + Send + Sync + 'static,
{
  type Item = P::Item;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<P::Item, P::Err> + 'static,
  {
    let buffer = DemandBuffer::new(subscriber, Backpressure::Buffer);
    let proxy = SubscriptionProxy::new();
    let timer = MutArc::own(TimerState { generation: 0, handle: None, done: false });
    buffer.attach(Some(Arc::new(TimeoutUpstream { proxy: proxy.clone(), timer: timer.clone() })));

    let core = Arc::new(TimeoutCore {
      buffer,
      proxy,
      timer,
      after: self.after,
      scheduler: self.scheduler.clone(),
      make_err: self.make_err.clone(),
    });
    core.arm();
    self.source.subscribe(TimeoutSubscriber { core })
  }
}

struct TimerState {
  generation: u64,
  handle: Option<TaskHandle>,
  done: bool,
}

impl TimerState {
  fn disarm(&mut self) {
    self.done = true;
    if let Some(handle) = self.handle.take() {
      handle.cancel();
    }
  }
}

struct TimeoutUpstream {
  proxy: SubscriptionProxy,
  timer: MutArc<TimerState>,
}

impl Subscription for TimeoutUpstream {
  #[inline]
  fn request(&self, demand: Demand) { self.proxy.request(demand); }

  fn cancel(&self) {
    self.timer.rc_deref_mut().disarm();
    self.proxy.cancel();
  }
}

pub struct TimeoutCore<Item, Err, Sch, F> {
  buffer: DemandBuffer<Item, Err>,
  proxy: SubscriptionProxy,
  timer: MutArc<TimerState>,
  after: Duration,
  scheduler: Sch,
  make_err: Arc<F>,
}

impl<Item, Err, Sch, F> TimeoutCore<Item, Err, Sch, F>
where
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
  F: Fn(TimeoutError) -> Err + Send + Sync + 'static,
{
  /// Start a fresh deadline, replacing the pending one. Returns `false`
  /// once the timer is done.
  fn arm(self: &Arc<Self>) -> bool {
    let mut timer = self.timer.rc_deref_mut();
    if timer.done {
      return false;
    }
    timer.generation += 1;
    let generation = timer.generation;
    let previous = timer.handle.take();
    drop(timer);
    if let Some(previous) = previous {
      previous.cancel();
    }

    let core = self.clone();
    let handle = self
      .scheduler
      .schedule_after(self.after, Box::new(move || core.expire(generation)));
    let mut timer = self.timer.rc_deref_mut();
    if timer.done || timer.generation != generation {
      handle.cancel();
    } else {
      timer.handle = Some(handle);
    }
    true
  }

  fn expire(&self, generation: u64) {
    let mut timer = self.timer.rc_deref_mut();
    if timer.done || timer.generation != generation {
      return;
    }
    timer.done = true;
    timer.handle = None;
    drop(timer);

    log::debug!("timeout: nothing received within {:?}, cancelling upstream", self.after);
    self.proxy.cancel();
    self.buffer.complete(Completion::Failed((self.make_err)(TimeoutError { after: self.after })));
  }
}

pub struct TimeoutSubscriber<C> {
  core: Arc<C>,
}

impl<Item, Err, Sch, F> Subscriber<Item, Err> for TimeoutSubscriber<TimeoutCore<Item, Err, Sch, F>>
where
  Item: Send + 'static,
  Err: Send + 'static,
  Sch: Scheduler,
  F: Fn(TimeoutError) -> Err + Send + Sync + 'static,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.core.proxy.bind(subscription); }

  fn on_value(&mut self, value: Item) -> Demand {
    if self.core.arm() {
      self.core.buffer.push(value);
    }
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    let mut timer = self.core.timer.rc_deref_mut();
    if timer.done {
      return;
    }
    timer.disarm();
    drop(timer);
    self.core.buffer.complete(completion);
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Mutex},
    time::Duration,
  };

  use crate::{error::TimeoutError, prelude::*, scheduler::VirtualTimeScheduler};

  #[derive(Clone, Debug, PartialEq)]
  enum FetchError {
    TimedOut(Duration),
  }

  impl From<TimeoutError> for FetchError {
    fn from(err: TimeoutError) -> Self { FetchError::TimedOut(err.after) }
  }

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
  fn every_event_restarts_the_deadline() {
    let scheduler = VirtualTimeScheduler::new();
    let subject = PassthroughSubject::<i32, FetchError>::new();
    let events = Events::default();
    let _handle =
      record_into(subject.clone().timeout(Duration::from_millis(10), scheduler.clone()), &events);

    scheduler.advance_by(Duration::from_millis(5));
    subject.send(1);
    scheduler.advance_by(Duration::from_millis(8));
    assert_eq!(*events.lock().unwrap(), vec!["1"]);

    scheduler.advance_by(Duration::from_millis(2));
    assert_eq!(*events.lock().unwrap(), vec!["1", "Failed(TimedOut(10ms))"]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn completion_in_time_disarms() {
    let scheduler = VirtualTimeScheduler::new();
    let subject = PassthroughSubject::<i32, String>::new();
    let events = Events::default();
    let _handle = record_into(
      subject
        .clone()
        .timeout_with(Duration::from_millis(10), scheduler.clone(), |e| e.to_string()),
      &events,
    );

    subject.send(7);
    subject.send_completion(Completion::Finished);
    scheduler.advance_by(Duration::from_millis(50));
    assert_eq!(*events.lock().unwrap(), vec!["7", "Finished"]);
  }

  #[test]
  fn silent_source_times_out_from_subscription() {
    let scheduler = VirtualTimeScheduler::new();
    let events = Events::default();
    let source = crate::publisher::never::<i32, String>().timeout_with(
      Duration::from_secs(1),
      scheduler.clone(),
      |e| e.to_string(),
    );
    let _handle = record_into(source, &events);

    scheduler.advance_by(Duration::from_secs(1));
    assert_eq!(*events.lock().unwrap(), vec!["Failed(\"no event received within 1s\")"]);
  }
}
