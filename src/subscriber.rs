//! Subscriber trait, terminal signals and the built-in subscribers.
//!
//! A subscriber consumes three kinds of signal, always in this order:
//! exactly one `on_subscribe`, any number of `on_value` (never more than the
//! demand it requested), and at most one `on_completion`.

mod buffer;
mod sink;

pub use buffer::{Backpressure, DemandBuffer};
pub use sink::{Sink, ValueSink};

use crate::{demand::Demand, subscription::SubscriptionRef};

/// Terminal signal of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Completion<Err> {
  Finished,
  Failed(Err),
}

impl<Err> Completion<Err> {
  #[inline]
  pub fn is_finished(&self) -> bool { matches!(self, Completion::Finished) }

  #[inline]
  pub fn is_failed(&self) -> bool { matches!(self, Completion::Failed(_)) }

  /// Narrow or convert the failure, keeping `Finished` as is.
  pub fn map_err<E, F>(self, f: F) -> Completion<E>
  where
    F: FnOnce(Err) -> E,
  {
    match self {
      Completion::Finished => Completion::Finished,
      Completion::Failed(err) => Completion::Failed(f(err)),
    }
  }

  pub fn as_ref(&self) -> Completion<&Err> {
    match self {
      Completion::Finished => Completion::Finished,
      Completion::Failed(err) => Completion::Failed(err),
    }
  }

  pub fn into_result(self) -> Result<(), Err> {
    match self {
      Completion::Finished => Ok(()),
      Completion::Failed(err) => Err(err),
    }
  }
}

/// The consumer side of the protocol.
pub trait Subscriber<Item, Err>: Send {
  /// Receive the subscription handle. Called once, before any other signal.
  fn on_subscribe(&mut self, subscription: SubscriptionRef);

  /// Receive a value; returns the additional demand to request on top of
  /// what is still outstanding.
  fn on_value(&mut self, value: Item) -> Demand;

  /// Receive the terminal signal. No further signal follows.
  fn on_completion(&mut self, completion: Completion<Err>);
}

/// Type-erased subscriber.
pub type BoxedSubscriber<Item, Err> = Box<dyn Subscriber<Item, Err>>;

impl<Item, Err, S> Subscriber<Item, Err> for Box<S>
where
  S: Subscriber<Item, Err> + ?Sized,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_value(&mut self, value: Item) -> Demand { (**self).on_value(value) }

  #[inline]
  fn on_completion(&mut self, completion: Completion<Err>) { (**self).on_completion(completion) }
}
