//! Subscription: the live link between one publisher and one subscriber.
//!
//! A subscriber receives a [`SubscriptionRef`] in `on_subscribe` and uses it
//! to `request` more demand or to `cancel`. Both calls are non-blocking,
//! idempotent with respect to termination, and safe to invoke from any
//! thread, including from inside the subscriber's own callbacks.

use std::sync::Arc;

use crate::demand::Demand;

mod cancellable;
mod dynamic;
mod proxy;

pub use cancellable::{CancelBag, Cancellable};
pub use dynamic::DynamicSubscriptions;
pub use proxy::SubscriptionProxy;

/// The handle a publisher gives to its subscriber.
pub trait Subscription: Send + Sync {
  /// Add `demand` to the outstanding demand of this subscription.
  fn request(&self, demand: Demand);

  /// Stop delivery and release the resources of this subscription.
  ///
  /// Once cancellation is observed no further signal reaches the subscriber;
  /// a signal already in flight may still complete.
  fn cancel(&self);
}

/// Shared, type-erased subscription handle.
pub type SubscriptionRef = Arc<dyn Subscription>;

/// Lifecycle of a single subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
  /// Created, the subscriber has not received its handle yet.
  Pending,
  /// Handle delivered; values flow while demand is outstanding.
  Active,
  Finished,
  Failed,
  Cancelled,
}

impl Lifecycle {
  #[inline]
  pub fn is_terminated(&self) -> bool {
    matches!(self, Lifecycle::Finished | Lifecycle::Failed | Lifecycle::Cancelled)
  }
}

/// A subscription with nothing behind it: demand is ignored and there is
/// nothing to release. Handed out by sources that terminate immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
  fn request(&self, _demand: Demand) {}

  fn cancel(&self) {}
}

impl EmptySubscription {
  pub fn shared() -> SubscriptionRef { Arc::new(EmptySubscription) }
}

impl<T: Subscription + ?Sized> Subscription for Box<T> {
  #[inline]
  fn request(&self, demand: Demand) { (**self).request(demand) }

  #[inline]
  fn cancel(&self) { (**self).cancel() }
}

/// Forwards cancellation unchanged and rewrites every request through a
/// demand mapping, e.g. batch scaling for `collect` or "anything means
/// unbounded" for folding operators.
pub(crate) struct MapDemand<F> {
  upstream: SubscriptionRef,
  map: F,
}

impl<F> MapDemand<F>
where
  F: Fn(Demand) -> Demand + Send + Sync + 'static,
{
  pub(crate) fn shared(upstream: SubscriptionRef, map: F) -> SubscriptionRef {
    Arc::new(MapDemand { upstream, map })
  }
}

impl<F> Subscription for MapDemand<F>
where
  F: Fn(Demand) -> Demand + Send + Sync,
{
  fn request(&self, demand: Demand) {
    let mapped = (self.map)(demand);
    if !mapped.is_zero() {
      self.upstream.request(mapped);
    }
  }

  fn cancel(&self) { self.upstream.cancel(); }
}

/// Demand mapping used by operators that need the whole upstream sequence
/// before they can emit anything.
pub(crate) fn unbounded_on_any(demand: Demand) -> Demand {
  if demand.is_zero() { Demand::NONE } else { Demand::Unbounded }
}
