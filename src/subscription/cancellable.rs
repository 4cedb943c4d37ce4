use smallvec::SmallVec;

use super::SubscriptionRef;

/// An RAII handle over a subscription: dropping it cancels the subscription.
///
/// Returned by `sink`, `sink_all` and `Multicast::connect`.
///
/// **Attention:** if the returned value is not bound to a variable, the
/// subscription is cancelled right away, which is probably not what you
/// want. Keep it alive, [`store`](Cancellable::store) it in a [`CancelBag`],
/// or call [`detach`](Cancellable::detach).
#[must_use]
pub struct Cancellable(Option<SubscriptionRef>);

impl Cancellable {
  pub fn new(subscription: SubscriptionRef) -> Self { Cancellable(Some(subscription)) }

  /// Cancel now. Calling it again, or dropping afterwards, is a no-op.
  pub fn cancel(&mut self) {
    if let Some(subscription) = self.0.take() {
      subscription.cancel();
    }
  }

  pub fn is_cancelled(&self) -> bool { self.0.is_none() }

  /// Move this handle into `bag`; the subscription then lives as long as
  /// the bag does.
  pub fn store(self, bag: &mut CancelBag) { bag.insert(self); }

  /// Give up the RAII behavior and return the underlying subscription.
  pub fn detach(mut self) -> Option<SubscriptionRef> { self.0.take() }
}

impl Drop for Cancellable {
  #[inline]
  fn drop(&mut self) { self.cancel() }
}

impl std::fmt::Debug for Cancellable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Cancellable")
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}

/// An owned store of cancellables, all cancelled together when the bag is
/// dropped or [`cancel_all`](CancelBag::cancel_all) is called.
#[derive(Default, Debug)]
pub struct CancelBag {
  items: SmallVec<[Cancellable; 4]>,
}

impl CancelBag {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, cancellable: Cancellable) {
    self.items.retain(|c| !c.is_cancelled());
    self.items.push(cancellable);
  }

  pub fn cancel_all(&mut self) {
    for mut item in self.items.drain(..) {
      item.cancel();
    }
  }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::{demand::Demand, subscription::Subscription};

  #[derive(Default)]
  struct Counter(AtomicUsize);

  impl Subscription for Counter {
    fn request(&self, _demand: Demand) {}

    fn cancel(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
  }

  #[test]
  fn drop_cancels_once() {
    let counter = Arc::new(Counter::default());
    {
      let mut c = Cancellable::new(counter.clone());
      c.cancel();
    }
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn detach_disables_raii() {
    let counter = Arc::new(Counter::default());
    let handle = Cancellable::new(counter.clone()).detach();
    assert!(handle.is_some());
    assert_eq!(counter.0.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn bag_cancels_everything_on_drop() {
    let counter = Arc::new(Counter::default());
    {
      let mut bag = CancelBag::new();
      Cancellable::new(counter.clone()).store(&mut bag);
      Cancellable::new(counter.clone()).store(&mut bag);
      assert_eq!(bag.len(), 2);
    }
    assert_eq!(counter.0.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn cancel_all_empties_the_bag() {
    let counter = Arc::new(Counter::default());
    let mut bag = CancelBag::new();
    Cancellable::new(counter.clone()).store(&mut bag);
    bag.cancel_all();
    assert!(bag.is_empty());
    drop(bag);
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
  }
}
