use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Shared mutable state guarded by a mutex.
///
/// Every piece of state that is touched from more than one execution context
/// (a subject's subscriber set, a connector's demand table, an operator's
/// merge state) lives behind one of these. A guard must never be held while
/// calling back into a subscriber: callbacks are allowed to re-enter the
/// same state through `request`, `cancel` or `send`.
pub struct MutArc<T>(Arc<Mutex<T>>);

/// Non-owning counterpart of [`MutArc`], used by handles that must not keep
/// their owner alive (e.g. a subscriber's detach handle on a subject).
pub struct WeakArc<T>(Weak<Mutex<T>>);

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }

  /// Lock the state. A poisoned lock is recovered: a panicking subscriber
  /// callback never runs while a guard is held, so the data is consistent.
  #[inline]
  pub fn rc_deref_mut(&self) -> MutexGuard<'_, T> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  #[inline]
  pub fn downgrade(&self) -> WeakArc<T> { WeakArc(Arc::downgrade(&self.0)) }

  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl<T> WeakArc<T> {
  #[inline]
  pub fn upgrade(&self) -> Option<MutArc<T>> { self.0.upgrade().map(MutArc) }
}

impl<T> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> Clone for WeakArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: Default> Default for MutArc<T> {
  fn default() -> Self { Self::own(T::default()) }
}

impl<T> From<T> for MutArc<T> {
  fn from(t: T) -> Self { Self::own(t) }
}
