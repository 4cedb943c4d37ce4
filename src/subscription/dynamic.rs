use smallvec::SmallVec;

use super::Subscription;

/// An insertion-ordered container of items keyed by a generated id.
///
/// Used wherever a dynamic set of downstream conduits or inner
/// subscriptions has to be tracked: a subject's attached subscribers, a
/// connector's demand table, the active inner publishers of `flat_map`.
/// Insertion order is preserved, which fixes the fan-out order.
///
/// ```rust
/// use rxflow::subscription::DynamicSubscriptions;
///
/// let mut subs = DynamicSubscriptions::default();
/// let first = subs.add("a");
/// let _second = subs.add("b");
/// assert_eq!(subs.remove(first), Some("a"));
/// assert_eq!(subs.snapshot(), vec!["b"]);
/// ```
pub struct DynamicSubscriptions<U> {
  next_id: usize,
  items: SmallVec<[(usize, U); 2]>,
}

impl<U> Default for DynamicSubscriptions<U> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<U> DynamicSubscriptions<U> {
  /// Add an item and return its id.
  #[inline]
  pub fn add(&mut self, item: U) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.items.push((id, item));
    id
  }

  /// Remove an item by id.
  pub fn remove(&mut self, id: usize) -> Option<U> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  #[inline]
  pub fn get(&self, id: usize) -> Option<&U> {
    self.items.iter().find(|(i, _)| *i == id).map(|(_, item)| item)
  }

  #[inline]
  pub fn contains(&self, id: usize) -> bool { self.items.iter().any(|(i, _)| *i == id) }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  /// Remove every item, in insertion order.
  pub fn drain(&mut self) -> Vec<U> { self.items.drain(..).map(|(_, item)| item).collect() }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &U> { self.items.iter().map(|(_, item)| item) }
}

impl<U: Clone> DynamicSubscriptions<U> {
  /// Clone the current items so they can be called without holding the
  /// lock that guards this container.
  pub fn snapshot(&self) -> Vec<U> { self.iter().cloned().collect() }
}

impl<U: Subscription> DynamicSubscriptions<U> {
  /// Cancel every item and clear the container.
  pub fn cancel_all(&mut self) {
    for item in self.drain() {
      item.cancel();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_never_reused() {
    let mut subs = DynamicSubscriptions::default();
    let a = subs.add(1);
    subs.remove(a);
    let b = subs.add(2);
    assert_ne!(a, b);
    assert!(!subs.contains(a));
    assert_eq!(subs.get(b), Some(&2));
  }

  #[test]
  fn preserves_insertion_order() {
    let mut subs = DynamicSubscriptions::default();
    for v in [3, 1, 2] {
      subs.add(v);
    }
    assert_eq!(subs.snapshot(), vec![3, 1, 2]);
    assert_eq!(subs.drain(), vec![3, 1, 2]);
    assert!(subs.is_empty());
  }
}
