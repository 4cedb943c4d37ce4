//! Demand: how many more values a subscriber permits a publisher to deliver.

use std::{
  fmt::{Display, Formatter},
  ops::{Add, AddAssign},
};

use crate::error::DemandError;

/// Outstanding demand of a subscription.
///
/// Bounded demand is consumed one unit per delivered value; requesting more
/// adds to the outstanding total. `Unbounded` absorbs every arithmetic
/// operation and never runs out.
///
/// The variant order makes the derived ordering treat `Unbounded` as larger
/// than any bounded count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Demand {
  Bounded(u64),
  Unbounded,
}

impl Demand {
  /// No demand at all.
  pub const NONE: Demand = Demand::Bounded(0);

  #[inline]
  pub fn unbounded() -> Self { Demand::Unbounded }

  #[inline]
  pub fn bounded(n: u64) -> Self { Demand::Bounded(n) }

  #[inline]
  pub fn none() -> Self { Self::NONE }

  #[inline]
  pub fn is_zero(&self) -> bool { *self == Self::NONE }

  #[inline]
  pub fn is_unbounded(&self) -> bool { matches!(self, Demand::Unbounded) }

  /// The bounded count, or `None` for `Unbounded`.
  #[inline]
  pub fn count(&self) -> Option<u64> {
    match self {
      Demand::Bounded(n) => Some(*n),
      Demand::Unbounded => None,
    }
  }

  /// Sum of two demands. Overflow saturates to `Unbounded`.
  pub fn add(self, other: Demand) -> Demand {
    match (self, other) {
      (Demand::Bounded(a), Demand::Bounded(b)) => {
        a.checked_add(b).map_or(Demand::Unbounded, Demand::Bounded)
      }
      _ => Demand::Unbounded,
    }
  }

  /// Remove `n` units of demand.
  ///
  /// Fails with [`DemandError::Underflow`] when fewer than `n` units are
  /// outstanding; callers check for outstanding demand before delivering.
  pub fn subtract(self, n: u64) -> Result<Demand, DemandError> {
    match self {
      Demand::Unbounded => Ok(Demand::Unbounded),
      Demand::Bounded(available) => available
        .checked_sub(n)
        .map(Demand::Bounded)
        .ok_or(DemandError::Underflow { available, requested: n }),
    }
  }

  /// Consume one unit, stopping at zero.
  #[inline]
  pub(crate) fn saturating_decrement(self) -> Demand {
    self.subtract(1).unwrap_or(Self::NONE)
  }

  /// How much of `self` is not yet covered by `covered`.
  ///
  /// Anything is fully covered by `Unbounded`.
  pub fn saturating_sub(self, covered: Demand) -> Demand {
    match (self, covered) {
      (_, Demand::Unbounded) => Self::NONE,
      (Demand::Unbounded, Demand::Bounded(_)) => Demand::Unbounded,
      (Demand::Bounded(a), Demand::Bounded(b)) => Demand::Bounded(a.saturating_sub(b)),
    }
  }

  /// Scale demand by a batch size. Overflow saturates to `Unbounded`.
  pub fn scale(self, factor: u64) -> Demand {
    match self {
      Demand::Bounded(n) => n.checked_mul(factor).map_or(Demand::Unbounded, Demand::Bounded),
      Demand::Unbounded => Demand::Unbounded,
    }
  }

  /// `true` when more than `n` units are outstanding, i.e. `n` values are
  /// already spoken for and one more can still be delivered.
  #[inline]
  pub(crate) fn covers(&self, n: usize) -> bool { *self > Demand::Bounded(n as u64) }
}

impl Default for Demand {
  fn default() -> Self { Self::NONE }
}

impl Add for Demand {
  type Output = Demand;

  #[inline]
  fn add(self, rhs: Demand) -> Demand { Demand::add(self, rhs) }
}

impl AddAssign for Demand {
  #[inline]
  fn add_assign(&mut self, rhs: Demand) { *self = Demand::add(*self, rhs); }
}

impl From<u64> for Demand {
  fn from(n: u64) -> Self { Demand::Bounded(n) }
}

impl Display for Demand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Demand::Bounded(n) => write!(f, "max({n})"),
      Demand::Unbounded => f.write_str("unlimited"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn addition_accumulates() {
    assert_eq!(Demand::bounded(2) + Demand::bounded(3), Demand::bounded(5));
    let mut d = Demand::none();
    d += Demand::bounded(1);
    d += Demand::bounded(1);
    assert_eq!(d, Demand::bounded(2));
  }

  #[test]
  fn unbounded_absorbs() {
    assert_eq!(Demand::unbounded() + Demand::bounded(7), Demand::Unbounded);
    assert_eq!(Demand::bounded(7) + Demand::unbounded(), Demand::Unbounded);
    assert_eq!(Demand::unbounded().subtract(1_000), Ok(Demand::Unbounded));
    assert_eq!(Demand::unbounded().scale(3), Demand::Unbounded);
  }

  #[test]
  fn overflow_saturates_to_unbounded() {
    assert_eq!(Demand::bounded(u64::MAX) + Demand::bounded(1), Demand::Unbounded);
    assert_eq!(Demand::bounded(u64::MAX / 2 + 1).scale(2), Demand::Unbounded);
  }

  #[test]
  fn subtract_from_zero_underflows() {
    assert_eq!(
      Demand::none().subtract(1),
      Err(DemandError::Underflow { available: 0, requested: 1 })
    );
    assert_eq!(Demand::bounded(3).subtract(1), Ok(Demand::bounded(2)));
    assert_eq!(Demand::none().saturating_decrement(), Demand::none());
  }

  #[test]
  fn ordering_puts_unbounded_on_top() {
    assert!(Demand::unbounded() > Demand::bounded(u64::MAX));
    assert_eq!(Demand::bounded(4).max(Demand::bounded(9)), Demand::bounded(9));
    assert!(Demand::bounded(2).covers(1));
    assert!(!Demand::bounded(1).covers(1));
    assert!(Demand::unbounded().covers(usize::MAX));
  }

  #[test]
  fn saturating_sub_respects_coverage() {
    assert_eq!(Demand::bounded(5).saturating_sub(Demand::bounded(2)), Demand::bounded(3));
    assert_eq!(Demand::bounded(2).saturating_sub(Demand::bounded(5)), Demand::none());
    assert_eq!(Demand::unbounded().saturating_sub(Demand::bounded(5)), Demand::Unbounded);
    assert_eq!(Demand::unbounded().saturating_sub(Demand::unbounded()), Demand::none());
  }

  #[test]
  fn display_matches_combine_style() {
    assert_eq!(Demand::bounded(3).to_string(), "max(3)");
    assert_eq!(Demand::unbounded().to_string(), "unlimited");
  }
}
