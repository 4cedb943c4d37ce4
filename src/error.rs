use std::time::Duration;

use thiserror::Error;

/// Errors raised by [`Demand`](crate::demand::Demand) arithmetic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandError {
  #[error("demand underflow: cannot subtract {requested} from bounded demand {available}")]
  Underflow { available: u64, requested: u64 },
}

/// Failure produced by the `timeout` operator when no event arrived in time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no event received within {after:?}")]
pub struct TimeoutError {
  pub after: Duration,
}
