//! Where delayed work runs.
//!
//! The core protocol never needs a scheduler; only time-based operators
//! (`timeout`) do. A scheduler runs a task once after a delay, on whatever
//! execution context it owns, and hands back a handle that can prevent a
//! task which has not run yet.

use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

mod virtual_time;
pub use virtual_time::VirtualTimeScheduler;

#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// A unit of delayed work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Run `task` once, `delay` from now.
  fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle;
}

/// Cancellation handle of a scheduled task.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle(Arc<AtomicBool>);

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  /// Prevent the task from running. A task that already ran is unaffected;
  /// calling it again is a no-op.
  #[inline]
  pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}
