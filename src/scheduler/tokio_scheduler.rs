use std::time::Duration;

use tokio::runtime::Handle;

use super::{Scheduler, Task, TaskHandle};

/// Runs delayed tasks on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler(Handle);

impl TokioScheduler {
  pub fn new(handle: Handle) -> Self { TokioScheduler(handle) }

  /// Use the runtime the caller is running on.
  ///
  /// # Panics
  ///
  /// When called outside of a tokio runtime.
  pub fn current() -> Self { TokioScheduler(Handle::current()) }
}

impl Scheduler for TokioScheduler {
  fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
    let handle = TaskHandle::new();
    let cancelled = handle.clone();
    self.0.spawn(async move {
      tokio::time::sleep(delay).await;
      if !cancelled.is_cancelled() {
        task();
      }
    });
    handle
  }
}
