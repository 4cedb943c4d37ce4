use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use super::{Scheduler, Task, TaskHandle};
use crate::rc::MutArc;

// ==================== Internal State ====================

#[derive(Default)]
struct VirtualState {
  now: Duration,
  queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
}

struct ScheduledTask {
  due: Duration,
  task_id: usize,
  task: Task,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.task_id == other.task_id }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier due time first, then FIFO by task id
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

// ==================== VirtualTimeScheduler ====================

/// A scheduler driven by virtual time, for deterministic tests.
///
/// Time only moves when [`advance_by`](Self::advance_by) is called; tasks
/// that become due run synchronously inside that call, in due order. Clones
/// share the same clock and queue.
///
/// ```rust
/// use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, time::Duration};
///
/// use rxflow::scheduler::{Scheduler, VirtualTimeScheduler};
///
/// let scheduler = VirtualTimeScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// scheduler.schedule_after(Duration::from_millis(10), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// scheduler.advance_by(Duration::from_millis(9));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance_by(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Default)]
pub struct VirtualTimeScheduler(MutArc<VirtualState>);

impl VirtualTimeScheduler {
  pub fn new() -> Self { Self::default() }

  /// Current virtual time, measured from the scheduler's creation.
  pub fn now(&self) -> Duration { self.0.rc_deref_mut().now }

  /// Number of tasks waiting to run, cancelled ones included.
  pub fn pending_tasks(&self) -> usize { self.0.rc_deref_mut().queue.len() }

  /// Move the clock forward by `delta`, running every task that falls due.
  ///
  /// Tasks scheduled by a running task are honoured if they fall due within
  /// the same window.
  pub fn advance_by(&self, delta: Duration) {
    let target = self.now() + delta;
    loop {
      let mut state = self.0.rc_deref_mut();
      let due = matches!(state.queue.peek(), Some(next) if next.due <= target);
      if !due {
        state.now = target;
        return;
      }
      let Some(next) = state.queue.pop() else {
        return;
      };
      state.now = next.due;
      drop(state);
      if !next.handle.is_cancelled() {
        (next.task)();
      }
    }
  }
}

impl Scheduler for VirtualTimeScheduler {
  fn schedule_after(&self, delay: Duration, task: Task) -> TaskHandle {
    let handle = TaskHandle::new();
    let mut state = self.0.rc_deref_mut();
    let task_id = state.next_task_id;
    state.next_task_id += 1;
    let due = state.now + delay;
    state.queue.push(ScheduledTask { due, task_id, task, handle: handle.clone() });
    handle
  }
}
