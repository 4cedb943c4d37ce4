use super::{Subscription, SubscriptionRef};
use crate::{demand::Demand, rc::MutArc};

/// A subscription handle that can be bound to its real target later.
///
/// Operators hand a proxy out before the upstream subscription exists (or
/// while it is being swapped, as in `retry`, `catch` and `switch_to_latest`).
/// Demand requested before binding accumulates and is forwarded on `bind`; a
/// target bound after `cancel` is cancelled on the spot.
#[derive(Clone, Default)]
pub struct SubscriptionProxy(MutArc<ProxyState>);

#[derive(Default)]
struct ProxyState {
  target: Option<SubscriptionRef>,
  pending: Demand,
  cancelled: bool,
}

impl SubscriptionProxy {
  pub fn new() -> Self { Self::default() }

  /// Bind the real subscription and forward any demand requested so far.
  pub fn bind(&self, target: SubscriptionRef) {
    let mut state = self.0.rc_deref_mut();
    if state.cancelled {
      drop(state);
      target.cancel();
      return;
    }
    let pending = std::mem::take(&mut state.pending);
    state.target = Some(target.clone());
    drop(state);
    if !pending.is_zero() {
      target.request(pending);
    }
  }

  /// Forget the current target without cancelling it (it has terminated on
  /// its own) and seed the demand the next bound target must receive.
  pub fn unbind(&self, pending: Demand) {
    let mut state = self.0.rc_deref_mut();
    state.target = None;
    state.pending = pending;
  }

  pub fn is_bound(&self) -> bool { self.0.rc_deref_mut().target.is_some() }

  pub fn is_cancelled(&self) -> bool { self.0.rc_deref_mut().cancelled }
}

impl Subscription for SubscriptionProxy {
  fn request(&self, demand: Demand) {
    let mut state = self.0.rc_deref_mut();
    if state.cancelled || demand.is_zero() {
      return;
    }
    match state.target.clone() {
      Some(target) => {
        drop(state);
        target.request(demand);
      }
      None => state.pending += demand,
    }
  }

  fn cancel(&self) {
    let mut state = self.0.rc_deref_mut();
    if state.cancelled {
      log::trace!("cancel on an already cancelled subscription");
      return;
    }
    state.cancelled = true;
    state.pending = Demand::NONE;
    let target = state.target.take();
    drop(state);
    if let Some(target) = target {
      target.cancel();
    }
  }
}
