//! Subjects: publishers that values are pushed into from outside.
//!
//! A subject broadcasts every `send` to the subscribers attached at that
//! moment, in attach order. Two kinds are provided:
//!
//! - [`PassthroughSubject`] keeps no history. A subscriber without
//!   outstanding demand misses the value.
//! - [`CurrentValueSubject`] retains the latest value: a new subscriber
//!   receives it first, and a subscriber that is out of demand gets the most
//!   recent value it missed once demand arrives.
//!
//! Both are also subscribers, so a subject can be subscribed to any
//! publisher to relay it. After the terminal signal every further `send` is
//! a silent no-op; [`Subject::is_terminated`] tells whether that happened.

mod current_value;
mod passthrough;
mod subject_core;

pub use current_value::CurrentValueSubject;
pub use passthrough::PassthroughSubject;

use crate::{publisher::Publisher, subscriber::Completion};

/// The push side of a subject.
pub trait Subject<Item, Err>: Publisher<Item = Item, Err = Err> {
  /// Deliver `value` to every attached subscriber.
  fn send(&self, value: Item);

  /// Deliver the terminal signal to every attached subscriber and detach
  /// them all. Only the first call has an effect.
  fn send_completion(&self, completion: Completion<Err>);

  fn is_terminated(&self) -> bool;
}
