use std::marker::PhantomData;

use crate::{
  publisher::{sequence::IterSubscription, Publisher},
  subscriber::{Completion, Subscriber},
  subscription::EmptySubscription,
};

/// Finishes right away without emitting.
pub fn empty<Item, Err>() -> Empty<Item, Err> { Empty(PhantomData) }

/// Never emits and never terminates.
pub fn never<Item, Err>() -> Never<Item, Err> { Never(PhantomData) }

/// Fails right away with `err`.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use rxflow::{prelude::*, publisher};
///
/// let result = Arc::new(Mutex::new(None));
/// let slot = result.clone();
/// let _handle = publisher::fail::<i32, _>("boom")
///   .sink_all(|_| {}, move |c| *slot.lock().unwrap() = Some(c));
/// assert_eq!(*result.lock().unwrap(), Some(Completion::Failed("boom")));
/// ```
pub fn fail<Item, Err>(err: Err) -> Fail<Item, Err> { Fail(err, PhantomData) }

pub struct Empty<Item, Err>(PhantomData<fn() -> (Item, Err)>);

pub struct Never<Item, Err>(PhantomData<fn() -> (Item, Err)>);

pub struct Fail<Item, Err>(Err, PhantomData<fn() -> Item>);

impl<Item, Err> Clone for Empty<Item, Err> {
  fn clone(&self) -> Self { Empty(PhantomData) }
}

impl<Item, Err> Clone for Never<Item, Err> {
  fn clone(&self) -> Self { Never(PhantomData) }
}

impl<Item, Err: Clone> Clone for Fail<Item, Err> {
  fn clone(&self) -> Self { Fail(self.0.clone(), PhantomData) }
}

impl<Item, Err> Publisher for Empty<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    IterSubscription::start(std::iter::empty(), Completion::Finished, subscriber)
  }
}

impl<Item, Err> Publisher for Never<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, mut subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    subscriber.on_subscribe(EmptySubscription::shared());
  }
}

impl<Item, Err> Publisher for Fail<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Item = Item;
  type Err = Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Item, Err> + 'static,
  {
    IterSubscription::start(std::iter::empty(), Completion::Failed(self.0.clone()), subscriber)
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{demand::Demand, subscription::SubscriptionRef};

  #[derive(Default, Clone)]
  struct Signals(Arc<Mutex<Vec<&'static str>>>);

  impl<Item, Err> Subscriber<Item, Err> for Signals {
    fn on_subscribe(&mut self, _: SubscriptionRef) { self.0.lock().unwrap().push("subscribe"); }

    fn on_value(&mut self, _: Item) -> Demand {
      self.0.lock().unwrap().push("value");
      Demand::none()
    }

    fn on_completion(&mut self, completion: Completion<Err>) {
      let name = if completion.is_finished() { "finished" } else { "failed" };
      self.0.lock().unwrap().push(name);
    }
  }

  #[test]
  fn terminal_sources() {
    let signals = Signals::default();
    empty::<i32, ()>().subscribe(signals.clone());
    fail::<i32, _>(()).subscribe(signals.clone());
    never::<i32, ()>().subscribe(signals.clone());
    assert_eq!(
      *signals.0.lock().unwrap(),
      vec!["subscribe", "finished", "subscribe", "failed", "subscribe"]
    );
  }
}
