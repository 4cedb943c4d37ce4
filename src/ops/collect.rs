use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{Backpressure, Completion, DemandBuffer, Subscriber},
  subscription::{unbounded_on_any, MapDemand, SubscriptionRef},
};

/// Gathers values into vectors.
///
/// With a batch size, a vector is emitted every `n` values and the last,
/// partial batch when upstream finishes; one unit of downstream demand is
/// turned into `n` units of upstream demand. Without one, the whole
/// sequence is emitted as one vector when upstream finishes. A failure
/// drops whatever has not been emitted yet.
pub struct Collect<P> {
  pub(crate) source: P,
  pub(crate) batch: Option<usize>,
}

impl<P: Publisher> Publisher for Collect<P> {
  type Item = Vec<P::Item>;
  type Err = P::Err;

  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<Vec<P::Item>, P::Err> + 'static,
  {
    self.source.subscribe(CollectSubscriber {
      buffer: DemandBuffer::new(subscriber, Backpressure::Buffer),
      items: Vec::with_capacity(self.batch.unwrap_or(0)),
      batch: self.batch,
    })
  }
}

pub struct CollectSubscriber<Item, Err> {
  buffer: DemandBuffer<Vec<Item>, Err>,
  items: Vec<Item>,
  batch: Option<usize>,
}

impl<Item, Err> Subscriber<Item, Err> for CollectSubscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let upstream = match self.batch {
      Some(n) => MapDemand::shared(subscription, move |d: Demand| d.scale(n as u64)),
      None => MapDemand::shared(subscription, unbounded_on_any),
    };
    self.buffer.attach(Some(upstream));
  }

  fn on_value(&mut self, value: Item) -> Demand {
    self.items.push(value);
    if let Some(n) = self.batch {
      if self.items.len() >= n {
        let batch = std::mem::replace(&mut self.items, Vec::with_capacity(n));
        self.buffer.push(batch);
      }
    }
    Demand::none()
  }

  fn on_completion(&mut self, completion: Completion<Err>) {
    if completion.is_finished() && (self.batch.is_none() || !self.items.is_empty()) {
      self.buffer.push(std::mem::take(&mut self.items));
    }
    self.buffer.complete(completion);
  }
}

#[cfg(test)]
mod test {
  use std::sync::{Arc, Mutex};

  use crate::{prelude::*, publisher};

  fn batches(len: i32, n: usize) -> Vec<Vec<i32>> {
    let out = Arc::new(Mutex::new(vec![]));
    let sink = out.clone();
    let _handle = publisher::sequence(0..len)
      .collect_into_batches(n)
      .sink(move |v| sink.lock().unwrap().push(v));
    let result = out.lock().unwrap().clone();
    result
  }

  #[test]
  fn batch_count_is_ceil() {
    for (len, n) in [(10, 3), (9, 3), (1, 4), (0, 2)] {
      let got = batches(len, n);
      let expected = (len as usize).div_ceil(n);
      assert_eq!(got.len(), expected, "len {len} n {n}");
      if let Some(last) = got.last() {
        let rem = len as usize % n;
        assert_eq!(last.len(), if rem == 0 { n } else { rem });
      }
    }
  }

  #[test]
  fn failure_drops_partial_batch() {
    let out = Arc::new(Mutex::new(vec![]));
    let (values, done) = (out.clone(), out.clone());
    let _handle = publisher::record(vec![1, 2, 3], Completion::Failed("e"))
      .collect_into_batches(2)
      .sink_all(
        move |v| values.lock().unwrap().push(format!("{v:?}")),
        move |c| done.lock().unwrap().push(format!("{c:?}")),
      );
    assert_eq!(*out.lock().unwrap(), vec!["[1, 2]", "Failed(\"e\")"]);
  }

  #[test]
  fn collect_all_emits_once() {
    let out = Arc::new(Mutex::new(vec![]));
    let sink = out.clone();
    let _handle = publisher::sequence(vec!["a", "b"])
      .collect()
      .sink(move |v| sink.lock().unwrap().push(v));
    assert_eq!(*out.lock().unwrap(), vec![vec!["a", "b"]]);
  }
}
