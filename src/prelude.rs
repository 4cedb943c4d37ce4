//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Connectors
pub use crate::connectable::{Multicast, Share, SubjectMulticast};
// Core protocol
pub use crate::demand::Demand;
// Errors
pub use crate::error::{DemandError, TimeoutError};
// Operators
pub use crate::ops::PublisherExt;
pub use crate::publisher::{AnyPublisher, Publisher};
// Scheduler
pub use crate::scheduler::{Scheduler, TaskHandle};
// Subject
pub use crate::subject::{CurrentValueSubject, PassthroughSubject, Subject};
pub use crate::subscriber::{Backpressure, Completion, Subscriber};
// Subscription
pub use crate::subscription::{CancelBag, Cancellable, Subscription, SubscriptionRef};
