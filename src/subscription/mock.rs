//! Controllable subscription source for tests.
//!
//! [`MockSource`] emits values on demand, so application logic that depends
//! on subscriptions (input events, refresh ticks) can be driven
//! deterministically without a terminal or real timers.
//!
//! ```
//! use plaza::subscription::{Subscription, mock::MockSource};
//!
//! #[derive(Clone)]
//! enum Input {
//!     NextPage,
//! }
//!
//! let input = MockSource::<Input>::new();
//! let sub = Subscription::new(input.clone());
//!
//! // Nothing is listening until the runtime starts the subscription.
//! assert_eq!(input.receiver_count(), 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::subscription::{SubscriptionId, SubscriptionSource};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(0);

/// A subscription source that emits values when told to.
///
/// Backed by a broadcast channel, so clones share the same channel and the
/// same subscription id. Hand one clone to the application and keep another
/// in the test.
#[derive(Debug, Clone)]
pub struct MockSource<T: Clone> {
    sender: broadcast::Sender<T>,
    id: SubscriptionId,
}

impl<T: Clone + 'static> MockSource<T> {
    /// Creates a mock with room for `capacity` unreceived values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            id: SubscriptionId::of::<Self>(NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Creates a mock with a capacity of 100.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Emits a value to every running stream.
    ///
    /// # Errors
    ///
    /// Returns an error if no stream is currently running.
    pub fn emit(&self, value: T) -> Result<usize, broadcast::error::SendError<T>> {
        self.sender.send(value)
    }

    /// Number of running streams.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + 'static> Default for MockSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SubscriptionSource for MockSource<T> {
    type Output = T;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::Subscription;

    #[test]
    fn test_emit_requires_receiver() {
        let mock = MockSource::<i32>::new();
        assert!(mock.emit(42).is_err());

        let _rx = mock.sender.subscribe();
        assert_eq!(mock.receiver_count(), 1);
        assert_eq!(mock.emit(42).expect("should emit to receiver"), 1);
    }

    #[test]
    fn test_clones_share_channel_and_id() {
        let first = MockSource::<i32>::new();
        let second = first.clone();

        let _rx = first.sender.subscribe();
        assert_eq!(second.receiver_count(), 1);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn test_distinct_mocks_have_distinct_ids() {
        let first = MockSource::<i32>::new();
        let second = MockSource::<i32>::new();
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_stream_receives_values() {
        let mock = MockSource::<i32>::new();
        let sub = Subscription::new(mock.clone());
        let mut stream = (sub.spawn)();

        mock.emit(1).expect("should emit to stream");
        mock.emit(2).expect("should emit to stream");

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
    }
}
