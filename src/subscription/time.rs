//! Periodic ticks.
//!
//! The client uses a [`Timer`] to sweep idle cache entries and to refresh the
//! "posted 5 minutes ago" labels.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::IntervalStream;

use super::{SubscriptionId, SubscriptionSource};

/// Produced by [`Timer`] on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

/// Emits a [`Tick`] at a fixed interval.
///
/// The first tick arrives one full interval after the subscription starts.
/// Missed ticks are skipped rather than replayed.
///
/// ```
/// use plaza::subscription::{Subscription, time::Timer};
///
/// enum Message {
///     SweepCache,
/// }
///
/// let sweep = Subscription::new(Timer::new(60_000)).map(|_| Message::SweepCache);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timer {
    period: Duration,
}

impl Timer {
    /// A timer ticking every `interval_ms` milliseconds.
    #[must_use]
    pub const fn new(interval_ms: u64) -> Self {
        Self::every(Duration::from_millis(interval_ms))
    }

    /// A timer ticking every `period`.
    #[must_use]
    pub const fn every(period: Duration) -> Self {
        Self { period }
    }

    /// The tick period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl SubscriptionSource for Timer {
    type Output = Tick;

    fn stream(&self) -> BoxStream<'static, Tick> {
        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        IntervalStream::new(interval)
            .skip(1) // interval() fires immediately
            .map(|_| Tick)
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_timer_id_consistency() {
        assert_eq!(Timer::new(1000).id(), Timer::new(1000).id());
        assert_eq!(Timer::new(1000).id(), Timer::every(Duration::from_secs(1)).id());
        assert_ne!(Timer::new(1000).id(), Timer::new(2000).id());
    }

    #[tokio::test]
    async fn test_timer_stream_produces_ticks() {
        let mut stream = Timer::new(10).stream();

        let mut count = 0;
        for _ in 0..3 {
            let result = timeout(Duration::from_millis(200), stream.next()).await;
            if matches!(result, Ok(Some(Tick))) {
                count += 1;
            }
        }
        assert_eq!(count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_no_immediate_tick() {
        let mut stream = Timer::new(100).stream();

        let early = timeout(Duration::from_millis(50), stream.next()).await;
        assert!(early.is_err(), "timer should not tick immediately");

        let later = timeout(Duration::from_millis(100), stream.next()).await;
        assert!(matches!(later, Ok(Some(Tick))));
    }
}
