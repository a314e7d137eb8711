use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::QueryError;

/// Observable freshness of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Data was fetched after the last invalidation and within `stale_time`.
    Fresh,
    /// Data is missing, invalidated, or older than `stale_time`.
    Stale,
    /// A request for this key is in flight.
    Fetching,
}

/// What happened to a response handed to [`CacheEntry::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The response was stored. `is_stale` is set when the request was
    /// issued before the latest invalidation.
    Stored { is_stale: bool },
    /// A newer response for the key was already stored; this one was dropped.
    Superseded,
}

/// One slot of the query cache.
///
/// The payload is type-erased so entries of every value type can share one
/// table and be invalidated without knowing their type. Freshness is tracked
/// next to the payload instead of inside it for the same reason.
///
/// Requests are numbered per key. `issued` is the last number handed out,
/// `stored` the number of the response currently held, and `invalidated_at`
/// the value of `issued` at the last invalidation. `version` counts every
/// change of the stored payload or error.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    data: Option<Arc<dyn Any + Send + Sync>>,
    error: Option<QueryError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    in_flight: usize,
    issued: u64,
    stored: u64,
    invalidated_at: u64,
    version: u64,
    subscribers: usize,
    last_active: Instant,
}

impl CacheEntry {
    /// An entry with nothing fetched yet.
    pub(crate) fn empty() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            in_flight: 0,
            issued: 0,
            stored: 0,
            invalidated_at: 0,
            version: 0,
            subscribers: 0,
            last_active: Instant::now(),
        }
    }

    /// An entry holding `data`, fresh as of now.
    #[cfg(test)]
    pub(crate) fn with_data<T: Send + Sync + 'static>(data: T) -> Self {
        let mut entry = Self::empty();
        entry.replace(data);
        entry
    }

    /// The cached value, if there is one of type `T`.
    pub(crate) fn data<T: Clone + 'static>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|data| data.downcast_ref::<T>())
            .cloned()
    }

    pub(crate) const fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Whether the entry needs a refetch.
    pub(crate) fn is_stale(&self, stale_time: Duration) -> bool {
        match self.updated_at {
            None => true,
            Some(at) => self.invalidated || at.elapsed() > stale_time,
        }
    }

    /// Whether the stored data is known to be outdated, regardless of its age.
    pub(crate) const fn is_invalidated(&self) -> bool {
        self.invalidated || self.updated_at.is_none()
    }

    /// Whether a newly started request is needed to make the entry fresh.
    ///
    /// A stale entry does not need one while a request issued after the last
    /// invalidation is still running.
    pub(crate) fn needs_fetch(&self, stale_time: Duration) -> bool {
        let covered = self.in_flight > 0 && self.issued > self.invalidated_at;
        !covered && self.is_stale(stale_time)
    }

    pub(crate) const fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn freshness(&self, stale_time: Duration) -> Freshness {
        if self.in_flight > 0 {
            Freshness::Fetching
        } else if self.is_stale(stale_time) {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// Marks the entry stale. Responses to requests issued so far will not
    /// make it fresh again.
    pub(crate) fn invalidate(&mut self) {
        self.invalidated = true;
        self.invalidated_at = self.issued;
    }

    /// Registers a new request and returns its sequence number.
    pub(crate) fn begin_fetch(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight += 1;
        self.issued
    }

    /// Records the response to request `seq`.
    pub(crate) fn complete<T: Send + Sync + 'static>(
        &mut self,
        seq: u64,
        result: Result<T, QueryError>,
    ) -> Completion {
        self.in_flight = self.in_flight.saturating_sub(1);
        if seq < self.stored {
            return Completion::Superseded;
        }
        self.stored = seq;
        self.version += 1;

        match result {
            Ok(data) => {
                self.data = Some(Arc::new(data));
                self.error = None;
                self.updated_at = Some(Instant::now());
                self.invalidated = seq <= self.invalidated_at;
            }
            Err(error) => {
                // Keep the last good value around for stale-while-error views.
                self.error = Some(error);
            }
        }
        Completion::Stored {
            is_stale: self.is_invalidated(),
        }
    }

    /// Releases a request whose response will never arrive.
    pub(crate) fn abandon_fetch(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Replaces the data directly, as after an optimistic update.
    pub(crate) fn replace<T: Send + Sync + 'static>(&mut self, data: T) {
        self.data = Some(Arc::new(data));
        self.error = None;
        self.updated_at = Some(Instant::now());
        self.invalidated = false;
        self.version += 1;
        // Outstanding requests predate this value.
        self.stored = self.issued + 1;
    }

    pub(crate) fn mount(&mut self) {
        self.subscribers += 1;
        self.last_active = Instant::now();
    }

    pub(crate) fn unmount(&mut self) {
        self.subscribers = self.subscribers.saturating_sub(1);
        self.last_active = Instant::now();
    }

    pub(crate) const fn subscribers(&self) -> usize {
        self.subscribers
    }

    /// Whether the entry has been unused for longer than `cache_time`.
    pub(crate) fn should_gc(&self, cache_time: Duration) -> bool {
        self.subscribers == 0 && self.in_flight == 0 && self.last_active.elapsed() > cache_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_empty_entry_is_stale() {
        let entry = CacheEntry::empty();
        assert!(entry.is_stale(LONG));
        assert_eq!(entry.data::<i32>(), None);
    }

    #[test]
    fn test_with_data_is_fresh() {
        let entry = CacheEntry::with_data(42);
        assert_eq!(entry.data::<i32>(), Some(42));
        assert_eq!(entry.freshness(LONG), Freshness::Fresh);
    }

    #[test]
    fn test_data_of_wrong_type_is_none() {
        let entry = CacheEntry::with_data(42_i32);
        assert_eq!(entry.data::<String>(), None);
    }

    #[test]
    fn test_stale_after_stale_time() {
        let entry = CacheEntry::with_data(42);
        sleep(Duration::from_millis(10));
        assert!(entry.is_stale(Duration::from_millis(5)));
        assert!(!entry.is_stale(LONG));
    }

    #[test]
    fn test_invalidate_marks_stale() {
        let mut entry = CacheEntry::with_data(42);
        entry.invalidate();
        assert_eq!(entry.freshness(LONG), Freshness::Stale);
    }

    #[test]
    fn test_fetching_state() {
        let mut entry = CacheEntry::empty();
        let seq = entry.begin_fetch();
        assert_eq!(entry.freshness(LONG), Freshness::Fetching);
        entry.complete(seq, Ok(1));
        assert_eq!(entry.freshness(LONG), Freshness::Fresh);
    }

    #[test]
    fn test_late_older_response_is_discarded() {
        let mut entry = CacheEntry::empty();
        let first = entry.begin_fetch();
        let second = entry.begin_fetch();

        assert_eq!(entry.complete(second, Ok("new")), Completion::Stored { is_stale: false });
        assert_eq!(entry.complete(first, Ok("old")), Completion::Superseded);
        assert_eq!(entry.data::<&str>(), Some("new"));
        assert_eq!(entry.freshness(LONG), Freshness::Fresh);
    }

    #[test]
    fn test_in_order_responses_keep_the_latest() {
        let mut entry = CacheEntry::empty();
        let first = entry.begin_fetch();
        let second = entry.begin_fetch();

        entry.complete(first, Ok(1));
        entry.complete(second, Ok(2));
        assert_eq!(entry.data::<i32>(), Some(2));
    }

    #[test]
    fn test_response_issued_before_invalidation_stays_stale() {
        let mut entry = CacheEntry::empty();
        let before = entry.begin_fetch();
        entry.invalidate();

        assert_eq!(entry.complete(before, Ok(1)), Completion::Stored { is_stale: true });
        assert!(entry.is_stale(LONG));

        let after = entry.begin_fetch();
        assert_eq!(entry.complete(after, Ok(2)), Completion::Stored { is_stale: false });
        assert!(!entry.is_stale(LONG));
    }

    #[test]
    fn test_error_keeps_data_and_is_cleared_on_success() {
        let mut entry = CacheEntry::with_data(1);
        let seq = entry.begin_fetch();
        entry.complete::<i32>(seq, Err(QueryError::Network("down".into())));
        assert_eq!(entry.data::<i32>(), Some(1));
        assert!(entry.error().is_some());

        let seq = entry.begin_fetch();
        entry.complete(seq, Ok(2));
        assert!(entry.error().is_none());
        assert_eq!(entry.data::<i32>(), Some(2));
    }

    #[test]
    fn test_replace_supersedes_outstanding_requests() {
        let mut entry = CacheEntry::empty();
        let seq = entry.begin_fetch();
        entry.replace(10);
        assert_eq!(entry.complete(seq, Ok(1)), Completion::Superseded);
        assert_eq!(entry.data::<i32>(), Some(10));

        let next = entry.begin_fetch();
        assert_eq!(entry.complete(next, Ok(2)), Completion::Stored { is_stale: false });
        assert_eq!(entry.data::<i32>(), Some(2));
    }

    #[test]
    fn test_running_request_covers_stale_entry() {
        let mut entry = CacheEntry::with_data(1);
        entry.invalidate();
        assert!(entry.needs_fetch(LONG));

        let seq = entry.begin_fetch();
        assert!(!entry.needs_fetch(LONG));

        // A second invalidation makes the running request insufficient.
        entry.invalidate();
        assert!(entry.needs_fetch(LONG));

        entry.complete(seq, Ok(2));
        assert!(entry.needs_fetch(LONG));
    }

    #[test]
    fn test_version_counts_stored_changes() {
        let mut entry = CacheEntry::empty();
        assert_eq!(entry.version(), 0);
        entry.replace(1);
        let old = entry.begin_fetch() - 1;
        assert_eq!(entry.complete(old, Ok(0)), Completion::Superseded);
        assert_eq!(entry.version(), 1);

        let seq = entry.begin_fetch();
        entry.complete::<i32>(seq, Err(QueryError::Unknown(None)));
        assert_eq!(entry.version(), 2);
    }

    #[test]
    fn test_gc_requires_no_subscribers() {
        let mut entry = CacheEntry::with_data(1);
        entry.mount();
        sleep(Duration::from_millis(5));
        assert!(!entry.should_gc(Duration::from_millis(1)));

        entry.unmount();
        sleep(Duration::from_millis(5));
        assert!(entry.should_gc(Duration::from_millis(1)));
        assert!(!entry.should_gc(LONG));
    }
}
