//! Cached reads and the client that coordinates them.
//!
//! A [`Query`] is a **subscription**: while the application lists it in
//! `subscriptions()`, it keeps its key mounted in the [`QueryClient`] and
//! keeps the application up to date with the cached value.
//!
//! 1. Cached fresh data is emitted immediately and no request is made.
//! 2. Cached stale data is emitted immediately, then refetched.
//! 3. A cache miss emits `Loading`, then fetches.
//! 4. When the key is invalidated, the query refetches.
//!
//! Removing the query from `subscriptions()` unmounts it. A fetch that is
//! still running at that point is dropped and its response never reaches the
//! cache.
//!
//! # Example
//!
//! ```rust,ignore
//! fn subscriptions(&self) -> Vec<Subscription<Message>> {
//!     let backend = self.backend.clone();
//!     vec![
//!         Subscription::new(Query::new(
//!             post_keys::detail(&self.post_id),
//!             move || {
//!                 let backend = backend.clone();
//!                 let id = post_id.clone();
//!                 Box::pin(async move { backend.post(&id).await })
//!             },
//!             &self.query_client,
//!         ))
//!         .map(Message::PostLoaded),
//!     ]
//! }
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};

use crate::command::{Action, Command};
use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::cache::{CacheEntry, Completion, Freshness};
use super::config::QueryConfig;
use super::error::QueryError;
use super::key::{KeyFilter, QueryKey};

/// The state of a query as seen by the application.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// No data yet; a request is in flight.
    Loading,
    /// Data is available.
    Success {
        data: T,
        /// The data is known to be outdated and a refetch is under way or due.
        is_stale: bool,
    },
    /// The last request failed.
    Error(QueryError),
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::Loading
    }
}

/// One emission of a [`Query`].
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    /// The key the result belongs to.
    pub key: QueryKey,
    pub state: QueryState<T>,
    /// Set when the query asked consumers to keep showing the previous
    /// key's data while this one loads.
    pub keep_previous: bool,
}

impl<T> QueryResult<T> {
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }

    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }
}

/// Notifications sent from the client to mounted queries.
#[derive(Debug, Clone)]
enum CacheEvent {
    /// The key was marked stale or a request for it was abandoned.
    Invalidated(QueryKey),
    /// New data or a new error was stored for the key.
    Updated { key: QueryKey, version: u64 },
}

/// The query cache and invalidation coordinator.
///
/// Construct one at the application root and hand clones to whatever needs
/// it; clones share the same cache. Dropping the last clone drops the cache,
/// so tests that build their own client never leak state into each other.
///
/// ```rust
/// use plaza::subscription::http::{QueryClient, QueryConfig, QueryKey};
/// use std::time::Duration;
///
/// let client = QueryClient::with_config(QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// ));
///
/// client.set_query_data(&QueryKey::new("wallets").segment("a-1"), 120_u64);
/// assert_eq!(client.get_query_data::<u64>(&QueryKey::new("wallets").segment("a-1")), Some(120));
/// ```
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<QueryKey, CacheEntry>>,
    exclusive: Arc<DashSet<QueryKey>>,
    events: broadcast::Sender<CacheEvent>,
    config: QueryConfig,
}

impl QueryClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            cache: Arc::new(DashMap::new()),
            exclusive: Arc::new(DashSet::new()),
            events,
            config,
        }
    }

    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Marks every entry selected by any of `filters` stale.
    ///
    /// Mounted queries on a marked key refetch; unmounted entries stay stale
    /// until a query for them is mounted again. Returns the marked keys.
    pub fn invalidate_queries<I>(&self, filters: I) -> Vec<QueryKey>
    where
        I: IntoIterator,
        I::Item: Into<KeyFilter>,
    {
        let filters: Vec<KeyFilter> = filters.into_iter().map(Into::into).collect();
        if filters.is_empty() {
            return Vec::new();
        }

        let mut marked = Vec::new();
        let mut mounted = Vec::new();
        for mut entry in self.cache.iter_mut() {
            if filters.iter().any(|filter| filter.matches(entry.key())) {
                entry.value_mut().invalidate();
                marked.push(entry.key().clone());
                if entry.subscribers() > 0 {
                    mounted.push(entry.key().clone());
                }
            }
        }

        debug!(
            filters = ?filters,
            marked = marked.len(),
            mounted = mounted.len(),
            "invalidated queries"
        );
        for key in mounted {
            // No receiver only means nothing is mounted anymore.
            let _ = self.events.send(CacheEvent::Invalidated(key));
        }
        marked
    }

    /// Invalidation as a command, for use from `update`.
    ///
    /// The command finishes without producing a message.
    pub fn invalidate<Msg>(&self, filter: impl Into<KeyFilter>) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let filter = filter.into();
        Command {
            stream: Some(
                stream::once(async move {
                    client.invalidate_queries([filter]);
                })
                .filter_map(|()| async { None::<Action<Msg>> })
                .boxed(),
            ),
        }
    }

    /// The cached value for `key`, if any.
    pub fn get_query_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.cache.get(key).and_then(|entry| entry.data::<T>())
    }

    /// Writes a value for `key` directly and pushes it to mounted queries.
    ///
    /// Requests for `key` that are still in flight will not overwrite it.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, data: T) {
        let version = {
            let mut entry = self.cache.entry(key.clone()).or_insert_with(CacheEntry::empty);
            entry.replace(data);
            entry.version()
        };
        let _ = self.events.send(CacheEvent::Updated {
            key: key.clone(),
            version,
        });
    }

    /// The freshness of `key`, or `None` if it is not cached.
    pub fn freshness(&self, key: &QueryKey) -> Option<Freshness> {
        self.cache
            .get(key)
            .map(|entry| entry.freshness(self.config.stale_time))
    }

    /// The error of the last request for `key`, if it failed.
    pub fn query_error(&self, key: &QueryKey) -> Option<QueryError> {
        self.cache.get(key).and_then(|entry| entry.error().cloned())
    }

    /// Number of mounted queries for `key`.
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.cache.get(key).map_or(0, |entry| entry.subscribers())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drops entries that have had no mounted query for longer than
    /// `cache_time`. Returns how many were dropped.
    pub fn collect_garbage(&self) -> usize {
        let before = self.cache.len();
        let cache_time = self.config.cache_time;
        self.cache.retain(|_, entry| !entry.should_gc(cache_time));
        let removed = before.saturating_sub(self.cache.len());
        if removed > 0 {
            debug!(removed, "collected idle cache entries");
        }
        removed
    }

    /// Drops every entry. Mounted queries keep running and refill the cache
    /// on their next fetch.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Returns `true` while an exclusive mutation for `scope` is running.
    pub fn is_pending(&self, scope: &QueryKey) -> bool {
        self.exclusive.contains(scope)
    }

    /// Claims `scope` for an exclusive mutation, or `None` if it is taken.
    pub(crate) fn try_claim(&self, scope: &QueryKey) -> Option<ExclusiveClaim> {
        self.exclusive.insert(scope.clone()).then(|| ExclusiveClaim {
            set: Arc::clone(&self.exclusive),
            scope: scope.clone(),
        })
    }

    fn mount(&self, key: &QueryKey) -> Mount {
        self.cache
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty)
            .mount();
        trace!(%key, "mounted query");
        Mount {
            client: self.clone(),
            key: key.clone(),
        }
    }

    fn unmount(&self, key: &QueryKey) {
        if let Some(mut entry) = self.cache.get_mut(key) {
            entry.unmount();
        }
        trace!(%key, "unmounted query");
    }

    fn snapshot<T: Clone + 'static>(&self, key: &QueryKey) -> Snapshot<T> {
        self.cache.get(key).map_or_else(Snapshot::default, |entry| Snapshot {
            data: entry.data::<T>(),
            error: entry.error().cloned(),
            is_stale: entry.is_invalidated(),
            needs_fetch: entry.needs_fetch(self.config.stale_time),
            version: entry.version(),
        })
    }

    fn begin_fetch(&self, key: &QueryKey) -> u64 {
        self.cache
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty)
            .begin_fetch()
    }

    fn complete_fetch<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        seq: u64,
        result: Result<T, QueryError>,
    ) -> (Completion, u64) {
        let (completion, version) = {
            let mut entry = self.cache.entry(key.clone()).or_insert_with(CacheEntry::empty);
            let completion = entry.complete(seq, result);
            (completion, entry.version())
        };
        match completion {
            Completion::Stored { .. } => {
                let _ = self.events.send(CacheEvent::Updated {
                    key: key.clone(),
                    version,
                });
            }
            Completion::Superseded => {
                debug!(%key, seq, "discarded out-of-order response");
            }
        }
        (completion, version)
    }

    fn abandon_fetch(&self, key: &QueryKey) {
        if let Some(mut entry) = self.cache.get_mut(key) {
            entry.abandon_fetch();
        }
        // Queries waiting on the abandoned request must fetch themselves.
        let _ = self.events.send(CacheEvent::Invalidated(key.clone()));
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by a running mutation that was started with `exclusive`.
pub(crate) struct ExclusiveClaim {
    set: Arc<DashSet<QueryKey>>,
    scope: QueryKey,
}

impl Drop for ExclusiveClaim {
    fn drop(&mut self) {
        self.set.remove(&self.scope);
    }
}

/// Keeps a key mounted for as long as a query stream is alive.
struct Mount {
    client: QueryClient,
    key: QueryKey,
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.client.unmount(&self.key);
    }
}

/// Releases the in-flight slot of a request that was dropped before it
/// completed.
struct InFlight<'a> {
    client: &'a QueryClient,
    key: &'a QueryKey,
    done: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.client.abandon_fetch(self.key);
        }
    }
}

struct Snapshot<T> {
    data: Option<T>,
    error: Option<QueryError>,
    /// Invalidated or never fetched. Age alone only matters through
    /// `needs_fetch`.
    is_stale: bool,
    needs_fetch: bool,
    version: u64,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_stale: true,
            needs_fetch: true,
            version: 0,
        }
    }
}

type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync>;

/// A cached read bound to one key.
///
/// The fetcher must only depend on data that is also part of the key:
/// two queries with equal keys share one cache entry.
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: QueryClient,
    keep_previous: bool,
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a query for `key` using `fetcher` to load it.
    pub fn new<F>(key: QueryKey, fetcher: F, client: &QueryClient) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(fetcher),
            client: client.clone(),
            keep_previous: false,
        }
    }

    /// Asks consumers to keep showing the previous key's data while this
    /// key loads, e.g. when paging or typing a search.
    #[must_use]
    pub const fn keep_previous_data(mut self) -> Self {
        self.keep_previous = true;
        self
    }

    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let driver = Driver {
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            rx: self.client.subscribe(),
            _mount: self.client.mount(&self.key),
            client: self.client.clone(),
            keep_previous: self.keep_previous,
            seen: 0,
        };

        stream::unfold((driver, State::Initial), |(mut driver, state)| async move {
            let (result, next) = driver.step(state).await?;
            Some((result, (driver, next)))
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.key.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

/// Internal state machine of a running query.
enum State {
    Initial,
    Fetching,
    Watching,
}

struct Driver<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: QueryClient,
    rx: broadcast::Receiver<CacheEvent>,
    keep_previous: bool,
    /// Version of the cache entry last emitted.
    seen: u64,
    _mount: Mount,
}

impl<V> Driver<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn step(&mut self, state: State) -> Option<(QueryResult<V>, State)> {
        match state {
            State::Initial => Some(self.check()),

            State::Fetching => Some(self.fetch().await),

            State::Watching => loop {
                match self.rx.recv().await {
                    Ok(CacheEvent::Invalidated(key)) if key == self.key => {}
                    Ok(CacheEvent::Updated { key, version })
                        if key == self.key && version > self.seen =>
                    {
                        let snapshot = self.client.snapshot::<V>(&self.key);
                        return Some((self.emit(snapshot, false), State::Watching));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(key = %self.key, skipped, "query lagged behind cache events");
                    }
                    Err(RecvError::Closed) => return None,
                }

                let snapshot = self.client.snapshot::<V>(&self.key);
                if snapshot.needs_fetch {
                    trace!(key = %self.key, "refetching invalidated query");
                    return Some(self.check());
                }
                if snapshot.version > self.seen {
                    return Some((self.emit(snapshot, false), State::Watching));
                }
            },
        }
    }

    /// Emits what the cache holds and decides whether to fetch.
    fn check(&mut self) -> (QueryResult<V>, State) {
        let snapshot = self.client.snapshot::<V>(&self.key);
        let fetching = snapshot.needs_fetch;
        let next = if fetching {
            State::Fetching
        } else {
            State::Watching
        };
        (self.emit(snapshot, fetching), next)
    }

    async fn fetch(&mut self) -> (QueryResult<V>, State) {
        let seq = self.client.begin_fetch(&self.key);
        let mut in_flight = InFlight {
            client: &self.client,
            key: &self.key,
            done: false,
        };
        let result = (self.fetcher)().await;
        in_flight.done = true;
        drop(in_flight);

        let outcome = result.clone();
        match self.client.complete_fetch(&self.key, seq, result) {
            (Completion::Stored { is_stale }, version) => {
                self.seen = version;
                match outcome {
                    // Invalidated while the request was in flight.
                    Ok(data) if is_stale => (
                        self.result(QueryState::Success { data, is_stale }),
                        State::Fetching,
                    ),
                    Ok(data) => (
                        self.result(QueryState::Success { data, is_stale }),
                        State::Watching,
                    ),
                    Err(error) => {
                        debug!(key = %self.key, %error, "query failed");
                        (self.result(QueryState::Error(error)), State::Watching)
                    }
                }
            }
            (Completion::Superseded, _) => {
                let snapshot = self.client.snapshot::<V>(&self.key);
                (self.emit(snapshot, false), State::Watching)
            }
        }
    }

    fn emit(&mut self, snapshot: Snapshot<V>, fetching: bool) -> QueryResult<V> {
        self.seen = self.seen.max(snapshot.version);
        let state = match (snapshot.data, snapshot.error) {
            (Some(data), _) => QueryState::Success {
                data,
                is_stale: snapshot.is_stale || fetching,
            },
            (None, Some(error)) if !fetching => QueryState::Error(error),
            (None, _) => QueryState::Loading,
        };
        self.result(state)
    }

    fn result(&self, state: QueryState<V>) -> QueryResult<V> {
        QueryResult {
            key: self.key.clone(),
            state,
            keep_previous: self.keep_previous,
        }
    }
}

/// Consumer-side holder for the results of one query.
///
/// Views keep a `QueryView` in their model and feed every [`QueryResult`]
/// into [`apply`](Self::apply). It implements keep-previous-data: when the
/// query's key changes (next page, new search) and the new key is still
/// loading, the previous data stays visible and is flagged as a placeholder.
#[derive(Debug, Clone)]
pub struct QueryView<T> {
    state: QueryState<T>,
    key: Option<QueryKey>,
    tracked: Option<QueryKey>,
    is_placeholder: bool,
}

impl<T> Default for QueryView<T> {
    fn default() -> Self {
        Self {
            state: QueryState::Loading,
            key: None,
            tracked: None,
            is_placeholder: false,
        }
    }
}

impl<T: Clone> QueryView<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept results for `key` from now on.
    ///
    /// Call this when the parameters change so that a late emission from the
    /// previous key's query cannot overwrite the new one.
    pub fn track(&mut self, key: QueryKey) {
        self.tracked = Some(key);
    }

    /// Folds a query result into the view. Returns `false` if the result was
    /// ignored because it belongs to a key that is no longer tracked.
    pub fn apply(&mut self, result: QueryResult<T>) -> bool {
        if self.tracked.as_ref().is_some_and(|tracked| *tracked != result.key) {
            trace!(key = %result.key, "ignored result for untracked key");
            return false;
        }

        let switching = self.key.as_ref() != Some(&result.key);
        match result.state {
            QueryState::Loading
                if result.keep_previous
                    && (switching || self.is_placeholder)
                    && self.data().is_some() =>
            {
                self.is_placeholder = true;
            }
            state => {
                self.state = state;
                self.is_placeholder = false;
            }
        }
        self.key = Some(result.key);
        true
    }

    pub const fn state(&self) -> &QueryState<T> {
        &self.state
    }

    /// The data on screen, including stale and placeholder data.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&QueryError> {
        match &self.state {
            QueryState::Error(error) => Some(error),
            _ => None,
        }
    }

    /// The shown data belongs to a previous key.
    pub const fn is_placeholder(&self) -> bool {
        self.is_placeholder
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    /// Loading or refreshing in the background.
    pub const fn is_fetching(&self) -> bool {
        self.is_placeholder
            || matches!(
                self.state,
                QueryState::Loading | QueryState::Success { is_stale: true, .. }
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn counting_query(
        key: QueryKey,
        client: &QueryClient,
        calls: Arc<AtomicUsize>,
    ) -> Query<usize> {
        Query::new(
            key,
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }.boxed()
            },
            client,
        )
    }

    async fn next<V>(stream: &mut BoxStream<'static, QueryResult<V>>) -> QueryResult<V> {
        timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("emission within timeout")
            .expect("stream still running")
    }

    fn listing() -> QueryKey {
        QueryKey::new("posts").segment("listing")
    }

    #[test]
    fn test_query_result_predicates() {
        let loading: QueryResult<i32> = QueryResult {
            key: listing(),
            state: QueryState::Loading,
            keep_previous: false,
        };
        assert!(loading.is_loading());
        assert_eq!(loading.data(), None);

        let stale = QueryResult {
            key: listing(),
            state: QueryState::Success {
                data: 42,
                is_stale: true,
            },
            keep_previous: false,
        };
        assert!(stale.is_success());
        assert!(stale.is_stale());
        assert_eq!(stale.data(), Some(&42));

        let error: QueryResult<i32> = QueryResult {
            key: listing(),
            state: QueryState::Error(QueryError::NotFound(None)),
            keep_previous: false,
        };
        assert!(error.is_error());
        assert!(!error.is_stale());
    }

    #[test]
    fn test_query_id_follows_key_and_type() {
        let client = QueryClient::new();
        let fetch = || async { Ok::<i32, QueryError>(1) }.boxed();

        let a = Query::new(listing(), fetch, &client);
        let b = Query::new(listing(), fetch, &client);
        let c = Query::new(QueryKey::new("tags"), fetch, &client);
        let d = Query::new(listing(), || async { Ok::<u8, QueryError>(1) }.boxed(), &client);

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_ne!(a.id(), d.id());
    }

    #[tokio::test]
    async fn test_cache_miss_loads_then_succeeds() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls.clone()).stream();

        assert!(next(&mut stream).await.is_loading());
        let loaded = next(&mut stream).await;
        assert_eq!(loaded.data(), Some(&1));
        assert!(!loaded.is_stale());
        assert_eq!(client.get_query_data::<usize>(&listing()), Some(1));
        assert_eq!(client.subscriber_count(&listing()), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_fetch() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        client.set_query_data(&listing(), 7_usize);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls.clone()).stream();

        let first = next(&mut stream).await;
        assert_eq!(first.data(), Some(&7));
        assert!(!first.is_stale());
        assert!(timeout(Duration::from_millis(50), stream.next()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_is_shown_then_refetched() {
        let client = QueryClient::new(); // stale immediately
        client.set_query_data(&listing(), 7_usize);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls).stream();

        let first = next(&mut stream).await;
        assert_eq!(first.data(), Some(&7));
        assert!(first.is_stale());

        let second = next(&mut stream).await;
        assert_eq!(second.data(), Some(&1));
    }

    #[tokio::test]
    async fn test_invalidation_refetches_mounted_query() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls.clone()).stream();
        next(&mut stream).await; // Loading
        assert_eq!(next(&mut stream).await.data(), Some(&1));

        let marked = client.invalidate_queries([QueryKey::new("posts")]);
        assert_eq!(marked, vec![listing()]);

        // Stale data first, then the refetched value.
        let stale = next(&mut stream).await;
        assert!(stale.is_stale());
        let mut fresh = next(&mut stream).await;
        while fresh.is_stale() || fresh.data() != Some(&2) {
            fresh = next(&mut stream).await;
        }
        assert_eq!(client.freshness(&listing()), Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_invalidation_marks_only_matching_entries() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let detail = QueryKey::new("posts").segment("detail").segment("p-1");
        let comments = QueryKey::new("comments").segment("byPost").segment("p-1");
        client.set_query_data(&listing(), 1_u8);
        client.set_query_data(&detail, 2_u8);
        client.set_query_data(&comments, 3_u8);

        let marked = client.invalidate_queries([listing()]);

        assert_eq!(marked, vec![listing()]);
        assert_eq!(client.freshness(&listing()), Some(Freshness::Stale));
        assert_eq!(client.freshness(&detail), Some(Freshness::Fresh));
        assert_eq!(client.freshness(&comments), Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_unmounted_entry_stays_stale_until_next_mount() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        client.set_query_data(&listing(), 10_usize);
        client.invalidate_queries([listing()]);
        assert_eq!(client.freshness(&listing()), Some(Freshness::Stale));

        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls.clone()).stream();
        assert!(next(&mut stream).await.is_stale());
        assert_eq!(next(&mut stream).await.data(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_latest_request_wins() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let (slow_tx, slow_rx) = oneshot::channel::<usize>();
        let (fast_tx, fast_rx) = oneshot::channel::<usize>();
        let receivers = Arc::new(std::sync::Mutex::new(vec![fast_rx, slow_rx]));
        let pending = Arc::clone(&receivers);

        let query = Query::new(
            listing(),
            move || {
                let rx = receivers.lock().expect("lock").pop().expect("two fetches");
                async move { rx.await.map_err(|e| QueryError::Network(e.to_string())) }.boxed()
            },
            &client,
        );
        let remaining = move || pending.lock().expect("lock").len();

        let mut first = query.stream();
        assert!(next(&mut first).await.is_loading());
        let first_fetch = tokio::spawn(async move { next(&mut first).await });
        while remaining() != 1 {
            tokio::task::yield_now().await;
        }

        // The running request predates this, so a second mount fetches again.
        client.invalidate_queries([listing()]);
        let mut second = query.stream();
        assert!(next(&mut second).await.is_loading());
        let second_fetch = tokio::spawn(async move { next(&mut second).await });
        while remaining() != 0 {
            tokio::task::yield_now().await;
        }

        // The second request answers first, then the first one straggles in.
        fast_tx.send(2).expect("second fetch waiting");
        let second_result = second_fetch.await.expect("task");
        assert_eq!(second_result.data(), Some(&2));

        slow_tx.send(1).expect("first fetch waiting");
        let first_result = first_fetch.await.expect("task");

        assert_eq!(first_result.data(), Some(&2));
        assert_eq!(client.get_query_data::<usize>(&listing()), Some(2));
        assert_eq!(client.freshness(&listing()), Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_concurrent_mounts_share_one_request() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<()>();
        let gate = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        let counter = Arc::clone(&calls);
        let query = Query::new(
            listing(),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let gate = Arc::clone(&gate);
                async move {
                    if let Some(rx) = gate.lock().await.take() {
                        let _ = rx.await;
                    }
                    Ok(n)
                }
                .boxed()
            },
            &client,
        );

        let mut first = query.stream();
        assert!(next(&mut first).await.is_loading());
        let first_fetch = tokio::spawn(async move { next(&mut first).await });
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let mut second = query.stream();
        assert!(next(&mut second).await.is_loading());
        tx.send(()).expect("fetch waiting");

        assert_eq!(first_fetch.await.expect("task").data(), Some(&1));
        assert_eq!(next(&mut second).await.data(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_stream_unmounts_and_discards_response() {
        let client = QueryClient::new();
        let (tx, rx) = oneshot::channel::<usize>();
        let rx = Arc::new(std::sync::Mutex::new(Some(rx)));
        let query = Query::new(
            listing(),
            move || {
                let rx = rx.lock().expect("lock").take().expect("one fetch");
                async move { rx.await.map_err(|e| QueryError::Network(e.to_string())) }.boxed()
            },
            &client,
        );

        let mut stream = query.stream();
        assert!(next(&mut stream).await.is_loading());
        // Start the fetch, then give up on it.
        assert!(timeout(Duration::from_millis(20), stream.next()).await.is_err());
        assert_eq!(client.freshness(&listing()), Some(Freshness::Fetching));
        drop(stream);

        assert_eq!(client.subscriber_count(&listing()), 0);
        assert_eq!(client.freshness(&listing()), Some(Freshness::Stale));
        assert!(tx.send(5).is_err(), "the request future was dropped");
        assert_eq!(client.get_query_data::<usize>(&listing()), None);
    }

    #[tokio::test]
    async fn test_fetch_error_is_emitted_and_stored() {
        let client = QueryClient::new();
        let query: Query<u32> = Query::new(
            listing(),
            || async { Err(QueryError::NotFound(Some("gone".into()))) }.boxed(),
            &client,
        );
        let mut stream = query.stream();
        next(&mut stream).await;
        let failed = next(&mut stream).await;

        assert!(matches!(failed.state, QueryState::Error(QueryError::NotFound(_))));
        assert_eq!(
            client.query_error(&listing()),
            Some(QueryError::NotFound(Some("gone".into())))
        );
    }

    #[tokio::test]
    async fn test_set_query_data_reaches_mounted_query() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls).stream();
        next(&mut stream).await;
        next(&mut stream).await;

        client.set_query_data(&listing(), 99_usize);
        let mut updated = next(&mut stream).await;
        while updated.data() != Some(&99) {
            updated = next(&mut stream).await;
        }
        assert!(!updated.is_stale());
    }

    #[tokio::test]
    async fn test_refetch_by_second_mount_settles_the_first() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut first = counting_query(listing(), &client, calls.clone()).stream();
        assert!(next(&mut first).await.is_loading());
        assert!(!next(&mut first).await.is_stale());

        // With a zero stale time the new mount refetches.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut second = counting_query(listing(), &client, calls.clone()).stream();
        let cached = next(&mut second).await;
        assert_eq!(cached.data(), Some(&1));
        assert!(cached.is_stale());
        let refetched = next(&mut second).await;
        assert_eq!(refetched.data(), Some(&2));
        assert!(!refetched.is_stale());

        let updated = next(&mut first).await;
        assert_eq!(updated.data(), Some(&2));
        assert!(!updated.is_stale());
        let mut view = QueryView::new();
        view.apply(updated);
        assert!(!view.is_fetching());

        assert!(timeout(Duration::from_millis(20), first.next()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_command_produces_no_messages() {
        let client = QueryClient::new();
        client.set_query_data(&listing(), 1_u8);

        let cmd: Command<()> = client.invalidate(QueryKey::new("posts"));
        let actions: Vec<_> = cmd.stream.expect("stream").collect().await;

        assert!(actions.is_empty());
        assert_eq!(client.freshness(&listing()), Some(Freshness::Stale));
    }

    #[tokio::test]
    async fn test_collect_garbage_drops_idle_entries_only() {
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_millis(1),
        ));
        client.set_query_data(&QueryKey::new("tags"), 1_u8);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = counting_query(listing(), &client, calls).stream();
        next(&mut stream).await;
        next(&mut stream).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(client.collect_garbage(), 1);
        assert!(client.get_query_data::<u8>(&QueryKey::new("tags")).is_none());
        assert!(client.get_query_data::<usize>(&listing()).is_some());
    }

    #[test]
    fn test_exclusive_claims() {
        let client = QueryClient::new();
        let scope = QueryKey::new("bookmarks").segment("toggle").segment("p-1");

        let claim = client.try_claim(&scope).expect("free scope");
        assert!(client.is_pending(&scope));
        assert!(client.try_claim(&scope).is_none());

        drop(claim);
        assert!(!client.is_pending(&scope));
    }

    #[test]
    fn test_view_keeps_previous_data_while_switching() {
        let page = |n: u32| listing().params(&serde_json::json!({ "page": n }));
        let mut view = QueryView::<Vec<u32>>::new();

        view.apply(QueryResult {
            key: page(1),
            state: QueryState::Success {
                data: vec![1, 2],
                is_stale: false,
            },
            keep_previous: true,
        });
        view.track(page(2));
        view.apply(QueryResult {
            key: page(2),
            state: QueryState::Loading,
            keep_previous: true,
        });
        assert_eq!(view.data(), Some(&vec![1, 2]));
        assert!(view.is_placeholder());
        assert!(view.is_fetching());

        // Late emission from the old page is ignored.
        assert!(!view.apply(QueryResult {
            key: page(1),
            state: QueryState::Success {
                data: vec![9],
                is_stale: false,
            },
            keep_previous: true,
        }));

        view.apply(QueryResult {
            key: page(2),
            state: QueryState::Success {
                data: vec![3, 4],
                is_stale: false,
            },
            keep_previous: true,
        });
        assert_eq!(view.data(), Some(&vec![3, 4]));
        assert!(!view.is_placeholder());
    }

    #[test]
    fn test_view_without_keep_previous_shows_loading() {
        let mut view = QueryView::<u32>::new();
        view.apply(QueryResult {
            key: QueryKey::new("a"),
            state: QueryState::Success {
                data: 1,
                is_stale: false,
            },
            keep_previous: false,
        });
        view.apply(QueryResult {
            key: QueryKey::new("b"),
            state: QueryState::Loading,
            keep_previous: false,
        });
        assert!(view.is_loading());
        assert_eq!(view.data(), None);
    }
}
