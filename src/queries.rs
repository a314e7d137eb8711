//! Read paths: one [`Query`] per resource view.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::api::{
    Account, Api, Backend, Comment, FilterTransaction, Post, PostFilter, Tag, Topic,
    TransactionFilter, Upvote, UserListingParams, Wallet,
};
use crate::keys::{
    bookmark_keys, comment_keys, post_keys, tag_keys, topic_keys, transaction_keys, upvote_keys,
    user_keys, wallet_keys,
};
use crate::subscription::http::{Query, QueryError, QueryKey};

impl Api {
    fn query<V, F, Fut>(&self, key: QueryKey, fetch: F) -> Query<V>
    where
        V: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn Backend>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, QueryError>> + Send + 'static,
    {
        let backend = Arc::clone(self.backend());
        Query::new(key, move || fetch(Arc::clone(&backend)).boxed(), self.client())
    }

    /// One page of the public feed. Keeps the previous page on screen while
    /// the next one loads.
    pub fn posts(&self, filter: PostFilter) -> Query<Vec<Post>> {
        self.query(post_keys::listing_params(&filter), move |backend| {
            let filter = filter.clone();
            async move { backend.posts(&filter).await }
        })
        .keep_previous_data()
    }

    pub fn post(&self, post_id: &str) -> Query<Post> {
        let post_id = post_id.to_string();
        self.query(post_keys::detail(&post_id), move |backend| {
            let post_id = post_id.clone();
            async move { backend.post(&post_id).await }
        })
    }

    pub fn drafts(&self) -> Query<Vec<Post>> {
        self.query(post_keys::drafts(), |backend| async move {
            backend.drafts().await
        })
    }

    pub fn comments(&self, post_id: &str) -> Query<Vec<Comment>> {
        let post_id = post_id.to_string();
        self.query(comment_keys::by_post(&post_id), move |backend| {
            let post_id = post_id.clone();
            async move { backend.comments(&post_id).await }
        })
    }

    pub fn bookmarks(&self) -> Query<Vec<Post>> {
        self.query(bookmark_keys::listing(), |backend| async move {
            backend.bookmarks().await
        })
    }

    pub fn upvotes(&self) -> Query<Vec<Upvote>> {
        self.query(upvote_keys::listing(), |backend| async move {
            backend.upvotes().await
        })
    }

    pub fn wallet(&self, account_id: &str) -> Query<Wallet> {
        let account_id = account_id.to_string();
        self.query(wallet_keys::by_account(&account_id), move |backend| {
            let account_id = account_id.clone();
            async move { backend.wallet(&account_id).await }
        })
    }

    pub fn transactions(&self, filter: Option<TransactionFilter>) -> Query<FilterTransaction> {
        self.query(
            transaction_keys::current_account(filter.as_ref()),
            move |backend| {
                let filter = filter.clone();
                async move { backend.transactions(filter.as_ref()).await }
            },
        )
        .keep_previous_data()
    }

    pub fn users(&self, params: UserListingParams) -> Query<Vec<Account>> {
        self.query(user_keys::listing_params(&params), move |backend| {
            let params = params.clone();
            async move { backend.users(&params).await }
        })
        .keep_previous_data()
    }

    pub fn tags(&self) -> Query<Vec<Tag>> {
        self.query(tag_keys::listing(), |backend| async move {
            backend.tags().await
        })
    }

    pub fn topics(&self) -> Query<Vec<Topic>> {
        self.query(topic_keys::listing(), |backend| async move {
            backend.topics().await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use futures::stream::BoxStream;
    use tokio::time::timeout;

    use super::*;
    use crate::api::MemoryBackend;
    use crate::subscription::SubscriptionSource;
    use crate::subscription::http::{QueryClient, QueryConfig, QueryResult, QueryState};

    fn api() -> (Arc<MemoryBackend>, Api) {
        let backend = Arc::new(MemoryBackend::demo("a-me", "me"));
        let client = QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        (backend.clone(), Api::new(backend, client))
    }

    async fn next<V>(stream: &mut BoxStream<'static, QueryResult<V>>) -> QueryResult<V> {
        timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("emission within timeout")
            .expect("stream still running")
    }

    #[tokio::test]
    async fn test_post_detail_loads_then_succeeds() {
        let (_, api) = api();
        let mut stream = api.post("p-1").stream();

        assert!(next(&mut stream).await.is_loading());
        let loaded = next(&mut stream).await;
        assert_eq!(loaded.data().map(|p| p.title.as_str()), Some("Ownership in five minutes"));
        assert!(!loaded.is_stale());
    }

    #[tokio::test]
    async fn test_missing_post_is_not_found() {
        let (_, api) = api();
        let mut stream = api.post("nope").stream();

        next(&mut stream).await;
        let failed = next(&mut stream).await;
        assert!(matches!(failed.state, QueryState::Error(QueryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fresh_listing_is_served_from_cache() {
        let (backend, api) = api();
        let mut first = api.tags().stream();
        next(&mut first).await;
        next(&mut first).await;
        drop(first);

        let mut second = api.tags().stream();
        let cached = next(&mut second).await;
        assert!(cached.is_success());
        assert_eq!(backend.calls("tags").await, 1);
    }

    #[test]
    fn test_paged_reads_keep_previous_data() {
        let (_, api) = api();
        let page_two = PostFilter {
            page: 2,
            ..PostFilter::default()
        };
        assert_eq!(api.posts(page_two.clone()).key(), &post_keys::listing_params(&page_two));
        assert_ne!(
            api.users(UserListingParams::default()).key(),
            api.users(UserListingParams::default().search("kim")).key()
        );
        assert_eq!(
            api.transactions(None).key(),
            &transaction_keys::current_account(None)
        );
    }

    #[tokio::test]
    async fn test_wallet_reads_by_account() {
        let (_, api) = api();
        let mut stream = api.wallet("a-me").stream();

        next(&mut stream).await;
        let wallet = next(&mut stream).await;
        assert_eq!(wallet.data().map(|w| w.balance), Some(12));
    }
}
