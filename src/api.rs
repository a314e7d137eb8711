//! Access to the REST backend.
//!
//! [`Backend`] has one method per resource operation. [`HttpBackend`] talks
//! to the real service; [`MemoryBackend`] keeps everything in process for
//! tests and the `--demo` mode. The rest of the application only sees
//! [`Api`], which pairs a backend with the [`QueryClient`] whose cache it
//! feeds.

mod http;
mod memory;
mod model;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use model::*;

use crate::subscription::http::{QueryClient, QueryError};

/// The operations the client performs against the service.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn posts(&self, filter: &PostFilter) -> Result<Vec<Post>, QueryError>;
    async fn post(&self, post_id: &str) -> Result<Post, QueryError>;
    async fn drafts(&self) -> Result<Vec<Post>, QueryError>;
    async fn delete_post(&self, post_id: &str) -> Result<(), QueryError>;
    async fn delete_drafts(&self, post_ids: &[String]) -> Result<(), QueryError>;
    async fn update_post_status(&self, post_id: &str, status: PostStatus)
    -> Result<(), QueryError>;
    async fn report_post(&self, post_id: &str, reason: ReportReason) -> Result<(), QueryError>;
    /// Charges [`DOWNLOAD_POINT`] and returns where to fetch the attachment.
    async fn download_post(&self, post_id: &str) -> Result<Download, QueryError>;

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, QueryError>;
    async fn create_comment(&self, post_id: &str, content: &str) -> Result<Comment, QueryError>;

    /// Posts bookmarked by the current account.
    async fn bookmarks(&self) -> Result<Vec<Post>, QueryError>;
    async fn toggle_bookmark(&self, post_id: &str) -> Result<(), QueryError>;
    /// Upvotes cast by the current account.
    async fn upvotes(&self) -> Result<Vec<Upvote>, QueryError>;
    async fn toggle_upvote(&self, post_id: &str) -> Result<(), QueryError>;

    async fn wallet(&self, account_id: &str) -> Result<Wallet, QueryError>;
    async fn transactions(
        &self,
        filter: Option<&TransactionFilter>,
    ) -> Result<FilterTransaction, QueryError>;

    async fn users(&self, params: &UserListingParams) -> Result<Vec<Account>, QueryError>;
    async fn delete_account(&self, account_id: &str) -> Result<(), QueryError>;
    async fn tags(&self) -> Result<Vec<Tag>, QueryError>;
    async fn delete_tag(&self, tag_id: &str) -> Result<(), QueryError>;
    async fn topics(&self) -> Result<Vec<Topic>, QueryError>;
    async fn delete_topic(&self, topic_id: &str) -> Result<(), QueryError>;

    async fn forgot_password(&self, email: &str) -> Result<(), QueryError>;
}

/// A backend together with the query cache in front of it.
///
/// Cloning is cheap; clones share the backend and the cache.
#[derive(Clone)]
pub struct Api {
    backend: Arc<dyn Backend>,
    client: QueryClient,
}

impl Api {
    pub fn new(backend: Arc<dyn Backend>, client: QueryClient) -> Self {
        Self { backend, client }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub const fn client(&self) -> &QueryClient {
        &self.client
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("cached", &self.client.len())
            .finish_non_exhaustive()
    }
}
