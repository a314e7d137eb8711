use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, trace};
use url::Url;

use super::{
    Account, Backend, Comment, Download, FilterTransaction, Post, PostFilter, PostStatus,
    ReportReason, Tag, Topic, TransactionFilter, Upvote, UserListingParams, Wallet,
};
use crate::subscription::http::QueryError;

#[derive(Debug, thiserror::Error)]
pub enum HttpBackendError {
    #[error("Invalid API base URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("API base URL cannot have a path: {0}")]
    NotABase(Url),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Successful responses wrap their payload as `{ "entity": ... }`.
#[derive(Deserialize)]
struct Envelope<T> {
    entity: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// [`Backend`] over the service's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Fails if `base_url` is not an absolute URL or the HTTP client cannot
    /// be built.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, HttpBackendError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(HttpBackendError::NotABase(base_url));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// The base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected bases that cannot take segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        trace!(%method, %url, "request");
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, QueryError> {
        let response = request
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, "backend rejected request");
        Err(error_for_status(status, &body))
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, QueryError> {
        let response = Self::send(request).await?;
        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            if e.is_decode() {
                QueryError::Unknown(Some(format!("Unexpected response: {e}")))
            } else {
                QueryError::Network(e.to_string())
            }
        })?;
        Ok(envelope.entity)
    }

    async fn execute(request: RequestBuilder) -> Result<(), QueryError> {
        Self::send(request).await.map(drop)
    }
}

/// Maps a non-2xx response to the error taxonomy.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> QueryError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty());
    match status {
        StatusCode::NOT_FOUND => QueryError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            QueryError::Validation(message)
        }
        _ => QueryError::Unknown(message),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn posts(&self, filter: &PostFilter) -> Result<Vec<Post>, QueryError> {
        Self::fetch(self.request(Method::GET, &["post", "listing"]).query(filter)).await
    }

    async fn post(&self, post_id: &str) -> Result<Post, QueryError> {
        Self::fetch(self.request(Method::GET, &["post", post_id])).await
    }

    async fn drafts(&self) -> Result<Vec<Post>, QueryError> {
        Self::fetch(self.request(Method::GET, &["post", "drafts"])).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), QueryError> {
        Self::execute(self.request(Method::DELETE, &["post", post_id])).await
    }

    async fn delete_drafts(&self, post_ids: &[String]) -> Result<(), QueryError> {
        Self::execute(
            self.request(Method::DELETE, &["post", "drafts"])
                .json(&json!({ "postIds": post_ids })),
        )
        .await
    }

    async fn update_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
    ) -> Result<(), QueryError> {
        Self::execute(
            self.request(Method::PUT, &["post", "update", post_id, "status"])
                .query(&[("status", status.as_param())]),
        )
        .await
    }

    async fn report_post(&self, post_id: &str, reason: ReportReason) -> Result<(), QueryError> {
        Self::execute(
            self.request(Method::POST, &["report"])
                .json(&json!({ "postId": post_id, "reason": reason })),
        )
        .await
    }

    async fn download_post(&self, post_id: &str) -> Result<Download, QueryError> {
        Self::fetch(self.request(Method::GET, &["post", "download", post_id])).await
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, QueryError> {
        Self::fetch(self.request(Method::GET, &["comment", "post", post_id])).await
    }

    async fn create_comment(&self, post_id: &str, content: &str) -> Result<Comment, QueryError> {
        Self::fetch(
            self.request(Method::POST, &["comment"])
                .json(&json!({ "postId": post_id, "content": content })),
        )
        .await
    }

    async fn bookmarks(&self) -> Result<Vec<Post>, QueryError> {
        Self::fetch(self.request(Method::GET, &["bookmark", "listing"])).await
    }

    async fn toggle_bookmark(&self, post_id: &str) -> Result<(), QueryError> {
        Self::execute(
            self.request(Method::POST, &["bookmark", "toggle"])
                .json(&json!({ "postId": post_id })),
        )
        .await
    }

    async fn upvotes(&self) -> Result<Vec<Upvote>, QueryError> {
        Self::fetch(self.request(Method::GET, &["upvote", "listing"])).await
    }

    async fn toggle_upvote(&self, post_id: &str) -> Result<(), QueryError> {
        Self::execute(self.request(Method::POST, &["upvote", "toggle", post_id])).await
    }

    async fn wallet(&self, account_id: &str) -> Result<Wallet, QueryError> {
        Self::fetch(self.request(Method::GET, &["wallet", "account", account_id])).await
    }

    async fn transactions(
        &self,
        filter: Option<&TransactionFilter>,
    ) -> Result<FilterTransaction, QueryError> {
        let request = self.request(Method::GET, &["utility", "filter-transaction"]);
        let request = match filter {
            Some(filter) => request.query(filter),
            None => request,
        };
        Self::fetch(request).await
    }

    async fn users(&self, params: &UserListingParams) -> Result<Vec<Account>, QueryError> {
        Self::fetch(self.request(Method::GET, &["account", "listing"]).query(params)).await
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), QueryError> {
        Self::execute(self.request(Method::DELETE, &["account", account_id])).await
    }

    async fn tags(&self) -> Result<Vec<Tag>, QueryError> {
        Self::fetch(self.request(Method::GET, &["tag", "listing"])).await
    }

    async fn delete_tag(&self, tag_id: &str) -> Result<(), QueryError> {
        Self::execute(self.request(Method::DELETE, &["tag", tag_id])).await
    }

    async fn topics(&self) -> Result<Vec<Topic>, QueryError> {
        Self::fetch(self.request(Method::GET, &["topic", "listing"])).await
    }

    async fn delete_topic(&self, topic_id: &str) -> Result<(), QueryError> {
        Self::execute(self.request(Method::DELETE, &["topic", topic_id])).await
    }

    async fn forgot_password(&self, email: &str) -> Result<(), QueryError> {
        Self::execute(
            self.request(Method::POST, &["auth", "forgot-password"])
                .json(&json!({ "email": email })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(
            &server.base_url(),
            Some("secret".into()),
            Duration::from_secs(2),
        )
        .expect("valid backend")
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"message":"Post not found"}"#;
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, body),
            QueryError::NotFound(Some("Post not found".into()))
        );
        assert_eq!(
            error_for_status(StatusCode::CONFLICT, "{}"),
            QueryError::Validation(None)
        );
        assert_eq!(
            error_for_status(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":" "}"#),
            QueryError::Validation(None)
        );
        assert_eq!(
            error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            QueryError::Unknown(None)
        );
    }

    #[test]
    fn test_rejects_relative_base_url() {
        assert!(matches!(
            HttpBackend::new("/api", None, Duration::from_secs(1)),
            Err(HttpBackendError::Url(_))
        ));
    }

    #[test]
    fn test_rejects_base_url_without_path() {
        assert!(matches!(
            HttpBackend::new("mailto:team@plaza.example", None, Duration::from_secs(1)),
            Err(HttpBackendError::NotABase(_))
        ));
    }

    #[test]
    fn test_ids_are_encoded_as_single_segments() {
        let backend = HttpBackend::new(
            "https://plaza.example/api/v1/",
            None,
            Duration::from_secs(1),
        )
        .expect("valid backend");

        assert_eq!(
            backend.endpoint(&["post", "listing"]).as_str(),
            "https://plaza.example/api/v1/post/listing"
        );
        assert_eq!(
            backend.endpoint(&["post", "../tag/t-1"]).path(),
            "/api/v1/post/..%2Ftag%2Ft-1"
        );
        assert_eq!(
            backend.endpoint(&["post", "update", "p 1?x#y", "status"]).path(),
            "/api/v1/post/update/p%201%3Fx%23y/status"
        );
    }

    #[tokio::test]
    async fn test_listing_sends_filter_and_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/post/listing")
                    .query_param("page", "2")
                    .query_param("perPage", "10")
                    .query_param("search", "rust")
                    .header("authorization", "Bearer secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"entity":[{"postId":"p-1","title":"Rust","content":"","status":"PUBLIC","account":{"accountId":"a-1","username":"kim"},"createdDate":"2024-05-01T10:00:00Z"}]}"#);
            })
            .await;

        let filter = PostFilter {
            page: 2,
            search: Some("rust".into()),
            ..PostFilter::default()
        };
        let posts = backend(&server).posts(&filter).await.expect("listing");

        mock.assert_async().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post_id, "p-1");
    }

    #[tokio::test]
    async fn test_error_payload_message_is_kept() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/post/download/p-9");
                then.status(400)
                    .header("content-type", "application/json")
                    .body(r#"{"message":"Not enough points"}"#);
            })
            .await;

        let err = backend(&server).download_post("p-9").await.expect_err("rejected");
        assert_eq!(err, QueryError::Validation(Some("Not enough points".into())));
        assert_eq!(err.message(), Some("Not enough points"));
    }

    #[tokio::test]
    async fn test_delete_ignores_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("DELETE").path("/post/p-1");
                then.status(204);
            })
            .await;

        backend(&server).delete_post("p-1").await.expect("deleted");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_update_uses_query_param() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("PUT")
                    .path("/post/update/p-1/status")
                    .query_param("status", "HIDDEN");
                then.status(200);
            })
            .await;

        backend(&server)
            .update_post_status("p-1", PostStatus::Hidden)
            .await
            .expect("updated");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_entity_is_unknown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/tag/listing");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"data":[]}"#);
            })
            .await;

        let err = backend(&server).tags().await.expect_err("no entity");
        assert!(matches!(err, QueryError::Unknown(Some(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let backend =
            HttpBackend::new("http://127.0.0.1:9", None, Duration::from_millis(500)).expect("valid");
        let err = backend.topics().await.expect_err("nothing listens on port 9");
        assert!(matches!(err, QueryError::Network(_)));
    }
}
