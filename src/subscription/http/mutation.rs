//! Writes against the backend.
//!
//! A mutation is a one-off side effect, so it is a [`Command`] rather than a
//! subscription. [`Mutation::run`] performs the request and, only when it
//! succeeds, invalidates the queries the write made outdated. Mounted queries
//! on those keys refetch by themselves; the caller only handles the result.
//!
//! # Example
//!
//! ```rust,ignore
//! Message::DeletePost(id) => Mutation::new(id, move |id| {
//!         let backend = backend.clone();
//!         Box::pin(async move { backend.delete_post(&id).await })
//!     })
//!     .invalidates(post_keys::listing())
//!     .invalidates(post_keys::detail(&id))
//!     .fallback_message("Failed to delete post")
//!     .run(&self.query_client)
//!     .map(move |result| Message::PostDeleted(id.clone(), result)),
//! ```

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::command::Command;

use super::error::{GENERIC_FAILURE, MutationError, QueryError};
use super::key::{KeyFilter, QueryKey};
use super::query::QueryClient;

type Mutator<I, O> = Box<dyn FnOnce(I) -> BoxFuture<'static, Result<O, QueryError>> + Send>;

/// A write request together with the cache keys it makes outdated.
pub struct Mutation<I, O> {
    input: I,
    mutator: Mutator<I, O>,
    invalidates: Vec<KeyFilter>,
    exclusive: Option<QueryKey>,
    fallback: String,
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// A mutation that will call `mutator` with `input` when run.
    pub fn new<F>(input: I, mutator: F) -> Self
    where
        F: FnOnce(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + 'static,
    {
        Self {
            input,
            mutator: Box::new(mutator),
            invalidates: Vec::new(),
            exclusive: None,
            fallback: GENERIC_FAILURE.to_string(),
        }
    }

    /// Invalidates `filter` after the mutation succeeds.
    ///
    /// A bare [`QueryKey`] selects every key it prefixes; pass
    /// [`KeyFilter::Exact`] to select one entry only.
    #[must_use]
    pub fn invalidates(mut self, filter: impl Into<KeyFilter>) -> Self {
        self.invalidates.push(filter.into());
        self
    }

    /// Runs at most one mutation per `scope` at a time.
    ///
    /// Running the mutation while another one with the same scope is still
    /// in flight does nothing, so a repeated toggle counts once.
    #[must_use]
    pub fn exclusive(mut self, scope: QueryKey) -> Self {
        self.exclusive = Some(scope);
        self
    }

    /// Message used when the backend's error carries none.
    #[must_use]
    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback = message.into();
        self
    }

    /// Performs the mutation.
    ///
    /// The returned command yields exactly one result, or nothing when an
    /// exclusive mutation for the same scope is already running.
    pub fn run(self, client: &QueryClient) -> Command<Result<O, MutationError>> {
        let claim = match &self.exclusive {
            Some(scope) => {
                let Some(claim) = client.try_claim(scope) else {
                    debug!(%scope, "mutation already in flight, ignoring");
                    return Command::none();
                };
                Some(claim)
            }
            None => None,
        };

        let client = client.clone();
        let Self {
            input,
            mutator,
            invalidates,
            fallback,
            ..
        } = self;

        Command::future(async move {
            let _claim = claim;
            match mutator(input).await {
                Ok(output) => {
                    client.invalidate_queries(invalidates);
                    Ok(output)
                }
                Err(error) => {
                    warn!(%error, "mutation failed");
                    Err(MutationError::new(error, &fallback))
                }
            }
        })
    }
}
