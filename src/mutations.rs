//! Write paths.
//!
//! Every write declares the keys it makes outdated. A key is listed here
//! whenever the data behind it can change as a result of the write:
//!
//! | write | invalidates |
//! |---|---|
//! | delete post | post listings, the post, bookmarks, upvotes |
//! | delete drafts | drafts |
//! | change post status | post listings, the post |
//! | toggle bookmark | bookmark listing |
//! | toggle upvote | upvote listing, post listings, the post |
//! | create comment | the post's comments, the post, post listings |
//! | download attachment | wallets, transactions |
//! | delete account | user listings |
//! | delete tag / topic | tag / topic listings, every post key, bookmark listing |
//!
//! Reports and password resets change nothing the client reads.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::api::{Api, Backend, Comment, Download, PostStatus, ReportReason};
use crate::command::Command;
use crate::keys::{
    bookmark_keys, comment_keys, post_keys, tag_keys, topic_keys, transaction_keys, upvote_keys,
    user_keys, wallet_keys,
};
use crate::subscription::http::{Mutation, MutationError, QueryError};

/// What a finished mutation produces.
pub type MutationResult<T> = Result<T, MutationError>;

impl Api {
    fn mutation<I, O, F, Fut>(&self, input: I, write: F) -> Mutation<I, O>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: FnOnce(Arc<dyn Backend>, I) -> Fut + Send + 'static,
        Fut: Future<Output = Result<O, QueryError>> + Send + 'static,
    {
        let backend = Arc::clone(self.backend());
        Mutation::new(input, move |input| write(backend, input).boxed())
    }

    pub fn delete_post(&self, post_id: &str) -> Command<MutationResult<()>> {
        self.mutation(post_id.to_string(), |backend, id| async move {
            backend.delete_post(&id).await
        })
        .invalidates(post_keys::listing())
        .invalidates(post_keys::detail(post_id))
        .invalidates(bookmark_keys::all())
        .invalidates(upvote_keys::all())
        .fallback_message("Failed to delete post")
        .run(self.client())
    }

    pub fn delete_drafts(&self, post_ids: Vec<String>) -> Command<MutationResult<()>> {
        self.mutation(post_ids, |backend, ids| async move {
            backend.delete_drafts(&ids).await
        })
        .invalidates(post_keys::drafts())
        .fallback_message("Failed to delete drafts")
        .run(self.client())
    }

    pub fn update_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
    ) -> Command<MutationResult<()>> {
        self.mutation(post_id.to_string(), move |backend, id| async move {
            backend.update_post_status(&id, status).await
        })
        .invalidates(post_keys::listing())
        .invalidates(post_keys::detail(post_id))
        .fallback_message("Failed to update post status")
        .run(self.client())
    }

    pub fn report_post(&self, post_id: &str, reason: ReportReason) -> Command<MutationResult<()>> {
        self.mutation(post_id.to_string(), move |backend, id| async move {
            backend.report_post(&id, reason).await
        })
        .fallback_message("Failed to report post")
        .run(self.client())
    }

    /// Toggles the bookmark on `post_id`. Repeats while one is running are
    /// ignored.
    pub fn toggle_bookmark(&self, post_id: &str) -> Command<MutationResult<()>> {
        self.mutation(post_id.to_string(), |backend, id| async move {
            backend.toggle_bookmark(&id).await
        })
        .invalidates(bookmark_keys::listing())
        .exclusive(bookmark_keys::toggle(post_id))
        .run(self.client())
    }

    /// Toggles the upvote on `post_id`. Repeats while one is running are
    /// ignored.
    pub fn toggle_upvote(&self, post_id: &str) -> Command<MutationResult<()>> {
        self.mutation(post_id.to_string(), |backend, id| async move {
            backend.toggle_upvote(&id).await
        })
        .invalidates(upvote_keys::listing())
        .invalidates(post_keys::listing())
        .invalidates(post_keys::detail(post_id))
        .exclusive(upvote_keys::toggle(post_id))
        .run(self.client())
    }

    pub fn create_comment(&self, post_id: &str, content: &str) -> Command<MutationResult<Comment>> {
        let input = (post_id.to_string(), content.to_string());
        self.mutation(input, |backend, (id, content)| async move {
            backend.create_comment(&id, &content).await
        })
        .invalidates(comment_keys::by_post(post_id))
        .invalidates(post_keys::detail(post_id))
        .invalidates(post_keys::listing())
        .fallback_message("Failed to post comment")
        .run(self.client())
    }

    /// Buys the attachment of `post_id`. The balance and the transaction
    /// history change, so both are invalidated.
    pub fn download_post(&self, post_id: &str) -> Command<MutationResult<Download>> {
        self.mutation(post_id.to_string(), |backend, id| async move {
            backend.download_post(&id).await
        })
        .invalidates(wallet_keys::all())
        .invalidates(transaction_keys::all())
        .exclusive(post_keys::download(post_id))
        .fallback_message("Download failed")
        .run(self.client())
    }

    pub fn delete_account(&self, account_id: &str) -> Command<MutationResult<()>> {
        self.mutation(account_id.to_string(), |backend, id| async move {
            backend.delete_account(&id).await
        })
        .invalidates(user_keys::listing())
        .fallback_message("Failed to delete account")
        .run(self.client())
    }

    pub fn delete_tag(&self, tag_id: &str) -> Command<MutationResult<()>> {
        self.mutation(tag_id.to_string(), |backend, id| async move {
            backend.delete_tag(&id).await
        })
        .invalidates(tag_keys::all())
        .invalidates(post_keys::all())
        .invalidates(bookmark_keys::listing())
        .fallback_message("Failed to delete tag")
        .run(self.client())
    }

    pub fn delete_topic(&self, topic_id: &str) -> Command<MutationResult<()>> {
        self.mutation(topic_id.to_string(), |backend, id| async move {
            backend.delete_topic(&id).await
        })
        .invalidates(topic_keys::all())
        .invalidates(post_keys::all())
        .invalidates(bookmark_keys::listing())
        .fallback_message("Failed to delete topic")
        .run(self.client())
    }

    pub fn forgot_password(&self, email: &str) -> Command<MutationResult<()>> {
        self.mutation(email.to_string(), |backend, email| async move {
            backend.forgot_password(&email).await
        })
        .fallback_message("Failed to send reset email")
        .run(self.client())
    }
}
