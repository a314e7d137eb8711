//! Cache keys for every resource the client reads.
//!
//! Each resource kind gets a module of key factories. Keys are hierarchical:
//! `all()` prefixes `listing()`, which prefixes every `listing_params(..)`,
//! so invalidating a shorter key covers all of its refinements.
//!
//! ```
//! use plaza::keys::post_keys;
//! use plaza::api::PostFilter;
//!
//! let page_two = post_keys::listing_params(&PostFilter { page: 2, ..PostFilter::default() });
//! assert!(page_two.starts_with(&post_keys::listing()));
//! assert!(!post_keys::detail("p-1").starts_with(&post_keys::listing()));
//! ```

pub mod post_keys {
    use crate::api::PostFilter;
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("posts")
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }

    pub fn listing_params(filter: &PostFilter) -> QueryKey {
        listing().params(filter)
    }

    pub fn detail(post_id: &str) -> QueryKey {
        all().segment("detail").segment(post_id)
    }

    pub fn drafts() -> QueryKey {
        all().segment("drafts")
    }

    /// Scope of a running attachment download.
    pub fn download(post_id: &str) -> QueryKey {
        all().segment("download").segment(post_id)
    }
}

pub mod comment_keys {
    use serde::Serialize;

    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("comments")
    }

    pub fn by_post(post_id: &str) -> QueryKey {
        all().segment("byPost").segment(post_id)
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }

    pub fn listing_params<P: Serialize>(params: &P) -> QueryKey {
        listing().params(params)
    }

    /// Replies listed under another comment.
    pub fn listing_another_comment(comment_id: &str) -> QueryKey {
        listing().segment("another-comment").segment(comment_id)
    }
}

pub mod bookmark_keys {
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("bookmarks")
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }

    /// Scope of a running bookmark toggle on one post.
    pub fn toggle(post_id: &str) -> QueryKey {
        all().segment("toggle").segment(post_id)
    }
}

pub mod upvote_keys {
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("upvotes")
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }

    /// Scope of a running upvote toggle on one post.
    pub fn toggle(post_id: &str) -> QueryKey {
        all().segment("toggle").segment(post_id)
    }
}

pub mod wallet_keys {
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("wallets")
    }

    pub fn by_account(account_id: &str) -> QueryKey {
        all().segment("byAccount").segment(account_id)
    }
}

pub mod user_keys {
    use crate::api::UserListingParams;
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("users")
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }

    pub fn listing_params(params: &UserListingParams) -> QueryKey {
        listing().params(params)
    }
}

pub mod tag_keys {
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("tags")
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }
}

pub mod topic_keys {
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("topics")
    }

    pub fn listing() -> QueryKey {
        all().segment("listing")
    }
}

pub mod transaction_keys {
    use crate::api::TransactionFilter;
    use crate::subscription::http::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::new("transactions")
    }

    /// Transactions of the signed-in account; no filter keys as `{}`.
    pub fn current_account(filter: Option<&TransactionFilter>) -> QueryKey {
        all().segment("currentAccount").params_opt(filter)
    }
}
