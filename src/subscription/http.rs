//! Cached queries and mutations against the backend.
//!
//! This is the data layer of the client, modelled on SWR and TanStack Query:
//!
//! - **Keys**: every cached read is addressed by a hierarchical [`QueryKey`].
//! - **Queries**: subscriptions that serve cached data and refetch when it
//!   goes stale.
//! - **Mutations**: commands that write and then invalidate the keys they
//!   made outdated.
//! - **Client**: one [`QueryClient`] per application holds the cache and
//!   routes invalidations to mounted queries.
//!
//! # Example
//!
//! ```rust,ignore
//! use plaza::prelude::*;
//! use plaza::subscription::http::{Mutation, Query, QueryClient, QueryView};
//!
//! struct Feed {
//!     client: QueryClient,
//!     posts: QueryView<Vec<Post>>,
//! }
//!
//! impl Application for Feed {
//!     fn subscriptions(&self) -> Vec<Subscription<Message>> {
//!         vec![Subscription::new(Query::new(post_keys::listing(), fetch_posts, &self.client))
//!             .map(Message::Posts)]
//!     }
//!
//!     fn update(&mut self, msg: Message) -> Command<Message> {
//!         match msg {
//!             Message::Posts(result) => {
//!                 self.posts.apply(result);
//!                 Command::none()
//!             }
//!             Message::Delete(id) => Mutation::new(id, delete_post)
//!                 .invalidates(post_keys::listing())
//!                 .run(&self.client)
//!                 .map(Message::Deleted),
//!             Message::Deleted(_) => Command::none(),
//!         }
//!     }
//! }
//! ```

mod cache;
mod config;
mod error;
mod key;
pub mod mutation;
pub mod query;

pub use cache::Freshness;
pub use config::QueryConfig;
pub use error::{GENERIC_FAILURE, MutationError, QueryError};
pub use key::{KeyFilter, QueryKey};
pub use mutation::Mutation;
pub use query::{Query, QueryClient, QueryResult, QueryState, QueryView};
