//! # Plaza
//!
//! A terminal client for a community where members share posts, comment,
//! bookmark and upvote, and spend points to download attachments. Staff get
//! an admin console for accounts, tags and topics.
//!
//! The client is an Elm-architecture application on top of
//! [ratatui](https://ratatui.rs/):
//!
//! - [`Application`](application::Application): model, update and view.
//! - [`Runtime`](runtime::Runtime): the event loop.
//! - [`Command`](command::Command): asynchronous work that produces messages.
//! - [`Subscription`](subscription::Subscription): long-running event sources.
//!
//! Data flows through the query layer in [`subscription::http`]. Every read
//! is a [`Query`](subscription::http::Query) addressed by a hierarchical
//! [`QueryKey`](subscription::http::QueryKey) built by the factories in
//! [`keys`]. Every write is a [`Mutation`](subscription::http::Mutation)
//! that names the keys it made outdated, and the
//! [`QueryClient`](subscription::http::QueryClient) refetches whichever of
//! those queries are on screen.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use plaza::api::{Api, MemoryBackend};
//! use plaza::keys::post_keys;
//! use plaza::subscription::http::QueryClient;
//!
//! # async fn demo() {
//! let api = Api::new(Arc::new(MemoryBackend::demo("a-1", "kim")), QueryClient::new());
//!
//! // Deleting a post refetches every mounted post listing.
//! let _cmd = api.delete_post("p-1");
//! api.client().invalidate_queries([post_keys::listing()]);
//! # }
//! ```

pub mod api;
pub mod app;
pub mod application;
pub mod cli;
pub mod command;
pub mod config;
pub mod keys;
pub mod mutations;
pub mod prelude;
pub mod queries;
pub mod route;
pub mod runtime;
pub mod session;
pub mod subscription;
pub mod telemetry;
pub mod text;
