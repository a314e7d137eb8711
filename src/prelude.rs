//! The types almost every application needs.
//!
//! ```
//! use plaza::prelude::*;
//! ```

pub use crate::application::Application;
pub use crate::command::{Action, Command};
pub use crate::runtime::Runtime;
pub use crate::subscription::Subscription;
pub use crate::subscription::http::{Mutation, Query, QueryClient, QueryKey, QueryView};
