//! The signed-in account and what the UI offers it.
//!
//! These checks only decide which actions are shown. The backend enforces
//! authorization on every request.

use serde::Deserialize;

use crate::api::{Post, Role};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    pub account_id: String,
    pub username: String,
    pub role: Role,
}

impl Session {
    pub fn new(account_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            account_id: account_id.into(),
            username: username.into(),
            role,
        }
    }

    pub const fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Staff)
    }

    pub fn is_author(&self, post: &Post) -> bool {
        post.account.account_id == self.account_id
    }

    /// Change status and delete.
    pub fn can_manage(&self, post: &Post) -> bool {
        self.is_staff() || self.is_author(post)
    }

    pub fn can_report(&self, post: &Post) -> bool {
        self.is_staff() || !self.is_author(post)
    }

    /// Access to the admin console.
    pub const fn can_administer(&self) -> bool {
        self.is_staff()
    }
}
