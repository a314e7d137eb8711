//! Resources exchanged with the backend.
//!
//! Field names follow the backend's camelCase JSON.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Points charged for downloading a post's attachment.
pub const DOWNLOAD_POINT: u64 = 5;

/// Default page size for paged listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "ADMIN",
            Self::Staff => "STAFF",
            Self::User => "USER",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Banned,
}

/// The author shown on posts and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub account_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    #[serde(default)]
    pub wallet: Option<Wallet>,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Public,
    Private,
    Hidden,
    Draft,
}

impl PostStatus {
    /// Statuses an existing post can be switched to.
    pub const SELECTABLE: [Self; 3] = [Self::Public, Self::Private, Self::Hidden];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::Private => "Private",
            Self::Hidden => "Hidden",
            Self::Draft => "Draft",
        }
    }

    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
            Self::Hidden => "HIDDEN",
            Self::Draft => "DRAFT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub tag_id: String,
    pub name: String,
    #[serde(default)]
    pub background_color_hex: Option<String>,
    #[serde(default)]
    pub text_color_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub topic_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFile {
    pub post_file_id: String,
    pub url: String,
}

impl PostFile {
    /// The last path segment of the file URL, percent-decoded.
    pub fn file_name(&self) -> Option<String> {
        let url = url::Url::parse(&self.url).ok()?;
        let name = url.path_segments()?.next_back()?.to_string();
        if name.is_empty() {
            return None;
        }
        Some(
            url::form_urlencoded::parse(format!("n={name}").as_bytes())
                .next()
                .map_or(name, |(_, decoded)| decoded.into_owned()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub post_id: String,
    pub title: String,
    /// HTML body.
    pub content: String,
    pub status: PostStatus,
    pub account: Author,
    #[serde(default)]
    pub tag: Option<Tag>,
    #[serde(default)]
    pub topic: Option<Topic>,
    #[serde(default)]
    pub image_list: Vec<Image>,
    #[serde(default)]
    pub post_file_list: Vec<PostFile>,
    #[serde(default)]
    pub upvote_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    pub created_date: DateTime<Utc>,
}

impl Post {
    pub fn has_attachment(&self) -> bool {
        !self.post_file_list.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: String,
    pub post_id: String,
    pub account: Author,
    pub content: String,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upvote {
    pub upvote_id: String,
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub wallet_id: String,
    pub account_id: String,
    pub balance: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    View,
    DailyPoint,
    BonusPoint,
    OrderPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub kind: TransactionKind,
    /// Signed point delta.
    pub amount: i64,
    pub description: String,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterTransaction {
    pub transactions: Vec<Transaction>,
    /// Sum of `amount` over `transactions`.
    pub total: i64,
}

/// A download grant for a post's attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportReason {
    Spam,
    Harassment,
    HateSpeech,
    Violence,
    FalseInformation,
    Copyright,
    Other,
}

impl ReportReason {
    pub const ALL: [Self; 7] = [
        Self::Spam,
        Self::Harassment,
        Self::HateSpeech,
        Self::Violence,
        Self::FalseInformation,
        Self::Copyright,
        Self::Other,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Spam => "Spam",
            Self::Harassment => "Harassment or bullying",
            Self::HateSpeech => "Hate speech",
            Self::Violence => "Violence",
            Self::FalseInformation => "False information",
            Self::Copyright => "Copyright infringement",
            Self::Other => "Something else",
        }
    }
}

/// Filter for the post listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilter {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
            search: None,
            topic_id: None,
        }
    }
}

/// Paging and search for the admin user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListingParams {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Default for UserListingParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
            username: None,
            email: None,
        }
    }
}

impl UserListingParams {
    /// Searches both username and email, starting over at the first page.
    #[must_use]
    pub fn search(mut self, term: &str) -> Self {
        let term = term.trim();
        let term = (!term.is_empty()).then(|| term.to_string());
        self.username.clone_from(&term);
        self.email = term;
        self.page = 1;
        self
    }
}

/// Which transactions of the current account to list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub view_transaction: bool,
    pub daily_point: bool,
    pub bonus_point: bool,
    pub order_point: bool,
    pub order_point_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            view_transaction: true,
            daily_point: true,
            bonus_point: true,
            order_point: true,
            order_point_status: "ALL".to_string(),
            start_date: None,
            end_date: None,
        }
    }
}

impl TransactionFilter {
    /// Whether transactions of `kind` pass the filter.
    pub const fn includes(&self, kind: TransactionKind) -> bool {
        match kind {
            TransactionKind::View => self.view_transaction,
            TransactionKind::DailyPoint => self.daily_point,
            TransactionKind::BonusPoint => self.bonus_point,
            TransactionKind::OrderPoint => self.order_point,
        }
    }

    /// Flips whether `kind` is included.
    pub fn toggle(&mut self, kind: TransactionKind) {
        let flag = match kind {
            TransactionKind::View => &mut self.view_transaction,
            TransactionKind::DailyPoint => &mut self.daily_point,
            TransactionKind::BonusPoint => &mut self.bonus_point,
            TransactionKind::OrderPoint => &mut self.order_point,
        };
        *flag = !*flag;
    }

    /// The date range, only when both ends are set.
    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start_date.zip(self.end_date)
    }
}
