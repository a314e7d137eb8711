use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

use super::{
    Account, AccountStatus, Author, Backend, Comment, DOWNLOAD_POINT, Download,
    FilterTransaction, Post, PostFile, PostFilter, PostStatus, ReportReason, Role, Tag, Topic,
    Transaction, TransactionFilter, TransactionKind, Upvote, UserListingParams, Wallet,
};
use crate::subscription::http::QueryError;

#[derive(Default)]
struct State {
    posts: Vec<Post>,
    drafts: Vec<Post>,
    comments: Vec<Comment>,
    bookmarks: Vec<String>,
    upvotes: Vec<Upvote>,
    wallets: HashMap<String, Wallet>,
    transactions: Vec<Transaction>,
    accounts: Vec<Account>,
    tags: Vec<Tag>,
    topics: Vec<Topic>,
    reports: Vec<(String, ReportReason)>,
    password_resets: Vec<String>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, QueryError>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn post_mut(&mut self, post_id: &str) -> Result<&mut Post, QueryError> {
        self.posts
            .iter_mut()
            .find(|post| post.post_id == post_id)
            .ok_or_else(|| QueryError::NotFound(Some("Post not found".into())))
    }
}

/// An in-process [`Backend`] with seeded data.
///
/// Every operation is counted, and a failure can be injected for the next
/// call of any operation, which makes it the backend of choice for tests.
/// `--demo` runs the client against [`MemoryBackend::demo`].
pub struct MemoryBackend {
    state: Mutex<State>,
    account_id: String,
    latency: Duration,
}

impl MemoryBackend {
    /// An empty backend whose current account is `account_id`.
    pub fn new(account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        let mut state = State::default();
        state.wallets.insert(
            account_id.clone(),
            Wallet {
                wallet_id: format!("w-{account_id}"),
                account_id: account_id.clone(),
                balance: 0,
            },
        );
        Self {
            state: Mutex::new(state),
            account_id,
            latency: Duration::ZERO,
        }
    }

    /// A backend seeded with a small community for `account_id`.
    pub fn demo(account_id: impl Into<String>, username: &str) -> Self {
        let mut backend = Self::new(account_id);
        seed(backend.state.get_mut(), &backend.account_id, username);
        backend
    }

    /// Delays every operation by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_post(mut self, post: Post) -> Self {
        self.state.get_mut().posts.push(post);
        self
    }

    #[must_use]
    pub fn with_balance(mut self, balance: u64) -> Self {
        if let Some(wallet) = self.state.get_mut().wallets.get_mut(&self.account_id) {
            wallet.balance = balance;
        }
        self
    }

    /// How many times `operation` (the `Backend` method name) was called.
    pub async fn calls(&self, operation: &str) -> usize {
        self.state.lock().await.calls.get(operation).copied().unwrap_or(0)
    }

    /// Makes the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: &'static str, error: QueryError) {
        self.state.lock().await.failures.insert(operation, error);
    }

    pub async fn is_bookmarked(&self, post_id: &str) -> bool {
        self.state.lock().await.bookmarks.iter().any(|id| id == post_id)
    }

    pub async fn is_upvoted(&self, post_id: &str) -> bool {
        self.state
            .lock()
            .await
            .upvotes
            .iter()
            .any(|upvote| upvote.post_id == post_id)
    }

    pub async fn balance(&self) -> u64 {
        self.state
            .lock()
            .await
            .wallets
            .get(&self.account_id)
            .map_or(0, |wallet| wallet.balance)
    }

    pub async fn reports(&self) -> Vec<(String, ReportReason)> {
        self.state.lock().await.reports.clone()
    }

    pub async fn password_resets(&self) -> Vec<String> {
        self.state.lock().await.password_resets.clone()
    }

    async fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, QueryError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.state.lock().await;
        *state.calls.entry(operation).or_default() += 1;
        trace!(operation, "memory backend call");
        match state.failures.remove(operation) {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn page<T: Clone>(items: &[T], page: u32, per_page: u32) -> Vec<T> {
    let per_page = per_page.max(1) as usize;
    let skip = (page.max(1) as usize - 1) * per_page;
    items.iter().skip(skip).take(per_page).cloned().collect()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn posts(&self, filter: &PostFilter) -> Result<Vec<Post>, QueryError> {
        let state = self.enter("posts").await?;
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| {
                post.status == PostStatus::Public || post.account.account_id == self.account_id
            })
            .filter(|post| {
                filter.search.as_deref().is_none_or(|term| {
                    contains_ignore_case(&post.title, term) || contains_ignore_case(&post.content, term)
                })
            })
            .filter(|post| {
                filter.topic_id.as_deref().is_none_or(|topic| {
                    post.topic.as_ref().is_some_and(|t| t.topic_id == topic)
                })
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(page(&posts, filter.page, filter.per_page))
    }

    async fn post(&self, post_id: &str) -> Result<Post, QueryError> {
        let state = self.enter("post").await?;
        state
            .posts
            .iter()
            .chain(&state.drafts)
            .find(|post| post.post_id == post_id)
            .cloned()
            .ok_or_else(|| QueryError::NotFound(Some("Post not found".into())))
    }

    async fn drafts(&self) -> Result<Vec<Post>, QueryError> {
        let state = self.enter("drafts").await?;
        Ok(state
            .drafts
            .iter()
            .filter(|post| post.account.account_id == self.account_id)
            .cloned()
            .collect())
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), QueryError> {
        let mut state = self.enter("delete_post").await?;
        let before = state.posts.len();
        state.posts.retain(|post| post.post_id != post_id);
        if state.posts.len() == before {
            return Err(QueryError::NotFound(Some("Post not found".into())));
        }
        state.bookmarks.retain(|id| id != post_id);
        state.upvotes.retain(|upvote| upvote.post_id != post_id);
        state.comments.retain(|comment| comment.post_id != post_id);
        Ok(())
    }

    async fn delete_drafts(&self, post_ids: &[String]) -> Result<(), QueryError> {
        let mut state = self.enter("delete_drafts").await?;
        let before = state.drafts.len();
        state.drafts.retain(|post| !post_ids.contains(&post.post_id));
        if state.drafts.len() == before {
            return Err(QueryError::NotFound(Some("Draft not found".into())));
        }
        Ok(())
    }

    async fn update_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
    ) -> Result<(), QueryError> {
        let mut state = self.enter("update_post_status").await?;
        if status == PostStatus::Draft {
            return Err(QueryError::Validation(Some(
                "A published post cannot become a draft".into(),
            )));
        }
        state.post_mut(post_id)?.status = status;
        Ok(())
    }

    async fn report_post(&self, post_id: &str, reason: ReportReason) -> Result<(), QueryError> {
        let mut state = self.enter("report_post").await?;
        state.post_mut(post_id)?;
        state.reports.push((post_id.to_string(), reason));
        Ok(())
    }

    async fn download_post(&self, post_id: &str) -> Result<Download, QueryError> {
        let mut state = self.enter("download_post").await?;
        let url = state
            .post_mut(post_id)?
            .post_file_list
            .first()
            .map(|file| file.url.clone())
            .ok_or_else(|| QueryError::Validation(Some("This post has no attachment".into())))?;

        let wallet = state
            .wallets
            .get_mut(&self.account_id)
            .ok_or_else(|| QueryError::NotFound(Some("Wallet not found".into())))?;
        if wallet.balance < DOWNLOAD_POINT {
            return Err(QueryError::Validation(Some(format!(
                "Not enough points. A download costs {DOWNLOAD_POINT} points."
            ))));
        }
        wallet.balance -= DOWNLOAD_POINT;

        let transaction_id = state.next_id("tx");
        state.transactions.push(Transaction {
            transaction_id,
            kind: TransactionKind::OrderPoint,
            amount: -i64::try_from(DOWNLOAD_POINT).unwrap_or(i64::MAX),
            description: format!("Downloaded attachment of {post_id}"),
            created_date: Utc::now(),
        });
        Ok(Download { url })
    }

    async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, QueryError> {
        let state = self.enter("comments").await?;
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create_comment(&self, post_id: &str, content: &str) -> Result<Comment, QueryError> {
        let mut state = self.enter("create_comment").await?;
        let content = content.trim();
        if content.is_empty() {
            return Err(QueryError::Validation(Some("Comment cannot be empty".into())));
        }
        state.post_mut(post_id)?.comment_count += 1;

        let username = state
            .accounts
            .iter()
            .find(|account| account.account_id == self.account_id)
            .map_or_else(|| self.account_id.clone(), |account| account.username.clone());
        let comment = Comment {
            comment_id: state.next_id("c"),
            post_id: post_id.to_string(),
            account: Author {
                account_id: self.account_id.clone(),
                username,
            },
            content: content.to_string(),
            created_date: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn bookmarks(&self) -> Result<Vec<Post>, QueryError> {
        let state = self.enter("bookmarks").await?;
        Ok(state
            .bookmarks
            .iter()
            .filter_map(|id| state.posts.iter().find(|post| &post.post_id == id))
            .cloned()
            .collect())
    }

    async fn toggle_bookmark(&self, post_id: &str) -> Result<(), QueryError> {
        let mut state = self.enter("toggle_bookmark").await?;
        state.post_mut(post_id)?;
        if let Some(index) = state.bookmarks.iter().position(|id| id == post_id) {
            state.bookmarks.remove(index);
        } else {
            state.bookmarks.push(post_id.to_string());
        }
        Ok(())
    }

    async fn upvotes(&self) -> Result<Vec<Upvote>, QueryError> {
        Ok(self.enter("upvotes").await?.upvotes.clone())
    }

    async fn toggle_upvote(&self, post_id: &str) -> Result<(), QueryError> {
        let mut state = self.enter("toggle_upvote").await?;
        state.post_mut(post_id)?;
        if let Some(index) = state.upvotes.iter().position(|u| u.post_id == post_id) {
            state.upvotes.remove(index);
            let post = state.post_mut(post_id)?;
            post.upvote_count = post.upvote_count.saturating_sub(1);
        } else {
            let upvote_id = state.next_id("u");
            state.upvotes.push(Upvote {
                upvote_id,
                post_id: post_id.to_string(),
            });
            state.post_mut(post_id)?.upvote_count += 1;
        }
        Ok(())
    }

    async fn wallet(&self, account_id: &str) -> Result<Wallet, QueryError> {
        let state = self.enter("wallet").await?;
        state
            .wallets
            .get(account_id)
            .cloned()
            .ok_or_else(|| QueryError::NotFound(Some("Wallet not found".into())))
    }

    async fn transactions(
        &self,
        filter: Option<&TransactionFilter>,
    ) -> Result<FilterTransaction, QueryError> {
        let state = self.enter("transactions").await?;
        let transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|tx| filter.is_none_or(|f| f.includes(tx.kind)))
            .filter(|tx| {
                filter.and_then(TransactionFilter::range).is_none_or(|(start, end)| {
                    let day = tx.created_date.date_naive();
                    start <= day && day <= end
                })
            })
            .cloned()
            .collect();
        let total = transactions.iter().map(|tx| tx.amount).sum();
        Ok(FilterTransaction {
            transactions,
            total,
        })
    }

    async fn users(&self, params: &UserListingParams) -> Result<Vec<Account>, QueryError> {
        let state = self.enter("users").await?;
        let searching = params.username.is_some() || params.email.is_some();
        let accounts: Vec<Account> = state
            .accounts
            .iter()
            .filter(|account| {
                !searching
                    || params
                        .username
                        .as_deref()
                        .is_some_and(|term| contains_ignore_case(&account.username, term))
                    || params
                        .email
                        .as_deref()
                        .is_some_and(|term| contains_ignore_case(&account.email, term))
            })
            .map(|account| {
                let mut account = account.clone();
                account.wallet = state.wallets.get(&account.account_id).cloned();
                account
            })
            .collect();
        Ok(page(&accounts, params.page, params.per_page))
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), QueryError> {
        let mut state = self.enter("delete_account").await?;
        if account_id == self.account_id {
            return Err(QueryError::Validation(Some(
                "You cannot delete your own account".into(),
            )));
        }
        let before = state.accounts.len();
        state.accounts.retain(|account| account.account_id != account_id);
        if state.accounts.len() == before {
            return Err(QueryError::NotFound(Some("Account not found".into())));
        }
        state.wallets.remove(account_id);
        Ok(())
    }

    async fn tags(&self) -> Result<Vec<Tag>, QueryError> {
        Ok(self.enter("tags").await?.tags.clone())
    }

    async fn delete_tag(&self, tag_id: &str) -> Result<(), QueryError> {
        let mut state = self.enter("delete_tag").await?;
        let before = state.tags.len();
        state.tags.retain(|tag| tag.tag_id != tag_id);
        if state.tags.len() == before {
            return Err(QueryError::NotFound(Some("Tag not found".into())));
        }
        for post in &mut state.posts {
            if post.tag.as_ref().is_some_and(|tag| tag.tag_id == tag_id) {
                post.tag = None;
            }
        }
        Ok(())
    }

    async fn topics(&self) -> Result<Vec<Topic>, QueryError> {
        Ok(self.enter("topics").await?.topics.clone())
    }

    async fn delete_topic(&self, topic_id: &str) -> Result<(), QueryError> {
        let mut state = self.enter("delete_topic").await?;
        let before = state.topics.len();
        state.topics.retain(|topic| topic.topic_id != topic_id);
        if state.topics.len() == before {
            return Err(QueryError::NotFound(Some("Topic not found".into())));
        }
        for post in &mut state.posts {
            if post.topic.as_ref().is_some_and(|topic| topic.topic_id == topic_id) {
                post.topic = None;
            }
        }
        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), QueryError> {
        let mut state = self.enter("forgot_password").await?;
        let email = email.trim();
        if !email.contains('@') {
            return Err(QueryError::Validation(Some("Enter a valid email address".into())));
        }
        if !state.accounts.iter().any(|account| account.email == email) {
            return Err(QueryError::NotFound(Some("No account uses this email".into())));
        }
        state.password_resets.push(email.to_string());
        Ok(())
    }
}

fn at(day: i64) -> DateTime<Utc> {
    // 2024-05-01T09:00:00Z plus `day` days
    DateTime::from_timestamp(1_714_554_000 + day * 86_400, 0).unwrap_or_default()
}

fn account(id: &str, username: &str, role: Role, day: i64) -> Account {
    Account {
        account_id: id.to_string(),
        username: username.to_string(),
        email: format!("{username}@plaza.example"),
        role,
        status: AccountStatus::Active,
        wallet: None,
        created_date: at(day),
    }
}

#[allow(clippy::too_many_lines)]
fn seed(state: &mut State, account_id: &str, username: &str) {
    state.accounts = vec![
        account(account_id, username, Role::User, 0),
        account("a-admin", "admin", Role::Admin, 0),
        account("a-staff", "moderator", Role::Staff, 1),
        account("a-kim", "kim", Role::User, 2),
        account("a-lee", "lee", Role::User, 3),
    ];
    for account in &state.accounts {
        state.wallets.insert(
            account.account_id.clone(),
            Wallet {
                wallet_id: format!("w-{}", account.account_id),
                account_id: account.account_id.clone(),
                balance: 20,
            },
        );
    }
    if let Some(wallet) = state.wallets.get_mut(account_id) {
        wallet.balance = 12;
    }

    state.tags = vec![
        Tag {
            tag_id: "t-rust".into(),
            name: "Rust".into(),
            background_color_hex: Some("#f74c00".into()),
            text_color_hex: Some("#ffffff".into()),
        },
        Tag {
            tag_id: "t-guide".into(),
            name: "Guide".into(),
            background_color_hex: Some("#1890ff".into()),
            text_color_hex: Some("#ffffff".into()),
        },
    ];
    state.topics = vec![
        Topic {
            topic_id: "tp-dev".into(),
            name: "Development".into(),
        },
        Topic {
            topic_id: "tp-life".into(),
            name: "Lifestyle".into(),
        },
    ];

    let author = |id: &str, name: &str| Author {
        account_id: id.to_string(),
        username: name.to_string(),
    };
    let me = author(account_id, username);
    let kim = author("a-kim", "kim");
    let lee = author("a-lee", "lee");
    let dev = state.topics.first().cloned();
    let life = state.topics.get(1).cloned();
    let rust = state.tags.first().cloned();
    let guide = state.tags.get(1).cloned();

    let post = |id: &str, title: &str, content: &str, account: &Author, day: i64| Post {
        post_id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        status: PostStatus::Public,
        account: account.clone(),
        tag: None,
        topic: None,
        image_list: Vec::new(),
        post_file_list: Vec::new(),
        upvote_count: 0,
        comment_count: 0,
        created_date: at(day),
    };

    let mut posts = vec![
        Post {
            topic: dev.clone(),
            tag: rust.clone(),
            upvote_count: 4,
            post_file_list: vec![PostFile {
                post_file_id: "f-1".into(),
                url: "https://cdn.plaza.example/files/p-1/ownership-cheatsheet.zip".into(),
            }],
            ..post(
                "p-1",
                "Ownership in five minutes",
                "<p>Every value has exactly one <b>owner</b>. When the owner goes out of scope the \
                 value is dropped. Borrowing lets you hand out references without giving up \
                 ownership: any number of shared references, or exactly one mutable one.</p>\
                 <p>The attached cheat sheet walks through moves, clones and the borrow checker's \
                 favourite error messages with small examples you can paste into the playground.</p>",
                &kim,
                9,
            )
        },
        Post {
            topic: life.clone(),
            ..post(
                "p-2",
                "Morning routine that stuck",
                "<p>Coffee, twenty minutes of reading, then a walk before opening the laptop. \
                 It took three attempts &amp; a lot of snoozing to get here.</p>",
                &lee,
                8,
            )
        },
        Post {
            topic: dev.clone(),
            tag: guide.clone(),
            upvote_count: 2,
            ..post(
                "p-3",
                "Writing a terminal UI with ratatui",
                "<p>Immediate-mode rendering feels odd at first: you redraw the whole screen from \
                 your state every frame. Once the state is the single source of truth the rest \
                 falls into place.</p><ul><li>Keep widgets dumb</li><li>Route input through \
                 messages</li><li>Never block the render loop</li></ul>",
                &me,
                7,
            )
        },
        post(
            "p-4",
            "Weekend hike photos",
            "<p>Clear skies on the ridge 🏔️ and far too many switchbacks.</p>",
            &kim,
            6,
        ),
        Post {
            status: PostStatus::Private,
            ..post(
                "p-5",
                "Notes to self",
                "<p>Remember to renew the domain.</p>",
                &me,
                5,
            )
        },
        Post {
            topic: dev,
            tag: rust,
            ..post(
                "p-6",
                "Async cancellation is just drop",
                "<p>Dropping a future cancels it. That one sentence explains most surprises with \
                 <code>select!</code>: whichever branch loses is dropped at its last await \
                 point.</p>",
                &lee,
                4,
            )
        },
        Post {
            topic: life,
            tag: guide,
            ..post(
                "p-7",
                "Sourdough for the impatient",
                "<p>Feed the starter at night, mix at breakfast, bake after dinner.</p>",
                &kim,
                3,
            )
        },
    ];
    for n in 8..=13_i64 {
        posts.push(post(
            &format!("p-{n}"),
            &format!("Community thread #{n}"),
            "<p>Share what you are working on this week.</p>",
            &lee,
            7 - n,
        ));
    }
    state.posts = posts;

    state.drafts = vec![
        Post {
            status: PostStatus::Draft,
            ..post(
                "d-1",
                "Half-written review",
                "<p>The keyboard is great but</p>",
                &me,
                10,
            )
        },
        Post {
            status: PostStatus::Draft,
            ..post("d-2", "Ideas", "<p>TODO: collect ideas</p>", &me, 11)
        },
    ];

    state.comments = vec![
        Comment {
            comment_id: "c-1".into(),
            post_id: "p-1".into(),
            account: lee.clone(),
            content: "This finally made lifetimes click for me.".into(),
            created_date: at(9),
        },
        Comment {
            comment_id: "c-2".into(),
            post_id: "p-1".into(),
            account: me.clone(),
            content: "Saving this one.".into(),
            created_date: at(10),
        },
        Comment {
            comment_id: "c-3".into(),
            post_id: "p-3".into(),
            account: kim,
            content: "The message routing tip is gold.".into(),
            created_date: at(7),
        },
    ];
    for post in &mut state.posts {
        let count = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.post_id)
            .count();
        post.comment_count = u32::try_from(count).unwrap_or(u32::MAX);
    }

    state.bookmarks = vec!["p-6".into()];
    state.upvotes = vec![Upvote {
        upvote_id: "u-1".into(),
        post_id: "p-1".into(),
    }];
    state.transactions = vec![
        Transaction {
            transaction_id: "tx-1".into(),
            kind: TransactionKind::DailyPoint,
            amount: 2,
            description: "Daily check-in".into(),
            created_date: at(8),
        },
        Transaction {
            transaction_id: "tx-2".into(),
            kind: TransactionKind::BonusPoint,
            amount: 10,
            description: "Welcome bonus".into(),
            created_date: at(0),
        },
        Transaction {
            transaction_id: "tx-3".into(),
            kind: TransactionKind::View,
            amount: 0,
            description: "Viewed \"Ownership in five minutes\"".into(),
            created_date: at(9),
        },
    ];
    state.next_id = 100;
}
