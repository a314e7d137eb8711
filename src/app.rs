//! The Plaza terminal client.
//!
//! [`App`] is the application model. Each screen reads through [`Query`]
//! subscriptions chosen from the current [`Route`], and every write goes
//! through a mutation whose invalidations bring the mounted queries up to
//! date. The model never patches cached data by hand.
//!
//! [`Query`]: crate::subscription::http::Query

mod view;

use std::collections::BTreeSet;
use std::io;
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use tracing::{debug, info, warn};

use crate::api::{
    Account, Api, Comment, DOWNLOAD_POINT, Download, FilterTransaction, Post, PostFilter,
    PostStatus, ReportReason, Tag, Topic, TransactionFilter, TransactionKind, Upvote,
    UserListingParams, Wallet,
};
use crate::application::Application;
use crate::command::{Action, Command};
use crate::config::UiConfig;
use crate::keys::{comment_keys, post_keys, transaction_keys, user_keys};
use crate::mutations::MutationResult;
use crate::route::{Route, Router};
use crate::session::Session;
use crate::subscription::Subscription;
use crate::subscription::http::{QueryKey, QueryResult, QueryView};
use crate::subscription::terminal::TerminalEvents;
use crate::subscription::time::Timer;
use crate::text::TruncatedText;

/// Everything [`App`] needs at startup.
pub struct Flags {
    pub api: Api,
    pub session: Session,
    pub ui: UiConfig,
    /// How often idle cache entries are swept.
    pub gc_interval: Duration,
    pub start: Route,
}

#[derive(Debug)]
pub enum Message {
    Terminal(Event),
    TerminalError(io::Error),
    SweepCache,

    Posts(QueryResult<Vec<Post>>),
    Drafts(QueryResult<Vec<Post>>),
    Post(QueryResult<Post>),
    Comments(QueryResult<Vec<Comment>>),
    Bookmarks(QueryResult<Vec<Post>>),
    Upvotes(QueryResult<Vec<Upvote>>),
    Wallet(QueryResult<Wallet>),
    Transactions(QueryResult<FilterTransaction>),
    Users(QueryResult<Vec<Account>>),
    Tags(QueryResult<Vec<Tag>>),
    Topics(QueryResult<Vec<Topic>>),

    PostDeleted(String, MutationResult<()>),
    DraftsDeleted(MutationResult<()>),
    StatusUpdated(MutationResult<()>),
    Reported(MutationResult<()>),
    BookmarkToggled(MutationResult<()>),
    UpvoteToggled(MutationResult<()>),
    CommentCreated(MutationResult<Comment>),
    Downloaded(MutationResult<Download>),
    AccountDeleted(MutationResult<()>),
    TagDeleted(MutationResult<()>),
    TopicDeleted(MutationResult<()>),
    PasswordResetSent(MutationResult<()>),

    Navigate(Route),
    Back,
    Quit,
}

/// A one-line message in the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Error(text) => text,
        }
    }
}

/// What a text prompt is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Search,
    UserSearch,
    Comment(String),
    ForgotPassword,
}

impl Prompt {
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Search => "Search posts",
            Self::UserSearch => "Search users by name or email",
            Self::Comment(_) => "Write a comment",
            Self::ForgotPassword => "Email for the password reset link",
        }
    }
}

/// A destructive or paid action waiting for a yes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    DeletePost(String),
    DeleteDrafts(Vec<String>),
    Download {
        post_id: String,
        /// Balance at the time of asking, if the wallet is loaded.
        balance: Option<u64>,
    },
    DeleteAccount { account_id: String, username: String },
    DeleteTag { tag_id: String, name: String },
    DeleteTopic { topic_id: String, name: String },
}

impl Confirm {
    pub fn question(&self) -> String {
        match self {
            Self::DeletePost(_) => "Delete this post? This cannot be undone.".to_string(),
            Self::DeleteDrafts(ids) => format!("Delete {} draft(s)?", ids.len()),
            Self::Download { balance, .. } => match balance {
                Some(balance) if *balance >= DOWNLOAD_POINT => format!(
                    "Downloading costs {DOWNLOAD_POINT} points. Balance: {balance} → {}.",
                    balance - DOWNLOAD_POINT
                ),
                Some(balance) => format!(
                    "Downloading costs {DOWNLOAD_POINT} points but you only have {balance}."
                ),
                None => format!("Downloading costs {DOWNLOAD_POINT} points."),
            },
            Self::DeleteAccount { username, .. } => format!("Delete the account of {username}?"),
            Self::DeleteTag { name, .. } => format!("Delete the tag {name}?"),
            Self::DeleteTopic { name, .. } => format!("Delete the topic {name}?"),
        }
    }
}

/// A choice from a fixed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picker {
    Status,
    Report,
}

impl Picker {
    pub fn options(self) -> Vec<&'static str> {
        match self {
            Self::Status => PostStatus::SELECTABLE.iter().map(|s| s.label()).collect(),
            Self::Report => ReportReason::ALL.iter().map(|r| r.label()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    Input { prompt: Prompt, buffer: String },
    Confirm(Confirm),
    Pick {
        picker: Picker,
        post_id: String,
        selected: usize,
    },
}

/// The post listing, or the author's drafts.
#[derive(Debug, Default)]
pub struct FeedState {
    pub filter: PostFilter,
    pub posts: QueryView<Vec<Post>>,
    pub drafts: QueryView<Vec<Post>>,
    pub show_drafts: bool,
    pub marked: BTreeSet<String>,
    pub selected: usize,
}

impl FeedState {
    fn new(page_size: u32) -> Self {
        Self {
            filter: PostFilter {
                per_page: page_size,
                ..PostFilter::default()
            },
            ..Self::default()
        }
    }

    pub fn visible(&self) -> &[Post] {
        let view = if self.show_drafts {
            &self.drafts
        } else {
            &self.posts
        };
        view.data().map_or(&[], Vec::as_slice)
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.visible().get(self.selected)
    }

    fn set_filter(&mut self, filter: PostFilter) {
        self.posts.track(post_keys::listing_params(&filter));
        self.filter = filter;
        self.selected = 0;
    }
}

/// The expandable body of the post on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    content: String,
    pub text: TruncatedText,
}

#[derive(Debug)]
pub struct DetailState {
    pub post_id: String,
    pub post: QueryView<Post>,
    pub comments: QueryView<Vec<Comment>>,
    pub body: Option<Body>,
}

impl DetailState {
    fn new(post_id: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            post: QueryView::new(),
            comments: QueryView::new(),
            body: None,
        }
    }

    /// Rebuilds the body when the content changed, keeping the toggle
    /// otherwise.
    fn sync_body(&mut self, truncate_at: usize) {
        let Some(post) = self.post.data() else {
            return;
        };
        if self.body.as_ref().is_some_and(|body| body.content == post.content) {
            return;
        }
        self.body = Some(Body {
            content: post.content.clone(),
            text: TruncatedText::new(&post.content, truncate_at),
        });
    }
}

#[derive(Debug)]
pub struct WalletState {
    pub wallet: QueryView<Wallet>,
    pub transactions: QueryView<FilterTransaction>,
    pub filter: TransactionFilter,
}

#[derive(Debug)]
pub struct UsersState {
    pub params: UserListingParams,
    pub users: QueryView<Vec<Account>>,
    pub selected: usize,
}

/// Which list of the tag screen has the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaxonomyFocus {
    #[default]
    Tags,
    Topics,
}

#[derive(Debug, Default)]
pub struct TaxonomyState {
    pub tags: QueryView<Vec<Tag>>,
    pub topics: QueryView<Vec<Topic>>,
    pub focus: TaxonomyFocus,
    pub selected: usize,
}

pub struct App {
    api: Api,
    session: Session,
    ui: UiConfig,
    gc_interval: Duration,
    router: Router,
    overlay: Option<Overlay>,
    notice: Option<Notice>,
    feed: FeedState,
    detail: Option<DetailState>,
    bookmarks: QueryView<Vec<Post>>,
    bookmark_selected: usize,
    upvotes: QueryView<Vec<Upvote>>,
    wallet: WalletState,
    users: UsersState,
    taxonomy: TaxonomyState,
}

impl Application for App {
    type Message = Message;
    type Flags = Flags;

    fn new(flags: Flags) -> (Self, Command<Message>) {
        let Flags {
            api,
            session,
            ui,
            gc_interval,
            start,
        } = flags;
        info!(account = %session.account_id, role = %session.role, "starting client");

        let mut app = Self {
            api,
            feed: FeedState::new(ui.page_size),
            wallet: WalletState {
                wallet: QueryView::new(),
                transactions: QueryView::new(),
                filter: TransactionFilter::default(),
            },
            users: UsersState {
                params: UserListingParams {
                    per_page: ui.page_size,
                    ..UserListingParams::default()
                },
                users: QueryView::new(),
                selected: 0,
            },
            session,
            ui,
            gc_interval,
            router: Router::default(),
            overlay: None,
            notice: None,
            detail: None,
            bookmarks: QueryView::new(),
            bookmark_selected: 0,
            upvotes: QueryView::new(),
            taxonomy: TaxonomyState::default(),
        };
        let cmd = app.navigate(start);
        (app, cmd)
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Terminal(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.on_key(key)
            }
            Message::Terminal(_) => Command::none(),
            Message::TerminalError(error) => {
                warn!(%error, "terminal input failed");
                self.notice = Some(Notice::Error(format!("Terminal error: {error}")));
                Command::none()
            }
            Message::SweepCache => {
                self.api.client().collect_garbage();
                Command::none()
            }

            Message::Posts(result) => {
                self.feed.posts.apply(result);
                self.feed.selected = clamp(self.feed.selected, self.feed.visible().len());
                Command::none()
            }
            Message::Drafts(result) => {
                self.feed.drafts.apply(result);
                let drafts = self.feed.drafts.data().cloned().unwrap_or_default();
                self.feed
                    .marked
                    .retain(|id| drafts.iter().any(|post| &post.post_id == id));
                self.feed.selected = clamp(self.feed.selected, self.feed.visible().len());
                Command::none()
            }
            Message::Post(result) => {
                let truncate_at = self.ui.truncate_at;
                if let Some(detail) = self.detail_for(&result.key) {
                    detail.post.apply(result);
                    detail.sync_body(truncate_at);
                }
                Command::none()
            }
            Message::Comments(result) => {
                if let Some(detail) = &mut self.detail {
                    detail.comments.apply(result);
                }
                Command::none()
            }
            Message::Bookmarks(result) => {
                self.bookmarks.apply(result);
                let len = self.bookmarks.data().map_or(0, Vec::len);
                self.bookmark_selected = clamp(self.bookmark_selected, len);
                Command::none()
            }
            Message::Upvotes(result) => {
                self.upvotes.apply(result);
                Command::none()
            }
            Message::Wallet(result) => {
                self.wallet.wallet.apply(result);
                Command::none()
            }
            Message::Transactions(result) => {
                self.wallet.transactions.apply(result);
                Command::none()
            }
            Message::Users(result) => {
                self.users.users.apply(result);
                let len = self.users.users.data().map_or(0, Vec::len);
                self.users.selected = clamp(self.users.selected, len);
                Command::none()
            }
            Message::Tags(result) => {
                self.taxonomy.tags.apply(result);
                self.clamp_taxonomy();
                Command::none()
            }
            Message::Topics(result) => {
                self.taxonomy.topics.apply(result);
                self.clamp_taxonomy();
                Command::none()
            }

            Message::PostDeleted(post_id, result) => {
                let viewing = matches!(self.router.current(), Route::PostDetail(id) if *id == post_id);
                if self.settle(&result, "Post deleted") && viewing {
                    self.router = Router::default();
                    self.detail = None;
                }
                Command::none()
            }
            Message::DraftsDeleted(result) => {
                if self.settle(&result, "Drafts deleted") {
                    self.feed.marked.clear();
                }
                Command::none()
            }
            Message::StatusUpdated(result) => {
                self.settle(&result, "Status updated");
                Command::none()
            }
            Message::Reported(result) => {
                self.settle(&result, "Thanks, the post was reported");
                Command::none()
            }
            Message::BookmarkToggled(result) => {
                self.settle(&result, "Bookmarks updated");
                Command::none()
            }
            Message::UpvoteToggled(result) => {
                self.settle(&result, "Upvotes updated");
                Command::none()
            }
            Message::CommentCreated(result) => {
                self.settle(&result, "Comment posted");
                Command::none()
            }
            Message::Downloaded(result) => {
                if let Ok(download) = &result {
                    info!(url = %download.url, "download granted");
                }
                let text = result
                    .as_ref()
                    .map(|download| format!("Download ready: {}", download.url))
                    .unwrap_or_default();
                self.settle(&result, text);
                Command::none()
            }
            Message::AccountDeleted(result) => {
                self.settle(&result, "Account deleted");
                Command::none()
            }
            Message::TagDeleted(result) => {
                self.settle(&result, "Tag deleted");
                Command::none()
            }
            Message::TopicDeleted(result) => {
                self.settle(&result, "Topic deleted");
                Command::none()
            }
            Message::PasswordResetSent(result) => {
                self.settle(&result, "Check your inbox for the reset link");
                Command::none()
            }

            Message::Navigate(route) => self.navigate(route),
            Message::Back => {
                self.overlay = None;
                self.router.back();
                Command::none()
            }
            Message::Quit => Command::effect(Action::Quit),
        }
    }

    fn view(&self, frame: &mut Frame<'_>) {
        view::render(self, frame);
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let mut subscriptions = vec![
            Subscription::new(TerminalEvents::new()).map(|event| match event {
                Ok(event) => Message::Terminal(event),
                Err(error) => Message::TerminalError(error),
            }),
            Subscription::new(Timer::every(self.gc_interval)).map(|_| Message::SweepCache),
        ];

        match self.router.current() {
            Route::Feed if self.feed.show_drafts => {
                subscriptions.push(Subscription::new(self.api.drafts()).map(Message::Drafts));
            }
            Route::Feed => subscriptions.push(
                Subscription::new(self.api.posts(self.feed.filter.clone())).map(Message::Posts),
            ),
            Route::PostDetail(post_id) => subscriptions.extend([
                Subscription::new(self.api.post(post_id)).map(Message::Post),
                Subscription::new(self.api.comments(post_id)).map(Message::Comments),
                Subscription::new(self.api.bookmarks()).map(Message::Bookmarks),
                Subscription::new(self.api.upvotes()).map(Message::Upvotes),
                Subscription::new(self.api.wallet(&self.session.account_id)).map(Message::Wallet),
            ]),
            Route::Bookmarks => {
                subscriptions.push(Subscription::new(self.api.bookmarks()).map(Message::Bookmarks));
            }
            Route::Wallet => subscriptions.extend([
                Subscription::new(self.api.wallet(&self.session.account_id)).map(Message::Wallet),
                Subscription::new(self.api.transactions(Some(self.wallet.filter.clone())))
                    .map(Message::Transactions),
            ]),
            Route::AdminUsers if self.session.can_administer() => subscriptions.push(
                Subscription::new(self.api.users(self.users.params.clone())).map(Message::Users),
            ),
            Route::AdminTags if self.session.can_administer() => subscriptions.extend([
                Subscription::new(self.api.tags()).map(Message::Tags),
                Subscription::new(self.api.topics()).map(Message::Topics),
            ]),
            Route::AdminUsers | Route::AdminTags => {}
        }
        subscriptions
    }
}

fn clamp(selected: usize, len: usize) -> usize {
    selected.min(len.saturating_sub(1))
}

impl App {
    pub const fn router(&self) -> &Router {
        &self.router
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub const fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub const fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub const fn feed(&self) -> &FeedState {
        &self.feed
    }

    pub const fn detail(&self) -> Option<&DetailState> {
        self.detail.as_ref()
    }

    pub fn is_bookmarked(&self, post_id: &str) -> bool {
        self.bookmarks
            .data()
            .is_some_and(|posts| posts.iter().any(|post| post.post_id == post_id))
    }

    pub fn is_upvoted(&self, post_id: &str) -> bool {
        self.upvotes
            .data()
            .is_some_and(|upvotes| upvotes.iter().any(|upvote| upvote.post_id == post_id))
    }

    fn detail_for(&mut self, key: &QueryKey) -> Option<&mut DetailState> {
        self.detail
            .as_mut()
            .filter(|detail| post_keys::detail(&detail.post_id) == *key)
    }

    /// Shows the outcome of a mutation. Returns `true` on success.
    fn settle<T>(&mut self, result: &MutationResult<T>, success: impl Into<String>) -> bool {
        match result {
            Ok(_) => {
                self.notice = Some(Notice::Info(success.into()));
                true
            }
            Err(error) => {
                self.notice = Some(Notice::Error(error.message.clone()));
                false
            }
        }
    }

    fn navigate(&mut self, route: Route) -> Command<Message> {
        if route.is_admin() && !self.session.can_administer() {
            self.notice = Some(Notice::Error(
                "The admin console is for staff only".to_string(),
            ));
            return Command::none();
        }
        if let Route::PostDetail(post_id) = &route {
            if self.detail.as_ref().is_none_or(|detail| detail.post_id != *post_id) {
                self.detail = Some(DetailState::new(post_id));
            }
        }
        debug!(path = %route, "navigating");
        self.overlay = None;
        self.router.push(route);
        Command::none()
    }

    fn on_key(&mut self, key: KeyEvent) -> Command<Message> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Command::message(Message::Quit);
        }
        match self.overlay.take() {
            Some(overlay) => self.on_overlay_key(overlay, key),
            None => self.on_screen_key(key),
        }
    }

    fn on_overlay_key(&mut self, overlay: Overlay, key: KeyEvent) -> Command<Message> {
        match overlay {
            Overlay::Input { prompt, mut buffer } => match key.code {
                KeyCode::Esc => Command::none(),
                KeyCode::Enter => self.submit(prompt, &buffer),
                KeyCode::Backspace => {
                    buffer.pop();
                    self.overlay = Some(Overlay::Input { prompt, buffer });
                    Command::none()
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    self.overlay = Some(Overlay::Input { prompt, buffer });
                    Command::none()
                }
                _ => {
                    self.overlay = Some(Overlay::Input { prompt, buffer });
                    Command::none()
                }
            },
            Overlay::Confirm(confirm) => match key.code {
                KeyCode::Char('y' | 'Y') | KeyCode::Enter => self.confirm(confirm),
                KeyCode::Char('n' | 'N') | KeyCode::Esc => Command::none(),
                _ => {
                    self.overlay = Some(Overlay::Confirm(confirm));
                    Command::none()
                }
            },
            Overlay::Pick {
                picker,
                post_id,
                selected,
            } => {
                let len = picker.options().len();
                let selected = match key.code {
                    KeyCode::Esc => return Command::none(),
                    KeyCode::Enter => return self.pick(picker, &post_id, selected),
                    KeyCode::Up | KeyCode::Char('k') => selected.saturating_sub(1),
                    KeyCode::Down | KeyCode::Char('j') => clamp(selected + 1, len),
                    _ => selected,
                };
                self.overlay = Some(Overlay::Pick {
                    picker,
                    post_id,
                    selected,
                });
                Command::none()
            }
        }
    }

    fn submit(&mut self, prompt: Prompt, input: &str) -> Command<Message> {
        let input = input.trim();
        match prompt {
            Prompt::Search => {
                self.feed.set_filter(PostFilter {
                    page: 1,
                    search: (!input.is_empty()).then(|| input.to_string()),
                    ..self.feed.filter.clone()
                });
                Command::none()
            }
            Prompt::UserSearch => {
                self.users.params = self.users.params.clone().search(input);
                self.users
                    .users
                    .track(user_keys::listing_params(&self.users.params));
                self.users.selected = 0;
                Command::none()
            }
            Prompt::Comment(post_id) => {
                if input.is_empty() {
                    self.notice = Some(Notice::Error("Comment cannot be empty".to_string()));
                    return Command::none();
                }
                self.api
                    .create_comment(&post_id, input)
                    .map(Message::CommentCreated)
            }
            Prompt::ForgotPassword => {
                if !input.contains('@') {
                    self.notice = Some(Notice::Error("Enter a valid email address".to_string()));
                    return Command::none();
                }
                self.api
                    .forgot_password(input)
                    .map(Message::PasswordResetSent)
            }
        }
    }

    fn confirm(&mut self, confirm: Confirm) -> Command<Message> {
        match confirm {
            Confirm::DeletePost(post_id) => self
                .api
                .delete_post(&post_id)
                .map(move |result| Message::PostDeleted(post_id.clone(), result)),
            Confirm::DeleteDrafts(ids) => self.api.delete_drafts(ids).map(Message::DraftsDeleted),
            Confirm::Download { post_id, .. } => {
                self.api.download_post(&post_id).map(Message::Downloaded)
            }
            Confirm::DeleteAccount { account_id, .. } => {
                self.api.delete_account(&account_id).map(Message::AccountDeleted)
            }
            Confirm::DeleteTag { tag_id, .. } => self.api.delete_tag(&tag_id).map(Message::TagDeleted),
            Confirm::DeleteTopic { topic_id, .. } => {
                self.api.delete_topic(&topic_id).map(Message::TopicDeleted)
            }
        }
    }

    fn pick(&mut self, picker: Picker, post_id: &str, selected: usize) -> Command<Message> {
        match picker {
            Picker::Status => match PostStatus::SELECTABLE.get(selected) {
                Some(status) => self
                    .api
                    .update_post_status(post_id, *status)
                    .map(Message::StatusUpdated),
                None => Command::none(),
            },
            Picker::Report => match ReportReason::ALL.get(selected) {
                Some(reason) => self.api.report_post(post_id, *reason).map(Message::Reported),
                None => Command::none(),
            },
        }
    }

    fn on_screen_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Char('q') => return Command::message(Message::Quit),
            KeyCode::Esc | KeyCode::Backspace => return Command::message(Message::Back),
            KeyCode::Char('1') => return self.navigate(Route::Feed),
            KeyCode::Char('2') => return self.navigate(Route::Bookmarks),
            KeyCode::Char('3') => return self.navigate(Route::Wallet),
            KeyCode::Char('4') => return self.navigate(Route::AdminUsers),
            KeyCode::Char('5') => return self.navigate(Route::AdminTags),
            KeyCode::Char('F') => {
                self.open_prompt(Prompt::ForgotPassword);
                return Command::none();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_selection(-1);
                return Command::none();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_selection(1);
                return Command::none();
            }
            _ => {}
        }

        match self.router.current().clone() {
            Route::Feed => self.on_feed_key(key),
            Route::PostDetail(post_id) => self.on_detail_key(&post_id, key),
            Route::Bookmarks => match key.code {
                KeyCode::Enter => self.open_selected(),
                _ => Command::none(),
            },
            Route::Wallet => {
                let kind = match key.code {
                    KeyCode::Char('v') => TransactionKind::View,
                    KeyCode::Char('y') => TransactionKind::DailyPoint,
                    KeyCode::Char('n') => TransactionKind::BonusPoint,
                    KeyCode::Char('o') => TransactionKind::OrderPoint,
                    _ => return Command::none(),
                };
                self.wallet.filter.toggle(kind);
                self.wallet
                    .transactions
                    .track(transaction_keys::current_account(Some(&self.wallet.filter)));
                Command::none()
            }
            Route::AdminUsers => self.on_users_key(key),
            Route::AdminTags => self.on_taxonomy_key(key),
        }
    }

    fn on_feed_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('/') => {
                self.open_prompt(Prompt::Search);
                Command::none()
            }
            KeyCode::Char('n') if !self.feed.show_drafts => {
                let full_page = self.feed.visible().len() >= self.feed.filter.per_page as usize;
                if full_page && !self.feed.posts.is_placeholder() {
                    self.feed.set_filter(PostFilter {
                        page: self.feed.filter.page + 1,
                        ..self.feed.filter.clone()
                    });
                }
                Command::none()
            }
            KeyCode::Char('p') if !self.feed.show_drafts && self.feed.filter.page > 1 => {
                self.feed.set_filter(PostFilter {
                    page: self.feed.filter.page - 1,
                    ..self.feed.filter.clone()
                });
                Command::none()
            }
            KeyCode::Char('d') => {
                self.feed.show_drafts = !self.feed.show_drafts;
                self.feed.selected = 0;
                Command::none()
            }
            KeyCode::Char(' ') if self.feed.show_drafts => {
                if let Some(id) = self.feed.selected_post().map(|post| post.post_id.clone()) {
                    if !self.feed.marked.remove(&id) {
                        self.feed.marked.insert(id);
                    }
                }
                Command::none()
            }
            KeyCode::Char('x') if self.feed.show_drafts => {
                let ids: Vec<String> = if self.feed.marked.is_empty() {
                    self.feed
                        .selected_post()
                        .map(|post| post.post_id.clone())
                        .into_iter()
                        .collect()
                } else {
                    self.feed.marked.iter().cloned().collect()
                };
                if !ids.is_empty() {
                    self.overlay = Some(Overlay::Confirm(Confirm::DeleteDrafts(ids)));
                }
                Command::none()
            }
            KeyCode::Char('r') => {
                let listing = if self.feed.show_drafts {
                    post_keys::drafts()
                } else {
                    post_keys::listing()
                };
                self.api.client().invalidate(listing)
            }
            _ => Command::none(),
        }
    }

    fn on_detail_key(&mut self, post_id: &str, key: KeyEvent) -> Command<Message> {
        let post = self
            .detail
            .as_ref()
            .and_then(|detail| detail.post.data())
            .cloned();
        match key.code {
            KeyCode::Char('m') => {
                if let Some(body) = self.detail.as_mut().and_then(|d| d.body.as_mut()) {
                    body.text.toggle();
                }
                Command::none()
            }
            KeyCode::Char('r') => {
                let client = self.api.client();
                Command::batch([
                    client.invalidate(post_keys::detail(post_id)),
                    client.invalidate(comment_keys::by_post(post_id)),
                ])
            }
            KeyCode::Char('b') => self.api.toggle_bookmark(post_id).map(Message::BookmarkToggled),
            KeyCode::Char('u') => self.api.toggle_upvote(post_id).map(Message::UpvoteToggled),
            KeyCode::Char('c') => {
                self.open_prompt(Prompt::Comment(post_id.to_string()));
                Command::none()
            }
            KeyCode::Char('s') if post.as_ref().is_some_and(|p| self.session.can_manage(p)) => {
                self.open_picker(Picker::Status, post_id);
                Command::none()
            }
            KeyCode::Char('x') if post.as_ref().is_some_and(|p| self.session.can_manage(p)) => {
                self.overlay = Some(Overlay::Confirm(Confirm::DeletePost(post_id.to_string())));
                Command::none()
            }
            KeyCode::Char('R') if post.as_ref().is_some_and(|p| self.session.can_report(p)) => {
                self.open_picker(Picker::Report, post_id);
                Command::none()
            }
            KeyCode::Char('D') if post.as_ref().is_some_and(Post::has_attachment) => {
                self.overlay = Some(Overlay::Confirm(Confirm::Download {
                    post_id: post_id.to_string(),
                    balance: self.wallet.wallet.data().map(|wallet| wallet.balance),
                }));
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn on_users_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Char('/') => self.open_prompt(Prompt::UserSearch),
            KeyCode::Char('n') => {
                let len = self.users.users.data().map_or(0, Vec::len);
                if len >= self.users.params.per_page as usize {
                    self.set_user_page(self.users.params.page + 1);
                }
            }
            KeyCode::Char('p') if self.users.params.page > 1 => {
                self.set_user_page(self.users.params.page - 1);
            }
            KeyCode::Char('x') => {
                let account = self
                    .users
                    .users
                    .data()
                    .and_then(|users| users.get(self.users.selected));
                if let Some(account) = account {
                    if account.account_id == self.session.account_id {
                        self.notice =
                            Some(Notice::Error("You cannot delete your own account".to_string()));
                    } else {
                        self.overlay = Some(Overlay::Confirm(Confirm::DeleteAccount {
                            account_id: account.account_id.clone(),
                            username: account.username.clone(),
                        }));
                    }
                }
            }
            _ => {}
        }
        Command::none()
    }

    fn set_user_page(&mut self, page: u32) {
        self.users.params.page = page;
        self.users
            .users
            .track(user_keys::listing_params(&self.users.params));
        self.users.selected = 0;
    }

    fn on_taxonomy_key(&mut self, key: KeyEvent) -> Command<Message> {
        match key.code {
            KeyCode::Tab => {
                self.taxonomy.focus = match self.taxonomy.focus {
                    TaxonomyFocus::Tags => TaxonomyFocus::Topics,
                    TaxonomyFocus::Topics => TaxonomyFocus::Tags,
                };
                self.taxonomy.selected = 0;
            }
            KeyCode::Char('x') => {
                let selected = self.taxonomy.selected;
                let confirm = match self.taxonomy.focus {
                    TaxonomyFocus::Tags => {
                        self.taxonomy
                            .tags
                            .data()
                            .and_then(|tags| tags.get(selected))
                            .map(|tag| Confirm::DeleteTag {
                                tag_id: tag.tag_id.clone(),
                                name: tag.name.clone(),
                            })
                    }
                    TaxonomyFocus::Topics => self
                        .taxonomy
                        .topics
                        .data()
                        .and_then(|topics| topics.get(selected))
                        .map(|topic| Confirm::DeleteTopic {
                            topic_id: topic.topic_id.clone(),
                            name: topic.name.clone(),
                        }),
                };
                self.overlay = confirm.map(Overlay::Confirm);
            }
            _ => {}
        }
        Command::none()
    }

    fn open_prompt(&mut self, prompt: Prompt) {
        self.overlay = Some(Overlay::Input {
            prompt,
            buffer: String::new(),
        });
    }

    fn open_picker(&mut self, picker: Picker, post_id: &str) {
        self.overlay = Some(Overlay::Pick {
            picker,
            post_id: post_id.to_string(),
            selected: 0,
        });
    }

    fn open_selected(&mut self) -> Command<Message> {
        let post = match self.router.current() {
            Route::Bookmarks => self
                .bookmarks
                .data()
                .and_then(|posts| posts.get(self.bookmark_selected)),
            _ => self.feed.selected_post(),
        };
        match post.map(|post| post.post_id.clone()) {
            Some(post_id) => self.navigate(Route::PostDetail(post_id)),
            None => Command::none(),
        }
    }

    fn taxonomy_len(&self) -> usize {
        match self.taxonomy.focus {
            TaxonomyFocus::Tags => self.taxonomy.tags.data().map_or(0, Vec::len),
            TaxonomyFocus::Topics => self.taxonomy.topics.data().map_or(0, Vec::len),
        }
    }

    fn clamp_taxonomy(&mut self) {
        self.taxonomy.selected = clamp(self.taxonomy.selected, self.taxonomy_len());
    }

    fn move_selection(&mut self, delta: isize) {
        let step = |selected: usize, len: usize| {
            clamp(selected.saturating_add_signed(delta), len)
        };
        match self.router.current() {
            Route::Feed => {
                self.feed.selected = step(self.feed.selected, self.feed.visible().len());
            }
            Route::Bookmarks => {
                let len = self.bookmarks.data().map_or(0, Vec::len);
                self.bookmark_selected = step(self.bookmark_selected, len);
            }
            Route::AdminUsers => {
                let len = self.users.users.data().map_or(0, Vec::len);
                self.users.selected = step(self.users.selected, len);
            }
            Route::AdminTags => {
                self.taxonomy.selected = step(self.taxonomy.selected, self.taxonomy_len());
            }
            Route::PostDetail(_) | Route::Wallet => {}
        }
    }
}
