//! Rendering for [`App`]. Nothing here changes state.

use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph, Row, Table, Wrap};

use super::{App, Confirm, Notice, Overlay, Picker, TaxonomyFocus};
use crate::api::{Post, TransactionKind};
use crate::route::Route;
use crate::subscription::http::{QueryError, QueryState, QueryView};
use crate::text::relative_time;

const HIGHLIGHT: Style = Style::new().add_modifier(Modifier::REVERSED);

pub(super) fn render(app: &App, frame: &mut Frame<'_>) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(app, frame, header);
    match app.router.current() {
        Route::Feed => render_feed(app, frame, body),
        Route::PostDetail(_) => render_detail(app, frame, body),
        Route::Bookmarks => render_bookmarks(app, frame, body),
        Route::Wallet => render_wallet(app, frame, body),
        Route::AdminUsers => render_users(app, frame, body),
        Route::AdminTags => render_taxonomy(app, frame, body),
    }
    render_footer(app, frame, footer);

    if let Some(overlay) = &app.overlay {
        render_overlay(overlay, frame, body);
    }
}

fn render_header(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let mut tabs = vec![
        Span::raw(" Plaza ").bold().fg(Color::Cyan),
        tab("1 Feed", matches!(app.router.current(), Route::Feed)),
        tab("2 Bookmarks", *app.router.current() == Route::Bookmarks),
        tab("3 Wallet", *app.router.current() == Route::Wallet),
    ];
    if app.session.can_administer() {
        tabs.push(tab("4 Users", *app.router.current() == Route::AdminUsers));
        tabs.push(tab("5 Tags", *app.router.current() == Route::AdminTags));
    }
    tabs.push(Span::raw(format!("  @{} ({})", app.session.username, app.session.role)).dim());
    frame.render_widget(Line::from(tabs), area);
}

fn tab(label: &str, active: bool) -> Span<'_> {
    let span = Span::raw(format!(" {label} "));
    if active { span.reversed() } else { span }
}

fn render_footer(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let line = match &app.notice {
        Some(Notice::Info(text)) => Line::from(text.as_str()).green(),
        Some(Notice::Error(text)) => Line::from(text.as_str()).red(),
        None => Line::from(hints(app.router.current(), app.feed.show_drafts)).dim(),
    };
    frame.render_widget(line, area);
}

fn hints(route: &Route, show_drafts: bool) -> &'static str {
    match route {
        Route::Feed if show_drafts => "space mark · x delete · d posts · r refresh · q quit",
        Route::Feed => "enter open · / search · n/p page · d drafts · r refresh · q quit",
        Route::PostDetail(_) => {
            "m more/less · r refresh · b bookmark · u upvote · c comment · s status · x delete · R report · D download · esc back"
        }
        Route::Bookmarks => "enter open · esc back",
        Route::Wallet => "v/y/n/o filter kinds · esc back",
        Route::AdminUsers => "/ search · n/p page · x delete · esc back",
        Route::AdminTags => "tab switch list · x delete · esc back",
    }
}

/// Title with a refresh marker while the view is fetching.
fn titled<T: Clone>(title: String, view: &QueryView<T>) -> Block<'static> {
    let title = if view.is_placeholder() {
        format!(" {title} (loading…) ")
    } else if view.is_fetching() && view.data().is_some() {
        format!(" {title} (refreshing) ")
    } else {
        format!(" {title} ")
    };
    Block::bordered().title(title)
}

/// Placeholder text for views without data.
fn status_text<T: Clone>(view: &QueryView<T>) -> Option<Paragraph<'static>> {
    match view.state() {
        QueryState::Loading => Some(Paragraph::new("Loading…").dim()),
        QueryState::Error(error) => Some(Paragraph::new(error_line(error)).red()),
        QueryState::Success { .. } => None,
    }
}

fn error_line(error: &QueryError) -> String {
    match error {
        QueryError::NotFound(_) => "Not found".to_string(),
        other => other.to_string(),
    }
}

fn post_item(post: &Post, marked: bool) -> ListItem<'static> {
    let now = Utc::now();
    let mut title = vec![Span::raw(post.title.clone()).bold()];
    if marked {
        title.insert(0, Span::raw("[x] ").yellow());
    }
    if let Some(tag) = &post.tag {
        title.push(Span::raw(format!("  #{}", tag.name)).cyan());
    }
    let meta = Line::from(format!(
        "  {} · {} · ▲ {} · 💬 {}",
        post.account.username,
        relative_time(post.created_date, now),
        post.upvote_count,
        post.comment_count
    ))
    .dim();
    ListItem::new(Text::from(vec![Line::from(title), meta]))
}

fn render_feed(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let feed = &app.feed;
    let (view, title) = if feed.show_drafts {
        (&feed.drafts, format!("Drafts ({} marked)", feed.marked.len()))
    } else {
        let mut title = format!("Feed · page {}", feed.filter.page);
        if let Some(search) = &feed.filter.search {
            title.push_str(&format!(" · \"{search}\""));
        }
        (&feed.posts, title)
    };
    let block = titled(title, view);

    if let Some(status) = status_text(view) {
        frame.render_widget(status.block(block), area);
        return;
    }
    let posts = feed.visible();
    if posts.is_empty() {
        frame.render_widget(Paragraph::new("Nothing here yet").dim().block(block), area);
        return;
    }
    let items = posts
        .iter()
        .map(|post| post_item(post, feed.marked.contains(&post.post_id)));
    let mut state = ListState::default().with_selected(Some(feed.selected));
    frame.render_stateful_widget(
        List::new(items).block(block).highlight_style(HIGHLIGHT),
        area,
        &mut state,
    );
}

fn render_detail(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let Some(detail) = &app.detail else {
        return;
    };
    let block = titled("Post".to_string(), &detail.post);
    if let Some(status) = status_text(&detail.post) {
        frame.render_widget(status.block(block), area);
        return;
    }
    let Some(post) = detail.post.data() else {
        return;
    };

    let [content, comments] =
        Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);

    let mut lines = vec![
        Line::from(post.title.clone()).bold(),
        Line::from(format!(
            "by {} · {} · {}",
            post.account.username,
            relative_time(post.created_date, Utc::now()),
            post.status.label()
        ))
        .dim(),
        Line::from(vec![
            marker("▲", app.is_upvoted(&post.post_id), post.upvote_count.to_string()),
            Span::raw("  "),
            marker("★", app.is_bookmarked(&post.post_id), "bookmarked".to_string()),
        ]),
        Line::default(),
    ];
    if let Some(body) = &detail.body {
        lines.extend(body.text.visible().lines().map(|line| Line::from(line.to_string())));
        if let Some(label) = body.text.toggle_label() {
            lines.push(Line::from(format!("[m] {label}")).cyan());
        }
    }
    for file in &post.post_file_list {
        let name = file.file_name().unwrap_or_else(|| file.url.clone());
        lines.push(Line::from(format!("📎 {name}  [D] download")).yellow());
    }
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
        content,
    );

    let block = titled(format!("Comments ({})", post.comment_count), &detail.comments);
    if let Some(status) = status_text(&detail.comments) {
        frame.render_widget(status.block(block), comments);
        return;
    }
    let items: Vec<ListItem<'_>> = detail
        .comments
        .data()
        .map(|comments| {
            comments
                .iter()
                .map(|comment| {
                    ListItem::new(Text::from(vec![
                        Line::from(format!(
                            "{} · {}",
                            comment.account.username,
                            relative_time(comment.created_date, Utc::now())
                        ))
                        .dim(),
                        Line::from(format!("  {}", comment.content)),
                    ]))
                })
                .collect()
        })
        .unwrap_or_default();
    frame.render_widget(List::new(items).block(block), comments);
}

fn marker(symbol: &'static str, active: bool, label: String) -> Span<'static> {
    let span = Span::raw(format!("{symbol} {label}"));
    if active { span.yellow().bold() } else { span.dim() }
}

fn render_bookmarks(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let block = titled("Bookmarks".to_string(), &app.bookmarks);
    if let Some(status) = status_text(&app.bookmarks) {
        frame.render_widget(status.block(block), area);
        return;
    }
    let posts = app.bookmarks.data().map_or(&[][..], Vec::as_slice);
    let items = posts.iter().map(|post| post_item(post, false));
    let mut state = ListState::default().with_selected(Some(app.bookmark_selected));
    frame.render_stateful_widget(
        List::new(items).block(block).highlight_style(HIGHLIGHT),
        area,
        &mut state,
    );
}

fn kind_label(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::View => "View",
        TransactionKind::DailyPoint => "Daily",
        TransactionKind::BonusPoint => "Bonus",
        TransactionKind::OrderPoint => "Order",
    }
}

fn render_wallet(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let [summary, filter, table] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(1),
    ])
    .areas(area);

    let balance = match app.wallet.wallet.state() {
        QueryState::Success { data, .. } => format!("{} points", data.balance),
        QueryState::Loading => "…".to_string(),
        QueryState::Error(error) => error_line(error),
    };
    frame.render_widget(
        Paragraph::new(balance).block(titled("Wallet".to_string(), &app.wallet.wallet)),
        summary,
    );

    let kinds = [
        ('v', TransactionKind::View),
        ('y', TransactionKind::DailyPoint),
        ('n', TransactionKind::BonusPoint),
        ('o', TransactionKind::OrderPoint),
    ]
    .into_iter()
    .map(|(key, kind)| {
        let label = Span::raw(format!(" [{key}] {} ", kind_label(kind)));
        if app.wallet.filter.includes(kind) {
            label.green()
        } else {
            label.dim()
        }
    });
    frame.render_widget(Line::from(kinds.collect::<Vec<_>>()), filter);

    let view = &app.wallet.transactions;
    let title = match view.data() {
        Some(page) => format!("Transactions · total {:+}", page.total),
        None => "Transactions".to_string(),
    };
    let block = titled(title, view);
    if let Some(status) = status_text(view) {
        frame.render_widget(status.block(block), table);
        return;
    }
    let now = Utc::now();
    let rows = view
        .data()
        .map(|page| page.transactions.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|tx| {
            Row::new([
                relative_time(tx.created_date, now),
                kind_label(tx.kind).to_string(),
                format!("{:+}", tx.amount),
                tx.description.clone(),
            ])
        });
    let widths = [
        Constraint::Length(14),
        Constraint::Length(7),
        Constraint::Length(6),
        Constraint::Fill(1),
    ];
    frame.render_widget(
        Table::new(rows, widths)
            .header(Row::new(["When", "Kind", "Points", "Description"]).bold())
            .block(block),
        table,
    );
}

fn render_users(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let users = &app.users;
    let mut title = format!("Users · page {}", users.params.page);
    if let Some(term) = users.params.username.as_ref().or(users.params.email.as_ref()) {
        title.push_str(&format!(" · \"{term}\""));
    }
    let block = titled(title, &users.users);
    if let Some(status) = status_text(&users.users) {
        frame.render_widget(status.block(block), area);
        return;
    }
    let items = users
        .users
        .data()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|account| {
            let balance = account
                .wallet
                .as_ref()
                .map_or_else(|| "-".to_string(), |wallet| wallet.balance.to_string());
            ListItem::new(format!(
                "{:<12} {:<28} {:<6} {:>5} pts",
                account.username, account.email, account.role, balance
            ))
        });
    let mut state = ListState::default().with_selected(Some(users.selected));
    frame.render_stateful_widget(
        List::new(items).block(block).highlight_style(HIGHLIGHT),
        area,
        &mut state,
    );
}

fn render_taxonomy(app: &App, frame: &mut Frame<'_>, area: Rect) {
    let taxonomy = &app.taxonomy;
    let [tags, topics] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);

    let tag_items: Vec<String> = taxonomy
        .tags
        .data()
        .map(|tags| tags.iter().map(|tag| format!("#{}", tag.name)).collect())
        .unwrap_or_default();
    let topic_items: Vec<String> = taxonomy
        .topics
        .data()
        .map(|topics| topics.iter().map(|topic| topic.name.clone()).collect())
        .unwrap_or_default();

    for (area, title, items, focus, view_status) in [
        (
            tags,
            titled("Tags".to_string(), &taxonomy.tags),
            tag_items,
            TaxonomyFocus::Tags,
            status_text(&taxonomy.tags),
        ),
        (
            topics,
            titled("Topics".to_string(), &taxonomy.topics),
            topic_items,
            TaxonomyFocus::Topics,
            status_text(&taxonomy.topics),
        ),
    ] {
        let block = if taxonomy.focus == focus {
            title.border_style(Style::new().cyan())
        } else {
            title
        };
        if let Some(status) = view_status {
            frame.render_widget(status.block(block), area);
            continue;
        }
        let selected = (taxonomy.focus == focus).then_some(taxonomy.selected);
        let mut state = ListState::default().with_selected(selected);
        frame.render_stateful_widget(
            List::new(items).block(block).highlight_style(HIGHLIGHT),
            area,
            &mut state,
        );
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    area
}

fn render_overlay(overlay: &Overlay, frame: &mut Frame<'_>, area: Rect) {
    match overlay {
        Overlay::Input { prompt, buffer } => {
            let popup = popup_area(area, 60, 3);
            frame.render_widget(Clear, popup);
            frame.render_widget(
                Paragraph::new(format!("{buffer}▏"))
                    .block(Block::bordered().title(format!(" {} ", prompt.title()))),
                popup,
            );
        }
        Overlay::Confirm(confirm) => {
            let popup = popup_area(area, 60, 5);
            frame.render_widget(Clear, popup);
            let title = match confirm {
                Confirm::Download { .. } => " Download ",
                _ => " Confirm ",
            };
            frame.render_widget(
                Paragraph::new(vec![
                    Line::from(confirm.question()),
                    Line::default(),
                    Line::from("[y] yes   [n] no").dim(),
                ])
                .wrap(Wrap { trim: true })
                .block(Block::bordered().title(title)),
                popup,
            );
        }
        Overlay::Pick {
            picker, selected, ..
        } => {
            let options = picker.options();
            let height = u16::try_from(options.len()).unwrap_or(u16::MAX).saturating_add(2);
            let popup = popup_area(area, 40, height);
            frame.render_widget(Clear, popup);
            let title = match picker {
                Picker::Status => " Change status ",
                Picker::Report => " Report reason ",
            };
            let mut state = ListState::default().with_selected(Some(*selected));
            frame.render_stateful_widget(
                List::new(options)
                    .block(Block::bordered().title(title))
                    .highlight_style(HIGHLIGHT),
                popup,
                &mut state,
            );
        }
    }
}
