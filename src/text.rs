//! Text shown in post bodies and lists.
//!
//! Post content arrives as HTML. The terminal shows a plain-text projection
//! of it, collapsed to a preview when it is long.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use unicode_segmentation::UnicodeSegmentation;

/// Elements that start on a new line.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
    "tr", "table", "section", "article", "header", "footer",
];

/// Marker appended to a collapsed preview.
pub const ELLIPSIS: char = '…';

/// Projects an HTML fragment to plain text.
///
/// Tags are dropped, entities decoded, whitespace collapsed. `<br>` and
/// block elements become line breaks and list items get a bullet.
///
/// ```
/// use plaza::text::html_to_text;
///
/// assert_eq!(html_to_text("<p>Fish &amp; chips</p><p>Tea</p>"), "Fish & chips\nTea");
/// ```
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    walk(fragment.root_element(), &mut out);

    let mut text = String::with_capacity(out.len());
    for line in out.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(line);
    }
    text
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_collapsed(out, text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            if name == "li" {
                out.push_str("• ");
            }
            walk(child, out);
            if block {
                out.push('\n');
            }
        }
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        if !text.is_empty() && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
    let mut first = true;
    for word in words {
        if !first {
            out.push(' ');
        }
        out.push_str(word);
        first = false;
    }
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

/// Whether long text shows its preview or all of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    Collapsed,
    Expanded,
}

/// Post text with a show more / show less toggle.
///
/// Lengths are counted in grapheme clusters, so an emoji or an accented
/// letter counts once.
///
/// ```
/// use plaza::text::{Truncation, TruncatedText};
///
/// let mut text = TruncatedText::plain("hello world", 5);
/// assert_eq!(text.visible(), "hello…");
/// text.toggle();
/// assert_eq!(text.state(), Some(Truncation::Expanded));
/// assert_eq!(text.visible(), "hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedText {
    text: String,
    preview: Option<String>,
    state: Option<Truncation>,
}

impl TruncatedText {
    /// Text for the HTML `content`, collapsed past `max_len` graphemes.
    pub fn new(content: &str, max_len: usize) -> Self {
        Self::plain(html_to_text(content), max_len)
    }

    /// Like [`new`](Self::new) for text that is already plain.
    pub fn plain(text: impl Into<String>, max_len: usize) -> Self {
        let text = text.into();
        if text.graphemes(true).count() <= max_len {
            return Self {
                text,
                preview: None,
                state: None,
            };
        }

        let mut preview: String = text.graphemes(true).take(max_len).collect();
        preview.truncate(preview.trim_end().len());
        preview.push(ELLIPSIS);
        Self {
            text,
            preview: Some(preview),
            state: Some(Truncation::Collapsed),
        }
    }

    /// `None` when the text fits and there is nothing to toggle.
    pub const fn state(&self) -> Option<Truncation> {
        self.state
    }

    pub const fn is_truncatable(&self) -> bool {
        self.state.is_some()
    }

    /// Switches between preview and full text. Does nothing for short text.
    pub fn toggle(&mut self) {
        self.state = match self.state {
            Some(Truncation::Collapsed) => Some(Truncation::Expanded),
            Some(Truncation::Expanded) => Some(Truncation::Collapsed),
            None => None,
        };
    }

    /// The text to render right now.
    pub fn visible(&self) -> Cow<'_, str> {
        match (&self.state, &self.preview) {
            (Some(Truncation::Collapsed), Some(preview)) => Cow::Borrowed(preview),
            _ => Cow::Borrowed(&self.text),
        }
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }

    /// Label for the toggle control, if there is one.
    pub const fn toggle_label(&self) -> Option<&'static str> {
        match self.state {
            Some(Truncation::Collapsed) => Some("Show more"),
            Some(Truncation::Expanded) => Some("Show less"),
            None => None,
        }
    }
}

/// "3 hours ago" style age of `then` as seen at `now`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };
    let seconds = elapsed.num_seconds();
    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3_600 {
        plural(elapsed.num_minutes(), "minute")
    } else if seconds < 86_400 {
        plural(elapsed.num_hours(), "hour")
    } else if seconds < 30 * 86_400 {
        plural(elapsed.num_days(), "day")
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn len(text: &str) -> usize {
        text.graphemes(true).count()
    }

    const SAMPLES: &[&str] = &[
        "",
        "a",
        "short",
        "hello world, this is a longer sentence",
        "héllo wörld with àccents everywhere",
        "🏔️🏔️🏔️ mountains 👨‍👩‍👧 family",
        "trailing spaces      inside the cut",
        "line one\nline two\nline three",
    ];

    #[test]
    fn test_html_projection() {
        assert_eq!(html_to_text("plain"), "plain");
        assert_eq!(html_to_text("<p>a</p><p>b</p>"), "a\nb");
        assert_eq!(html_to_text("one<br>two"), "one\ntwo");
        assert_eq!(html_to_text("<b>bold</b> and <i>italic</i>"), "bold and italic");
        assert_eq!(html_to_text("<p>  lots \n of   space </p>"), "lots of space");
        assert_eq!(html_to_text("&lt;tag&gt; &quot;q&quot;"), "<tag> \"q\"");
        assert_eq!(html_to_text("<ul><li>x</li><li>y</li></ul>"), "• x\n• y");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_short_text_has_no_toggle() {
        for sample in SAMPLES {
            let max = len(sample);
            let mut text = TruncatedText::plain(*sample, max);
            assert_eq!(text.state(), None, "{sample:?}");
            assert_eq!(text.toggle_label(), None);
            text.toggle();
            assert_eq!(text.visible(), *sample);
        }
    }

    #[test]
    fn test_collapsed_preview_is_bounded() {
        for sample in SAMPLES {
            for max in 0..len(sample) {
                let text = TruncatedText::plain(*sample, max);
                assert_eq!(text.state(), Some(Truncation::Collapsed), "{sample:?} at {max}");
                let visible = text.visible();
                assert!(len(&visible) <= max + 1, "{visible:?} longer than {max} + 1");
                assert!(visible.ends_with(ELLIPSIS));
            }
        }
    }

    #[test]
    fn test_expand_shows_everything_and_collapse_restores() {
        for sample in SAMPLES {
            for max in 0..len(sample) {
                let mut text = TruncatedText::plain(*sample, max);
                let preview = text.visible().into_owned();

                text.toggle();
                assert_eq!(text.state(), Some(Truncation::Expanded));
                assert_eq!(text.visible(), *sample);
                assert_eq!(text.toggle_label(), Some("Show less"));

                text.toggle();
                assert_eq!(text.visible(), preview);
                assert_eq!(text.toggle_label(), Some("Show more"));
            }
        }
    }

    #[test]
    fn test_graphemes_are_not_split() {
        let text = TruncatedText::plain("👨‍👩‍👧👨‍👩‍👧", 1);
        assert_eq!(text.visible(), "👨‍👩‍👧…");
    }

    #[test]
    fn test_html_content_is_counted_as_text() {
        let text = TruncatedText::new("<p><b>abc</b></p>", 3);
        assert_eq!(text.state(), None);
        assert_eq!(text.full_text(), "abc");
    }

    #[test]
    fn test_relative_time() {
        let now = DateTime::from_timestamp(1_714_554_000, 0).expect("valid timestamp");
        let ago = |secs| relative_time(now - chrono::Duration::seconds(secs), now);
        assert_eq!(ago(5), "just now");
        assert_eq!(ago(60), "1 minute ago");
        assert_eq!(ago(7_200), "2 hours ago");
        assert_eq!(ago(86_400 * 3), "3 days ago");
        assert_eq!(ago(86_400 * 60), "2024-03-02");
    }
}
