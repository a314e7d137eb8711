//! Keyboard, mouse and resize events from the terminal.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;

use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use futures::stream::BoxStream;

use super::{SubscriptionId, SubscriptionSource};

/// Terminal input events read through crossterm's `EventStream`.
///
/// Yields `Err` when reading from the terminal fails; the stream keeps going
/// afterwards so a transient error does not kill input handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TerminalEvents;

impl TerminalEvents {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SubscriptionSource for TerminalEvents {
    type Output = Result<Event, io::Error>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        EventStream::new().boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        "terminal-events".hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}
