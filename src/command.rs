use futures::{
    FutureExt, StreamExt,
    stream::{self, BoxStream, select_all},
};

/// An action emitted by a running command.
///
/// Actions are what the runtime actually consumes: either a message for the
/// application's `update` function, or a request to stop the event loop.
pub enum Action<Msg> {
    /// Deliver a message to `Application::update`.
    Message(Msg),

    /// Stop the event loop and return from `Runtime::run`.
    Quit,
}

impl<Msg> Action<Msg> {
    /// Transforms the message carried by this action, leaving `Quit` untouched.
    pub fn map<B>(self, f: impl FnOnce(Msg) -> B) -> Action<B> {
        match self {
            Self::Message(msg) => Action::Message(f(msg)),
            Self::Quit => Action::Quit,
        }
    }
}

/// A description of side effects to run on behalf of the application.
///
/// Commands wrap an asynchronous stream of [`Action`]s. They are returned from
/// `Application::new` and `Application::update` and driven by the runtime on
/// their own task, so a slow backend request never blocks rendering.
///
/// # Examples
///
/// ```
/// use plaza::command::Command;
///
/// enum Message {
///     BalanceLoaded(u64),
/// }
///
/// let cmd = Command::future(async { Message::BalanceLoaded(120) });
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) stream: Option<BoxStream<'static, Action<Msg>>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// A command with no side effects.
    ///
    /// ```
    /// use plaza::command::Command;
    ///
    /// let cmd: Command<()> = Command::none();
    /// assert!(cmd.is_none());
    /// ```
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Returns `true` if this command does nothing.
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }

    /// Runs a future that already produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().map(Action::Message).boxed()),
        }
    }

    /// Delivers a message to `update` on the next turn of the event loop.
    ///
    /// Useful for translating raw input into a domain message without
    /// duplicating the handling code.
    pub fn message(msg: Msg) -> Self {
        Self::effect(Action::Message(msg))
    }

    /// Emits a single action immediately.
    ///
    /// ```
    /// use plaza::command::{Action, Command};
    ///
    /// let quit: Command<()> = Command::effect(Action::Quit);
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            stream: Some(stream::once(async move { action }).boxed()),
        }
    }

    /// Runs several commands concurrently.
    ///
    /// Message order across the batched commands is not guaranteed.
    /// `Command::none()` entries are dropped.
    pub fn batch(commands: impl IntoIterator<Item = Command<Msg>>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Converts the messages this command produces.
    ///
    /// This is how library commands such as mutations are adapted to the
    /// application's own message type.
    ///
    /// ```
    /// use plaza::command::Command;
    ///
    /// enum Message {
    ///     Deleted(Result<(), String>),
    /// }
    ///
    /// let cmd: Command<Result<(), String>> = Command::future(async { Ok(()) });
    /// let cmd: Command<Message> = cmd.map(Message::Deleted);
    /// ```
    pub fn map<B: Send + 'static>(self, f: impl Fn(Msg) -> B + Send + 'static) -> Command<B> {
        Command {
            stream: self
                .stream
                .map(|stream| stream.map(move |action| action.map(&f)).boxed()),
        }
    }
}
