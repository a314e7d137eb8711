use ratatui::Frame;

use crate::{command::Command, subscription::Subscription};

/// A terminal application in the Elm architecture.
///
/// The runtime owns the application and calls into it from a single task:
///
/// 1. [`new`](Self::new) once, to build the model and an initial command.
/// 2. [`update`](Self::update) for every message produced by commands and
///    subscriptions.
/// 3. [`subscriptions`](Self::subscriptions) after every update, to learn
///    which event sources should be running.
/// 4. [`view`](Self::view) whenever the screen needs redrawing.
///
/// # Example
///
/// ```
/// use ratatui::Frame;
/// use plaza::{application::Application, command::Command, subscription::Subscription};
///
/// enum Message {
///     Next,
///     Previous,
/// }
///
/// struct Pager {
///     page: u32,
/// }
///
/// impl Application for Pager {
///     type Message = Message;
///     type Flags = u32;
///
///     fn new(page: u32) -> (Self, Command<Message>) {
///         (Pager { page }, Command::none())
///     }
///
///     fn update(&mut self, msg: Message) -> Command<Message> {
///         match msg {
///             Message::Next => self.page += 1,
///             Message::Previous => self.page = self.page.saturating_sub(1).max(1),
///         }
///         Command::none()
///     }
///
///     fn view(&self, _frame: &mut Frame<'_>) {}
///
///     fn subscriptions(&self) -> Vec<Subscription<Message>> {
///         vec![]
///     }
/// }
/// ```
pub trait Application: Sized {
    /// Everything that can happen to the application.
    type Message: Send + 'static;

    /// Data needed to build the application, such as its configuration.
    type Flags: Send;

    /// Builds the initial model and the command to run at startup.
    fn new(flags: Self::Flags) -> (Self, Command<Self::Message>);

    /// Applies `msg` to the model and returns follow-up work.
    ///
    /// All state changes happen here. Slow work belongs in the returned
    /// command, which the runtime drives on its own task.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Renders the model. Must not change state.
    fn view(&self, frame: &mut Frame<'_>);

    /// The event sources that should be running for the current model.
    ///
    /// Called after every update. Subscriptions with the same id as a running
    /// one are left alone; missing ones are cancelled.
    ///
    /// ```
    /// # use plaza::{application::Application, command::Command, subscription::Subscription};
    /// # use ratatui::Frame;
    /// use plaza::subscription::{terminal::TerminalEvents, time::Timer};
    /// # struct MyApp;
    /// # enum Message { Tick, Input }
    /// # impl Application for MyApp {
    /// #     type Message = Message;
    /// #     type Flags = ();
    /// #     fn new(_: ()) -> (Self, Command<Message>) { (MyApp, Command::none()) }
    /// #     fn update(&mut self, msg: Message) -> Command<Message> { Command::none() }
    /// #     fn view(&self, frame: &mut Frame<'_>) {}
    /// fn subscriptions(&self) -> Vec<Subscription<Message>> {
    ///     vec![
    ///         Subscription::new(Timer::new(1000)).map(|_| Message::Tick),
    ///         Subscription::new(TerminalEvents::new()).map(|_| Message::Input),
    ///     ]
    /// }
    /// # }
    /// ```
    fn subscriptions(&self) -> Vec<Subscription<Self::Message>>;
}
