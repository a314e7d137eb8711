use std::time::Duration;

use color_eyre::eyre::Result;
use futures::StreamExt;
use ratatui::{Terminal, prelude::Backend};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    application::Application,
    command::{Action, Command},
    subscription::SubscriptionManager,
};

/// Drives an [`Application`]: runs its commands, keeps its subscriptions in
/// sync and redraws the terminal.
pub struct Runtime<A: Application> {
    app: A,
    init: Option<Command<A::Message>>,
    tx: mpsc::UnboundedSender<Action<A::Message>>,
    rx: mpsc::UnboundedReceiver<Action<A::Message>>,
    subscriptions: SubscriptionManager<A::Message>,
}

impl<A: Application> Runtime<A> {
    /// Builds the application from `flags`. Nothing runs until [`run`](Self::run).
    pub fn new(flags: A::Flags) -> Self {
        let (app, init) = A::new(flags);
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriptions = SubscriptionManager::new(tx.clone());

        Self {
            app,
            init: Some(init),
            tx,
            rx,
            subscriptions,
        }
    }

    /// The application model.
    pub const fn app(&self) -> &A {
        &self.app
    }

    fn spawn(&self, cmd: Command<A::Message>) {
        let Some(mut stream) = cmd.stream else {
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(action) = stream.next().await {
                if tx.send(action).is_err() {
                    break;
                }
            }
        });
    }

    /// Handles one action. Returns `false` when the application asked to quit.
    fn handle(&mut self, action: Action<A::Message>) -> bool {
        match action {
            Action::Message(msg) => {
                let cmd = self.app.update(msg);
                self.spawn(cmd);
                self.subscriptions.update(self.app.subscriptions());
                true
            }
            Action::Quit => false,
        }
    }

    /// Runs the event loop until the application quits.
    ///
    /// The screen is redrawn at most `frame_rate` times per second and only
    /// after something changed. Quit requests are handled as soon as they
    /// arrive, not at the next frame.
    ///
    /// # Errors
    ///
    /// Returns an error if drawing to the terminal fails.
    pub async fn run<B: Backend>(
        mut self,
        terminal: &mut Terminal<B>,
        frame_rate: u32,
    ) -> Result<()> {
        let frame = Duration::from_millis(1000 / u64::from(frame_rate.max(1)));
        let mut ticker = interval(frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if let Some(init) = self.init.take() {
            self.spawn(init);
        }
        self.subscriptions.update(self.app.subscriptions());
        info!(subscriptions = self.subscriptions.len(), "runtime started");

        terminal.draw(|frame| self.app.view(frame))?;
        let mut dirty = false;

        loop {
            tokio::select! {
                Some(action) = self.rx.recv() => {
                    if !self.handle(action) {
                        break;
                    }
                    let mut quit = false;
                    while let Ok(action) = self.rx.try_recv() {
                        if !self.handle(action) {
                            quit = true;
                            break;
                        }
                    }
                    if quit {
                        break;
                    }
                    dirty = true;
                }
                _ = ticker.tick() => {
                    if dirty {
                        terminal.draw(|frame| self.app.view(frame))?;
                        dirty = false;
                    }
                }
            }
        }

        debug!("quit requested, shutting down subscriptions");
        self.subscriptions.shutdown();
        Ok(())
    }
}
