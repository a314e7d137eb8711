//! Long-running event sources.
//!
//! A subscription is anything that keeps producing messages while the
//! application wants it: terminal input, a refresh timer, or a [`Query`]
//! that watches a cache key. Applications return the subscriptions they want
//! from `Application::subscriptions` after every update; the runtime diffs the
//! returned set against the running set by [`SubscriptionId`], starting new
//! ones and cancelling the rest.
//!
//! Cancelling a query subscription is how a view "unmounts" from a cache key:
//! the stream is dropped together with any fetch still in flight, so the late
//! response is discarded.
//!
//! [`Query`]: http::Query

pub mod http;
pub mod mock;
pub mod terminal;
pub mod time;

use std::any::TypeId;
use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::command::Action;

/// Identifies a subscription across calls to `Application::subscriptions`.
///
/// Two subscriptions with the same id are considered the same event source,
/// so the running one is kept instead of being restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Builds an id from the source type and a hash of its parameters.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of values that can be turned into a subscription.
pub trait SubscriptionSource: Send + 'static {
    /// The values produced by the source.
    type Output;

    /// Creates a fresh stream of values.
    ///
    /// Called once each time the runtime starts the subscription.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// A stable identifier derived from the source's parameters.
    fn id(&self) -> SubscriptionId;
}

/// A subscription producing application messages.
pub struct Subscription<Msg> {
    pub(crate) id: SubscriptionId,
    pub(crate) spawn: Box<dyn Fn() -> BoxStream<'static, Msg> + Send>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a subscription source.
    ///
    /// ```
    /// use plaza::subscription::{Subscription, time::Timer};
    ///
    /// enum Message {
    ///     SweepCache,
    /// }
    ///
    /// let sub = Subscription::new(Timer::new(30_000)).map(|_| Message::SweepCache);
    /// ```
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        let id = source.id();
        Self {
            id,
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Converts the produced values into another message type.
    ///
    /// The id is kept, so mapping never causes a restart.
    pub fn map<B: Send + 'static>(self, f: impl Fn(Msg) -> B + Send + Sync + 'static) -> Subscription<B> {
        let spawn = self.spawn;
        let f = std::sync::Arc::new(f);
        Subscription {
            id: self.id,
            spawn: Box::new(move || {
                let f = f.clone();
                spawn().map(move |msg| f(msg)).boxed()
            }),
        }
    }

    /// The id of the underlying source.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Handle for a running subscription task.
struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    fn cancel(self) {
        self.token.cancel();
        // The task notices the token at its next poll; aborting covers
        // streams that are parked inside a fetch.
        self.join.abort();
    }
}

/// Starts and stops subscription tasks to match what the application asks for.
pub(crate) struct SubscriptionManager<Msg> {
    running: HashMap<SubscriptionId, Handle>,
    tx: mpsc::UnboundedSender<Action<Msg>>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Action<Msg>>) -> Self {
        Self {
            running: HashMap::new(),
            tx,
        }
    }

    /// Reconciles the running tasks with the requested subscriptions.
    pub(crate) fn update(&mut self, subscriptions: impl IntoIterator<Item = Subscription<Msg>>) {
        let mut requested = HashMap::new();
        for sub in subscriptions {
            requested.entry(sub.id).or_insert(sub);
        }

        let stale: Vec<SubscriptionId> = self
            .running
            .keys()
            .filter(|id| !requested.contains_key(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(handle) = self.running.remove(&id) {
                trace!(?id, "stopping subscription");
                handle.cancel();
            }
        }

        for (id, sub) in requested {
            if self.running.contains_key(&id) {
                continue;
            }
            trace!(?id, "starting subscription");
            let token = CancellationToken::new();
            let child = token.clone();
            let tx = self.tx.clone();
            let mut stream = (sub.spawn)();
            let join = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = child.cancelled() => break,
                        next = stream.next() => match next {
                            Some(msg) => {
                                if tx.send(Action::Message(msg)).is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });
            self.running.insert(id, Handle { token, join });
        }
    }

    /// Number of running subscriptions.
    pub(crate) fn len(&self) -> usize {
        self.running.len()
    }

    /// Cancels every running subscription.
    pub(crate) fn shutdown(&mut self) {
        debug!(count = self.running.len(), "shutting down subscriptions");
        for (_, handle) in self.running.drain() {
            handle.cancel();
        }
    }
}

impl<Msg> Drop for SubscriptionManager<Msg> {
    fn drop(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.token.cancel();
            handle.join.abort();
        }
    }
}
