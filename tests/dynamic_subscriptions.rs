//! Queries mount while subscribed and unmount when the view drops them.

#![allow(clippy::expect_used)]

use std::sync::Arc;

use plaza::{
    api::{Api, MemoryBackend, Post},
    application::Application,
    command::{Action, Command},
    keys::post_keys,
    runtime::Runtime,
    subscription::{
        Subscription,
        http::{QueryClient, QueryConfig, QueryResult},
        mock::MockSource,
        time::Timer,
    },
};
use ratatui::{Frame, Terminal, backend::TestBackend};
use tokio::time::{Duration, sleep, timeout};

#[derive(Debug, Clone)]
enum Control {
    Close,
    Quit,
}

#[derive(Debug)]
enum Message {
    Control(Control),
    Post(QueryResult<Post>),
    Tick,
}

struct DetailScreen {
    api: Api,
    control: MockSource<Control>,
    open: bool,
    ticks: usize,
}

impl Application for DetailScreen {
    type Message = Message;
    type Flags = (Api, MockSource<Control>);

    fn new((api, control): (Api, MockSource<Control>)) -> (Self, Command<Message>) {
        (
            Self {
                api,
                control,
                open: true,
                ticks: 0,
            },
            Command::none(),
        )
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Control(Control::Close) => {
                self.open = false;
                Command::none()
            }
            Message::Control(Control::Quit) => Command::effect(Action::Quit),
            Message::Post(_) => Command::none(),
            Message::Tick => {
                self.ticks += 1;
                Command::none()
            }
        }
    }

    fn view(&self, _frame: &mut Frame<'_>) {}

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let mut subscriptions =
            vec![Subscription::new(self.control.clone()).map(Message::Control)];
        if self.open {
            subscriptions.extend([
                Subscription::new(self.api.post("p-1")).map(Message::Post),
                Subscription::new(Timer::every(Duration::from_millis(10))).map(|_| Message::Tick),
            ]);
        }
        subscriptions
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    while !condition() {
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_closing_a_view_unmounts_its_query() {
    let client = QueryClient::with_config(QueryConfig::new(Duration::ZERO, Duration::ZERO));
    let api = Api::new(Arc::new(MemoryBackend::demo("a-me", "me")), client.clone());
    let control = MockSource::new();
    let key = post_keys::detail("p-1");
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).expect("test terminal");

    let driver = {
        let client = client.clone();
        let control = control.clone();
        let key = key.clone();
        async move {
            wait_until(|| client.get_query_data::<Post>(&key).is_some()).await;
            assert_eq!(client.subscriber_count(&key), 1);

            wait_until(|| control.receiver_count() > 0).await;
            control.emit(Control::Close).expect("subscribed");
            wait_until(|| client.subscriber_count(&key) == 0).await;

            sleep(Duration::from_millis(5)).await;
            assert_eq!(client.collect_garbage(), 1);
            assert!(client.get_query_data::<Post>(&key).is_none());

            control.emit(Control::Quit).expect("still subscribed");
        }
    };

    let run = Runtime::<DetailScreen>::new((api, control.clone())).run(&mut terminal, 60);
    let (result, ()) = timeout(Duration::from_secs(2), async { tokio::join!(run, driver) })
        .await
        .expect("finished before the timeout");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_identical_queries_share_one_mount() {
    let client = QueryClient::new();
    let api = Api::new(Arc::new(MemoryBackend::demo("a-me", "me")), client.clone());
    let first = Subscription::new(api.post("p-1"));
    let second = Subscription::new(api.post("p-1"));
    let other = Subscription::new(api.post("p-2"));

    assert_eq!(first.id(), second.id());
    assert_ne!(first.id(), other.id());
}
