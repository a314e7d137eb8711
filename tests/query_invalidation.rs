//! A mounted listing picks up a mutation's invalidation through the runtime.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use plaza::{
    api::{Api, MemoryBackend, Post, PostFilter},
    application::Application,
    command::{Action, Command},
    keys::post_keys,
    mutations::MutationResult,
    runtime::Runtime,
    subscription::{
        Subscription,
        http::{QueryClient, QueryConfig, QueryResult, QueryState},
    },
};
use ratatui::{Frame, Terminal, backend::TestBackend};
use tokio::time::{Duration, timeout};

type Log = Arc<Mutex<Vec<Vec<String>>>>;

#[derive(Debug)]
enum Message {
    Posts(QueryResult<Vec<Post>>),
    Deleted(MutationResult<()>),
}

struct DeleteWatcher {
    api: Api,
    log: Log,
    deleted: bool,
}

impl Application for DeleteWatcher {
    type Message = Message;
    type Flags = (Api, Log);

    fn new((api, log): (Api, Log)) -> (Self, Command<Message>) {
        (
            Self {
                api,
                log,
                deleted: false,
            },
            Command::none(),
        )
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Posts(QueryResult {
                state: QueryState::Success {
                    data,
                    is_stale: false,
                },
                ..
            }) => {
                let ids: Vec<String> = data.into_iter().map(|post| post.post_id).collect();
                let gone = !ids.iter().any(|id| id == "p-6");
                self.log.lock().expect("log lock").push(ids);
                if !self.deleted {
                    self.deleted = true;
                    self.api.delete_post("p-6").map(Message::Deleted)
                } else if gone {
                    Command::effect(Action::Quit)
                } else {
                    Command::none()
                }
            }
            Message::Posts(_) => Command::none(),
            Message::Deleted(result) => {
                result.expect("delete succeeds");
                Command::none()
            }
        }
    }

    fn view(&self, _frame: &mut Frame<'_>) {}

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        vec![Subscription::new(self.api.posts(PostFilter::default())).map(Message::Posts)]
    }
}

#[tokio::test]
async fn test_delete_refetches_mounted_listing() {
    let backend = Arc::new(MemoryBackend::demo("a-me", "me"));
    let client = QueryClient::with_config(QueryConfig::new(
        Duration::from_secs(60),
        Duration::from_secs(60),
    ));
    let api = Api::new(backend.clone(), client.clone());
    let log = Log::default();
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).expect("test terminal");

    let result = timeout(
        Duration::from_secs(2),
        Runtime::<DeleteWatcher>::new((api, log.clone())).run(&mut terminal, 60),
    )
    .await
    .expect("listing refetched before the timeout");
    assert!(result.is_ok());

    let log = log.lock().expect("log lock");
    assert_eq!(log.len(), 2);
    assert!(log[0].iter().any(|id| id == "p-6"));
    assert!(!log[1].iter().any(|id| id == "p-6"));
    // the stale-time window would have served the cache without the invalidation
    assert_eq!(backend.calls("posts").await, 2);
    assert_eq!(backend.calls("delete_post").await, 1);
    assert!(
        client
            .get_query_data::<Vec<Post>>(&post_keys::listing_params(&PostFilter::default()))
            .is_some_and(|posts| posts.iter().all(|post| post.post_id != "p-6"))
    );
}
