use cucumber::{given, then, when, World};
use message_queue::{BusError, InMemoryBus, Message, MessageBus, Subscription};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, World)]
#[world(init = Self::new)]
struct MessageQueueWorld {
    bus: Arc<InMemoryBus>,
    subscribers: Vec<Subscription>,
    reply: Option<Result<Message, BusError>>,
}

impl MessageQueueWorld {
    fn new() -> Self {
        Self {
            bus: Arc::new(InMemoryBus::new()),
            subscribers: Vec::new(),
            reply: None,
        }
    }
}

#[given("an in-memory bus")]
async fn given_bus(world: &mut MessageQueueWorld) {
    world.bus = Arc::new(InMemoryBus::new());
}

#[given(expr = "{int} subscribers on {string}")]
async fn given_subscribers(world: &mut MessageQueueWorld, count: usize, subject: String) {
    for _ in 0..count {
        let subscription = world.bus.subscribe(&subject).await.unwrap();
        world.subscribers.push(subscription);
    }
}

#[given(expr = "a responder on {string} that replies {string}")]
async fn given_responder(world: &mut MessageQueueWorld, subject: String, answer: String) {
    let mut requests = world.bus.subscribe(&subject).await.unwrap();
    let bus = Arc::clone(&world.bus);
    tokio::spawn(async move {
        while let Some(request) = requests.next().await {
            if let Some(reply) = request.reply {
                let payload = serde_json::to_vec(&answer).unwrap();
                bus.publish(&reply, payload).await.unwrap();
            }
        }
    });
}

#[when(expr = "I publish {string} on {string}")]
async fn when_publish(world: &mut MessageQueueWorld, payload: String, subject: String) {
    world
        .bus
        .publish(&subject, payload.into_bytes())
        .await
        .unwrap();
}

#[when(expr = "I send the request {string} to {string}")]
async fn when_request(world: &mut MessageQueueWorld, payload: String, subject: String) {
    let reply = world
        .bus
        .request(&subject, payload.into_bytes(), Duration::from_millis(200))
        .await;
    world.reply = Some(reply);
}

#[then(expr = "every subscriber should receive {string}")]
async fn then_all_receive(world: &mut MessageQueueWorld, expected: String) {
    for subscription in &mut world.subscribers {
        let message = subscription.next().await.expect("message should arrive");
        assert_eq!(message.payload, expected.as_bytes());
    }
}

#[then(expr = "the reply should be {string}")]
async fn then_reply_is(world: &mut MessageQueueWorld, expected: String) {
    let message = match world.reply.take() {
        Some(Ok(message)) => message,
        other => panic!("expected a reply, got {other:?}"),
    };
    let text: String = message.json().unwrap();
    assert_eq!(text, expected);
}

#[then("the request should time out")]
async fn then_timed_out(world: &mut MessageQueueWorld) {
    assert!(matches!(world.reply, Some(Err(BusError::Timeout { .. }))));
}

#[tokio::main]
async fn main() {
    MessageQueueWorld::cucumber().run_and_exit("tests/features").await;
}
