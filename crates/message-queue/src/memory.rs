//! Process-local bus. Subjects match exactly; there are no wildcards.

use crate::bus::{validate_subject, Message, MessageBus, Subscription};
use crate::error::BusError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Default)]
pub struct InMemoryBus {
    subscribers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Message>>>>,
}

impl fmt::Debug for InMemoryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subjects = self.subscribers.read();
        f.debug_struct("InMemoryBus")
            .field("subjects", &subjects.len())
            .finish()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions on `subject`.
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.subscribers
            .read()
            .get(subject)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        validate_subject(subject)?;
        let message = Message {
            subject: subject.to_string(),
            reply: reply.map(str::to_string),
            payload,
        };

        let mut subscribers = self.subscribers.write();
        if let Some(senders) = subscribers.get_mut(subject) {
            senders.retain(|tx| tx.send(message.clone()).is_ok());
            trace!(subject, delivered = senders.len(), "Published message");
            if senders.is_empty() {
                subscribers.remove(subject);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        validate_subject(subject)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(subject, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fan_out_to_every_subscriber() {
        let bus = InMemoryBus::new();
        let mut first = bus.subscribe("policy_events").await.unwrap();
        let mut second = bus.subscribe("policy_events").await.unwrap();
        let mut other = bus.subscribe("other").await.unwrap();

        bus.publish("policy_events", b"one".to_vec()).await.unwrap();

        assert_eq!(first.next().await.unwrap().payload, b"one");
        assert_eq!(second.next().await.unwrap().payload, b"one");
        let nothing = tokio::time::timeout(Duration::from_millis(20), other.next()).await;
        assert!(nothing.is_err(), "unrelated subject should not receive the message");
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_pruned() {
        let bus = InMemoryBus::new();
        let subscription = bus.subscribe("s").await.unwrap();
        assert_eq!(bus.subscriber_count("s"), 1);

        drop(subscription);
        bus.publish("s", Vec::new()).await.unwrap();
        assert_eq!(bus.subscriber_count("s"), 0);
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = Arc::new(InMemoryBus::new());
        let mut service = bus.subscribe("echo").await.unwrap();

        let responder = Arc::clone(&bus);
        tokio::spawn(async move {
            let request = service.next().await.unwrap();
            let reply = request.reply.expect("request should carry a reply subject");
            responder.publish(&reply, request.payload).await.unwrap();
        });

        let response = bus
            .request("echo", b"ping".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.payload, b"ping");
    }

    #[tokio::test]
    async fn test_request_times_out_without_responder() {
        let bus = InMemoryBus::new();
        let result = bus
            .request("nobody", Vec::new(), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(BusError::Timeout { .. })));
    }
}
