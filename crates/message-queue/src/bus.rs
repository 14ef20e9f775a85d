//! The publish/subscribe contract the agent and the CLI are written against

use crate::error::BusError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    /// Correlation address the sender expects a reply on.
    pub reply: Option<String>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Messages received on one subject, in arrival order.
#[derive(Debug)]
pub struct Subscription {
    subject: String,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    pub fn new(subject: impl Into<String>, rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            subject: subject.into(),
            rx,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// `None` once the bus has dropped the subscription.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `subject`, optionally naming a reply subject.
    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<(), BusError>;

    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError>;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.publish_with_reply(subject, None, payload).await
    }

    /// Publish on `subject` and wait for the first reply on a fresh inbox.
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Message, BusError> {
        let inbox = new_inbox();
        let mut replies = self.subscribe(&inbox).await?;
        self.publish_with_reply(subject, Some(&inbox), payload)
            .await?;

        match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(BusError::Closed),
            Err(_) => Err(BusError::Timeout {
                subject: subject.to_string(),
            }),
        }
    }
}

/// A unique reply subject.
pub fn new_inbox() -> String {
    format!("_INBOX.{}", Uuid::new_v4().simple())
}

/// Serialize `value` as JSON and publish it.
pub async fn publish_json<T: Serialize + ?Sized>(
    bus: &dyn MessageBus,
    subject: &str,
    value: &T,
) -> Result<(), BusError> {
    let payload = serde_json::to_vec(value)?;
    bus.publish(subject, payload).await
}

pub(crate) fn validate_subject(subject: &str) -> Result<(), BusError> {
    if subject.is_empty() || subject.chars().any(char::is_whitespace) {
        return Err(BusError::InvalidSubject {
            subject: subject.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inboxes_are_unique() {
        let first = new_inbox();
        assert!(first.starts_with("_INBOX."));
        assert_ne!(first, new_inbox());
    }

    #[test]
    fn test_subject_validation() {
        assert!(validate_subject("policy_events").is_ok());
        assert!(validate_subject("").is_err());
        assert!(validate_subject("has space").is_err());
    }

    #[test]
    fn test_message_json() {
        let message = Message {
            subject: "s".into(),
            reply: None,
            payload: br#""policy_add_ack""#.to_vec(),
        };
        let decoded: String = message.json().unwrap();
        assert_eq!(decoded, "policy_add_ack");
    }
}
