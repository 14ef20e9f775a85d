//! Events emitted by running policies and the sink they are forwarded to

use crate::error::{LookoutError, Result};
use crate::policy::Policy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

pub type EventData = Map<String, Value>;

/// One observation made by a running policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub policy_name: String,
    pub agent_uid: String,
    pub data: EventData,
}

impl Event {
    /// Stamp `data` with the current time and the policy's provenance.
    pub fn new(policy: &Policy, data: EventData) -> Self {
        Self {
            time: Utc::now(),
            policy_name: policy.name.clone(),
            agent_uid: policy.agent_uid.clone(),
            data,
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.data.get("status").and_then(Value::as_str)
    }
}

/// Outbound destination for every event produced on this agent.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<()>;
}

/// Sink that hands events to an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: &Event) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| LookoutError::Transport {
                reason: "event channel closed".to_string(),
            })
    }
}
