//! Event sink that publishes every event on the bus

use crate::bus::MessageBus;
use async_trait::async_trait;
use lookout_core::{subjects, Event, EventSink, LookoutError, Result};
use std::fmt;
use std::sync::Arc;

/// Publishes events as JSON on `policy_events` (or a custom subject).
pub struct BusEventSink {
    bus: Arc<dyn MessageBus>,
    subject: String,
}

impl fmt::Debug for BusEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusEventSink")
            .field("subject", &self.subject)
            .finish()
    }
}

impl BusEventSink {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self::with_subject(bus, subjects::POLICY_EVENTS)
    }

    pub fn with_subject(bus: Arc<dyn MessageBus>, subject: impl Into<String>) -> Self {
        Self {
            bus,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl EventSink for BusEventSink {
    async fn publish(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.bus
            .publish(&self.subject, payload)
            .await
            .map_err(LookoutError::from)
    }
}
