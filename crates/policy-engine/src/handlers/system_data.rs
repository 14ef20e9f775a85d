//! Periodic system snapshot

use super::spawn_ticker;
use lookout_core::{CancelSignal, EventData, EventStream, Policy, PolicyHandler, Result};
use metrics::Collector;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Gathers a snapshot from its collectors every `interval`.
#[derive(Clone)]
pub struct SystemDataHandler {
    collectors: Arc<Vec<Arc<dyn Collector>>>,
}

impl SystemDataHandler {
    pub fn with_collectors(collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self {
            collectors: Arc::new(collectors),
        }
    }
}

impl Default for SystemDataHandler {
    fn default() -> Self {
        Self::with_collectors(metrics::default_collectors())
    }
}

impl fmt::Debug for SystemDataHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.collectors.iter().map(|c| c.name()).collect();
        f.debug_struct("SystemDataHandler")
            .field("collectors", &names)
            .finish()
    }
}

impl PolicyHandler for SystemDataHandler {
    fn start(&self, policy: &Policy, cancel: CancelSignal) -> Result<EventStream> {
        let interval = policy.interval()?;
        let collectors = Arc::clone(&self.collectors);

        Ok(spawn_ticker(policy.clone(), interval, cancel, move || {
            let collectors = Arc::clone(&collectors);
            async move {
                // Collectors do blocking filesystem reads.
                match tokio::task::spawn_blocking(move || metrics::gather(&collectors)).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(error = %err, "Snapshot collection panicked");
                        let mut data = EventData::new();
                        data.insert("error".into(), Value::from(err.to_string()));
                        data
                    }
                }
            }
        }))
    }
}
