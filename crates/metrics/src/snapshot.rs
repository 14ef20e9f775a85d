//! Accumulate every collector's output into one snapshot

use crate::collector::Collector;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// Run every collector once. A failing collector is logged and left out;
/// it never fails the snapshot as a whole.
pub fn gather(collectors: &[Arc<dyn Collector>]) -> Map<String, Value> {
    let mut snapshot = Map::new();
    snapshot.insert(
        "collected_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );

    for collector in collectors {
        match collector.collect() {
            Ok(value) => {
                snapshot.insert(collector.name().to_string(), value);
            }
            Err(err) => {
                warn!(collector = collector.name(), error = %err, "Collector failed, omitting from snapshot");
            }
        }
    }
    snapshot
}
