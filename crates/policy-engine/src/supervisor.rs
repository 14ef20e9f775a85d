//! Tracks running policies and forwards their events to the sink.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lookout_core::{
    cancel_pair, CancelHandle, CancelSignal, EventSink, EventStream, HandlerRegistry,
    LookoutError, Policy, PolicyType, Result,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Bookkeeping for one running policy. Each start gets a fresh `id`, so a
/// forwarder that outlives its entry never removes a newer execution.
#[derive(Debug)]
struct Execution {
    id: u64,
    policy_type: PolicyType,
    started_at: DateTime<Utc>,
    cancel: CancelHandle,
}

/// Public view of a running execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningPolicy {
    pub name: String,
    pub policy_type: PolicyType,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStats {
    pub running_policies: usize,
    pub registered_types: usize,
}

/// Starts and stops policy executions, at most one per policy name.
pub struct ExecutionSupervisor {
    registry: Arc<HandlerRegistry>,
    sink: Arc<dyn EventSink>,
    running: Arc<DashMap<String, Execution>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ExecutionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSupervisor")
            .field("registry", &self.registry)
            .field("running_count", &self.running.len())
            .finish()
    }
}

impl ExecutionSupervisor {
    pub fn new(registry: Arc<HandlerRegistry>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            sink,
            running: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Execute `policy` and forward its events until stopped.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self, policy), fields(policy = %policy.name, policy_type = %policy.policy_type))]
    pub fn start(&self, policy: &Policy) -> Result<()> {
        let slot = match self.running.entry(policy.name.clone()) {
            Entry::Occupied(_) => {
                return Err(LookoutError::PolicyAlreadyRunning {
                    name: policy.name.clone(),
                })
            }
            Entry::Vacant(slot) => slot,
        };

        let (cancel, signal) = cancel_pair();
        let stream = policy.execute(&self.registry, signal.clone())?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        slot.insert(Execution {
            id,
            policy_type: policy.policy_type.clone(),
            started_at: Utc::now(),
            cancel,
        });

        tokio::spawn(forward(
            policy.name.clone(),
            id,
            stream,
            signal,
            Arc::clone(&self.sink),
            Arc::clone(&self.running),
        ));

        info!("Policy execution started");
        Ok(())
    }

    /// Cancel the execution named `name`. No event it produces afterwards
    /// reaches the sink.
    #[instrument(skip(self))]
    pub fn stop(&self, name: &str) -> Result<()> {
        let (_, execution) =
            self.running
                .remove(name)
                .ok_or_else(|| LookoutError::PolicyNotFound {
                    name: name.to_string(),
                })?;
        execution.cancel.cancel();

        info!(policy_type = %execution.policy_type, "Policy execution stopped");
        Ok(())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    /// Running executions sorted by name.
    pub fn running(&self) -> Vec<RunningPolicy> {
        let mut running: Vec<RunningPolicy> = self
            .running
            .iter()
            .map(|entry| RunningPolicy {
                name: entry.key().clone(),
                policy_type: entry.value().policy_type.clone(),
                started_at: entry.value().started_at,
            })
            .collect();
        running.sort_by(|a, b| a.name.cmp(&b.name));
        running
    }

    /// Stop everything; returns how many executions were cancelled.
    pub fn stop_all(&self) -> usize {
        let names: Vec<String> = self.running.iter().map(|e| e.key().clone()).collect();
        names.iter().filter(|name| self.stop(name).is_ok()).count()
    }

    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            running_policies: self.running.len(),
            registered_types: self.registry.types().len(),
        }
    }
}

async fn forward(
    name: String,
    id: u64,
    mut stream: EventStream,
    signal: CancelSignal,
    sink: Arc<dyn EventSink>,
    running: Arc<DashMap<String, Execution>>,
) {
    let mut forwarded: u64 = 0;
    loop {
        let event = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            next = stream.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };
        if signal.is_cancelled() {
            break;
        }

        match sink.publish(&event).await {
            Ok(()) => forwarded += 1,
            Err(err) => warn!(policy = %name, error = %err, "Dropping undeliverable event"),
        }
    }
    drop(stream);

    if running.remove_if(&name, |_, e| e.id == id).is_some() {
        info!(policy = %name, "Policy handler finished on its own");
    }
    debug!(policy = %name, forwarded, "Event forwarding ended");
}
