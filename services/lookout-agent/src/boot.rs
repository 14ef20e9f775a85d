//! Agent boot sequence and lifetime.

use crate::config::ConfigStore;
use crate::control::ControlPlane;
use lookout_core::{params, HandlerRegistry, Policy, Result};
use message_queue::{BusEventSink, MessageBus};
use policy_engine::{handlers, ExecutionSupervisor};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

pub const DEFAULT_POLICY_NAME: &str = "default_system_data";
pub const DEFAULT_POLICY_INTERVAL: &str = "60s";

/// The system snapshot every agent runs unless told otherwise.
pub fn default_policy(agent_uid: &str) -> Policy {
    Policy::new(DEFAULT_POLICY_NAME, agent_uid, handlers::SYSTEM_DATA)
        .with_param(params::INTERVAL, DEFAULT_POLICY_INTERVAL)
}

/// Add the default policy if the store lacks it. Returns whether it was added.
pub fn ensure_default_policy(store: &ConfigStore) -> Result<bool> {
    let mut config = store.lock();
    if config.contains(DEFAULT_POLICY_NAME) {
        return Ok(false);
    }
    let policy = default_policy(&config.uid);
    config.add_policy(policy)?;
    config.save()?;
    info!(policy = DEFAULT_POLICY_NAME, "Added default policy");
    Ok(true)
}

/// Start every stored policy. Failures are logged and skipped; returns how
/// many started.
pub fn start_stored(store: &ConfigStore, supervisor: &ExecutionSupervisor) -> usize {
    let policies = store.snapshot().policies;
    let mut started = 0;
    for policy in &policies {
        match supervisor.start(policy) {
            Ok(()) => started += 1,
            Err(err) => error!(policy = %policy.name, error = %err, "Failed to start stored policy"),
        }
    }
    info!(started, stored = policies.len(), "Stored policies started");
    started
}

/// A booted agent: policies running, control plane listening.
#[derive(Debug)]
pub struct Agent {
    store: Arc<ConfigStore>,
    supervisor: Arc<ExecutionSupervisor>,
    control: Arc<ControlPlane>,
    listeners: JoinSet<()>,
}

impl Agent {
    pub async fn boot(
        store: Arc<ConfigStore>,
        registry: Arc<HandlerRegistry>,
        bus: Arc<dyn MessageBus>,
    ) -> Result<Self> {
        ensure_default_policy(&store)?;

        let sink = Arc::new(BusEventSink::new(Arc::clone(&bus)));
        let supervisor = Arc::new(ExecutionSupervisor::new(registry, sink));
        start_stored(&store, &supervisor);

        let control = Arc::new(ControlPlane::new(
            Arc::clone(&store),
            Arc::clone(&supervisor),
            bus,
        ));
        let listeners = control.listen().await?;

        Ok(Self {
            store,
            supervisor,
            control,
            listeners,
        })
    }

    pub fn uid(&self) -> String {
        self.store.uid()
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn supervisor(&self) -> &Arc<ExecutionSupervisor> {
        &self.supervisor
    }

    pub fn control(&self) -> &Arc<ControlPlane> {
        &self.control
    }

    /// Resolves once the control plane stops listening. Subscriptions only
    /// end when the bus connection drops, so the agent can no longer be
    /// managed after this returns.
    pub async fn closed(&mut self) {
        if let Some(Err(err)) = self.listeners.join_next().await {
            error!(error = %err, "Control listener failed");
        }
        error!("Control plane lost its bus connection");
    }

    /// Stop listening and cancel every running policy.
    pub fn shutdown(mut self) {
        self.listeners.abort_all();
        let stopped = self.supervisor.stop_all();
        info!(stopped, "Agent shut down");
    }
}
