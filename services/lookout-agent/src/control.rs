//! Remote add/delete/modify commands received over the message bus.
//!
//! Every command changes the config store and the supervisor together, so
//! commands run one at a time behind `gate`. The store lock and the
//! supervisor table are never held together: stops happen before the store
//! is touched, starts after it has been saved.

use crate::config::{AgentConfig, ConfigStore};
use lookout_core::{subjects, LookoutError, Policy, Result};
use message_queue::{publish_json, Message, MessageBus};
use policy_engine::ExecutionSupervisor;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Delete,
    Modify,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Add, Command::Delete, Command::Modify];

    /// Subject suffix, e.g. `policy_add`.
    pub fn name(self) -> &'static str {
        match self {
            Command::Add => subjects::POLICY_ADD,
            Command::Delete => subjects::POLICY_DELETE,
            Command::Modify => subjects::POLICY_MODIFY,
        }
    }

    /// Reply sent when the command succeeds.
    pub fn ack(self) -> &'static str {
        match self {
            Command::Add => "policy_add_ack",
            Command::Delete => "policy_delete_ack",
            Command::Modify => "policy_modify_ack",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ControlPlane {
    uid: String,
    store: Arc<ConfigStore>,
    supervisor: Arc<ExecutionSupervisor>,
    bus: Arc<dyn MessageBus>,
    gate: Mutex<()>,
}

impl fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlane")
            .field("uid", &self.uid)
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

impl ControlPlane {
    pub fn new(
        store: Arc<ConfigStore>,
        supervisor: Arc<ExecutionSupervisor>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            uid: store.uid(),
            store,
            supervisor,
            bus,
            gate: Mutex::new(()),
        }
    }

    pub fn subject(&self, command: Command) -> String {
        subjects::command(&self.uid, command.name())
    }

    /// Subscribe to the three command subjects. Each inbound message is
    /// handled on its own task. A listener in the returned set finishes
    /// when its subscription ends, which means the bus connection is gone.
    pub async fn listen(self: &Arc<Self>) -> Result<JoinSet<()>> {
        let mut listeners = JoinSet::new();
        for command in Command::ALL {
            let subject = self.subject(command);
            let mut subscription = self.bus.subscribe(&subject).await?;
            info!(%subject, "Listening for control commands");

            let plane = Arc::clone(self);
            listeners.spawn(async move {
                while let Some(message) = subscription.next().await {
                    let plane = Arc::clone(&plane);
                    tokio::spawn(async move { plane.dispatch(command, message).await });
                }
                warn!(subject = %subscription.subject(), "Control subscription closed");
            });
        }
        Ok(listeners)
    }

    /// Decode, apply and answer one inbound command message.
    #[instrument(skip(self, command, message), fields(command = %command, subject = %message.subject))]
    pub async fn dispatch(&self, command: Command, message: Message) {
        let reply = match serde_json::from_slice::<Policy>(&message.payload) {
            Ok(policy) => {
                info!(policy = %policy.name, "Control command received");
                match self.handle(command, policy).await {
                    Ok(()) => command.ack().to_string(),
                    Err(err) => {
                        if err.is_validation() {
                            info!(error = %err, "Control command rejected");
                        } else {
                            warn!(error = %err, "Control command failed");
                        }
                        err.to_string()
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Undecodable control payload");
                format!("invalid policy payload: {err}")
            }
        };

        match message.reply.as_deref() {
            Some(reply_subject) => {
                if let Err(err) = publish_json(self.bus.as_ref(), reply_subject, &reply).await {
                    warn!(error = %err, "Failed to send control reply");
                }
            }
            None => warn!(%reply, "Control command has no reply subject; reply dropped"),
        }
    }

    /// Apply `command` to `policy` once no other command is in progress.
    pub async fn handle(&self, command: Command, policy: Policy) -> Result<()> {
        let _gate = self.gate.lock().await;
        let policy = self.claim(policy)?;
        match command {
            Command::Add => self.add_policy(policy),
            Command::Delete => self.delete_policy(&policy.name),
            Command::Modify => self.modify_policy(policy),
        }
    }

    /// Fill in a missing agent UID; refuse policies addressed to another agent.
    fn claim(&self, mut policy: Policy) -> Result<Policy> {
        if policy.agent_uid.is_empty() {
            policy.agent_uid = self.uid.clone();
        } else if policy.agent_uid != self.uid {
            return Err(LookoutError::InvalidArgument {
                reason: format!(
                    "policy {} is addressed to agent {}, not {}",
                    policy.name, policy.agent_uid, self.uid
                ),
            });
        }
        Ok(policy)
    }

    fn add_policy(&self, policy: Policy) -> Result<()> {
        policy.validate(self.supervisor.registry())?;

        {
            let mut config = self.store.lock();
            config.add_policy(policy.clone())?;
            if let Err(err) = config.save() {
                forget(&mut config, &policy.name);
                return Err(err);
            }
        }

        if let Err(err) = self.supervisor.start(&policy) {
            let mut config = self.store.lock();
            forget(&mut config, &policy.name);
            if let Err(save_err) = config.save() {
                error!(policy = %policy.name, error = %save_err, "Failed to persist add rollback");
            }
            return Err(err);
        }
        Ok(())
    }

    fn delete_policy(&self, name: &str) -> Result<()> {
        let running = self.supervisor.is_running(name);
        let stored = self.store.lock().contains(name);
        if !running && !stored {
            return Err(LookoutError::PolicyNotFound {
                name: name.to_string(),
            });
        }

        if running && self.supervisor.stop(name).is_err() {
            debug!(policy = name, "Policy finished before it could be stopped");
        }
        if stored {
            let mut config = self.store.lock();
            config.remove_policy(name)?;
            config.save()?;
        }
        Ok(())
    }

    fn modify_policy(&self, policy: Policy) -> Result<()> {
        policy.validate(self.supervisor.registry())?;

        let name = policy.name.clone();
        let was_running = self.supervisor.is_running(&name);
        let previous = {
            let config = self.store.lock();
            config
                .policies
                .iter()
                .position(|p| p.name == name)
                .map(|index| (index, config.policies[index].clone()))
        };
        if !was_running && previous.is_none() {
            return Err(LookoutError::PolicyNotFound { name });
        }

        if was_running && self.supervisor.stop(&name).is_err() {
            debug!(policy = %name, "Policy finished before it could be stopped");
        }

        let applied = self
            .replace_stored(&policy)
            .and_then(|()| self.supervisor.start(&policy));
        if let Err(err) = applied {
            self.restore(&name, previous, was_running);
            return Err(err);
        }
        Ok(())
    }

    /// Swap in the new definition, keeping the stored position of the old one.
    fn replace_stored(&self, policy: &Policy) -> Result<()> {
        let mut config = self.store.lock();
        match config.policies.iter().position(|p| p.name == policy.name) {
            Some(index) => config.policies[index] = policy.clone(),
            None => config.add_policy(policy.clone())?,
        }
        config.save()
    }

    /// Put `previous` back at its original index after a failed modify.
    fn restore(&self, name: &str, previous: Option<(usize, Policy)>, restart: bool) {
        {
            let mut config = self.store.lock();
            forget(&mut config, name);
            if let Some((index, previous)) = &previous {
                let index = (*index).min(config.policies.len());
                config.policies.insert(index, previous.clone());
            }
            if let Err(err) = config.save() {
                error!(policy = name, error = %err, "Failed to persist restored policy");
            }
        }

        if let Some((_, previous)) = previous.filter(|_| restart) {
            if let Err(err) = self.supervisor.start(&previous) {
                error!(policy = name, error = %err, "Failed to restart previous policy definition");
            }
        }
    }
}

fn forget(config: &mut AgentConfig, name: &str) {
    config.policies.retain(|p| p.name != name);
}
