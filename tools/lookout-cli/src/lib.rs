//! Operator-side helpers behind the `lookout` command.

use anyhow::{anyhow, Context};
use lookout_core::{parse_duration, subjects, Event, Policy};
use message_queue::MessageBus;
use std::time::Duration;

/// Parse a `key=value` policy parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

/// Parse a `--timeout` value such as `5s` or `750ms`.
pub fn parse_timeout(raw: &str) -> Result<Duration, String> {
    parse_duration(raw)
        .map_err(|e| e.to_string())?
        .positive()
        .ok_or_else(|| format!("timeout must be positive, got {raw:?}"))
}

pub fn build_policy(
    name: &str,
    agent_uid: &str,
    policy_type: &str,
    params: impl IntoIterator<Item = (String, String)>,
) -> Policy {
    params
        .into_iter()
        .fold(Policy::new(name, agent_uid, policy_type), |policy, (k, v)| {
            policy.with_param(k, v)
        })
}

/// Send `policy` to `<agent_uid>_<command>` and return the agent's reply.
pub async fn send_command(
    bus: &dyn MessageBus,
    command: &str,
    policy: &Policy,
    timeout: Duration,
) -> anyhow::Result<String> {
    let subject = subjects::command(&policy.agent_uid, command);
    let payload = serde_json::to_vec(policy)?;
    let reply = bus
        .request(&subject, payload, timeout)
        .await
        .with_context(|| format!("no answer on {subject}"))?;
    reply
        .json::<String>()
        .map_err(|e| anyhow!("unexpected reply on {subject}: {e}"))
}

/// Whether a reply acknowledges `command`.
pub fn is_ack(command: &str, reply: &str) -> bool {
    reply.strip_suffix("_ack") == Some(command)
}

/// Narrow the event stream to one agent and/or one policy.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub agent_uid: Option<String>,
    pub policy_name: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.agent_uid.as_deref().map_or(true, |uid| event.agent_uid == uid)
            && self
                .policy_name
                .as_deref()
                .map_or(true, |name| event.policy_name == name)
    }
}
