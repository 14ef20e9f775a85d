//! Policy types and validation

use crate::cancel::CancelSignal;
use crate::duration::parse_duration;
use crate::error::{LookoutError, Result};
use crate::registry::{EventStream, HandlerRegistry, PolicyHandler};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key into the handler registry, e.g. `"tcp"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyType(String);

impl PolicyType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PolicyType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for PolicyType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for PolicyType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

pub type PolicyParams = BTreeMap<String, String>;

/// A named, typed, parameterized description of a recurring check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub agent_uid: String,
    pub policy_type: PolicyType,
    /// Handler-specific parameters.
    #[serde(rename = "m", default)]
    pub params: PolicyParams,
}

impl Policy {
    pub fn new(
        name: impl Into<String>,
        agent_uid: impl Into<String>,
        policy_type: impl Into<PolicyType>,
    ) -> Self {
        Self {
            name: name.into(),
            agent_uid: agent_uid.into(),
            policy_type: policy_type.into(),
            params: PolicyParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Checked against the registry on every call; registry contents may
    /// have changed since the policy was last seen.
    pub fn validate(&self, registry: &HandlerRegistry) -> Result<()> {
        self.resolve(registry).map(|_| ())
    }

    /// Validate, then hand the policy to its registered handler.
    pub fn execute(&self, registry: &HandlerRegistry, cancel: CancelSignal) -> Result<EventStream> {
        self.resolve(registry)?.start(self, cancel)
    }

    /// The handler for this policy, or the reason the policy is invalid.
    fn resolve(&self, registry: &HandlerRegistry) -> Result<Arc<dyn PolicyHandler>> {
        if self.name.is_empty() {
            return Err(LookoutError::EmptyName);
        }
        registry
            .lookup(self.policy_type.as_str())
            .ok_or_else(|| LookoutError::UnknownType {
                policy_type: self.policy_type.to_string(),
            })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// A parameter the handler cannot run without.
    pub fn require_param(&self, key: &str) -> Result<&str> {
        self.param(key).ok_or_else(|| {
            LookoutError::invalid_parameter(
                self.policy_type.as_str(),
                format!("{key:?} key missing in {} policy", self.policy_type),
            )
        })
    }

    /// The `interval` parameter as a strictly positive duration.
    pub fn interval(&self) -> Result<Duration> {
        let raw = self.require_param(crate::params::INTERVAL)?;
        let parsed = parse_duration(raw).map_err(|e| {
            LookoutError::invalid_parameter(self.policy_type.as_str(), e.to_string())
        })?;
        parsed.positive().ok_or_else(|| {
            LookoutError::invalid_parameter(
                self.policy_type.as_str(),
                "interval must be a positive quantity",
            )
        })
    }
}
