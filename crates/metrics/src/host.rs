//! Identity of the host and of the user the agent runs as

use crate::collector::{CollectError, Collector};
use serde_json::Value;
use std::path::PathBuf;

const KERNEL_HOSTNAME: &str = "/proc/sys/kernel/hostname";

/// Login name of the user running the agent, from `USER` or `LOGNAME`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentUser;

impl Collector for CurrentUser {
    fn name(&self) -> &str {
        "current_user"
    }

    fn collect(&self) -> Result<Value, CollectError> {
        ["USER", "LOGNAME"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
            .map(Value::String)
            .ok_or_else(|| CollectError::Unavailable {
                reason: "neither USER nor LOGNAME is set".to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct HostName {
    path: PathBuf,
}

impl HostName {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<String, CollectError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
            Ok(_) => Err(CollectError::Unavailable {
                reason: format!("{} is empty", self.path.display()),
            }),
            Err(err) => std::env::var("HOSTNAME")
                .ok()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| CollectError::io(&self.path, err)),
        }
    }
}

impl Default for HostName {
    fn default() -> Self {
        Self::new(KERNEL_HOSTNAME)
    }
}

impl Collector for HostName {
    fn name(&self) -> &str {
        "host_name"
    }

    fn collect(&self) -> Result<Value, CollectError> {
        self.read().map(Value::String)
    }
}

/// Best-effort host name for registration; empty when it can't be determined.
pub fn host_name() -> String {
    HostName::default().read().unwrap_or_default()
}
