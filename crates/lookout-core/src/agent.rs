//! Agent identity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh agent UID: 32 lowercase hex characters.
pub fn generate_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// What an agent tells the master server about itself when registering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub uid: String,
    #[serde(default)]
    pub host_name: String,
}

impl AgentInfo {
    pub fn new(uid: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            host_name: host_name.into(),
        }
    }
}
