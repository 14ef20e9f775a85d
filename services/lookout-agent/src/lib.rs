//! # Lookout Agent
//!
//! The `lookoutd` daemon: persisted configuration, the bus control plane,
//! registration with the master and the boot sequence tying them together.

pub mod boot;
pub mod config;
pub mod control;
pub mod register;

pub use boot::{default_policy, ensure_default_policy, start_stored, Agent};
pub use config::{AgentConfig, ConfigGuard, ConfigStore};
pub use control::{Command, ControlPlane};
pub use register::{register, Registration};
