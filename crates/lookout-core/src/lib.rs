//! # Lookout Core
//!
//! Core types and traits for the Lookout monitoring agent.
//!
//! - [`Policy`]: a named, typed, parameterized check an agent runs
//! - [`HandlerRegistry`]: runtime table from policy type to [`PolicyHandler`]
//! - [`Event`]: one observation, forwarded to an [`EventSink`]
//! - [`cancel_pair`]: cooperative cancellation threaded into every handler

pub mod agent;
pub mod cancel;
pub mod duration;
pub mod error;
pub mod event;
pub mod policy;
pub mod registry;

pub use agent::{generate_uid, AgentInfo};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use duration::{parse_duration, DurationError, SignedDuration};
pub use error::{LookoutError, Result};
pub use event::{ChannelSink, Event, EventData, EventSink};
pub use policy::{Policy, PolicyParams, PolicyType};
pub use registry::{EventStream, HandlerRegistry, PolicyHandler, EVENT_BUFFER};

/// Current Lookout version for compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lookout build information for logs and debugging
pub const BUILD_INFO: &str = concat!(
    "Lookout ",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_NAME"),
    ")"
);

/// Message bus subjects shared by agents and controllers
pub mod subjects {
    /// Outbound subject carrying every event from every running policy.
    pub const POLICY_EVENTS: &str = "policy_events";

    pub const POLICY_ADD: &str = "policy_add";
    pub const POLICY_DELETE: &str = "policy_delete";
    pub const POLICY_MODIFY: &str = "policy_modify";

    /// Agent-scoped command subject, e.g. `"13fcdf794886_policy_add"`.
    pub fn command(agent_uid: &str, command: &str) -> String {
        format!("{agent_uid}_{command}")
    }
}

/// Master server HTTP paths
pub mod endpoints {
    pub const API_AGENTS: &str = "/api/agents";
}

/// Well-known policy parameter keys
pub mod params {
    pub const INTERVAL: &str = "interval";
    pub const ADDRESS: &str = "address";
}
