//! # Lookout Metrics
//!
//! Shallow host data collectors. Each implements [`Collector`]; the
//! `system_data` policy runs them on every tick via [`gather`].

pub mod collector;
pub mod host;
pub mod network;
pub mod process;
pub mod snapshot;

pub use collector::{CollectError, Collector};
pub use host::{host_name, CurrentUser, HostName};
pub use network::NetworkInterfaces;
pub use process::ProcessList;
pub use snapshot::gather;

use std::sync::Arc;

/// The collectors consulted by the `system_data` policy.
pub fn default_collectors() -> Vec<Arc<dyn Collector>> {
    vec![
        Arc::new(CurrentUser),
        Arc::new(HostName::default()),
        Arc::new(ProcessList::default()),
        Arc::new(NetworkInterfaces::default()),
    ]
}
