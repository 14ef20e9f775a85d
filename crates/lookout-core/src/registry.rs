//! Handler registry: maps a policy type to the handler that executes it.

use crate::cancel::CancelSignal;
use crate::error::{LookoutError, Result};
use crate::event::Event;
use crate::policy::{Policy, PolicyType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Events produced by one running policy, in production order.
pub type EventStream = mpsc::Receiver<Event>;

/// Channel capacity used by handlers for their event streams.
pub const EVENT_BUFFER: usize = 16;

/// Executable behaviour bound to a policy type.
///
/// `start` checks the policy's parameters and fails without spawning
/// anything when they are unusable. On success it returns a stream that
/// yields events until `cancel` fires, after which the stream closes. A
/// handler must never block on a full stream once `cancel` has fired.
pub trait PolicyHandler: Send + Sync {
    fn start(&self, policy: &Policy, cancel: CancelSignal) -> Result<EventStream>;
}

impl<F> PolicyHandler for F
where
    F: Fn(&Policy, CancelSignal) -> Result<EventStream> + Send + Sync,
{
    fn start(&self, policy: &Policy, cancel: CancelSignal) -> Result<EventStream> {
        self(policy, cancel)
    }
}

/// Process-wide table of handlers, shared by `Arc`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<PolicyType, Arc<dyn PolicyHandler>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `policy_type`. Each type may be registered once.
    pub fn register<H>(&self, policy_type: impl Into<PolicyType>, handler: H) -> Result<()>
    where
        H: PolicyHandler + 'static,
    {
        let policy_type = policy_type.into();
        if policy_type.is_empty() {
            return Err(LookoutError::InvalidArgument {
                reason: "policy type can't be empty".to_string(),
            });
        }

        let mut handlers = self.handlers.write();
        if handlers.contains_key(&policy_type) {
            return Err(LookoutError::AlreadyRegistered {
                policy_type: policy_type.to_string(),
            });
        }
        info!(policy_type = %policy_type, "Registered policy handler");
        handlers.insert(policy_type, Arc::new(handler));
        Ok(())
    }

    pub fn lookup(&self, policy_type: &str) -> Option<Arc<dyn PolicyHandler>> {
        self.handlers.read().get(policy_type).cloned()
    }

    pub fn contains(&self, policy_type: &str) -> bool {
        self.handlers.read().contains_key(policy_type)
    }

    /// Registered types, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .keys()
            .map(|t| t.to_string())
            .collect();
        types.sort();
        types
    }
}
