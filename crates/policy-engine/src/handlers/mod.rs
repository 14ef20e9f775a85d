//! Built-in policy handlers
//!
//! Both reference handlers share the same shape: validate parameters up
//! front, then run a check once per interval until cancelled.

mod system_data;
mod tcp;

pub use system_data::SystemDataHandler;
pub use tcp::TcpHandler;

use lookout_core::{
    CancelSignal, Event, EventData, EventStream, HandlerRegistry, Policy, Result, EVENT_BUFFER,
};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

pub const TCP: &str = "tcp";
pub const SYSTEM_DATA: &str = "system_data";

/// Register `tcp` and `system_data` with their default configuration.
pub fn register_builtin(registry: &HandlerRegistry) -> Result<()> {
    registry.register(TCP, TcpHandler)?;
    registry.register(SYSTEM_DATA, SystemDataHandler::default())?;
    Ok(())
}

/// Spawn the tick loop shared by the built-in handlers.
///
/// The first tick fires one `period` after start. Cancellation is checked
/// before every tick and raced against every send, so a consumer that stops
/// reading can never hold the task open.
pub(crate) fn spawn_ticker<P, Fut>(
    policy: Policy,
    period: Duration,
    cancel: CancelSignal,
    mut check: P,
) -> EventStream
where
    P: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = EventData> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // An in-flight check runs to completion; its result is dropped
            // if cancellation arrived meanwhile.
            let data = check().await;
            if cancel.is_cancelled() {
                break;
            }

            let event = Event::new(&policy, data);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(event) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(policy = %policy.name, "Policy handler stopped");
    });

    rx
}
