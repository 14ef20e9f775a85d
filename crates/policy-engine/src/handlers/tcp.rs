//! Periodic TCP reachability check

use super::spawn_ticker;
use lookout_core::{params, CancelSignal, EventData, EventStream, LookoutError, Policy, PolicyHandler, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;

/// Connects to `address` every `interval`, reporting `success` or `failure`.
/// Each attempt is bounded by the interval itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpHandler;

impl PolicyHandler for TcpHandler {
    fn start(&self, policy: &Policy, cancel: CancelSignal) -> Result<EventStream> {
        let address = policy.require_param(params::ADDRESS)?.to_string();
        check_address(policy, &address)?;
        let interval = policy.interval()?;

        Ok(spawn_ticker(policy.clone(), interval, cancel, move || {
            let address = address.clone();
            async move { try_connect(&address, interval).await }
        }))
    }
}

fn check_address(policy: &Policy, address: &str) -> Result<()> {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(LookoutError::invalid_parameter(
            policy.policy_type.as_str(),
            format!("address {address:?} must be host:port"),
        )),
    }
}

async fn try_connect(address: &str, timeout: Duration) -> EventData {
    let mut data = EventData::new();
    let failure = match time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(_) => Some(format!("connection timed out after {timeout:?}")),
    };

    match failure {
        None => {
            data.insert("status".into(), Value::from("success"));
        }
        Some(error) => {
            data.insert("status".into(), Value::from("failure"));
            data.insert("error".into(), Value::from(error));
        }
    }
    data
}
