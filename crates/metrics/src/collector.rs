//! The contract every snapshot data source implements

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data unavailable: {reason}")]
    Unavailable { reason: String },
}

impl CollectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A data source consulted when building a system snapshot.
///
/// `collect` gathers the data now. The result is stored in the snapshot
/// under `name()`.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    fn collect(&self) -> Result<Value, CollectError>;
}
