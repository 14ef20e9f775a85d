//! Error types for message bus adapters

use lookout_core::LookoutError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("invalid bus URL: {url}")]
    InvalidUrl { url: String },

    #[error("invalid subject: {subject:?}")]
    InvalidSubject { subject: String },

    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    #[error("no reply on {subject} before the timeout")]
    Timeout { subject: String },

    #[error("connection closed")]
    Closed,

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("payload encoding error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl From<BusError> for LookoutError {
    fn from(err: BusError) -> Self {
        LookoutError::Transport {
            reason: err.to_string(),
        }
    }
}
