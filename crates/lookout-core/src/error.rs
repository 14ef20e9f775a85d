//! Error types for the Lookout agent

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LookoutError>;

#[derive(Error, Debug)]
pub enum LookoutError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Handler already registered for policy type: {policy_type}")]
    AlreadyRegistered { policy_type: String },

    #[error("Policy name can't be empty")]
    EmptyName,

    #[error("Unknown policy type: {policy_type}")]
    UnknownType { policy_type: String },

    #[error("Invalid {policy_type} policy parameters: {reason}")]
    InvalidParameter { policy_type: String, reason: String },

    #[error("Policy with the given name already exists: {name}")]
    DuplicateName { name: String },

    #[error("Policy not found: {name}")]
    PolicyNotFound { name: String },

    #[error("Policy already running: {name}")]
    PolicyAlreadyRunning { name: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Agent registration failed: {reason}")]
    Registration { reason: String },

    #[error("Message bus operation failed: {reason}")]
    Transport { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl LookoutError {
    /// Shorthand for a parameter error raised by the handler of `policy_type`.
    pub fn invalid_parameter(policy_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            policy_type: policy_type.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than by the agent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::EmptyName
                | Self::UnknownType { .. }
                | Self::InvalidParameter { .. }
                | Self::DuplicateName { .. }
                | Self::PolicyNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_mistakes_are_validation_errors() {
        assert!(LookoutError::EmptyName.is_validation());
        assert!(LookoutError::invalid_parameter("tcp", "missing address").is_validation());
        assert!(LookoutError::PolicyNotFound { name: "web".into() }.is_validation());

        assert!(!LookoutError::Transport {
            reason: "connection reset".into()
        }
        .is_validation());
        assert!(!LookoutError::PolicyAlreadyRunning { name: "web".into() }.is_validation());
        assert!(!LookoutError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full")).is_validation());
    }
}
