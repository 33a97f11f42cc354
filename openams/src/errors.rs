//! Error types for the provisioning workflow.
//!
//! Variants follow the recovery path an operator takes:
//! - [`ProvisionError::PreconditionUnmet`], [`ProvisionError::Ambiguous`]: fix the setup, re-run
//! - [`ProvisionError::Timeout`]: the hardware never appeared on the bus
//! - [`ProvisionError::ToolMissing`]: install the tool or relax the policy
//! - [`ProvisionError::CommandFailed`]: an external build/flash/probe step failed

use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Something a stage depends on is absent (artifact, profile, identity).
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(String),

    /// Discovery did not yield exactly the identities the stage requires.
    #[error("ambiguous result: {0}")]
    Ambiguous(String),

    /// A bounded wait expired.
    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { what: String, after: Duration },

    /// A required external program is not installed.
    #[error("required tool not found: {0}")]
    ToolMissing(String),

    /// An external command exited with a non-zero status.
    #[error("`{command}` exited with status {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("storage: {0}")]
    Storage(String),

    #[error("config: {0}")]
    Config(String),

    /// A write would overwrite an already-recorded checkpoint.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Another provisioning process holds the state lock.
    #[error("{0}")]
    Locked(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl ProvisionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProvisionError::Timeout { .. })
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_the_wait() {
        let err = ProvisionError::Timeout {
            what: "mainboard identity".to_string(),
            after: Duration::from_secs(900),
        };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "timed out after 900s waiting for mainboard identity"
        );
    }

    #[test]
    fn test_command_failed_is_not_timeout() {
        let err = ProvisionError::CommandFailed {
            command: "make".to_string(),
            code: 2,
        };
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("status 2"));
    }
}
