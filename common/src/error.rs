use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// A target specification that is neither an address, a CIDR block nor a range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid target '{spec}': {reason}")]
    InvalidTarget { spec: String, reason: String },
}

impl TargetError {
    pub fn invalid(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reasons a sweep refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
    #[error("a sweep is already running")]
    AlreadyRunning,
}

/// Failure to obtain a report from an OS tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{0}' is not installed")]
    NotFound(String),
    #[error("'{program}' did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("failed to run '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("a port scan of {0} is already in progress")]
    InProgress(IpAddr),
}
