use thiserror::Error;
use tokio::task::JoinError;

/// Errors that abort a blast.
///
/// Per-request failures never show up here: they travel as protocol statuses
/// and end up in the errors breakdown instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run settings, detected before any ticket is issued.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The protocol adapter hit a condition the run cannot recover from.
    #[error("fatal protocol error: {0:#}")]
    Fatal(anyhow::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine task failed: {0}")]
    Join(#[from] JoinError),
}

impl Error {
    #[inline]
    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}
