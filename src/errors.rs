use std::result;
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Error, Debug)]
pub enum SyncErrorType {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Computation failed: {0}")]
    Computation(Arc<anyhow::Error>),
    #[error("Completion abandoned before a value was produced")]
    Abandoned,
    #[error("Timed out while waiting for completion")]
    Timeout,
}

impl SyncErrorType {
    pub(crate) fn computation(err: anyhow::Error) -> Self {
        SyncErrorType::Computation(Arc::new(err))
    }

    ///
    /// Whether this error was produced by a failing computation.
    pub fn is_computation(&self) -> bool {
        matches!(self, SyncErrorType::Computation(_))
    }
}

pub type SyncResult<T> = result::Result<T, SyncErrorType>;
