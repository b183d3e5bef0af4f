use shared::error::ApiError;
use thiserror::Error;

use crate::reorder::ReorderError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("invalid move: {0}")]
    InvalidMove(#[from] ReorderError),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote store rejected request: {0}")]
    Remote(ApiError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("session closed")]
    SessionClosed,
}

impl SyncError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Transport failures and retryable remote errors may succeed on a
    /// second attempt; validation failures never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Remote(err) => err.is_retryable(),
            Self::InvalidMove(_) | Self::InvalidInput(_) | Self::SessionClosed => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
