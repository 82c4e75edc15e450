#![allow(missing_docs)]

use cerulean_types::ValidationError;
use thiserror::Error;

/// Rejection reported by the application backend.
///
/// The backend decides whether the failure is worth retrying; a rejection
/// of a self-produced block is always fatal for the proposer regardless.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    pub message: String,
    pub retriable: bool,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The block is malformed. Fatal when the block is our own.
    #[error("invalid block: {0}")]
    InvalidBlock(#[from] ValidationError),

    #[error("block height {got} does not follow applied height {applied}")]
    UnexpectedHeight { applied: u64, got: u64 },

    #[error("block chain id {got:?} does not match {expected:?}")]
    ChainIdMismatch { expected: String, got: String },

    /// The application backend rejected the block.
    #[error("application error: {0}")]
    App(#[source] AppError),
}

impl ExecutorError {
    /// True only for application errors the backend marked retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::App(err) if err.retriable)
    }
}
