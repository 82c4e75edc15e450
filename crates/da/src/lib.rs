//! Data availability layer interface.
//!
//! The manager talks to DA through two operations: publish a block, fetch a
//! block by height. Everything else about the DA network (batching,
//! namespaces, fee handling) stays behind the implementation.

#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![allow(missing_docs)]

use async_trait::async_trait;
use cerulean_types::Block;

mod mock;
mod registry;

pub use mock::MockDaClient;
pub use registry::{AlreadyRegistered, Registry};

/// Outcome class of a DA call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    Error = 1,
    Timeout = 2,
}

/// Result of a DA operation: a status code and an optional human-readable
/// message for the logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaResult {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl DaResult {
    pub fn success() -> Self {
        Self { code: StatusCode::Success, message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { code: StatusCode::Error, message: Some(message.into()) }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self { code: StatusCode::Timeout, message: Some(message.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}

/// Result of a block retrieval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrieveBlockResult {
    pub result: DaResult,
    pub block: Option<Block>,
}

impl RetrieveBlockResult {
    pub fn success(block: Block) -> Self {
        Self { result: DaResult::success(), block: Some(block) }
    }

    pub fn failure(result: DaResult) -> Self {
        Self { result, block: None }
    }

    /// Enforces the retrieval contract: success must carry a block whose
    /// height matches the request. Violations are coerced to errors.
    pub fn normalized(self, requested_height: u64) -> Self {
        if !self.result.is_success() {
            return Self { block: None, ..self };
        }
        match &self.block {
            None => Self::failure(DaResult::error(format!(
                "DA returned success without a block for height {requested_height}"
            ))),
            Some(block) if block.height() != requested_height => {
                Self::failure(DaResult::error(format!(
                    "DA returned block at height {} for requested height {requested_height}",
                    block.height()
                )))
            }
            Some(_) => self,
        }
    }
}

/// Client for an external data availability network.
///
/// Submission is best-effort from the manager's point of view: the DA
/// layer, not the manager, owns the authoritative record. Implementations
/// must be safe to share across tasks.
#[async_trait]
pub trait DataAvailabilityClient: Send + Sync {
    async fn submit_block(&self, block: &Block) -> DaResult;

    async fn retrieve_block(&self, height: u64) -> RetrieveBlockResult;
}

#[cfg(test)]
mod tests {
    use cerulean_types::test_utils::random_block;

    use super::*;

    #[test]
    fn normalized_passes_matching_success_through() {
        let block = random_block(4, 1);
        let result = RetrieveBlockResult::success(block.clone()).normalized(4);
        assert!(result.result.is_success());
        assert_eq!(result.block, Some(block));
    }

    #[test]
    fn normalized_rejects_height_mismatch_and_missing_block() {
        let block = random_block(5, 1);
        let result = RetrieveBlockResult::success(block).normalized(4);
        assert_eq!(result.result.code, StatusCode::Error);
        assert!(result.block.is_none());

        let result = RetrieveBlockResult { result: DaResult::success(), block: None }.normalized(4);
        assert_eq!(result.result.code, StatusCode::Error);
    }

    #[test]
    fn normalized_keeps_failures_as_is() {
        let result = RetrieveBlockResult::failure(DaResult::timeout("slow lane")).normalized(4);
        assert_eq!(result.result.code, StatusCode::Timeout);
    }
}
