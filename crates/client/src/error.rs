//! Library error types.

use thiserror::Error;

/// Input problems detected locally, before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("item list is empty after trimming")]
    EmptyItemList,

    #[error("unknown process type: {0}")]
    UnknownProcessType(String),
}
