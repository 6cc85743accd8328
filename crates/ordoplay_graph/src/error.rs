// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy shared by every part of the graph engine.

use thiserror::Error;

/// Errors raised by the dataflow engine.
///
/// Every variant carries a human-readable message. Nothing inside this crate
/// catches or retries these errors; they propagate to the embedding
/// application, which decides whether a failure is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Operation attempted on an object whose state forbids it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed caller input (bad JSON, duplicate ids, missing selectors)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Well-formed lookup key that does not exist
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Value present but not convertible as requested
    #[error("Invalid cast: {0}")]
    InvalidCast(String),

    /// Structurally disallowed operation on a correctly typed object
    #[error("Invalid call: {0}")]
    InvalidCall(String),

    /// Pipeline assembly failed; the graph cannot be scheduled
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}

impl GraphError {
    /// Shorthand for [`GraphError::InvalidState`]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Shorthand for [`GraphError::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for [`GraphError::OutOfRange`]
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange(message.into())
    }

    /// Shorthand for [`GraphError::InvalidCast`]
    pub fn invalid_cast(message: impl Into<String>) -> Self {
        Self::InvalidCast(message.into())
    }

    /// Shorthand for [`GraphError::InvalidCall`]
    pub fn invalid_call(message: impl Into<String>) -> Self {
        Self::InvalidCall(message.into())
    }

    /// Shorthand for [`GraphError::InvalidGraph`]
    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph(message.into())
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
