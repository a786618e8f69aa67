//! Error taxonomy for the review engine.
//!
//! Every component of the engine returns [`ReviewResult`]. Non-success HTTP
//! outcomes arrive as [`ApiError`] and are folded into
//! [`ReviewError::ConnectionFailure`] so callers only ever branch on the
//! engine-level kinds.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ReviewError {
    /// The poller gave up waiting for a resource to leave the pending set.
    #[error("timed out after {elapsed:?} waiting for remote resource ({polls} poll request(s))")]
    ConnectionTimeout { elapsed: Duration, polls: usize },

    /// Non-success HTTP outcome, transport error, or exhausted retries.
    #[error("{message}")]
    ConnectionFailure {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("vector store generation failed after {attempts} attempt(s)")]
    VectorStoreGenerationFailure { attempts: usize },

    /// Protocol-contract violation; never retried.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("engine used out of order: {0}")]
    InvalidState(String),

    #[error("state store I/O failed for {path}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state store file {path} is not valid JSON")]
    StorageFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("review task cancelled")]
    Cancelled,
}

impl ReviewError {
    pub fn connection(message: impl Into<String>) -> Self {
        ReviewError::ConnectionFailure {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_caused_by<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ReviewError::ConnectionFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Errors worth another attempt at the step-retrieval level.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReviewError::ConnectionFailure { .. } | ReviewError::ConnectionTimeout { .. }
        )
    }
}

impl From<ApiError> for ReviewError {
    fn from(err: ApiError) -> Self {
        ReviewError::connection_caused_by(err.message.clone(), err)
    }
}

impl From<reqwest::Error> for ReviewError {
    fn from(err: reqwest::Error) -> Self {
        ReviewError::connection_caused_by(format!("HTTP transport error: {}", err), err)
    }
}
