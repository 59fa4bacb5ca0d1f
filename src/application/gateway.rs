//! Port describing the remote post collection.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::posts::{Post, PostFields, PostId};

/// Failure of a single round trip to the remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response (status {status}): {message}")]
    Response { status: u16, message: String },
    #[error("request rejected (status {status}): {message}")]
    Validation { status: u16, message: String },
    #[error("post `{id}` not found")]
    NotFound { id: PostId },
}

impl GatewayError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn response(status: u16, message: impl Into<String>) -> Self {
        Self::Response {
            status,
            message: message.into(),
        }
    }

    pub fn validation(status: u16, message: impl Into<String>) -> Self {
        Self::Validation {
            status,
            message: message.into(),
        }
    }

    /// Short machine-friendly label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Response { .. } => "response",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
        }
    }
}

/// The four operations the remote collection offers.
///
/// Implementations perform exactly one round trip per call, never retry, and
/// return failures classified but otherwise unchanged.
#[async_trait]
pub trait PostsGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<Post>, GatewayError>;

    async fn create(&self, fields: &PostFields) -> Result<Post, GatewayError>;

    async fn update(&self, id: &PostId, fields: &PostFields) -> Result<Post, GatewayError>;

    /// Deleting an id the store no longer has is not an error.
    async fn delete(&self, id: &PostId) -> Result<(), GatewayError>;
}
