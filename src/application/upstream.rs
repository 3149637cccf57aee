//! Port describing the upstream comment source.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::comments::Comment;

/// One page of raw comments for a resolved collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPage {
    pub subfeddit_id: i64,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("collection `{collection}` does not exist upstream")]
    NotFound { collection: String },
    #[error("upstream unavailable: {message}")]
    Unavailable { message: String },
    #[error("upstream returned a malformed response: {message}")]
    Malformed { message: String },
}

impl UpstreamError {
    pub fn not_found(collection: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Whether a caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Fetches raw comment pages. Implementations perform I/O only; they neither
/// cache nor retry.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn fetch(
        &self,
        collection: &str,
        limit: u32,
        skip: u32,
    ) -> Result<UpstreamPage, UpstreamError>;
}
