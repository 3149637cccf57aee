use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::Response;
use thiserror::Error;

use crate::{
    application::upstream::UpstreamError, cache::Abandoned, infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failures of [`crate::application::pipeline::CommentPipeline`].
///
/// The type is `Clone` because a single coalesced failure is handed to every
/// caller waiting on the same key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("collection `{collection}` not found")]
    NotFound { collection: String },
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },
    #[error("internal invariant violated: {message}")]
    InternalInvariantViolation { message: String },
}

impl PipelineError {
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            message: message.into(),
        }
    }
}

impl From<UpstreamError> for PipelineError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::NotFound { collection } => Self::NotFound { collection },
            UpstreamError::Unavailable { message } => Self::UpstreamUnavailable { message },
            err @ UpstreamError::Malformed { .. } => Self::UpstreamUnavailable {
                message: err.to_string(),
            },
        }
    }
}

impl From<Abandoned> for PipelineError {
    fn from(error: Abandoned) -> Self {
        Self::invariant(error.to_string())
    }
}

/// Process-level failures surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_map_onto_pipeline_taxonomy() {
        assert_eq!(
            PipelineError::from(UpstreamError::not_found("rust")),
            PipelineError::NotFound {
                collection: "rust".to_string()
            }
        );
        assert!(matches!(
            PipelineError::from(UpstreamError::unavailable("connection refused")),
            PipelineError::UpstreamUnavailable { .. }
        ));
        assert!(matches!(
            PipelineError::from(UpstreamError::malformed("missing field `comments`")),
            PipelineError::UpstreamUnavailable { .. }
        ));
    }

    #[test]
    fn abandoned_producer_is_an_invariant_violation() {
        assert!(matches!(
            PipelineError::from(Abandoned),
            PipelineError::InternalInvariantViolation { .. }
        ));
    }

    #[test]
    fn error_report_collects_source_chain() {
        let addr = "127.0.0.1:8000".parse().expect("addr");
        let error = AppError::from(InfraError::bind(
            addr,
            std::io::Error::other("address in use"),
        ));
        let report = ErrorReport::from_error("serve", StatusCode::INTERNAL_SERVER_ERROR, &error);
        assert_eq!(
            report.messages,
            vec![
                "failed to bind 127.0.0.1:8000: address in use".to_string(),
                "address in use".to_string(),
            ]
        );
    }
}
